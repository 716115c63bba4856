// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Emit the daemon dispatch table source: procedure enum and flags table.
// Author: Lukas Bower

use action_registry::{Registry, StreamDirection};
use appliance_wire::{CallLayout, Protocol};
use std::fmt::Write as _;

use super::backend::camel_case;

pub const FLAG_CANCELLABLE: u32 = 1 << 0;
pub const FLAG_PROGRESS: u32 = 1 << 1;
pub const FLAG_UPLOAD: u32 = 1 << 2;
pub const FLAG_DOWNLOAD: u32 = 1 << 3;
pub const FLAG_OPTARGS: u32 = 1 << 4;

/// Enum variant for a procedure; the registry keeps these distinct.
fn variant(registry: &Registry, layout: &CallLayout) -> String {
    registry
        .get(&layout.name)
        .map(|action| action.derived.display_name.clone())
        .unwrap_or_else(|| camel_case(&layout.name))
}

fn flags(layout: &CallLayout) -> u32 {
    let mut flags = 0;
    if layout.cancellable {
        flags |= FLAG_CANCELLABLE;
    }
    if layout.progress {
        flags |= FLAG_PROGRESS;
    }
    match layout.stream {
        Some(StreamDirection::Upload) => flags |= FLAG_UPLOAD,
        Some(StreamDirection::Download) => flags |= FLAG_DOWNLOAD,
        None => {}
    }
    if !layout.optargs.is_empty() {
        flags |= FLAG_OPTARGS;
    }
    flags
}

pub fn render_dispatch_table(registry: &Registry, protocol: &Protocol, fingerprint: &str) -> String {
    let mut out = String::new();
    writeln!(out, "// Author: Lukas Bower").ok();
    writeln!(
        out,
        "// Purpose: Generated procedure table for the appliance daemon."
    )
    .ok();
    writeln!(out, "// @generated by action-rtc; do not edit.\n").ok();
    writeln!(out, "pub const REGISTRY_SHA256: &str = \"{fingerprint}\";").ok();
    writeln!(out, "pub const PROTOCOL_VERSION: u32 = {};", protocol.version).ok();
    writeln!(out, "pub const MAX_PROC_NR: u32 = {};\n", registry.max_proc_nr()).ok();
    for (name, value) in [
        ("FLAG_CANCELLABLE", FLAG_CANCELLABLE),
        ("FLAG_PROGRESS", FLAG_PROGRESS),
        ("FLAG_UPLOAD", FLAG_UPLOAD),
        ("FLAG_DOWNLOAD", FLAG_DOWNLOAD),
        ("FLAG_OPTARGS", FLAG_OPTARGS),
    ] {
        writeln!(out, "pub const {name}: u32 = {value:#x};").ok();
    }

    writeln!(out, "\n#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]").ok();
    writeln!(out, "#[repr(u32)]\npub enum Procedure {{").ok();
    for layout in protocol.iter() {
        writeln!(out, "    {} = {},", variant(registry, layout), layout.proc_nr).ok();
    }
    writeln!(out, "}}\n").ok();

    writeln!(out, "impl Procedure {{").ok();
    writeln!(out, "    pub fn from_u32(proc_nr: u32) -> Option<Self> {{").ok();
    writeln!(out, "        match proc_nr {{").ok();
    for layout in protocol.iter() {
        writeln!(
            out,
            "            {} => Some(Self::{}),",
            layout.proc_nr,
            variant(registry, layout)
        )
        .ok();
    }
    writeln!(out, "            _ => None,\n        }}\n    }}\n").ok();
    writeln!(out, "    pub fn name(self) -> &'static str {{").ok();
    writeln!(out, "        match self {{").ok();
    for layout in protocol.iter() {
        writeln!(
            out,
            "            Self::{} => {:?},",
            variant(registry, layout),
            layout.name
        )
        .ok();
    }
    writeln!(out, "        }}\n    }}\n}}\n").ok();

    writeln!(out, "/// `(proc_nr, action, flags)` in procedure order.").ok();
    writeln!(out, "pub const PROCEDURES: &[(u32, &str, u32)] = &[").ok();
    for layout in protocol.iter() {
        writeln!(
            out,
            "    ({}, {:?}, {:#x}),",
            layout.proc_nr,
            layout.name,
            flags(layout)
        )
        .ok();
    }
    writeln!(out, "];").ok();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use appliance_wire::WireKind;

    #[test]
    fn flags_follow_layout_attributes() {
        let layout = CallLayout {
            name: "download".to_owned(),
            proc_nr: 24,
            args: Vec::new(),
            optargs: Vec::new(),
            reply: WireKind::Unit,
            stream: Some(StreamDirection::Download),
            cancellable: true,
            progress: true,
            oversize_warning: false,
        };
        assert_eq!(flags(&layout), FLAG_CANCELLABLE | FLAG_PROGRESS | FLAG_DOWNLOAD);
    }
}
