// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Procedure table binding compiled layouts to native implementations.
// Author: Lukas Bower

use std::collections::BTreeMap;

use action_registry::Registry;
use appliance_wire::{CallLayout, Protocol};
use log::{debug, info, warn};

use crate::error::DispatchError;
use crate::native::{NativeFn, NativeSet};

/// What to do with daemon actions that have no native implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unimplemented {
    /// Refuse to build the table.
    #[default]
    Reject,
    /// Build anyway and answer calls with `ENOTSUP`.
    AnswerEnotsup,
}

/// One routable procedure.
pub struct Entry {
    layout: CallLayout,
    native: Option<NativeFn>,
    feature: Option<String>,
}

impl Entry {
    #[must_use]
    pub fn layout(&self) -> &CallLayout {
        &self.layout
    }

    #[must_use]
    pub fn is_implemented(&self) -> bool {
        self.native.is_some()
    }

    /// Optional appliance feature the action belongs to.
    #[must_use]
    pub fn feature(&self) -> Option<&str> {
        self.feature.as_deref()
    }

    pub(crate) fn native(&self) -> Option<&NativeFn> {
        self.native.as_ref()
    }
}

/// Procedures keyed by number.
pub struct DispatchTable {
    entries: BTreeMap<u32, Entry>,
}

impl DispatchTable {
    /// Bind every daemon action to its native. Fails when one is missing.
    pub fn build(
        registry: &Registry,
        protocol: &Protocol,
        natives: NativeSet,
    ) -> Result<Self, DispatchError> {
        Self::build_with(registry, protocol, natives, Unimplemented::Reject)
    }

    pub fn build_with(
        registry: &Registry,
        protocol: &Protocol,
        mut natives: NativeSet,
        unimplemented: Unimplemented,
    ) -> Result<Self, DispatchError> {
        let mut entries = BTreeMap::new();
        for action in registry.daemon_actions() {
            let layout = protocol
                .by_name(&action.name)
                .cloned()
                .ok_or_else(|| DispatchError::MissingLayout(action.name.clone()))?;
            let native = natives.take(&action.name);
            if native.is_none() {
                match unimplemented {
                    Unimplemented::Reject => {
                        return Err(DispatchError::MissingNative {
                            action: action.name.clone(),
                            proc_nr: layout.proc_nr,
                        })
                    }
                    Unimplemented::AnswerEnotsup => {
                        debug!("[dispatch] {} will answer ENOTSUP", action.name);
                    }
                }
            }
            entries.insert(
                layout.proc_nr,
                Entry {
                    layout,
                    native,
                    feature: action.feature.clone(),
                },
            );
        }
        if let Some(stray) = natives.names().next() {
            warn!("[dispatch] native {stray} has no daemon action");
            return Err(DispatchError::UnknownNative(stray.to_owned()));
        }
        let implemented = entries.values().filter(|entry| entry.is_implemented()).count();
        info!(
            "[dispatch] table ready: {} procedures, {} implemented",
            entries.len(),
            implemented
        );
        Ok(Self { entries })
    }

    #[must_use]
    pub fn get(&self, proc_nr: u32) -> Option<&Entry> {
        self.entries.get(&proc_nr)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }
}
