// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Compile per-procedure request and reply layouts from the frozen registry.
// Author: Lukas Bower

//! Wire layouts for every daemon action.
//!
//! A layout is the registry's view of an action reduced to what the codec
//! needs: the inline argument slots in order, the optional argument slots in
//! bit order, the reply kind and the streaming and progress flags.

use std::collections::BTreeMap;

use action_registry::{
    Action, FieldKind, OptParamType, ParamType, Registry, ReturnShape, StreamDirection,
};
use log::debug;

use crate::constants::PROTOCOL_VERSION;
use crate::error::WireError;

/// Struct shape used by struct-valued replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub tag: String,
    pub fields: Vec<(String, FieldKind)>,
}

/// Encoding of one slot on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireKind {
    Unit,
    String,
    OptString,
    StringList,
    Bool,
    Int32,
    Int64,
    Bytes,
    Struct(StructLayout),
    StructList(StructLayout),
    StringMap,
}

impl WireKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::String => "string",
            Self::OptString => "optional string",
            Self::StringList => "string list",
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Bytes => "buffer",
            Self::Struct(_) => "struct",
            Self::StructList(_) => "struct list",
            Self::StringMap => "string map",
        }
    }
}

/// One inline argument or optional argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSlot {
    pub name: String,
    pub kind: WireKind,
    /// Value must never appear in logs.
    pub secret: bool,
    /// Value must be an absolute appliance path.
    pub absolute_path: bool,
}

/// Request and reply layout of one daemon procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallLayout {
    pub name: String,
    pub proc_nr: u32,
    pub args: Vec<ArgSlot>,
    pub optargs: Vec<ArgSlot>,
    pub reply: WireKind,
    pub stream: Option<StreamDirection>,
    pub cancellable: bool,
    pub progress: bool,
    pub oversize_warning: bool,
}

impl CallLayout {
    /// Display helper for logging the required arguments of a call.
    #[must_use]
    pub fn redacted<'a>(&'a self, values: &'a [crate::value::Value]) -> crate::value::Redacted<'a> {
        crate::value::Redacted {
            names: self
                .args
                .iter()
                .map(|slot| (slot.name.as_str(), slot.secret))
                .collect(),
            values,
        }
    }

    /// Bit position of the named optional argument.
    #[must_use]
    pub fn optarg_index(&self, name: &str) -> Option<usize> {
        self.optargs.iter().position(|slot| slot.name == name)
    }
}

/// All procedure layouts, keyed by procedure number.
#[derive(Debug, Clone)]
pub struct Protocol {
    pub version: u32,
    procedures: BTreeMap<u32, CallLayout>,
    by_name: BTreeMap<String, u32>,
}

impl Protocol {
    #[must_use]
    pub fn get(&self, proc_nr: u32) -> Option<&CallLayout> {
        self.procedures.get(&proc_nr)
    }

    /// Look up by action name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&CallLayout> {
        self.by_name
            .get(name)
            .and_then(|proc_nr| self.procedures.get(proc_nr))
    }

    /// Layouts in ascending procedure number order.
    pub fn iter(&self) -> impl Iterator<Item = &CallLayout> {
        self.procedures.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}

/// Build layouts for every daemon action in the registry.
pub fn compile_protocol(registry: &Registry) -> Result<Protocol, WireError> {
    let mut procedures = BTreeMap::new();
    let mut by_name = BTreeMap::new();
    for action in registry.daemon_actions() {
        let layout = compile_action(registry, action)?;
        by_name.insert(layout.name.clone(), layout.proc_nr);
        procedures.insert(layout.proc_nr, layout);
    }
    debug!(
        "[wire] compiled {} procedure layouts (protocol version {})",
        procedures.len(),
        PROTOCOL_VERSION
    );
    Ok(Protocol {
        version: PROTOCOL_VERSION,
        procedures,
        by_name,
    })
}

fn compile_action(registry: &Registry, action: &Action) -> Result<CallLayout, WireError> {
    let proc_nr = action
        .proc_nr
        .ok_or_else(|| WireError::UnknownProcedure(0))?;
    let mut args = Vec::with_capacity(action.params.len());
    for param in &action.params {
        let kind = match param_kind(&param.kind) {
            Some(Some(kind)) => kind,
            // Streams travel as chunks, not inline.
            Some(None) => continue,
            None => {
                return Err(WireError::NoWireForm {
                    action: action.name.clone(),
                    param: param.name.clone(),
                })
            }
        };
        args.push(ArgSlot {
            name: param.name.clone(),
            kind,
            secret: param.kind.is_secret(),
            absolute_path: param.kind.requires_absolute_path(),
        });
    }
    let optargs = action
        .optargs
        .iter()
        .map(|opt| ArgSlot {
            name: opt.name.clone(),
            kind: optarg_kind(opt.kind),
            secret: false,
            absolute_path: false,
        })
        .collect();
    let reply = reply_kind(registry, action)?;
    Ok(CallLayout {
        name: action.name.clone(),
        proc_nr,
        args,
        optargs,
        reply,
        stream: action.stream_direction(),
        cancellable: action.cancellable,
        progress: action.has_progress,
        oversize_warning: action.oversize_warning,
    })
}

/// `None` when the kind has no wire form, `Some(None)` for stream
/// parameters that are carried out of band.
fn param_kind(kind: &ParamType) -> Option<Option<WireKind>> {
    let wire = match kind {
        ParamType::PlainString
        | ParamType::PathString
        | ParamType::DeviceString
        | ParamType::MountableString
        | ParamType::MountableOrPathString
        | ParamType::GuidString
        | ParamType::SecretString => WireKind::String,
        ParamType::OptionalString => WireKind::OptString,
        ParamType::StringList | ParamType::FilenameList => WireKind::StringList,
        ParamType::Bool => WireKind::Bool,
        ParamType::Int32 => WireKind::Int32,
        ParamType::Int64 => WireKind::Int64,
        ParamType::RawBytesIn => WireKind::Bytes,
        ParamType::StreamIn | ParamType::StreamOut => return Some(None),
        ParamType::OpaqueHandle(_) => return None,
    };
    Some(Some(wire))
}

fn optarg_kind(kind: OptParamType) -> WireKind {
    match kind {
        OptParamType::Bool => WireKind::Bool,
        OptParamType::Int32 => WireKind::Int32,
        OptParamType::Int64 => WireKind::Int64,
        OptParamType::PlainString => WireKind::String,
        OptParamType::StringList => WireKind::StringList,
    }
}

fn reply_kind(registry: &Registry, action: &Action) -> Result<WireKind, WireError> {
    let struct_layout = |tag: &str| {
        registry
            .struct_def(tag)
            .map(|def| StructLayout {
                tag: def.name.clone(),
                fields: def
                    .fields
                    .iter()
                    .map(|field| (field.name.clone(), field.kind))
                    .collect(),
            })
            .ok_or_else(|| WireError::UnknownStruct {
                action: action.name.clone(),
                tag: tag.to_owned(),
            })
    };
    Ok(match &action.return_shape {
        ReturnShape::NoResult => WireKind::Unit,
        ReturnShape::Int32 => WireKind::Int32,
        ReturnShape::Int64 => WireKind::Int64,
        ReturnShape::Bool => WireKind::Bool,
        ReturnShape::ConstString | ReturnShape::OwnedString => WireKind::String,
        ReturnShape::ConstOptionalString => WireKind::OptString,
        ReturnShape::StringList => WireKind::StringList,
        ReturnShape::NamedStruct(tag) => WireKind::Struct(struct_layout(tag)?),
        ReturnShape::NamedStructList(tag) => WireKind::StructList(struct_layout(tag)?),
        ReturnShape::StringMap => WireKind::StringMap,
        ReturnShape::RawBytesOut => WireKind::Bytes,
    })
}
