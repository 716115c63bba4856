// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Emit the Rust client surface: structs, optarg types and the action trait.
// Author: Lukas Bower

use action_registry::{
    Action, FieldKind, OptParamType, ParamType, Projection, Registry, ReturnShape, StructDef,
};
use std::fmt::Write as _;

use super::backend::{camel_case, deprecation, referenced_structs, wrap, BindingBackend, Rendered};

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do", "dyn",
    "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in", "let",
    "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return",
    "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized", "use",
    "virtual", "where", "while", "yield",
];

/// Keywords that cannot be written as raw identifiers.
const NOT_RAW: &[&str] = &["crate", "self", "Self", "super", "_"];

pub struct RustBackend;

fn ident(name: &str) -> String {
    if NOT_RAW.contains(&name) {
        format!("{name}_")
    } else if KEYWORDS.contains(&name) {
        format!("r#{name}")
    } else {
        name.to_owned()
    }
}

fn param_type(kind: &ParamType) -> &'static str {
    match kind {
        ParamType::PlainString
        | ParamType::PathString
        | ParamType::DeviceString
        | ParamType::MountableString
        | ParamType::MountableOrPathString
        | ParamType::GuidString
        | ParamType::SecretString => "&str",
        ParamType::OptionalString => "Option<&str>",
        ParamType::StringList | ParamType::FilenameList => "&[String]",
        ParamType::Bool => "bool",
        ParamType::Int32 => "i32",
        ParamType::Int64 => "i64",
        ParamType::RawBytesIn => "&[u8]",
        ParamType::StreamIn | ParamType::StreamOut => "&std::path::Path",
        ParamType::OpaqueHandle(_) => "&dyn std::any::Any",
    }
}

fn optarg_type(kind: OptParamType) -> &'static str {
    match kind {
        OptParamType::Bool => "Option<bool>",
        OptParamType::Int32 => "Option<i32>",
        OptParamType::Int64 => "Option<i64>",
        OptParamType::PlainString => "Option<String>",
        OptParamType::StringList => "Option<Vec<String>>",
    }
}

fn return_type(shape: &ReturnShape) -> String {
    match shape {
        ReturnShape::NoResult => "()".to_owned(),
        ReturnShape::Int32 => "i32".to_owned(),
        ReturnShape::Int64 => "i64".to_owned(),
        ReturnShape::Bool => "bool".to_owned(),
        ReturnShape::ConstString | ReturnShape::OwnedString => "String".to_owned(),
        ReturnShape::ConstOptionalString => "Option<String>".to_owned(),
        ReturnShape::StringList => "Vec<String>".to_owned(),
        ReturnShape::NamedStruct(tag) => camel_case(tag),
        ReturnShape::NamedStructList(tag) => format!("Vec<{}>", camel_case(tag)),
        ReturnShape::StringMap => "Vec<(String, String)>".to_owned(),
        ReturnShape::RawBytesOut => "Vec<u8>".to_owned(),
    }
}

fn field_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::String | FieldKind::Uuid => "String",
        FieldKind::Bytes => "Vec<u8>",
        FieldKind::Int32 => "i32",
        FieldKind::UInt32 => "u32",
        FieldKind::Int64 => "i64",
        FieldKind::UInt64 => "u64",
        FieldKind::Char => "u8",
        FieldKind::OptPercent => "Option<f32>",
    }
}

fn optargs_type(action: &Action) -> String {
    format!("{}Optargs", action.derived.display_name)
}

fn signature(action: &Action, name: &str, with_optargs: bool) -> String {
    let mut params = vec!["&mut self".to_owned()];
    for param in &action.params {
        params.push(format!("{}: {}", ident(&param.name), param_type(&param.kind)));
    }
    if with_optargs {
        params.push(format!("optargs: &{}", optargs_type(action)));
    }
    format!(
        "fn {}({}) -> Result<{}>",
        ident(name),
        params.join(", "),
        return_type(&action.return_shape)
    )
}

fn render_struct(out: &mut String, def: &StructDef) {
    writeln!(out, "#[derive(Debug, Clone, PartialEq)]").ok();
    writeln!(out, "pub struct {} {{", camel_case(&def.name)).ok();
    for field in &def.fields {
        writeln!(out, "    pub {}: {},", ident(&field.name), field_type(field.kind)).ok();
    }
    writeln!(out, "}}\n").ok();
}

fn render_optargs(out: &mut String, action: &Action) {
    let name = optargs_type(action);
    writeln!(
        out,
        "/// Optional arguments of [`Appliance::{}`].",
        action.derived.native_name
    )
    .ok();
    writeln!(out, "#[derive(Debug, Clone, Default, PartialEq, Eq)]").ok();
    writeln!(out, "pub struct {name} {{").ok();
    for opt in &action.optargs {
        writeln!(out, "    pub {}: {},", ident(&opt.name), optarg_type(opt.kind)).ok();
    }
    writeln!(out, "}}\n").ok();
    writeln!(out, "impl {name} {{").ok();
    for (bit, opt) in action.optargs.iter().enumerate() {
        writeln!(
            out,
            "    pub const {}: u64 = 1 << {bit};",
            opt.name.to_ascii_uppercase()
        )
        .ok();
    }
    writeln!(out).ok();
    writeln!(out, "    /// Bitmask of the arguments that are set.").ok();
    writeln!(out, "    pub fn bitmask(&self) -> u64 {{").ok();
    writeln!(out, "        let mut mask = 0;").ok();
    for opt in &action.optargs {
        writeln!(
            out,
            "        if self.{}.is_some() {{\n            mask |= Self::{};\n        }}",
            ident(&opt.name),
            opt.name.to_ascii_uppercase()
        )
        .ok();
    }
    writeln!(out, "        mask\n    }}\n}}\n").ok();
}

fn render_method(out: &mut String, action: &Action) {
    for line in wrap(&action.shortdesc, "    /// ", 96) {
        writeln!(out, "{line}").ok();
    }
    if !action.longdesc.is_empty() {
        writeln!(out, "    ///").ok();
        for line in wrap(&action.longdesc, "    /// ", 96) {
            writeln!(out, "{line}").ok();
        }
    }
    if action.has_progress {
        writeln!(out, "    ///\n    /// May report progress while it runs.").ok();
    }
    if action.cancellable {
        writeln!(out, "    ///\n    /// The transfer can be cancelled from another thread.").ok();
    }
    if let Some(replacement) = &action.deprecated_by {
        writeln!(out, "    #[deprecated(note = \"use {replacement} instead\")]").ok();
    }
    let with_optargs = action.has_optargs();
    writeln!(
        out,
        "    {};\n",
        signature(action, &action.derived.native_name, with_optargs)
    )
    .ok();

    // Legacy actions keep their original name without optional arguments.
    for alias in &action.derived.aliases {
        writeln!(
            out,
            "    /// Short form of [`Appliance::{}`] with every optional argument unset.",
            action.derived.native_name
        )
        .ok();
        let forwarded = action
            .params
            .iter()
            .map(|param| ident(&param.name))
            .chain(std::iter::once(format!("&{}::default()", optargs_type(action))))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(
            out,
            "    {} {{\n        self.{}({forwarded})\n    }}\n",
            signature(action, alias, false),
            ident(&action.derived.native_name)
        )
        .ok();
    }
}

impl BindingBackend for RustBackend {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn file_name(&self) -> &'static str {
        "appliance.rs"
    }

    fn render(&self, registry: &Registry, projection: Projection, fingerprint: &str) -> Rendered {
        let mut out = String::new();
        writeln!(out, "// Author: Lukas Bower").ok();
        writeln!(
            out,
            "// Purpose: Generated Rust client surface for the appliance actions."
        )
        .ok();
        writeln!(out, "// @generated by action-rtc; do not edit.\n").ok();
        writeln!(out, "pub const REGISTRY_SHA256: &str = \"{fingerprint}\";\n").ok();
        out.push_str(ERROR_PRELUDE);

        for def in referenced_structs(registry, projection) {
            render_struct(&mut out, def);
        }
        let actions: Vec<&Action> = projection.select(registry).collect();
        for action in actions.iter().filter(|action| action.has_optargs()) {
            render_optargs(&mut out, action);
        }

        let mut notices = Vec::new();
        writeln!(out, "/// Every action the appliance library exposes.").ok();
        writeln!(out, "pub trait Appliance {{").ok();
        for action in &actions {
            notices.extend(deprecation(self.name(), action));
            render_method(&mut out, action);
        }
        while out.ends_with("\n\n") {
            out.pop();
        }
        writeln!(out, "}}").ok();
        Rendered {
            source: out,
            notices,
        }
    }
}

const ERROR_PRELUDE: &str = r#"/// Failure of an action. `errno` is the symbolic error code reported by the
/// appliance (`EPROTO` for rejected calls); it is `None` for cancellation
/// and transport failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub errno: Option<String>,
    pub message: String,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.errno {
            Some(errno) => write!(f, "{}: {}", errno, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for Error {}

impl From<appliance_wire::CallError> for Error {
    fn from(err: appliance_wire::CallError) -> Self {
        match err {
            appliance_wire::CallError::Application(err)
            | appliance_wire::CallError::Protocol(err) => Self {
                errno: Some(err.errno),
                message: err.message,
            },
            other => Self {
                errno: None,
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_words_become_valid_identifiers() {
        assert_eq!(ident("path"), "path");
        assert_eq!(ident("type"), "r#type");
        assert_eq!(ident("abstract"), "r#abstract");
        assert_eq!(ident("gen"), "r#gen");
        assert_eq!(ident("self"), "self_");
        assert_eq!(ident("Self"), "Self_");
        assert_eq!(ident("crate"), "crate_");
        assert_eq!(ident("super"), "super_");
    }
}
