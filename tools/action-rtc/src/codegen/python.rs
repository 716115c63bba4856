// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Emit the Python client surface for the appliance actions.
// Author: Lukas Bower

use action_registry::{
    Action, FieldKind, OptParamType, ParamType, Projection, Registry, ReturnShape,
};
use std::fmt::Write as _;

use super::backend::{camel_case, deprecation, referenced_structs, wrap, BindingBackend, Rendered};

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

pub struct PythonBackend;

fn ident(name: &str) -> String {
    if KEYWORDS.contains(&name) {
        format!("{name}_")
    } else {
        name.to_owned()
    }
}

/// Escape text for a triple-quoted docstring.
fn docstring(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// First docstring line: escaped, ending in exactly one period.
fn doc_summary(text: &str) -> String {
    format!("{}.", docstring(text.trim_end().trim_end_matches('.')))
}

fn param_type(kind: &ParamType) -> &'static str {
    match kind {
        ParamType::PlainString
        | ParamType::PathString
        | ParamType::DeviceString
        | ParamType::MountableString
        | ParamType::MountableOrPathString
        | ParamType::GuidString
        | ParamType::SecretString
        | ParamType::StreamIn
        | ParamType::StreamOut => "str",
        ParamType::OptionalString => "Optional[str]",
        ParamType::StringList | ParamType::FilenameList => "List[str]",
        ParamType::Bool => "bool",
        ParamType::Int32 | ParamType::Int64 => "int",
        ParamType::RawBytesIn => "bytes",
        ParamType::OpaqueHandle(_) => "object",
    }
}

fn optarg_type(kind: OptParamType) -> &'static str {
    match kind {
        OptParamType::Bool => "Optional[bool]",
        OptParamType::Int32 | OptParamType::Int64 => "Optional[int]",
        OptParamType::PlainString => "Optional[str]",
        OptParamType::StringList => "Optional[List[str]]",
    }
}

fn return_type(shape: &ReturnShape) -> String {
    match shape {
        ReturnShape::NoResult => "None".to_owned(),
        ReturnShape::Int32 | ReturnShape::Int64 => "int".to_owned(),
        ReturnShape::Bool => "bool".to_owned(),
        ReturnShape::ConstString | ReturnShape::OwnedString => "str".to_owned(),
        ReturnShape::ConstOptionalString => "Optional[str]".to_owned(),
        ReturnShape::StringList => "List[str]".to_owned(),
        ReturnShape::NamedStruct(tag) => format!("\"{}\"", camel_case(tag)),
        ReturnShape::NamedStructList(tag) => format!("List[\"{}\"]", camel_case(tag)),
        ReturnShape::StringMap => "Dict[str, str]".to_owned(),
        ReturnShape::RawBytesOut => "bytes".to_owned(),
    }
}

fn field_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::String | FieldKind::Uuid => "str",
        FieldKind::Bytes => "bytes",
        FieldKind::Int32 | FieldKind::UInt32 | FieldKind::Int64 | FieldKind::UInt64 => "int",
        FieldKind::Char => "str",
        FieldKind::OptPercent => "Optional[float]",
    }
}

/// Expression turning the raw transport result into the declared type.
fn convert_result(shape: &ReturnShape, raw: &str) -> String {
    match shape {
        ReturnShape::NamedStruct(tag) => format!("{}(*{raw})", camel_case(tag)),
        ReturnShape::NamedStructList(tag) => {
            format!("[{}(*row) for row in {raw}]", camel_case(tag))
        }
        ReturnShape::StringMap => format!("dict(zip({raw}[::2], {raw}[1::2]))"),
        _ => raw.to_owned(),
    }
}

fn render_method(out: &mut String, action: &Action, name: &str, with_optargs: bool) {
    let mut params = vec!["self".to_owned()];
    params.extend(
        action
            .params
            .iter()
            .map(|param| format!("{}: {}", ident(&param.name), param_type(&param.kind))),
    );
    if with_optargs && action.has_optargs() {
        params.push("*".to_owned());
        params.extend(
            action
                .optargs
                .iter()
                .map(|opt| format!("{}: {} = None", ident(&opt.name), optarg_type(opt.kind))),
        );
    }
    writeln!(
        out,
        "    def {}({}) -> {}:",
        ident(name),
        params.join(", "),
        return_type(&action.return_shape)
    )
    .ok();
    let doc = if action.shortdesc.is_empty() {
        action.name.clone()
    } else {
        action.shortdesc.clone()
    };
    writeln!(out, "        \"\"\"{}", doc_summary(&doc)).ok();
    if !action.longdesc.is_empty() {
        writeln!(out).ok();
        for line in wrap(&docstring(&action.longdesc), "        ", 88) {
            writeln!(out, "{line}").ok();
        }
    }
    writeln!(out, "        \"\"\"").ok();
    if let Some(replacement) = &action.deprecated_by {
        writeln!(
            out,
            "        warnings.warn(\"{} is deprecated, use {replacement} instead\", DeprecationWarning, stacklevel=2)",
            action.derived.native_name
        )
        .ok();
    }
    let args = action
        .params
        .iter()
        .map(|param| ident(&param.name))
        .collect::<Vec<_>>()
        .join(", ");
    let optargs = if with_optargs && action.has_optargs() {
        let pairs = action
            .optargs
            .iter()
            .map(|opt| format!("\"{}\": {}", opt.name, ident(&opt.name)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{{pairs}}}")
    } else {
        "{}".to_owned()
    };
    let raw = format!("self._call(\"{}\", [{args}], {optargs})", action.name);
    match action.return_shape {
        ReturnShape::NoResult => writeln!(out, "        {raw}\n").ok(),
        ref shape => writeln!(out, "        return {}\n", convert_result(shape, &raw)).ok(),
    };
}

impl BindingBackend for PythonBackend {
    fn name(&self) -> &'static str {
        "python"
    }

    fn file_name(&self) -> &'static str {
        "appliance.py"
    }

    fn render(&self, registry: &Registry, projection: Projection, fingerprint: &str) -> Rendered {
        let mut out = String::new();
        writeln!(out, "# Author: Lukas Bower").ok();
        writeln!(
            out,
            "# Purpose: Generated Python client surface for the appliance actions."
        )
        .ok();
        writeln!(out, "# @generated by action-rtc; do not edit.").ok();
        out.push_str(PRELUDE);
        writeln!(out, "REGISTRY_SHA256 = \"{fingerprint}\"\n\n").ok();
        out.push_str(ERROR_CLASS);

        for def in referenced_structs(registry, projection) {
            writeln!(out, "@dataclass\nclass {}:", camel_case(&def.name)).ok();
            for field in &def.fields {
                writeln!(out, "    {}: {}", ident(&field.name), field_type(field.kind)).ok();
            }
            writeln!(out, "\n").ok();
        }

        out.push_str(CLIENT_CLASS);
        let mut notices = Vec::new();
        for action in projection.select(registry) {
            notices.extend(deprecation(self.name(), action));
            render_method(&mut out, action, &action.derived.native_name, true);
            for alias in &action.derived.aliases {
                render_method(&mut out, action, alias, false);
            }
        }
        while out.ends_with("\n\n") {
            out.pop();
        }
        Rendered {
            source: out,
            notices,
        }
    }
}

const PRELUDE: &str = r#""""Appliance client bindings."""

from dataclasses import dataclass
from typing import Dict, List, Optional
import warnings

"#;

const ERROR_CLASS: &str = r#"class ApplianceError(Exception):
    """Failure of an action; ``errno`` is the symbolic code (``EPROTO`` for
    rejected calls), or None for transport failures."""

    def __init__(self, message: str, errno: Optional[str] = None) -> None:
        super().__init__(message)
        self.errno = errno


"#;

const CLIENT_CLASS: &str = r#"class Appliance:
    def __init__(self, transport) -> None:
        self._transport = transport

    def _call(self, name, args, optargs):
        present = {key: value for key, value in optargs.items() if value is not None}
        try:
            return self._transport.call(name, args, present)
        except ApplianceError:
            raise
        except Exception as exc:
            raise ApplianceError(str(exc)) from exc

"#;
