// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Emit the C header declaring the appliance library entry points.
// Author: Lukas Bower

use action_registry::{
    Action, FieldKind, OptParamType, ParamType, Projection, Registry, ReturnShape, StructDef,
};
use std::fmt::Write as _;

use super::backend::{deprecation, referenced_structs, BindingBackend, Rendered};

pub struct CHeaderBackend;

fn c_param(kind: &ParamType, name: &str) -> String {
    match kind {
        ParamType::PlainString
        | ParamType::PathString
        | ParamType::DeviceString
        | ParamType::MountableString
        | ParamType::MountableOrPathString
        | ParamType::GuidString
        | ParamType::SecretString
        | ParamType::OptionalString
        | ParamType::StreamIn
        | ParamType::StreamOut => format!("const char *{name}"),
        ParamType::StringList | ParamType::FilenameList => format!("char *const *{name}"),
        ParamType::Bool | ParamType::Int32 => format!("int {name}"),
        ParamType::Int64 => format!("int64_t {name}"),
        ParamType::RawBytesIn => format!("const char *{name}, size_t {name}_size"),
        ParamType::OpaqueHandle(tag) => format!("void * /* {tag} */ {name}"),
    }
}

fn c_optarg_field(kind: OptParamType) -> &'static str {
    match kind {
        OptParamType::Bool | OptParamType::Int32 => "int",
        OptParamType::Int64 => "int64_t",
        OptParamType::PlainString => "const char *",
        OptParamType::StringList => "char *const *",
    }
}

fn c_return(prefix: &str, shape: &ReturnShape) -> String {
    match shape {
        ReturnShape::NoResult | ReturnShape::Int32 | ReturnShape::Bool => "int ".to_owned(),
        ReturnShape::Int64 => "int64_t ".to_owned(),
        ReturnShape::ConstString | ReturnShape::ConstOptionalString => "const char *".to_owned(),
        ReturnShape::OwnedString | ReturnShape::RawBytesOut => "char *".to_owned(),
        ReturnShape::StringList | ReturnShape::StringMap => "char **".to_owned(),
        ReturnShape::NamedStruct(tag) => format!("struct {prefix}_{tag} *"),
        ReturnShape::NamedStructList(tag) => format!("struct {prefix}_{tag}_list *"),
    }
}

fn c_field(kind: FieldKind, name: &str) -> String {
    match kind {
        FieldKind::String => format!("char *{name};"),
        FieldKind::Bytes => format!("uint32_t {name}_len;\n  char *{name};"),
        FieldKind::Uuid => format!("char {name}[32]; /* not NUL terminated */"),
        FieldKind::Int32 => format!("int32_t {name};"),
        FieldKind::UInt32 => format!("uint32_t {name};"),
        FieldKind::Int64 => format!("int64_t {name};"),
        FieldKind::UInt64 => format!("uint64_t {name};"),
        FieldKind::Char => format!("char {name};"),
        FieldKind::OptPercent => format!("float {name}; /* [0..100] or -1 */"),
    }
}

fn render_struct(out: &mut String, prefix: &str, def: &StructDef) {
    let name = format!("{prefix}_{}", def.name);
    writeln!(out, "struct {name} {{").ok();
    for field in &def.fields {
        writeln!(out, "  {}", c_field(field.kind, &field.name)).ok();
    }
    writeln!(out, "}};\n").ok();
    writeln!(out, "struct {name}_list {{\n  uint32_t len;\n  struct {name} *val;\n}};\n").ok();
    writeln!(out, "extern void {name}_free (struct {name} *);").ok();
    writeln!(out, "extern void {name}_list_free (struct {name}_list *);\n").ok();
}

fn params(prefix: &str, action: &Action) -> Vec<String> {
    let mut params = vec![format!("{prefix}_h *g")];
    params.extend(
        action
            .params
            .iter()
            .map(|param| c_param(&param.kind, &param.name)),
    );
    if matches!(action.return_shape, ReturnShape::RawBytesOut) {
        params.push("size_t *size_r".to_owned());
    }
    params
}

struct Decl<'a> {
    ret: &'a str,
    upper: &'a str,
    deprecated_by: Option<&'a str>,
}

fn declare(out: &mut String, decl: &Decl<'_>, name: &str, params: &[String]) {
    write!(out, "extern {}{name} ({})", decl.ret, params.join(", ")).ok();
    if let Some(replacement) = decl.deprecated_by {
        write!(out, "\n  {}_DEPRECATED_BY (\"{replacement}\")", decl.upper).ok();
    }
    writeln!(out, ";").ok();
}

fn render_action(out: &mut String, prefix: &str, action: &Action) {
    let ret = c_return(prefix, &action.return_shape);
    let upper_prefix = prefix.to_ascii_uppercase();
    let decl = Decl {
        ret: &ret,
        upper: &upper_prefix,
        deprecated_by: action.deprecated_by.as_deref(),
    };
    let base = params(prefix, action);
    let native = format!("{prefix}_{}", action.derived.native_name);
    if action.is_blocking {
        writeln!(out, "/* {} */", action.derived.native_name).ok();
    } else {
        writeln!(out, "/* {} (non-blocking) */", action.derived.native_name).ok();
    }

    if !action.has_optargs() {
        declare(out, &decl, &native, &base);
        writeln!(out).ok();
        return;
    }

    let upper = &action.derived.optarg_prefix;
    for (bit, opt) in action.optargs.iter().enumerate() {
        let name = opt.name.to_ascii_uppercase();
        writeln!(out, "#define {upper}_{name} {bit}").ok();
        writeln!(out, "#define {upper}_{name}_BITMASK (UINT64_C(1)<<{bit})").ok();
    }
    let argv = &action.derived.native_entry_point;
    writeln!(out, "struct {argv} {{\n  uint64_t bitmask;").ok();
    for opt in &action.optargs {
        writeln!(out, "  {} {};", c_optarg_field(opt.kind).trim_end(), opt.name).ok();
    }
    writeln!(out, "}};").ok();

    for alias in &action.derived.aliases {
        declare(out, &decl, &format!("{prefix}_{alias}"), &base);
    }
    let mut variadic = base.clone();
    variadic.push("...".to_owned());
    declare(out, &decl, &native, &variadic);
    let mut va = base.clone();
    va.push("va_list args".to_owned());
    declare(out, &decl, &format!("{native}_va"), &va);
    let mut with_argv = base;
    with_argv.push(format!("const struct {argv} *optargs"));
    declare(out, &decl, argv, &with_argv);
    writeln!(out).ok();
}

impl BindingBackend for CHeaderBackend {
    fn name(&self) -> &'static str {
        "c"
    }

    fn file_name(&self) -> &'static str {
        "appliance.h"
    }

    fn render(&self, registry: &Registry, projection: Projection, fingerprint: &str) -> Rendered {
        let prefix = registry.prefix();
        let upper = prefix.to_ascii_uppercase();
        let mut out = String::new();
        writeln!(out, "/* Author: Lukas Bower").ok();
        writeln!(out, " * Purpose: Generated C declarations for the appliance actions.").ok();
        writeln!(out, " * @generated by action-rtc; do not edit.\n */\n").ok();
        writeln!(out, "#ifndef {upper}_APPLIANCE_H_\n#define {upper}_APPLIANCE_H_\n").ok();
        writeln!(
            out,
            "#include <stdarg.h>\n#include <stddef.h>\n#include <stdint.h>\n"
        )
        .ok();
        writeln!(out, "#ifdef __cplusplus\nextern \"C\" {{\n#endif\n").ok();
        writeln!(out, "#define {upper}_REGISTRY_SHA256 \"{fingerprint}\"\n").ok();
        writeln!(out, "#if defined(__GNUC__)").ok();
        writeln!(
            out,
            "#define {upper}_DEPRECATED_BY(s) __attribute__((__deprecated__(\"use {prefix}_\" s \" instead\")))"
        )
        .ok();
        writeln!(out, "#else\n#define {upper}_DEPRECATED_BY(s)\n#endif\n").ok();
        writeln!(out, "typedef struct {prefix}_h {prefix}_h;\n").ok();
        writeln!(
            out,
            "/* Functions return -1 or NULL on failure. The failure's message and\n * errno-equivalent stay available until the next call on the handle. */"
        )
        .ok();
        writeln!(out, "extern const char *{prefix}_last_error ({prefix}_h *g);").ok();
        writeln!(out, "extern int {prefix}_last_errno ({prefix}_h *g);\n").ok();

        for def in referenced_structs(registry, projection) {
            render_struct(&mut out, prefix, def);
        }

        let mut notices = Vec::new();
        for action in projection.select(registry) {
            notices.extend(deprecation(self.name(), action));
            render_action(&mut out, prefix, action);
        }
        writeln!(out, "#ifdef __cplusplus\n}}\n#endif\n").ok();
        writeln!(out, "#endif /* {upper}_APPLIANCE_H_ */").ok();
        Rendered {
            source: out,
            notices,
        }
    }
}
