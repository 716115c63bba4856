// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Shared interface and helpers for language binding backends.
// Author: Lukas Bower

use action_registry::{Action, ParamType, Projection, Registry, StructDef};
use std::collections::BTreeSet;
use std::fmt;

/// Non-fatal note that a surfaced action is deprecated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecationNotice {
    pub backend: &'static str,
    pub action: String,
    pub replacement: String,
}

impl fmt::Display for DeprecationNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} is deprecated, use {} instead",
            self.backend, self.action, self.replacement
        )
    }
}

/// Source text produced by a backend.
#[derive(Debug, Default)]
pub struct Rendered {
    pub source: String,
    pub notices: Vec<DeprecationNotice>,
}

/// A pure `(registry, projection) -> source` translation. Rendering the same
/// registry twice yields identical text.
pub trait BindingBackend {
    fn name(&self) -> &'static str;

    /// File name inside the bindings directory.
    fn file_name(&self) -> &'static str;

    fn render(&self, registry: &Registry, projection: Projection, fingerprint: &str) -> Rendered;
}

/// Structs returned by any action in the projection, ordered by name.
pub(crate) fn referenced_structs<'r>(
    registry: &'r Registry,
    projection: Projection,
) -> Vec<&'r StructDef> {
    let tags: BTreeSet<&str> = projection
        .select(registry)
        .filter_map(|action| action.return_shape.struct_tag())
        .collect();
    tags.into_iter()
        .filter_map(|tag| registry.struct_def(tag))
        .collect()
}

pub(crate) fn deprecation(backend: &'static str, action: &Action) -> Option<DeprecationNotice> {
    action
        .deprecated_by
        .as_ref()
        .map(|replacement| DeprecationNotice {
            backend,
            action: action.derived.native_name.clone(),
            replacement: replacement.clone(),
        })
}

/// `FooBar` form of a snake_case identifier.
pub(crate) fn camel_case(name: &str) -> String {
    action_registry::derive::display_name(name)
}

pub(crate) fn is_stream(kind: &ParamType) -> bool {
    kind.stream_direction().is_some()
}

/// Text wrapped to `width` columns, prefixed on every line.
pub(crate) fn wrap(text: &str, prefix: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && prefix.len() + line.len() + 1 + word.len() > width {
            lines.push(format!("{prefix}{line}"));
            line.clear();
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(format!("{prefix}{line}"));
    }
    lines
}
