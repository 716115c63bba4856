// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Raw (authored) and validated (frozen) action records.
// Author: Lukas Bower

use serde::{Deserialize, Serialize};

use crate::testcase::TestCase;
use crate::types::{
    ActionKind, OptParam, Param, ParamType, ReturnShape, StreamDirection, Visibility,
};

/// Action as authored in a topic list, before derivation and numbering.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawAction {
    pub name: String,
    pub kind: ActionKind,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub optargs: Vec<OptParam>,
    #[serde(default)]
    pub returns: ReturnShape,
    /// Must stay unset; numbers come from the procedure number table.
    #[serde(default)]
    pub proc_nr: Option<u32>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub deprecated_by: Option<String>,
    #[serde(default)]
    pub cancellable: bool,
    #[serde(default)]
    pub progress: bool,
    #[serde(default = "default_blocking")]
    pub blocking: bool,
    #[serde(default)]
    pub oversize_warning: bool,
    /// Set when optional arguments were added to an action that first
    /// shipped without any.
    #[serde(default)]
    pub legacy_no_optargs: bool,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub shell_aliases: Vec<String>,
    /// Optional appliance feature group the action belongs to.
    #[serde(default)]
    pub feature: Option<String>,
    #[serde(default)]
    pub shortdesc: String,
    #[serde(default)]
    pub longdesc: String,
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

fn default_blocking() -> bool {
    true
}

impl RawAction {
    /// Minimal action with defaults for every optional attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            params: Vec::new(),
            optargs: Vec::new(),
            returns: ReturnShape::NoResult,
            proc_nr: None,
            visibility: Visibility::Public,
            deprecated_by: None,
            cancellable: false,
            progress: false,
            blocking: true,
            oversize_warning: false,
            legacy_no_optargs: false,
            display_name: None,
            shell_aliases: Vec::new(),
            feature: None,
            shortdesc: String::new(),
            longdesc: String::new(),
            tests: Vec::new(),
        }
    }
}

/// Identifiers computed by the registry. Never authored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedNames {
    /// Public name used by bindings (`grep_opts` for legacy actions).
    pub native_name: String,
    /// Prefixed library symbol (`appl_grep_opts_argv`).
    pub native_entry_point: String,
    /// Upper-case prefix for optional-argument constants.
    pub optarg_prefix: String,
    /// Capitalised form (`GetQemu`).
    pub display_name: String,
    /// Compatibility names kept for callers of an older signature.
    pub aliases: Vec<String>,
}

/// Validated, numbered action. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub name: String,
    pub kind: ActionKind,
    pub params: Vec<Param>,
    pub optargs: Vec<OptParam>,
    pub return_shape: ReturnShape,
    pub proc_nr: Option<u32>,
    pub visibility: Visibility,
    pub deprecated_by: Option<String>,
    pub cancellable: bool,
    pub has_progress: bool,
    pub is_blocking: bool,
    pub oversize_warning: bool,
    pub legacy_no_optargs: bool,
    pub derived: DerivedNames,
    pub topic: String,
    pub shell_aliases: Vec<String>,
    pub feature: Option<String>,
    pub shortdesc: String,
    pub longdesc: String,
    pub tests: Vec<TestCase>,
}

impl Action {
    pub(crate) fn from_raw(raw: RawAction, topic: &str, derived: DerivedNames) -> Self {
        Self {
            name: raw.name,
            kind: raw.kind,
            params: raw.params,
            optargs: raw.optargs,
            return_shape: raw.returns,
            proc_nr: None,
            visibility: raw.visibility,
            deprecated_by: raw.deprecated_by,
            cancellable: raw.cancellable,
            has_progress: raw.progress,
            is_blocking: raw.blocking,
            oversize_warning: raw.oversize_warning,
            legacy_no_optargs: raw.legacy_no_optargs,
            derived,
            topic: topic.to_owned(),
            shell_aliases: raw.shell_aliases,
            feature: raw.feature,
            shortdesc: raw.shortdesc,
            longdesc: raw.longdesc,
            tests: raw.tests,
        }
    }

    #[must_use]
    pub fn is_daemon(&self) -> bool {
        matches!(self.kind, ActionKind::Daemon)
    }

    #[must_use]
    pub fn has_optargs(&self) -> bool {
        !self.optargs.is_empty()
    }

    /// Out-of-band transfer direction, if the action streams a file.
    #[must_use]
    pub fn stream_direction(&self) -> Option<StreamDirection> {
        self.params
            .iter()
            .find_map(|param| param.kind.stream_direction())
    }

    #[must_use]
    pub fn has_opaque_handle(&self) -> bool {
        self.params
            .iter()
            .any(|param| matches!(param.kind, ParamType::OpaqueHandle(_)))
    }

    /// Bit position of the named optional argument in the optarg bitmask.
    #[must_use]
    pub fn optarg_bit(&self, name: &str) -> Option<u32> {
        self.optargs
            .iter()
            .position(|opt| opt.name == name)
            .map(|index| index as u32)
    }

    /// Required parameters that travel inline in the call message.
    pub fn inline_params(&self) -> impl Iterator<Item = &Param> {
        self.params
            .iter()
            .filter(|param| param.kind.stream_direction().is_none())
    }

    /// Every name a caller may use for this action, public name first.
    pub fn callable_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.derived.native_name.as_str())
            .chain(self.derived.aliases.iter().map(String::as_str))
    }
}
