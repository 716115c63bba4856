// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Derive native names, entry points and display names from action names.
// Author: Lukas Bower

use serde::{Deserialize, Serialize};

use crate::action::{DerivedNames, RawAction};

/// Naming settings applied to every action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Naming {
    /// Library symbol prefix, e.g. `appl` for `appl_mount`.
    pub prefix: String,
}

impl Default for Naming {
    fn default() -> Self {
        Self {
            prefix: "appl".to_owned(),
        }
    }
}

/// Names produced by the first derivation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeNames {
    pub native_name: String,
    pub native_entry_point: String,
    pub optarg_prefix: String,
    pub aliases: Vec<String>,
}

/// Pass 1: public name, library entry point and optarg constant prefix.
#[must_use]
pub fn native_names(
    name: &str,
    has_optargs: bool,
    legacy_no_optargs: bool,
    naming: &Naming,
) -> NativeNames {
    let (native_name, entry_suffix, aliases) = match (has_optargs, legacy_no_optargs) {
        (false, _) => (name.to_owned(), "", Vec::new()),
        (true, false) => (name.to_owned(), "_argv", Vec::new()),
        (true, true) => (format!("{name}_opts"), "_argv", vec![name.to_owned()]),
    };
    let native_entry_point = format!("{}_{}{}", naming.prefix, native_name, entry_suffix);
    let optarg_prefix = format!("{}_{}", naming.prefix, native_name).to_ascii_uppercase();
    NativeNames {
        native_name,
        native_entry_point,
        optarg_prefix,
        aliases,
    }
}

/// Pass 2: capitalise every underscore-delimited segment.
#[must_use]
pub fn display_name(name: &str) -> String {
    name.split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Run both derivation passes for one raw action.
#[must_use]
pub fn derive_names(raw: &RawAction, naming: &Naming) -> DerivedNames {
    let native = native_names(
        &raw.name,
        !raw.optargs.is_empty(),
        raw.legacy_no_optargs,
        naming,
    );
    let display = raw
        .display_name
        .clone()
        .unwrap_or_else(|| display_name(&raw.name));
    DerivedNames {
        native_name: native.native_name,
        native_entry_point: native.native_entry_point,
        optarg_prefix: native.optarg_prefix,
        display_name: display,
        aliases: native.aliases,
    }
}
