// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Serialise the validated registry into its resolved JSON form.
// Author: Lukas Bower

use action_registry::{Action, Registry, RegistryConfig, StructDef};
use anyhow::{Context, Result};
use appliance_wire::constants::PROTOCOL_VERSION;
use serde::Serialize;

/// Bumped when the resolved layout changes shape.
pub const RESOLVED_SCHEMA: &str = "1";

#[derive(Debug, Serialize)]
struct ResolvedRegistry<'a> {
    schema: &'static str,
    author: &'a str,
    purpose: &'a str,
    prefix: &'a str,
    protocol_version: u32,
    max_proc_nr: u32,
    structs: &'a [StructDef],
    actions: &'a [Action],
}

/// Pretty JSON with a trailing newline. Actions are already in name order,
/// so identical registries serialise to identical bytes.
pub fn serialize_registry(config: &RegistryConfig, registry: &Registry) -> Result<Vec<u8>> {
    let resolved = ResolvedRegistry {
        schema: RESOLVED_SCHEMA,
        author: &config.meta.author,
        purpose: &config.meta.purpose,
        prefix: registry.prefix(),
        protocol_version: PROTOCOL_VERSION,
        max_proc_nr: registry.max_proc_nr(),
        structs: registry.structs(),
        actions: registry.actions(),
    };
    let mut bytes =
        serde_json::to_vec_pretty(&resolved).context("failed to serialise resolved registry")?;
    bytes.push(b'\n');
    Ok(bytes)
}
