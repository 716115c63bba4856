// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Expose action-rtc registry compilation helpers for tests and the CLI.
// Author: Lukas Bower

pub mod codegen;
pub mod resolved;

use action_registry::{build_registry, load_source};
use anyhow::{bail, Context, Result};
use appliance_wire::compile_protocol;
use log::info;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub registry_path: PathBuf,
    /// Directory for generated bindings and the dispatch table.
    pub out_dir: PathBuf,
    pub resolved_out: PathBuf,
    pub doc_out: PathBuf,
    pub shell_out: PathBuf,
    pub max_proc_out: PathBuf,
    pub testsuite_out: PathBuf,
}

impl CompileOptions {
    /// Every artefact under `out_dir`, using the default file names.
    pub fn in_dir(registry_path: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        let out_dir = out_dir.into();
        Self {
            registry_path: registry_path.into(),
            resolved_out: out_dir.join(default_resolved_path()),
            doc_out: out_dir.join(default_doc_path()),
            shell_out: out_dir.join(default_shell_path()),
            max_proc_out: out_dir.join(default_max_proc_path()),
            testsuite_out: out_dir.join(default_testsuite_path()),
            out_dir: out_dir.join("bindings"),
        }
    }
}

pub fn compile(options: &CompileOptions) -> Result<codegen::GeneratedArtifacts> {
    if !options.registry_path.is_file() {
        bail!(
            "registry path does not exist or is not a file: {}",
            options.registry_path.display()
        );
    }

    let (config, source) = load_source(&options.registry_path)?;
    let registry = build_registry(source).with_context(|| {
        format!(
            "registry {} failed validation",
            options.registry_path.display()
        )
    })?;
    let protocol = compile_protocol(&registry).context("failed to compile wire layouts")?;
    info!(
        "[action-rtc] {} actions, {} procedures, max proc_nr {}",
        registry.actions().len(),
        protocol.len(),
        registry.max_proc_nr()
    );

    let resolved_json = resolved::serialize_registry(&config, &registry)?;
    let registry_hash = codegen::hash_bytes(&resolved_json);

    codegen::emit_all(&registry, &protocol, &registry_hash, &resolved_json, options)
}

pub fn default_resolved_path() -> PathBuf {
    PathBuf::from("registry_resolved.json")
}

pub fn default_doc_path() -> PathBuf {
    Path::new("docs").join("actions.md")
}

pub fn default_shell_path() -> PathBuf {
    Path::new("shell").join("shell_commands.rs")
}

pub fn default_max_proc_path() -> PathBuf {
    PathBuf::from("MAX_PROC_NR")
}

pub fn default_testsuite_path() -> PathBuf {
    Path::new("tests").join("testsuite.json")
}
