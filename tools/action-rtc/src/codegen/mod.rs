// Author: Lukas Bower
// Purpose: Emit deterministic artefacts from the validated action registry.

mod abi;
mod backend;
mod c;
mod dispatch;
mod docs;
mod python;
mod rust;
mod shell;
mod testsuite;

use action_registry::{Projection, Registry};
use anyhow::{Context, Result};
use appliance_wire::Protocol;
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub use backend::{BindingBackend, DeprecationNotice};
pub use c::CHeaderBackend;
pub use python::PythonBackend;
pub use rust::RustBackend;

#[derive(Debug)]
pub struct GeneratedArtifacts {
    pub bindings: Vec<PathBuf>,
    pub dispatch_table: PathBuf,
    pub resolved_json: PathBuf,
    pub resolved_hash: PathBuf,
    pub doc: PathBuf,
    pub shell: PathBuf,
    pub max_proc: PathBuf,
    pub testsuite: PathBuf,
    pub notices: Vec<DeprecationNotice>,
}

impl GeneratedArtifacts {
    pub fn summary(&self) -> String {
        format!(
            "bindings={}, dispatch={}, resolved={}, docs={}, shell={}, testsuite={} ({} deprecation notices)",
            self.bindings.len(),
            self.dispatch_table.display(),
            self.resolved_json.display(),
            self.doc.display(),
            self.shell.display(),
            self.testsuite.display(),
            self.notices.len()
        )
    }
}

/// Backends run for every compile, in output order.
pub fn backends() -> Vec<Box<dyn BindingBackend>> {
    vec![
        Box::new(RustBackend),
        Box::new(PythonBackend),
        Box::new(CHeaderBackend),
    ]
}

pub fn emit_all(
    registry: &Registry,
    protocol: &Protocol,
    registry_hash: &str,
    resolved_json: &[u8],
    options: &crate::CompileOptions,
) -> Result<GeneratedArtifacts> {
    fs::create_dir_all(&options.out_dir)
        .with_context(|| format!("failed to create {}", options.out_dir.display()))?;
    for path in [
        &options.resolved_out,
        &options.doc_out,
        &options.shell_out,
        &options.max_proc_out,
        &options.testsuite_out,
    ] {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let mut bindings = Vec::new();
    let mut notices = Vec::new();
    for backend in backends() {
        let rendered = backend.render(registry, Projection::External, registry_hash);
        let path = options.out_dir.join(backend.file_name());
        write_artifact(&path, rendered.source.as_bytes(), backend.name())?;
        debug!("[action-rtc] {} binding -> {}", backend.name(), path.display());
        bindings.push(path);
        notices.extend(rendered.notices);
    }
    for notice in &notices {
        warn!("[action-rtc] {notice}");
    }

    let dispatch_table = options.out_dir.join("dispatch_table.rs");
    write_artifact(
        &dispatch_table,
        dispatch::render_dispatch_table(registry, protocol, registry_hash).as_bytes(),
        "dispatch table",
    )?;
    write_artifact(
        &options.doc_out,
        docs::render_reference(registry, registry_hash).as_bytes(),
        "action reference",
    )?;
    write_artifact(
        &options.shell_out,
        shell::render_command_table(registry, registry_hash).as_bytes(),
        "shell command table",
    )?;
    write_artifact(
        &options.max_proc_out,
        abi::render_max_proc_nr(registry).as_bytes(),
        "max proc_nr",
    )?;
    write_artifact(
        &options.testsuite_out,
        &testsuite::render_manifest(registry, registry_hash)?,
        "test-suite manifest",
    )?;

    write_artifact(&options.resolved_out, resolved_json, "resolved registry")?;
    let hash_path = options.resolved_out.with_extension("json.sha256");
    let hash_contents = format!(
        "# Author: Lukas Bower\n# Purpose: SHA-256 fingerprint for registry_resolved.json.\n{}  {}\n",
        registry_hash,
        options
            .resolved_out
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("registry_resolved.json")
    );
    write_artifact(&hash_path, hash_contents.as_bytes(), "registry hash")?;

    Ok(GeneratedArtifacts {
        bindings,
        dispatch_table,
        resolved_json: options.resolved_out.clone(),
        resolved_hash: hash_path,
        doc: options.doc_out.clone(),
        shell: options.shell_out.clone(),
        max_proc: options.max_proc_out.clone(),
        testsuite: options.testsuite_out.clone(),
        notices,
    })
}

fn write_artifact(path: &Path, contents: &[u8], what: &str) -> Result<()> {
    fs::write(path, contents)
        .with_context(|| format!("failed to write {what} {}", path.display()))
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex::encode(digest)
}

pub fn hash_path(path: &Path) -> Result<String> {
    let contents = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(hash_bytes(&contents))
}
