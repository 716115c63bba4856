// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Validate action-rtc determinism, fingerprints and registry rejection.
// Author: Lukas Bower

use action_rtc::codegen::hash_path;
use action_rtc::{compile, CompileOptions};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn repo_path(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join(path)
}

#[test]
fn registry_codegen_is_deterministic() {
    let temp_dir = TempDir::new().expect("tempdir");
    let options = CompileOptions::in_dir(repo_path("configs/registry.toml"), temp_dir.path());

    let first = compile(&options).expect("compile registry");
    let baseline = snapshot_dir(&options.out_dir);
    let baseline_resolved = fs::read(&options.resolved_out).expect("resolved json");
    let baseline_doc = fs::read(&options.doc_out).expect("doc");
    let baseline_shell = fs::read(&options.shell_out).expect("shell table");
    let baseline_tests = fs::read(&options.testsuite_out).expect("test manifest");

    let second = compile(&options).expect("compile registry again");
    assert_eq!(baseline, snapshot_dir(&options.out_dir));
    assert_eq!(
        baseline_resolved,
        fs::read(&options.resolved_out).expect("resolved json")
    );
    assert_eq!(baseline_doc, fs::read(&options.doc_out).expect("doc"));
    assert_eq!(baseline_shell, fs::read(&options.shell_out).expect("shell table"));
    assert_eq!(
        baseline_tests,
        fs::read(&options.testsuite_out).expect("test manifest")
    );
    assert_eq!(first.summary(), second.summary());
    assert_eq!(first.bindings.len(), 3);
}

#[test]
fn fingerprint_matches_resolved_json() {
    let temp_dir = TempDir::new().expect("tempdir");
    let options = CompileOptions::in_dir(repo_path("configs/registry.toml"), temp_dir.path());
    let artifacts = compile(&options).expect("compile registry");

    let hash = hash_path(&artifacts.resolved_json).expect("hash resolved");
    let recorded = fs::read_to_string(&artifacts.resolved_hash).expect("hash file");
    assert!(recorded.starts_with("# Author: Lukas Bower\n"));
    assert!(recorded.contains(&format!("{hash}  registry_resolved.json")));

    for binding in &artifacts.bindings {
        let source = fs::read_to_string(binding).expect("binding");
        assert!(source.contains(&hash), "{} lacks fingerprint", binding.display());
    }
    let dispatch = fs::read_to_string(&artifacts.dispatch_table).expect("dispatch");
    assert!(dispatch.contains(&format!("REGISTRY_SHA256: &str = \"{hash}\"")));

    let resolved: serde_json::Value =
        serde_json::from_slice(&fs::read(&artifacts.resolved_json).expect("resolved"))
            .expect("resolved json parses");
    assert_eq!(resolved["prefix"], "appl");
    assert_eq!(resolved["max_proc_nr"], 63);
}

#[test]
fn max_proc_nr_is_written_alone() {
    let temp_dir = TempDir::new().expect("tempdir");
    let options = CompileOptions::in_dir(repo_path("configs/registry.toml"), temp_dir.path());
    compile(&options).expect("compile registry");
    assert_eq!(
        fs::read_to_string(&options.max_proc_out).expect("max proc"),
        "63\n"
    );
}

#[test]
fn invalid_registry_rejected() {
    let temp_dir = TempDir::new().expect("tempdir");
    let root = temp_dir.path();
    fs::write(
        root.join("registry.toml"),
        r#"
# Author: Lukas Bower
# Purpose: Invalid registry sample for action-rtc tests.
[sources]
topics = ["fs.toml"]
structs = "structs.toml"
proc_table = "proc_nr.toml"
"#,
    )
    .expect("write registry");
    fs::write(
        root.join("fs.toml"),
        r#"
[[actions]]
name = "mount"
kind = "daemon"
params = [{ name = "mountable", kind = "mountable-string" }]
shortdesc = "mount a filesystem"

[[actions]]
name = "sync"
kind = "daemon"
shortdesc = "sync disks"
"#,
    )
    .expect("write topic");
    fs::write(root.join("structs.toml"), "").expect("write structs");
    fs::write(root.join("proc_nr.toml"), "[procedures]\nmount = 1\n").expect("write table");

    let options = CompileOptions::in_dir(root.join("registry.toml"), root.join("out"));
    let err = compile(&options).expect_err("registry should be rejected");
    let message = format!("{err:#}");
    assert!(message.contains("failed validation"), "{message}");
    assert!(
        message.contains("daemon action sync has no entry in the procedure number table"),
        "{message}"
    );
    assert!(!options.out_dir.exists());
}

#[test]
fn missing_registry_rejected() {
    let temp_dir = TempDir::new().expect("tempdir");
    let options = CompileOptions::in_dir(temp_dir.path().join("absent.toml"), temp_dir.path());
    let err = compile(&options).expect_err("missing registry");
    assert!(err.to_string().contains("does not exist"));
}

fn snapshot_dir(path: &std::path::Path) -> Vec<(String, Vec<u8>)> {
    let mut entries = fs::read_dir(path)
        .expect("read dir")
        .map(|entry| {
            let entry = entry.expect("entry");
            let file_name = entry.file_name().to_string_lossy().to_string();
            let contents = fs::read(entry.path()).expect("read file");
            (file_name, contents)
        })
        .collect::<Vec<_>>();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}
