// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Check that each emitted artefact surfaces exactly its projection of the registry.
// Author: Lukas Bower

use action_rtc::codegen::{backends, GeneratedArtifacts};
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

fn compile_registry() -> (TempDir, CompileOptions, GeneratedArtifacts) {
    let temp_dir = TempDir::new().expect("tempdir");
    let options = CompileOptions::in_dir(repo_path("configs/registry.toml"), temp_dir.path());
    let artifacts = compile(&options).expect("compile registry");
    (temp_dir, options, artifacts)
}

fn binding(options: &CompileOptions, file_name: &str) -> String {
    fs::read_to_string(options.out_dir.join(file_name)).expect("binding source")
}

#[test]
fn internal_actions_stay_out_of_bindings() {
    let (_temp, options, _) = compile_registry();
    let header = binding(&options, "appliance.h");
    let rust = binding(&options, "appliance.rs");
    let python = binding(&options, "appliance.py");
    assert!(!header.contains("appl_internal_exit"));
    assert!(!rust.contains("fn internal_exit"));
    assert!(!python.contains("def internal_exit"));
    // Binding-test actions are external.
    assert!(header.contains("appl_internal_test_rint"));
}

#[test]
fn rust_errors_keep_the_daemon_message_and_errno() {
    let (_temp, options, _) = compile_registry();
    let rust = binding(&options, "appliance.rs");
    let from = rust
        .split("impl From<appliance_wire::CallError> for Error {")
        .nth(1)
        .and_then(|rest| rest.split("\n}\n").next())
        .expect("conversion impl");
    assert!(from.contains("| appliance_wire::CallError::Protocol(err) => Self {"));
    assert!(from.contains("errno: Some(err.errno),"));
    assert!(from.contains("message: err.message,"));
    // Only transport failures fall back to the formatted error.
    assert_eq!(from.matches("to_string()").count(), 1);
    assert!(from.contains("errno: None,"));
}

#[test]
fn c_header_keeps_legacy_grep_symbols() {
    let (_temp, options, _) = compile_registry();
    let header = binding(&options, "appliance.h");
    assert!(header.contains("#define APPL_GREP_OPTS_EXTENDED 0"));
    assert!(header.contains("#define APPL_GREP_OPTS_COMPRESSED_BITMASK (UINT64_C(1)<<3)"));
    assert!(header.contains("struct appl_grep_opts_argv {\n  uint64_t bitmask;"));
    assert!(header.contains(
        "extern char **appl_grep (appl_h *g, const char *regex, const char *path);"
    ));
    assert!(header.contains("extern char **appl_grep_opts_va ("));
    assert!(header.contains("extern int appl_sync (appl_h *g);"));
}

#[test]
fn deprecated_actions_produce_notices() {
    let (_temp, options, artifacts) = compile_registry();
    let mut deprecated: Vec<(&str, &str)> = artifacts
        .notices
        .iter()
        .filter(|notice| notice.backend == "rust")
        .map(|notice| (notice.action.as_str(), notice.replacement.as_str()))
        .collect();
    deprecated.sort();
    assert_eq!(
        deprecated,
        vec![("luks_open", "cryptsetup_open"), ("stat", "statns")]
    );
    assert_eq!(artifacts.notices.len(), 2 * backends().len());

    let header = binding(&options, "appliance.h");
    assert!(header.contains("APPL_DEPRECATED_BY (\"statns\")"));
    let rust = binding(&options, "appliance.rs");
    assert!(rust.contains("#[deprecated(note = \"use statns instead\")]"));
    let python = binding(&options, "appliance.py");
    assert!(python.contains("DeprecationWarning"));
}

#[test]
fn shell_table_follows_the_interactive_projection() {
    let (_temp, options, _) = compile_registry();
    let table = fs::read_to_string(&options.shell_out).expect("shell table");
    assert!(table.starts_with("// Author: Lukas Bower\n"));
    assert!(table.contains("name: \"list-devices\","));
    assert!(table.contains("name: \"debug\","));
    // Opaque handle parameter.
    assert!(!table.contains("\"add-libvirt-dom\""));
    assert!(!table.contains("name: \"internal-exit\","));
    assert!(!table.contains("name: \"is-ready\","));

    let grep = table
        .split("    Command {")
        .find(|entry| entry.contains("name: \"grep\","))
        .expect("grep command");
    assert!(grep.contains("aliases: &[\"grep-opts\", \"grep_opts\"],"));
    assert!(grep.contains("min_args: 2,"));
    assert!(grep.contains("max_args: 6,"));
}

#[test]
fn reference_lists_documented_actions_by_topic() {
    let (_temp, options, _) = compile_registry();
    let doc = fs::read_to_string(&options.doc_out).expect("doc");
    assert!(doc.contains("## filesystem"));
    assert!(doc.contains("### grep_opts"));
    assert!(doc.contains("### is_ready"));
    assert!(!doc.contains("### debug_upload"));
    assert!(!doc.contains("### internal_exit"));
    assert!(!doc.contains("### internal_test"));
    assert!(doc.contains("Deprecated: use `statns` instead."));
    assert!(doc.contains("Requires the `luks` feature"));
    assert!(doc.contains("Also callable as `grep`."));
}

#[test]
fn non_blocking_actions_are_marked() {
    let (_temp, options, _) = compile_registry();
    let doc = fs::read_to_string(&options.doc_out).expect("doc");
    let section = |name: &str| -> String {
        doc.split(&format!("### {name}\n"))
            .nth(1)
            .and_then(|rest| rest.split("\n### ").next())
            .expect("action section")
            .to_owned()
    };
    assert!(section("set_verbose").contains("Does not wait for the appliance"));
    assert!(!section("launch").contains("Does not wait for the appliance"));

    let header = binding(&options, "appliance.h");
    assert!(header.contains("/* get_qemu (non-blocking) */"));
    assert!(header.contains("/* launch */"));
}

#[test]
fn test_manifest_carries_enabled_cases_only() {
    let (_temp, options, _) = compile_registry();
    let manifest: serde_json::Value =
        serde_json::from_slice(&fs::read(&options.testsuite_out).expect("manifest"))
            .expect("manifest parses");
    let ids: Vec<&str> = manifest["cases"]
        .as_array()
        .expect("cases")
        .iter()
        .map(|case| case["id"].as_str().expect("id"))
        .collect();
    assert!(ids.contains(&"grep-0"));
    assert!(ids.contains(&"ping_daemon-0"));
    assert!(!ids.iter().any(|id| id.starts_with("zero_device-")));

    let grep = manifest["cases"]
        .as_array()
        .expect("cases")
        .iter()
        .find(|case| case["id"] == "grep-0")
        .expect("grep case");
    assert_eq!(grep["fixture"], "basic-fs");
    assert_eq!(grep["steps"][1][0], "grep");
}

#[test]
fn dispatch_table_lists_every_daemon_procedure() {
    let (_temp, _options, artifacts) = compile_registry();
    let table = fs::read_to_string(&artifacts.dispatch_table).expect("dispatch table");
    assert!(table.contains("pub const MAX_PROC_NR: u32 = 63;"));
    assert!(table.contains("    Mount = 1,"));
    assert!(table.contains("    (23, \"upload\", 0x7),"));
    assert!(table.contains("    (24, \"download\", 0xb),"));
    assert!(!table.contains("\"get_qemu\""));
    // Retired number.
    assert!(!table.contains("            6 => "));
}
