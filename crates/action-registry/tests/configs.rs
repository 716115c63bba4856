// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Guard that the shipped registry configuration loads and validates.
// Author: Lukas Bower
#![forbid(unsafe_code)]

use action_registry::{
    build_registry, is_interactive, load_source, Fixture, Outcome, Predicate, Projection,
    ReturnShape, Visibility,
};
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

fn shipped_registry() -> action_registry::Registry {
    let (_, source) = load_source(&repo_path("configs/registry.toml")).expect("load registry");
    build_registry(source).expect("build registry")
}

#[test]
fn shipped_registry_validates() {
    let registry = shipped_registry();
    assert!(registry.actions().len() > 50);
    let names: Vec<_> = registry.actions().iter().map(|a| a.name.clone()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    for action in registry.actions() {
        assert_eq!(action.is_daemon(), action.proc_nr.is_some(), "{}", action.name);
    }
}

#[test]
fn get_qemu_derivation() {
    let registry = shipped_registry();
    let action = registry.get("get_qemu").expect("get_qemu");
    assert_eq!(action.derived.native_name, "get_qemu");
    assert_eq!(action.derived.native_entry_point, "appl_get_qemu");
    assert_eq!(action.derived.display_name, "GetQemu");
    assert_eq!(action.return_shape, ReturnShape::ConstString);
}

#[test]
fn grep_is_legacy_with_four_flags() {
    let registry = shipped_registry();
    let grep = registry.resolve("grep_opts").expect("grep_opts");
    assert_eq!(grep.name, "grep");
    assert_eq!(grep.optargs.len(), 4);
    assert_eq!(grep.derived.aliases, vec!["grep".to_owned()]);
    let case = &grep.tests[0];
    assert_eq!(case.fixture, Fixture::BasicFs);
    assert_eq!(
        case.expect,
        Outcome::SucceedsWith(Predicate::ListEquals(vec![
            "abc".to_owned(),
            "abc123".to_owned()
        ]))
    );
}

#[test]
fn opaque_handles_stay_out_of_the_shell() {
    let registry = shipped_registry();
    let dom = registry.get("add_libvirt_dom").expect("add_libvirt_dom");
    assert!(dom.has_opaque_handle());
    assert!(!is_interactive(dom));
    assert!(Projection::Interactive
        .select(&registry)
        .all(|action| !action.has_opaque_handle()));
    assert!(registry
        .with_visibility(Visibility::Internal)
        .all(|action| !Projection::External.includes(action)));
}

#[test]
fn missing_topic_file_reports_path() {
    let temp_dir = TempDir::new().expect("tempdir");
    let config = temp_dir.path().join("registry.toml");
    fs::write(
        &config,
        r#"
[sources]
topics = ["actions/missing.toml"]
structs = "structs.toml"
proc_table = "proc_nr.toml"
"#,
    )
    .expect("write config");
    let err = load_source(&config).expect_err("missing topic");
    assert!(err.to_string().contains("missing.toml"), "{err}");
}

#[test]
fn unknown_action_fields_are_rejected() {
    let temp_dir = TempDir::new().expect("tempdir");
    let config = temp_dir.path().join("registry.toml");
    fs::write(
        &config,
        r#"
[sources]
topics = ["core.toml"]
structs = "structs.toml"
proc_table = "proc_nr.toml"
"#,
    )
    .expect("write config");
    fs::write(
        temp_dir.path().join("core.toml"),
        r#"
[[actions]]
name = "sync"
kind = "daemon"
procnr = 2
"#,
    )
    .expect("write topic");
    fs::write(temp_dir.path().join("structs.toml"), "").expect("write structs");
    fs::write(temp_dir.path().join("proc_nr.toml"), "[procedures]\nsync = 2\n")
        .expect("write table");
    let err = load_source(&config).expect_err("unknown field");
    assert!(matches!(err, action_registry::RegistryError::Parse { .. }));
}
