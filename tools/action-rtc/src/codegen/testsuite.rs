// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Emit the JSON test-suite manifest consumed by the external test runner.
// Author: Lukas Bower

use action_registry::{Fixture, Guard, Invocation, Outcome, Projection, Registry};
use anyhow::{Context, Result};
use serde::Serialize;

pub const MANIFEST_SCHEMA: &str = "1";

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    schema: &'static str,
    registry_sha256: &'a str,
    cases: Vec<Case<'a>>,
}

#[derive(Debug, Serialize)]
struct Case<'a> {
    /// `<action>-<n>`, stable while the action's case list is unchanged.
    id: String,
    action: &'a str,
    fixture: Fixture,
    guard: &'a Guard,
    steps: &'a [Invocation],
    expect: &'a Outcome,
    #[serde(skip_serializing_if = "no_steps")]
    cleanup: &'a [Invocation],
}

fn no_steps(steps: &&[Invocation]) -> bool {
    steps.is_empty()
}

/// Enabled test cases of the tested projection, in action order.
pub fn render_manifest(registry: &Registry, fingerprint: &str) -> Result<Vec<u8>> {
    let mut cases = Vec::new();
    for action in Projection::Tested.select(registry) {
        for (index, case) in action.tests.iter().enumerate() {
            if !case.is_enabled() {
                continue;
            }
            cases.push(Case {
                id: format!("{}-{}", action.name, index),
                action: &action.name,
                fixture: case.fixture,
                guard: &case.guard,
                steps: &case.steps,
                expect: &case.expect,
                cleanup: &case.cleanup,
            });
        }
    }
    let manifest = Manifest {
        schema: MANIFEST_SCHEMA,
        registry_sha256: fingerprint,
        cases,
    };
    let mut bytes =
        serde_json::to_vec_pretty(&manifest).context("failed to serialise test manifest")?;
    bytes.push(b'\n');
    Ok(bytes)
}
