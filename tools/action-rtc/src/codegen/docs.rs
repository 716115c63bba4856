// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Render the markdown action reference for documented actions.
// Author: Lukas Bower

use action_registry::{Action, Projection, Registry};
use std::fmt::Write as _;

use super::backend::{is_stream, wrap};

fn signature(action: &Action) -> String {
    let params: Vec<String> = action
        .params
        .iter()
        .map(|param| format!("{}: {}", param.name, param.kind.label()))
        .collect();
    let mut out = format!("{} ({})", action.derived.native_name, params.join(", "));
    if !action.optargs.is_empty() {
        let optargs: Vec<String> = action
            .optargs
            .iter()
            .map(|opt| format!("{}: {}", opt.name, opt.kind.label()))
            .collect();
        write!(out, " [{}]", optargs.join(", ")).ok();
    }
    write!(out, " -> {}", action.return_shape.label()).ok();
    out
}

fn notes(action: &Action) -> Vec<String> {
    let mut notes = Vec::new();
    if let Some(replacement) = &action.deprecated_by {
        notes.push(format!(
            "Deprecated: use `{replacement}` instead. New code should not call this action."
        ));
    }
    for param in action.params.iter().filter(|param| is_stream(&param.kind)) {
        notes.push(format!(
            "`{}` names a local file transferred as a chunked stream.",
            param.name
        ));
    }
    if !action.is_blocking {
        notes.push(
            "Does not wait for the appliance; it may be called while another call is in flight."
                .to_owned(),
        );
    }
    if action.has_progress {
        notes.push("Sends progress notifications while it runs.".to_owned());
    }
    if action.cancellable {
        notes.push("The transfer can be cancelled from another thread.".to_owned());
    }
    if action.oversize_warning {
        notes.push(
            "The result is returned in a single message and fails if it exceeds the protocol limit; prefer a streaming alternative for large results."
                .to_owned(),
        );
    }
    if action.params.iter().any(|param| param.kind.is_secret()) {
        notes.push("Secret arguments are never written to logs or traces.".to_owned());
    }
    if let Some(feature) = &action.feature {
        notes.push(format!(
            "Requires the `{feature}` feature; check availability before calling."
        ));
    }
    if !action.derived.aliases.is_empty() {
        notes.push(format!(
            "Also callable as {}.",
            action
                .derived
                .aliases
                .iter()
                .map(|alias| format!("`{alias}`"))
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    notes
}

/// Markdown reference over the documented projection, grouped by topic.
pub fn render_reference(registry: &Registry, fingerprint: &str) -> String {
    let mut out = String::new();
    writeln!(out, "<!-- Author: Lukas Bower -->").ok();
    writeln!(
        out,
        "<!-- Purpose: Generated appliance action reference. -->"
    )
    .ok();
    writeln!(out, "<!-- @generated by action-rtc; do not edit. -->\n").ok();
    writeln!(out, "# Appliance actions\n").ok();
    writeln!(out, "Registry fingerprint: `{fingerprint}`").ok();

    let mut actions: Vec<&Action> = Projection::Documented.select(registry).collect();
    actions.sort_by(|a, b| (&a.topic, &a.name).cmp(&(&b.topic, &b.name)));
    let mut topic = "";
    for action in actions {
        if action.topic != topic {
            topic = action.topic.as_str();
            writeln!(out, "\n## {topic}").ok();
        }
        writeln!(out, "\n### {}\n", action.derived.native_name).ok();
        writeln!(out, "```\n{}\n```\n", signature(action)).ok();
        writeln!(out, "{}", action.shortdesc).ok();
        if !action.longdesc.is_empty() {
            writeln!(out).ok();
            for line in wrap(&action.longdesc, "", 76) {
                writeln!(out, "{line}").ok();
            }
        }
        let notes = notes(action);
        if !notes.is_empty() {
            writeln!(out).ok();
            for note in notes {
                writeln!(out, "- {note}").ok();
            }
        }
    }
    out
}
