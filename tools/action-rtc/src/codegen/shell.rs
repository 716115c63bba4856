// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Render the interactive shell command table from the interactive projection.
// Author: Lukas Bower

use action_registry::{Action, Projection, Registry, Visibility};
use std::collections::BTreeSet;
use std::fmt::Write as _;

use super::backend::is_stream;

fn command_name(name: &str) -> String {
    name.replace('_', "-")
}

/// Every extra spelling accepted for the command, excluding its own name.
fn aliases(action: &Action) -> BTreeSet<String> {
    let primary = command_name(&action.name);
    let mut names = BTreeSet::new();
    for name in std::iter::once(action.name.as_str())
        .chain(action.callable_names())
        .chain(action.shell_aliases.iter().map(String::as_str))
    {
        names.insert(name.to_owned());
        names.insert(command_name(name));
    }
    names.remove(&primary);
    names
}

fn usage(action: &Action) -> String {
    let mut usage = command_name(&action.name);
    for param in &action.params {
        if is_stream(&param.kind) {
            write!(usage, " <{}:local-file>", param.name).ok();
        } else {
            write!(usage, " <{}>", param.name).ok();
        }
    }
    for opt in &action.optargs {
        write!(usage, " [{}:..]", opt.name).ok();
    }
    usage
}

pub fn render_command_table(registry: &Registry, fingerprint: &str) -> String {
    let mut commands: Vec<(String, &Action)> = Projection::Interactive
        .select(registry)
        .map(|action| (command_name(&action.name), action))
        .collect();
    commands.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = String::new();
    writeln!(out, "// Author: Lukas Bower").ok();
    writeln!(out, "// Purpose: Generated shell command table for appliance actions.").ok();
    writeln!(out, "// @generated by action-rtc; do not edit.\n").ok();
    writeln!(out, "pub const REGISTRY_SHA256: &str = \"{fingerprint}\";\n").ok();
    writeln!(out, "#[derive(Debug, Clone, Copy)]").ok();
    writeln!(out, "pub struct Command {{").ok();
    writeln!(out, "    pub name: &'static str,").ok();
    writeln!(out, "    pub aliases: &'static [&'static str],").ok();
    writeln!(out, "    /// Registry action the command calls.").ok();
    writeln!(out, "    pub action: &'static str,").ok();
    writeln!(out, "    pub min_args: usize,").ok();
    writeln!(out, "    /// Optional arguments are passed as `name:value`.").ok();
    writeln!(out, "    pub max_args: usize,").ok();
    writeln!(out, "    pub usage: &'static str,").ok();
    writeln!(out, "    pub shortdesc: &'static str,").ok();
    writeln!(out, "    pub debug: bool,").ok();
    writeln!(out, "}}\n").ok();

    writeln!(out, "pub const COMMANDS: &[Command] = &[").ok();
    for (name, action) in &commands {
        let aliases: Vec<String> = aliases(action)
            .into_iter()
            .map(|alias| format!("{alias:?}"))
            .collect();
        writeln!(out, "    Command {{").ok();
        writeln!(out, "        name: {name:?},").ok();
        writeln!(out, "        aliases: &[{}],", aliases.join(", ")).ok();
        writeln!(out, "        action: {:?},", action.name).ok();
        writeln!(out, "        min_args: {},", action.params.len()).ok();
        writeln!(
            out,
            "        max_args: {},",
            action.params.len() + action.optargs.len()
        )
        .ok();
        writeln!(out, "        usage: {:?},", usage(action)).ok();
        writeln!(out, "        shortdesc: {:?},", action.shortdesc).ok();
        writeln!(
            out,
            "        debug: {},",
            action.visibility == Visibility::Debug
        )
        .ok();
        writeln!(out, "    }},").ok();
    }
    writeln!(out, "];\n").ok();

    writeln!(out, "/// Look a command up by name or alias.").ok();
    writeln!(out, "pub fn lookup(name: &str) -> Option<&'static Command> {{").ok();
    writeln!(out, "    COMMANDS").ok();
    writeln!(out, "        .iter()").ok();
    writeln!(
        out,
        "        .find(|command| command.name == name || command.aliases.contains(&name))"
    )
    .ok();
    writeln!(out, "}}").ok();
    out
}
