// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: CLI entry point for the action registry compiler.
// Author: Lukas Bower

use action_rtc::{
    compile, default_doc_path, default_max_proc_path, default_resolved_path,
    default_shell_path, default_testsuite_path, CompileOptions,
};
use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to the registry TOML file.
    registry: PathBuf,
    /// Output directory for generated bindings and the dispatch table.
    #[arg(long)]
    out: PathBuf,
    /// Output path for the resolved registry JSON.
    #[arg(long = "resolved", default_value_os_t = default_resolved_path())]
    resolved_out: PathBuf,
    /// Output path for the action reference.
    #[arg(long, default_value_os_t = default_doc_path())]
    doc: PathBuf,
    /// Output path for the shell command table.
    #[arg(long, default_value_os_t = default_shell_path())]
    shell: PathBuf,
    /// Output path for the highest assigned procedure number.
    #[arg(long, default_value_os_t = default_max_proc_path())]
    max_proc: PathBuf,
    /// Output path for the test-suite manifest.
    #[arg(long, default_value_os_t = default_testsuite_path())]
    testsuite: PathBuf,
    /// Log debug detail.
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let options = CompileOptions {
        registry_path: args.registry,
        out_dir: args.out,
        resolved_out: args.resolved_out,
        doc_out: args.doc,
        shell_out: args.shell,
        max_proc_out: args.max_proc,
        testsuite_out: args.testsuite,
    };
    let output = compile(&options)?;
    println!("action-rtc: wrote {}", output.summary());
    Ok(())
}
