// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Load the registry configuration, topic lists, structs and number table from TOML.
// Author: Lukas Bower

use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::action::RawAction;
use crate::derive::Naming;
use crate::error::RegistryError;
use crate::proc_table::ProcTable;
use crate::registry::{RegistrySource, Topic};
use crate::types::StructDef;

/// Top-level registry configuration (`configs/registry.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    #[serde(default)]
    pub meta: RegistryMeta,
    #[serde(default)]
    pub naming: Naming,
    pub sources: Sources,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RegistryMeta {
    pub author: String,
    pub purpose: String,
}

/// Source files, relative to the configuration file's directory. Topics are
/// merged in the listed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sources {
    pub topics: Vec<String>,
    pub structs: String,
    pub proc_table: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TopicFile {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    actions: Vec<RawAction>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StructFile {
    #[serde(default)]
    structs: Vec<StructDef>,
}

pub fn load_config(path: &Path) -> Result<RegistryConfig, RegistryError> {
    read_toml(path)
}

/// Load every source named by the configuration at `config_path`.
pub fn load_source(config_path: &Path) -> Result<(RegistryConfig, RegistrySource), RegistryError> {
    let config = load_config(config_path)?;
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));

    let mut topics = Vec::with_capacity(config.sources.topics.len());
    for entry in &config.sources.topics {
        let path = resolve(base, entry);
        let file: TopicFile = read_toml(&path)?;
        let name = file.topic.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or(entry.as_str())
                .to_owned()
        });
        debug!(
            "[registry] loaded topic {} ({} actions) from {}",
            name,
            file.actions.len(),
            path.display()
        );
        topics.push(Topic {
            name,
            actions: file.actions,
        });
    }

    let structs: StructFile = read_toml(&resolve(base, &config.sources.structs))?;
    let proc_table: ProcTable = read_toml(&resolve(base, &config.sources.proc_table))?;

    let source = RegistrySource {
        naming: config.naming.clone(),
        topics,
        structs: structs.structs,
        proc_table,
    };
    Ok((config, source))
}

fn resolve(base: &Path, value: &str) -> PathBuf {
    let candidate = Path::new(value.trim());
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, RegistryError> {
    let contents = fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
