// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Separately maintained procedure number table for daemon actions.
// Author: Lukas Bower

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::RegistryError;

/// Name → number table. Numbers are assigned once and never reused; entries
/// for removed actions move to `retired` so their numbers stay reserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcTable {
    pub procedures: BTreeMap<String, u32>,
    #[serde(default)]
    pub retired: BTreeMap<String, u32>,
}

impl ProcTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion used by tests and tooling.
    #[must_use]
    pub fn with(mut self, name: &str, proc_nr: u32) -> Self {
        self.procedures.insert(name.to_owned(), proc_nr);
        self
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.procedures.get(name).copied()
    }

    #[must_use]
    pub fn max_assigned(&self) -> Option<u32> {
        self.procedures.values().copied().max()
    }

    /// Check the table on its own: no zero, no duplicate and no retired
    /// number in active use.
    pub fn check_numbers(&self) -> Result<(), RegistryError> {
        let mut owners: BTreeMap<u32, &str> = BTreeMap::new();
        for (name, &proc_nr) in &self.procedures {
            if proc_nr == 0 {
                return Err(RegistryError::ReservedProcNr { name: name.clone() });
            }
            if let Some(first) = owners.insert(proc_nr, name.as_str()) {
                return Err(RegistryError::DuplicateProcNr {
                    proc_nr,
                    first: first.to_owned(),
                    second: name.clone(),
                });
            }
        }
        for (name, &proc_nr) in &self.retired {
            if let Some(active) = owners.get(&proc_nr) {
                return Err(RegistryError::ReusedProcNr {
                    proc_nr,
                    retired: name.clone(),
                    active: (*active).to_owned(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_numbers_are_rejected() {
        let table = ProcTable::new().with("mount", 1).with("sync", 1);
        let err = table.check_numbers().expect_err("duplicate number");
        assert!(matches!(err, RegistryError::DuplicateProcNr { proc_nr: 1, .. }));
    }

    #[test]
    fn zero_is_reserved() {
        let table = ProcTable::new().with("mount", 0);
        assert!(matches!(
            table.check_numbers(),
            Err(RegistryError::ReservedProcNr { .. })
        ));
    }

    #[test]
    fn retired_numbers_stay_reserved() {
        let mut table = ProcTable::new().with("mount", 1).with("touch", 3);
        table.retired.insert("old_touch".to_owned(), 3);
        assert!(matches!(
            table.check_numbers(),
            Err(RegistryError::ReusedProcNr { proc_nr: 3, .. })
        ));
    }

    #[test]
    fn parses_table_from_toml() {
        let table: ProcTable = toml::from_str(
            r#"
[procedures]
mount = 1
sync = 2

[retired]
old_ls = 5
"#,
        )
        .expect("parse table");
        assert_eq!(table.lookup("sync"), Some(2));
        assert_eq!(table.max_assigned(), Some(2));
        table.check_numbers().expect("valid table");
    }
}
