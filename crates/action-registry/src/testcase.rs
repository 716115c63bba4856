// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Data model for registry-declared appliance test cases.
// Author: Lukas Bower

//! Test cases attached to actions. Only the data model lives here; running
//! the steps against an appliance is the job of an external test runner.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reusable appliance setup a test starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Fixture {
    /// Blank disks, nothing partitioned.
    #[default]
    Empty,
    /// One partition, no filesystem.
    BlankFs,
    /// One partition with an ext2 filesystem mounted on `/`.
    BasicFs,
    /// Partitioned disk with an LVM volume group and logical volumes.
    BasicLvm,
    /// Ext2 filesystem on a logical volume, mounted on `/`.
    BasicFsOnLvm,
    /// Read-only ISO image mounted on `/`.
    IsoFs,
}

impl Fixture {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::BlankFs => "blank-fs",
            Self::BasicFs => "basic-fs",
            Self::BasicLvm => "basic-lvm",
            Self::BasicFsOnLvm => "basic-fs-on-lvm",
            Self::IsoFs => "iso-fs",
        }
    }
}

/// Whether a test applies in a given build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Guard {
    #[default]
    Always,
    /// Run only when the named optional feature is available in the appliance.
    IfAvailable(String),
    Disabled,
}

/// Predicate applied to the value returned by the last step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Predicate {
    IsTrue,
    IsFalse,
    StringEquals(String),
    ListEquals(Vec<String>),
    IntEquals(i64),
    IsEmptyList,
}

/// Expected outcome of a test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// Every step succeeds and the last result satisfies the predicate.
    SucceedsWith(Predicate),
    /// Every step succeeds; the result is not inspected.
    SucceedsRunning,
    /// Every step but the last succeeds; the last one must fail.
    LastStepFails,
}

/// One call made by a test: the action name followed by literal arguments.
///
/// Required arguments are positional. Optional arguments follow as
/// `name:value` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Invocation {
    pub action: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Split the literal arguments into the positional part and the
    /// `name:value` optional part, given the number of required parameters.
    #[must_use]
    pub fn split_args(&self, required: usize) -> (&[String], &[String]) {
        let cut = required.min(self.args.len());
        self.args.split_at(cut)
    }
}

impl TryFrom<Vec<String>> for Invocation {
    type Error = String;

    fn try_from(mut value: Vec<String>) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err("test step must name an action".to_owned());
        }
        let action = value.remove(0);
        Ok(Self {
            action,
            args: value,
        })
    }
}

impl From<Invocation> for Vec<String> {
    fn from(value: Invocation) -> Self {
        let mut out = Vec::with_capacity(value.args.len() + 1);
        out.push(value.action);
        out.extend(value.args);
        out
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.action)?;
        for arg in &self.args {
            write!(f, " {arg:?}")?;
        }
        Ok(())
    }
}

/// A registry-declared test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCase {
    #[serde(default)]
    pub fixture: Fixture,
    #[serde(default)]
    pub guard: Guard,
    pub steps: Vec<Invocation>,
    pub expect: Outcome,
    #[serde(default)]
    pub cleanup: Vec<Invocation>,
}

impl TestCase {
    /// Whether the test is ever run.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self.guard, Guard::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        tests: Vec<TestCase>,
    }

    #[test]
    fn parses_grep_fixture_case() {
        let holder: Holder = toml::from_str(
            r#"
[[tests]]
fixture = "basic-fs"
steps = [
  ["write", "/test-grep", "abc\nabc123\n"],
  ["grep", "abc", "/test-grep"],
]
expect = { succeeds-with = { list-equals = ["abc", "abc123"] } }
"#,
        )
        .expect("parse tests");
        let case = &holder.tests[0];
        assert_eq!(case.fixture, Fixture::BasicFs);
        assert_eq!(case.guard, Guard::Always);
        assert_eq!(case.steps[1].action, "grep");
        assert_eq!(case.steps[1].args, vec!["abc", "/test-grep"]);
        assert_eq!(
            case.expect,
            Outcome::SucceedsWith(Predicate::ListEquals(vec![
                "abc".to_owned(),
                "abc123".to_owned()
            ]))
        );
        assert!(case.is_enabled());
    }

    #[test]
    fn empty_step_is_rejected() {
        let result: Result<Holder, _> = toml::from_str(
            r#"
[[tests]]
steps = [[]]
expect = "succeeds-running"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn split_args_separates_optargs() {
        let step = Invocation {
            action: "grep".to_owned(),
            args: vec![
                "abc".to_owned(),
                "/f".to_owned(),
                "insensitive:true".to_owned(),
            ],
        };
        let (required, optional) = step.split_args(2);
        assert_eq!(required.len(), 2);
        assert_eq!(optional, ["insensitive:true".to_owned()]);
    }
}
