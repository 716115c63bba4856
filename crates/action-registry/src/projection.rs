// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Pure projection predicates that select registry subsets for emitters.
// Author: Lukas Bower

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::registry::Registry;
use crate::types::Visibility;

/// Eligible for the interactive shell command table.
///
/// Opaque handles have no safe textual notation, so any action taking one
/// is excluded regardless of visibility.
#[must_use]
pub fn is_interactive(action: &Action) -> bool {
    let visible = match action.visibility {
        Visibility::Public | Visibility::Debug => true,
        Visibility::PublicNoInteractive
        | Visibility::StateTest
        | Visibility::BindTest
        | Visibility::Internal => false,
    };
    visible && !action.has_opaque_handle()
}

/// Listed in generated documentation.
#[must_use]
pub fn is_documented(action: &Action) -> bool {
    match action.visibility {
        Visibility::Public | Visibility::PublicNoInteractive | Visibility::StateTest => true,
        Visibility::BindTest | Visibility::Debug | Visibility::Internal => false,
    }
}

/// Exported from the library at all.
#[must_use]
pub fn is_external(action: &Action) -> bool {
    !matches!(action.visibility, Visibility::Internal)
}

/// Has at least one test case that is not disabled.
#[must_use]
pub fn is_tested(action: &Action) -> bool {
    action.tests.iter().any(|case| case.is_enabled())
}

/// Named filter over the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Projection {
    All,
    External,
    Documented,
    Interactive,
    Tested,
}

impl Projection {
    #[must_use]
    pub fn includes(&self, action: &Action) -> bool {
        match self {
            Self::All => true,
            Self::External => is_external(action),
            Self::Documented => is_documented(action),
            Self::Interactive => is_interactive(action),
            Self::Tested => is_tested(action),
        }
    }

    /// Actions in the projection, in registry (name) order.
    pub fn select<'r>(&self, registry: &'r Registry) -> impl Iterator<Item = &'r Action> + 'r {
        let projection = *self;
        registry
            .actions()
            .iter()
            .filter(move |action| projection.includes(action))
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::External => "external",
            Self::Documented => "documented",
            Self::Interactive => "interactive",
            Self::Tested => "tested",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::RawAction;
    use crate::derive::{derive_names, Naming};
    use crate::types::{ActionKind, Param, ParamType};

    fn action(visibility: Visibility, params: Vec<Param>) -> Action {
        let mut raw = RawAction::new("get_hv", ActionKind::NonDaemon);
        raw.visibility = visibility;
        raw.params = params;
        let derived = derive_names(&raw, &Naming::default());
        Action::from_raw(raw, "test", derived)
    }

    #[test]
    fn interactive_excludes_hidden_visibilities() {
        assert!(is_interactive(&action(Visibility::Public, Vec::new())));
        assert!(is_interactive(&action(Visibility::Debug, Vec::new())));
        for hidden in [
            Visibility::PublicNoInteractive,
            Visibility::StateTest,
            Visibility::BindTest,
            Visibility::Internal,
        ] {
            assert!(!is_interactive(&action(hidden, Vec::new())), "{hidden:?}");
        }
    }

    #[test]
    fn interactive_excludes_opaque_handles() {
        let params = vec![Param {
            name: "dom".to_owned(),
            kind: ParamType::OpaqueHandle("virDomainPtr".to_owned()),
        }];
        assert!(!is_interactive(&action(Visibility::Public, params)));
    }

    #[test]
    fn documented_and_external_sets() {
        assert!(is_documented(&action(Visibility::StateTest, Vec::new())));
        assert!(!is_documented(&action(Visibility::Debug, Vec::new())));
        assert!(is_external(&action(Visibility::BindTest, Vec::new())));
        assert!(!is_external(&action(Visibility::Internal, Vec::new())));
    }
}
