// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Registry of native action implementations keyed by action name.
// Author: Lukas Bower

use std::collections::BTreeMap;
use std::fmt;

use appliance_wire::{ApplicationError, Value};

use crate::context::CallContext;

/// A native implementation: decoded arguments in, reply value or
/// application failure out.
pub type NativeFn =
    Box<dyn Fn(&mut CallContext<'_>) -> Result<Value, ApplicationError> + Send + Sync>;

/// Native implementations supplied by the daemon.
#[derive(Default)]
pub struct NativeSet {
    natives: BTreeMap<String, NativeFn>,
}

impl NativeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the implementation of `action`, replacing any earlier one.
    pub fn register<F>(&mut self, action: impl Into<String>, native: F)
    where
        F: Fn(&mut CallContext<'_>) -> Result<Value, ApplicationError> + Send + Sync + 'static,
    {
        self.natives.insert(action.into(), Box::new(native));
    }

    /// Builder form of [`NativeSet::register`].
    #[must_use]
    pub fn with<F>(mut self, action: impl Into<String>, native: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<Value, ApplicationError> + Send + Sync + 'static,
    {
        self.register(action, native);
        self
    }

    #[must_use]
    pub fn contains(&self, action: &str) -> bool {
        self.natives.contains_key(action)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.natives.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.natives.is_empty()
    }

    pub(crate) fn take(&mut self, action: &str) -> Option<NativeFn> {
        self.natives.remove(action)
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.natives.keys().map(String::as_str)
    }
}

impl fmt::Debug for NativeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.natives.keys()).finish()
    }
}
