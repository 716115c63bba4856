// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Appliance daemon dispatch runtime.
// Author: Lukas Bower
#![forbid(unsafe_code)]

//! Routes decoded calls to native implementations by procedure number.
//!
//! Undecodable or unknown calls are answered with a protocol error; native
//! failures travel back as application errors with their errno intact.

mod context;
mod error;
mod native;
mod progress;
mod server;
mod table;

pub use context::CallContext;
pub use error::DispatchError;
pub use native::{NativeFn, NativeSet};
pub use progress::ProgressPolicy;
pub use server::Dispatcher;
pub use table::{DispatchTable, Entry, Unimplemented};
