// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Errors raised while assembling or running the dispatch table.
// Author: Lukas Bower

use appliance_wire::WireError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("daemon action {action} (proc {proc_nr}) has no native implementation")]
    MissingNative { action: String, proc_nr: u32 },
    #[error("native implementation {0} does not match any daemon action")]
    UnknownNative(String),
    #[error("daemon action {0} has no compiled layout")]
    MissingLayout(String),
    #[error(transparent)]
    Wire(#[from] WireError),
}
