// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Emit the data file carrying the highest assigned procedure number.
// Author: Lukas Bower

use action_registry::Registry;

/// Just the number and a newline, so shell and build scripts can read it.
pub fn render_max_proc_nr(registry: &Registry) -> String {
    format!("{}\n", registry.max_proc_nr())
}
