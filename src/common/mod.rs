// SPDX-License-Identifier: MIT

pub mod retry;
pub mod units;

// Shared aliases for frequently used modules.
pub use crate::domain::constants;
pub use crate::domain::error;
