// SPDX-License-Identifier: MIT

pub mod pricing;
pub mod withdrawal;
