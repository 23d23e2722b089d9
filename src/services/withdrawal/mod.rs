// SPDX-License-Identifier: MIT

pub mod dispatch;
pub mod executor;
