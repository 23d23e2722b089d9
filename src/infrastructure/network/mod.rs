// SPDX-License-Identifier: MIT

pub mod gas;
pub mod gateway;
pub mod provider;

#[cfg(test)]
pub(crate) mod mock;
