// SPDX-License-Identifier: MIT

pub mod accounting;
