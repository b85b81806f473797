// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node model families built on the core framework.

pub mod calculator;
