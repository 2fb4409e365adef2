// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

//! Concurrency primitives for the forwarder.

pub mod serialize;

pub use serialize::{Completion, ExecutorError, SerialExecutor, WeakSerialExecutor};
