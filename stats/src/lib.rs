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
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

//! Interface statistics of the engine, attached to the connections they belong to

mod metrics;

pub use metrics::MetricsServer;

use tracectl::trace_target;
trace_target!("stats", LevelFilter::INFO, &["stats"]);
