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

//! Dataplane engine management.
//!
//! The engine is driven through a [`Configurator`]: configurations built by the chains are pushed
//! to it, removed from it, and its interface counters polled. Chains get their configuration
//! from [`FreshConfig`] and hand it over to the engine through [`Commit`] and [`CommitClient`].

/* Engine interface */
pub mod configurator;

/* In-memory engine */
pub mod memory;

/* Chain elements creating the configuration and committing it */
pub mod commit;
pub mod fresh;

pub use commit::{Commit, CommitClient};
pub use fresh::FreshConfig;
pub use configurator::{Configurator, InterfaceCounters, InterfaceStats, StatsStream};
pub use memory::{EngineCall, MemoryConfigurator};

use tracectl::trace_target;
trace_target!("mgmt", LevelFilter::INFO, &["mgmt"]);
