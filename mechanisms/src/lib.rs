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

//! Mechanism elements: they turn the mechanism selected for a connection into the interfaces
//! realizing it.
//!
//! Client-side elements go in the chain towards the next hop. They add their mechanism to the
//! preferences of the outgoing request, and once the peer has picked one, append the
//! configuration for it. Server-side elements look at the mechanism of the incoming connection
//! and append their configuration before handing the call over.
//!
//! Either way, an element only does something when the selected mechanism is its own.

pub mod directmemif;
pub mod kernel;
pub mod memif;
pub mod srv6;
pub mod switch;
pub mod vxlan;

pub use directmemif::DirectMemif;
pub use kernel::{KernelClient, KernelServer};
pub use memif::{MemifClient, MemifServer};
pub use srv6::{Srv6Client, Srv6Server};
pub use switch::MechanismSwitch;
pub use vxlan::{VxlanClient, VxlanInit, VxlanServer};

use api::Connection;

pub(crate) fn client_name(conn: &Connection) -> String {
    format!("client-{}", conn.id)
}

pub(crate) fn server_name(conn: &Connection) -> String {
    format!("server-{}", conn.id)
}

use tracectl::trace_target;
trace_target!("mechanisms", LevelFilter::INFO, &["mechanisms"]);
