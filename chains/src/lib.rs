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

//! Assembled chains. A forwarder serves the [`xconnect_ns`] chain: it sets up the server side of
//! an incoming connection, connects it to the next hop through a [`PeerClient`] and commits the
//! resulting engine configuration.

mod connect;
mod path;
mod peer;
mod xconnectns;

pub use connect::Connect;
pub use path::UpdatePath;
pub use peer::{LoopbackPeer, PeerClient, ToPeer};
pub use xconnectns::{
    CONNECT_STAGE, XconnectError, XconnectParams, XconnectParamsBuilder,
    XconnectParamsBuilderError, xconnect_ns,
};

use tracectl::trace_target;
trace_target!("chains", LevelFilter::INFO, &["chains"]);
