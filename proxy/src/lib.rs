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

//! Proxy between two unix domain socket endpoints.
//!
//! A [`Proxy`] listens on a source socket path. Once a peer connects there, it connects to the
//! target path and relays messages both ways until either side goes away or the proxy is
//! stopped. Messages are moved together with the file descriptors they carry (`SCM_RIGHTS`),
//! which is what memif needs to hand over its shared memory regions and event fds.
//!
//! A proxy serves a single connection per start. Restarting it binds the source path again.

mod errors;
mod kind;
mod proxy;
mod socket;

pub use errors::ProxyError;
pub use kind::SocketKind;
pub use proxy::{Proxy, ProxyId, RX_BYTES, StopListener, StopListenerFn, TX_BYTES};

use tracectl::trace_target;
trace_target!("memif-proxy", LevelFilter::INFO, &["proxy"]);
