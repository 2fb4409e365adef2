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

//! Connection context appliers: elements copying the addressing of a connection (ip and mac
//! addresses, routes, neighbors) onto the interfaces the mechanism elements appended.
//!
//! Appliers always work on the last interface appended, so they go right after the mechanism
//! elements they complete. Client appliers act once the peer has answered, server ones before
//! handing the call over. Addresses that are missing or do not parse are skipped, never
//! reported.

mod apply;
mod getmac;
mod kernel;
mod vpp;

pub use apply::{ContextApplier, Side};
pub use getmac::GetMacServer;
pub use kernel::{
    KernelArpServer, KernelIpAddressClient, KernelIpAddressServer, KernelMacClient,
    KernelMacServer, KernelRoutesClient, KernelRoutesServer, kernel_client, kernel_server,
};
pub use vpp::{
    VppIpAddressClient, VppIpAddressServer, VppMacClient, VppMacServer, VppRoutesClient,
    VppRoutesServer, vpp_client, vpp_server,
};

use tracectl::trace_target;
trace_target!("connctx", LevelFilter::INFO, &["connctx"]);
