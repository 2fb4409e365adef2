// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Declarative model of the configuration pushed to the dataplane engine.
//!
//! A [`DataplaneConfig`] is built from scratch for every Request or Close call: chain elements
//! append interfaces, routes and the like to its lists as the call travels down the chain, and
//! the last element commits it. Since later elements find "the interface just added" by its
//! position, the lists are only ever appended to during a call. The one exception is patching
//! fields of the last entry (addresses, MACs).

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

pub mod dataplane;
pub mod display;
pub mod errors;
pub mod linux;
pub mod netalloc;
pub mod vpp;

pub use dataplane::DataplaneConfig; // re-export
pub use errors::{ConfigError, ConfigResult}; // re-export
pub use linux::{
    LinuxArpEntry, LinuxConfig, LinuxInterface, LinuxLink, LinuxRoute, LinuxRouteScope,
    NetNamespace,
}; // re-export
pub use netalloc::{IpAllocation, NetallocConfig}; // re-export
pub use vpp::{
    Acl, AclAction, AclInterfaces, AclRule, BridgeDomain, BridgeDomainInterface, IcmpMatch,
    IpMatch, IpProtocol, LocalSid, LocalSidFunction, PortMatch, PortRange, Srv6Policy,
    Srv6SegmentList, Srv6Steering, Srv6Traffic, VppArpEntry, VppConfig, VppInterface, VppLink,
    VppRoute, VppRouteKind, VrfTable, XConnectPair,
}; // re-export

use tracectl::trace_target;
trace_target!("config", LevelFilter::INFO, &["config"]);
