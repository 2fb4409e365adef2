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

//! Elements wiring the interfaces of a connection together: layer 2 cross-connects between the
//! two sides, access lists and bridge domains on the side of the requester.

pub mod acl;
pub mod bridge;
pub mod l2xconnect;

pub use acl::{AclRuleError, AclServer, parse_acl_rules};
pub use bridge::BridgeServer;
pub use l2xconnect::{L2XconnectClient, L2XconnectServer};

use tracectl::trace_target;
trace_target!("xconnect", LevelFilter::INFO, &["xconnect"]);
