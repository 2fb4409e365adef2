// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Network service connection model: the descriptor travelling along the chains, its
//! mechanisms and its addressing context.

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

pub mod connection;
pub mod context;
pub mod mechanism;
pub mod url;

pub use connection::{Connection, NetworkServiceRequest, Path, PathSegment}; // re-export
pub use context::{ConnectionContext, EthernetContext, IpContext, Route}; // re-export
pub use mechanism::{
    KernelMechanism, MemifMechanism, Mechanism, MechanismClass, MechanismError, MechanismType,
    Srv6Mechanism, VxlanMechanism,
}; // re-export
pub use url::{FileUrl, UrlError}; // re-export

/// Max length of a kernel interface name (IFNAMSIZ - 1)
pub const LINUX_IF_MAX_LENGTH: usize = 15;

/// Truncate `name` to what the kernel accepts as an interface name
#[must_use]
pub fn linux_ifname(name: &str) -> String {
    truncate(name, LINUX_IF_MAX_LENGTH).to_owned()
}

// truncate to at most `max` bytes, on a char boundary
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
