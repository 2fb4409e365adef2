// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Addressing context of a connection, filled in by the endpoint and read by the forwarder

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A route advertised by one side of the connection
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub prefix: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpContext {
    /// Address of the client side, with prefix length, e.g. `10.0.0.1/30`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub src_ip_addr: String,
    /// Address of the endpoint side, with prefix length
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dst_ip_addr: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub src_routes: Vec<Route>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dst_routes: Vec<Route>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EthernetContext {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub src_mac: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dst_mac: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionContext {
    pub ip: IpContext,
    pub ethernet: EthernetContext,
}

/// Strip the prefix length of an address, if it has one
#[must_use]
pub fn strip_prefix_len(addr: &str) -> &str {
    addr.split_once('/').map_or(addr, |(ip, _)| ip)
}

/// Parse an address with its prefix length, e.g. `10.0.0.5/24`, into the address and the
/// network it belongs to (`10.0.0.0/24`)
#[must_use]
pub fn parse_cidr(addr: &str) -> Option<(IpAddr, IpNet)> {
    let net: IpNet = addr.parse().ok()?;
    Some((net.addr(), net.trunc()))
}

/// Tell if `ip` is a global unicast address: neither unspecified, loopback, multicast,
/// link-local nor the IPv4 broadcast address. Private ranges count as global.
#[must_use]
pub fn is_global_unicast(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => {
            !(ip.is_unspecified()
                || ip.is_loopback()
                || ip.is_multicast()
                || ip.is_link_local()
                || ip.is_broadcast())
        }
        IpAddr::V6(ip) => {
            !(ip.is_unspecified()
                || ip.is_loopback()
                || ip.is_multicast()
                || ip.is_unicast_link_local())
        }
    }
}
