// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Appliers for vpp interfaces

use api::Connection;
use api::context::{is_global_unicast, parse_cidr};
use config::{DataplaneConfig, VppRoute};
use pipeline::Chain;
use std::collections::BTreeSet;
use tracing::debug;

use crate::apply::{ContextApplier, Side, chain_elements};

fn set_ip_address(config: &mut DataplaneConfig, addr: &str) {
    if addr.is_empty() {
        return;
    }
    if let Some(iface) = config.vpp.last_interface_mut() {
        iface.ip_addresses = vec![addr.to_owned()];
    }
}

fn set_mac(config: &mut DataplaneConfig, mac: &str) {
    if mac.is_empty() {
        return;
    }
    if let Some(iface) = config.vpp.last_interface_mut() {
        iface.phys_address = mac.to_owned();
    }
}

/// Gives the last vpp interface the source (client) address of the connection
pub struct VppIpAddressClient;

impl ContextApplier for VppIpAddressClient {
    const SIDE: Side = Side::Client;

    fn apply(&self, config: &mut DataplaneConfig, conn: &Connection) {
        set_ip_address(config, &conn.context.ip.src_ip_addr);
    }
}

/// Gives the last vpp interface the destination (endpoint) address of the connection
pub struct VppIpAddressServer;

impl ContextApplier for VppIpAddressServer {
    const SIDE: Side = Side::Server;

    fn apply(&self, config: &mut DataplaneConfig, conn: &Connection) {
        set_ip_address(config, &conn.context.ip.dst_ip_addr);
    }
}

pub struct VppMacClient;

impl ContextApplier for VppMacClient {
    const SIDE: Side = Side::Client;

    fn apply(&self, config: &mut DataplaneConfig, conn: &Connection) {
        set_mac(config, &conn.context.ethernet.src_mac);
    }
}

pub struct VppMacServer;

impl ContextApplier for VppMacServer {
    const SIDE: Side = Side::Server;

    fn apply(&self, config: &mut DataplaneConfig, conn: &Connection) {
        set_mac(config, &conn.context.ethernet.dst_mac);
    }
}

/// Routes towards the endpoint, through the first vpp interface.
///
/// Each distinct source route gets a route with the destination address as next hop. The
/// destination network gets one too, unless a source route already covers it or the source
/// network contains the destination address.
pub struct VppRoutesClient;

impl ContextApplier for VppRoutesClient {
    const SIDE: Side = Side::Client;

    fn apply(&self, config: &mut DataplaneConfig, conn: &Connection) {
        let Some(iface) = config.vpp.interfaces.first() else {
            return;
        };
        let (iface, vrf_id) = (iface.name.clone(), iface.vrf);
        let ip = &conn.context.ip;
        let (Some((dst_ip, dst_net)), Some((_, src_net))) =
            (parse_cidr(&ip.dst_ip_addr), parse_cidr(&ip.src_ip_addr))
        else {
            return;
        };

        let mut advertised = BTreeSet::new();
        for route in &ip.src_routes {
            if advertised.insert(route.prefix.as_str()) {
                config.vpp.routes.push(VppRoute {
                    dst_network: route.prefix.clone(),
                    outgoing_interface: iface.clone(),
                    next_hop_addr: dst_ip.to_string(),
                    ..VppRoute::default()
                });
            }
        }
        let dst_net_str = dst_net.to_string();
        if advertised.contains(dst_net_str.as_str()) || src_net.contains(&dst_ip) {
            return;
        }
        if is_global_unicast(dst_ip) {
            debug!("{}: route to {dst_net_str} through {iface}", conn.id);
            config.vpp.routes.push(VppRoute {
                dst_network: dst_net_str,
                outgoing_interface: iface,
                vrf_id,
                ..VppRoute::default()
            });
        }
    }
}

/// Route back to the source network, through the last vpp interface
pub struct VppRoutesServer;

impl ContextApplier for VppRoutesServer {
    const SIDE: Side = Side::Server;

    fn apply(&self, config: &mut DataplaneConfig, conn: &Connection) {
        let Some((src_ip, src_net)) = parse_cidr(&conn.context.ip.src_ip_addr) else {
            return;
        };
        let Some(iface) = config.vpp.last_interface() else {
            return;
        };
        if is_global_unicast(src_ip) {
            let route = VppRoute {
                dst_network: src_net.to_string(),
                outgoing_interface: iface.name.clone(),
                vrf_id: iface.vrf,
                ..VppRoute::default()
            };
            config.vpp.routes.push(route);
        }
    }
}

chain_elements!(
    VppIpAddressClient,
    VppIpAddressServer,
    VppMacClient,
    VppMacServer,
    VppRoutesClient,
    VppRoutesServer,
);

/// All the client side vpp appliers
#[must_use]
pub fn vpp_client() -> Chain {
    Chain::new()
        .add_stage(VppIpAddressClient)
        .add_stage(VppMacClient)
        .add_stage(VppRoutesClient)
}

/// All the server side vpp appliers
#[must_use]
pub fn vpp_server() -> Chain {
    Chain::new()
        .add_stage(VppIpAddressServer)
        .add_stage(VppMacServer)
        .add_stage(VppRoutesServer)
}
