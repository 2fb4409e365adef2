// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Appliers for kernel interfaces.
//!
//! They only act for connections using the kernel mechanism, once the kernel mechanism
//! element appended the linux interface of the connection.

use api::{Connection, Mechanism};
use api::context::{is_global_unicast, parse_cidr, strip_prefix_len};
use config::{DataplaneConfig, LinuxArpEntry, LinuxInterface, LinuxRoute, LinuxRouteScope};
use pipeline::Chain;
use std::collections::BTreeSet;
use tracing::debug;

use crate::apply::{ContextApplier, Side, chain_elements};

fn is_kernel(conn: &Connection) -> bool {
    conn.mechanism.as_ref().and_then(Mechanism::kernel).is_some()
}

/// The last linux interface, when the connection is a kernel one
fn kernel_interface<'a>(
    config: &'a mut DataplaneConfig,
    conn: &Connection,
) -> Option<&'a mut LinuxInterface> {
    if is_kernel(conn) {
        config.linux.last_interface_mut()
    } else {
        None
    }
}

fn set_ip_address(config: &mut DataplaneConfig, conn: &Connection, addr: &str) {
    let addr = strip_prefix_len(addr);
    if addr.is_empty() {
        return;
    }
    if let Some(iface) = kernel_interface(config, conn) {
        iface.ip_addresses = vec![addr.to_owned()];
    }
}

fn set_mac(config: &mut DataplaneConfig, conn: &Connection, mac: &str) {
    if mac.is_empty() {
        return;
    }
    if let Some(iface) = kernel_interface(config, conn) {
        iface.phys_address = mac.to_owned();
    }
}

pub struct KernelIpAddressClient;

impl ContextApplier for KernelIpAddressClient {
    const SIDE: Side = Side::Client;

    fn apply(&self, config: &mut DataplaneConfig, conn: &Connection) {
        set_ip_address(config, conn, &conn.context.ip.src_ip_addr);
    }
}

pub struct KernelIpAddressServer;

impl ContextApplier for KernelIpAddressServer {
    const SIDE: Side = Side::Server;

    fn apply(&self, config: &mut DataplaneConfig, conn: &Connection) {
        set_ip_address(config, conn, &conn.context.ip.dst_ip_addr);
    }
}

pub struct KernelMacClient;

impl ContextApplier for KernelMacClient {
    const SIDE: Side = Side::Client;

    fn apply(&self, config: &mut DataplaneConfig, conn: &Connection) {
        set_mac(config, conn, &conn.context.ethernet.src_mac);
    }
}

pub struct KernelMacServer;

impl ContextApplier for KernelMacServer {
    const SIDE: Side = Side::Server;

    fn apply(&self, config: &mut DataplaneConfig, conn: &Connection) {
        set_mac(config, conn, &conn.context.ethernet.dst_mac);
    }
}

/// Link scope route to the source network, on the last linux interface
pub struct KernelRoutesClient;

impl ContextApplier for KernelRoutesClient {
    const SIDE: Side = Side::Client;

    fn apply(&self, config: &mut DataplaneConfig, conn: &Connection) {
        let Some((src_ip, src_net)) = parse_cidr(&conn.context.ip.src_ip_addr) else {
            return;
        };
        if !is_global_unicast(src_ip) {
            return;
        }
        let Some(iface) = kernel_interface(config, conn).map(|iface| iface.name.clone()) else {
            return;
        };
        config.linux.routes.push(LinuxRoute {
            dst_network: src_net.to_string(),
            outgoing_interface: iface,
            scope: LinuxRouteScope::Link,
            gw_addr: String::new(),
        });
    }
}

/// Routes to the networks the client advertises, through the endpoint address
pub struct KernelRoutesServer;

impl ContextApplier for KernelRoutesServer {
    const SIDE: Side = Side::Server;

    fn apply(&self, config: &mut DataplaneConfig, conn: &Connection) {
        if !is_kernel(conn) {
            return;
        }
        let Some(iface) = config.linux.first_interface().map(|iface| iface.name.clone()) else {
            return;
        };
        let gw_addr = strip_prefix_len(&conn.context.ip.dst_ip_addr);
        let mut seen = BTreeSet::new();
        for route in &conn.context.ip.src_routes {
            if seen.insert(route.prefix.as_str()) {
                config.linux.routes.push(LinuxRoute {
                    dst_network: route.prefix.clone(),
                    outgoing_interface: iface.clone(),
                    scope: LinuxRouteScope::Global,
                    gw_addr: gw_addr.to_owned(),
                });
            }
        }
    }
}

/// Static neighbor for the endpoint address, when its mac address is known
pub struct KernelArpServer;

impl ContextApplier for KernelArpServer {
    const SIDE: Side = Side::Server;

    fn apply(&self, config: &mut DataplaneConfig, conn: &Connection) {
        let ethernet = &conn.context.ethernet;
        let ip = strip_prefix_len(&conn.context.ip.dst_ip_addr);
        if ethernet.dst_mac.is_empty() || ip.is_empty() {
            return;
        }
        let Some(iface) = kernel_interface(config, conn).map(|iface| iface.name.clone()) else {
            return;
        };
        debug!("{}: {ip} is at {} on {iface}", conn.id, ethernet.dst_mac);
        config.linux.arp_entries.push(LinuxArpEntry {
            interface: iface,
            ip_address: ip.to_owned(),
            hw_address: ethernet.dst_mac.clone(),
        });
    }
}

chain_elements!(
    KernelIpAddressClient,
    KernelIpAddressServer,
    KernelMacClient,
    KernelMacServer,
    KernelRoutesClient,
    KernelRoutesServer,
    KernelArpServer,
);

#[must_use]
pub fn kernel_client() -> Chain {
    Chain::new()
        .add_stage(KernelIpAddressClient)
        .add_stage(KernelMacClient)
        .add_stage(KernelRoutesClient)
}

#[must_use]
pub fn kernel_server() -> Chain {
    Chain::new()
        .add_stage(KernelIpAddressServer)
        .add_stage(KernelMacServer)
        .add_stage(KernelRoutesServer)
}

#[cfg(test)]
mod test {
    use api::{Connection, Mechanism, MechanismClass, MechanismType, NetworkServiceRequest, Route};
    use async_trait::async_trait;
    use config::{
        DataplaneConfig, LinuxArpEntry, LinuxInterface, LinuxLink, LinuxRoute, LinuxRouteScope,
    };
    use pipeline::sample_elements::SelectMechanism;
    use pipeline::{CallScope, Chain, ChainElement, ChainError, Next};
    use pretty_assertions::assert_eq;

    use super::{KernelArpServer, kernel_client, kernel_server};

    /// Appends a linux interface before delegating, as the kernel mechanism does
    struct AppendLinuxInterface(&'static str);

    impl AppendLinuxInterface {
        fn append(&self, scope: &mut CallScope) {
            if let Some(config) = scope.config_mut() {
                config.linux.interfaces.push(LinuxInterface::new(
                    self.0,
                    self.0,
                    None,
                    LinuxLink::TapToVpp {
                        vpp_tap_if_name: format!("vpp-{}", self.0),
                    },
                ));
            }
        }
    }

    #[async_trait]
    impl ChainElement for AppendLinuxInterface {
        async fn request(
            &self,
            scope: &mut CallScope,
            request: NetworkServiceRequest,
            next: Next<'_>,
        ) -> Result<Connection, ChainError> {
            self.append(scope);
            next.request(scope, request).await
        }

        async fn close(
            &self,
            scope: &mut CallScope,
            conn: &Connection,
            next: Next<'_>,
        ) -> Result<(), ChainError> {
            self.append(scope);
            next.close(scope, conn).await
        }
    }

    fn kernel() -> Mechanism {
        Mechanism::new(MechanismClass::Local, MechanismType::Kernel)
    }

    fn kernel_conn(src: &str, dst: &str) -> Connection {
        let mut conn = Connection::new("c1", "ns");
        conn.mechanism = Some(kernel());
        conn.context.ip.src_ip_addr = src.to_owned();
        conn.context.ip.dst_ip_addr = dst.to_owned();
        conn
    }

    async fn request(chain: &Chain, conn: Connection) -> DataplaneConfig {
        let mut scope = CallScope::new();
        scope.ensure_config();
        chain
            .run_request(&mut scope, NetworkServiceRequest::new(conn))
            .await
            .unwrap();
        scope.take_config().unwrap()
    }

    #[tokio::test]
    async fn server_address_without_prefix_length() {
        let chain = Chain::new()
            .add_stage(AppendLinuxInterface("nsm0"))
            .add_stage(kernel_server());
        let config = request(&chain, kernel_conn("10.0.0.1/24", "10.0.0.5/24")).await;
        assert_eq!(config.linux.interfaces.len(), 1);
        assert_eq!(config.linux.interfaces[0].ip_addresses, vec!["10.0.0.5".to_owned()]);
        // the source network covers the destination address
        assert!(config.linux.routes.is_empty());
    }

    #[tokio::test]
    async fn server_routes_advertised_networks_once() {
        let chain = Chain::new()
            .add_stage(AppendLinuxInterface("nsm0"))
            .add_stage(AppendLinuxInterface("nsm1"))
            .add_stage(kernel_server());
        let mut conn = kernel_conn("10.0.0.1/30", "10.0.0.2/30");
        conn.context.ethernet.dst_mac = "02:00:00:00:00:02".to_owned();
        conn.context.ip.src_routes = ["10.1.0.0/16", "10.1.0.0/16", "10.2.0.0/16"]
            .into_iter()
            .map(|prefix| Route {
                prefix: prefix.to_owned(),
            })
            .collect();
        let config = request(&chain, conn).await;

        let [nsm0, nsm1] = config.linux.interfaces.as_slice() else {
            panic!("unexpected interfaces {:?}", config.linux.interfaces);
        };
        assert!(nsm0.ip_addresses.is_empty());
        assert_eq!(nsm1.ip_addresses, vec!["10.0.0.2".to_owned()]);
        assert_eq!(nsm1.phys_address, "02:00:00:00:00:02");
        let route = |dst: &str| LinuxRoute {
            dst_network: dst.to_owned(),
            outgoing_interface: "nsm0".to_owned(),
            scope: LinuxRouteScope::Global,
            gw_addr: "10.0.0.2".to_owned(),
        };
        assert_eq!(config.linux.routes, vec![route("10.1.0.0/16"), route("10.2.0.0/16")]);
    }

    #[tokio::test]
    async fn client_applies_once_the_peer_answered() {
        let chain = Chain::new()
            .add_stage(kernel_client())
            .add_stage(AppendLinuxInterface("nsm0"));
        let mut conn = kernel_conn("10.0.0.1/30", "10.0.0.2/30");
        conn.context.ethernet.src_mac = "02:00:00:00:00:01".to_owned();
        let config = request(&chain, conn).await;

        let iface = &config.linux.interfaces[0];
        assert_eq!(iface.ip_addresses, vec!["10.0.0.1".to_owned()]);
        assert_eq!(iface.phys_address, "02:00:00:00:00:01");
        assert_eq!(
            config.linux.routes,
            vec![LinuxRoute {
                dst_network: "10.0.0.0/30".to_owned(),
                outgoing_interface: "nsm0".to_owned(),
                scope: LinuxRouteScope::Link,
                gw_addr: String::new(),
            }]
        );
    }

    #[tokio::test]
    async fn other_mechanisms_are_left_alone() {
        let chain = Chain::new()
            .add_stage(AppendLinuxInterface("nsm0"))
            .add_stage(kernel_server())
            .add_stage(KernelArpServer)
            .add_stage(kernel_client());
        let mut conn = kernel_conn("10.0.0.1/30", "10.0.0.2/30");
        conn.mechanism = Some(Mechanism::new(MechanismClass::Local, MechanismType::Memif));
        conn.context.ethernet.dst_mac = "02:00:00:00:00:02".to_owned();
        let config = request(&chain, conn).await;
        assert!(config.linux.interfaces[0].ip_addresses.is_empty());
        assert!(config.linux.interfaces[0].phys_address.is_empty());
        assert!(config.linux.routes.is_empty());
        assert!(config.linux.arp_entries.is_empty());

        // no interface to apply to
        let config = request(&kernel_server(), kernel_conn("10.0.0.1/30", "10.0.0.2/30")).await;
        assert_eq!(config, DataplaneConfig::default());
    }

    #[tokio::test]
    async fn arp_entry_needs_mac_and_address() {
        let chain = Chain::new()
            .add_stage(AppendLinuxInterface("nsm0"))
            .add_stage(KernelArpServer);
        let config = request(&chain, kernel_conn("10.0.0.1/30", "10.0.0.2/30")).await;
        assert!(config.linux.arp_entries.is_empty());

        let mut conn = kernel_conn("10.0.0.1/30", "10.0.0.2/30");
        conn.context.ethernet.dst_mac = "02:00:00:00:00:02".to_owned();
        let config = request(&chain, conn.clone()).await;
        assert_eq!(
            config.linux.arp_entries,
            vec![LinuxArpEntry {
                interface: "nsm0".to_owned(),
                ip_address: "10.0.0.2".to_owned(),
                hw_address: "02:00:00:00:00:02".to_owned(),
            }]
        );

        conn.context.ip.dst_ip_addr = String::new();
        let config = request(&chain, conn).await;
        assert!(config.linux.arp_entries.is_empty());
    }

    #[tokio::test]
    async fn selected_mechanism_counts() {
        // the request carries no mechanism until the endpoint picks one
        let chain = Chain::new()
            .add_stage(kernel_client())
            .add_stage(SelectMechanism(kernel()))
            .add_stage(AppendLinuxInterface("nsm0"));
        let mut conn = kernel_conn("10.0.0.1/30", "10.0.0.2/30");
        conn.mechanism = None;
        let config = request(&chain, conn).await;
        assert_eq!(config.linux.interfaces[0].ip_addresses, vec!["10.0.0.1".to_owned()]);
    }
}
