// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use api::{
    Connection, Mechanism, MechanismClass, MechanismType, NetworkServiceRequest, linux_ifname,
};
use async_trait::async_trait;
use config::{DataplaneConfig, LinuxInterface, LinuxLink, VppInterface, VppLink};
use pipeline::{CallScope, ChainElement, ChainError, Next};
use tracing::debug;

use super::namespace;
use crate::{client_name, server_name};

fn veth(peer: &str) -> LinuxLink {
    LinuxLink::Veth {
        peer_if_name: peer.to_owned(),
        rx_checksum_offloading: false,
        tx_checksum_offloading: false,
    }
}

/// Append a veth pair and the af-packet interface vpp plugs into its host end. The other end,
/// named `name`, goes into the namespace of the kernel mechanism of `conn`.
fn append_veth_pair(
    config: &mut DataplaneConfig,
    conn: &Connection,
    name: &str,
) -> Result<(), ChainError> {
    let Some(kernel) = conn.mechanism.as_ref().and_then(Mechanism::kernel) else {
        return Ok(());
    };
    let namespace = namespace(&kernel)?;
    let host_end = format!("{name}-veth");
    let host_if_name = linux_ifname(name);
    debug!("{}: veth pair {host_end}/{name} into {}", conn.id, namespace.path);
    config.linux.interfaces.push(LinuxInterface::new(
        host_end.clone(),
        host_if_name.clone(),
        None,
        veth(name),
    ));
    config.linux.interfaces.push(LinuxInterface::new(
        name,
        kernel.interface_name(conn),
        Some(namespace),
        veth(&host_end),
    ));
    config
        .vpp
        .interfaces
        .push(VppInterface::new(name, VppLink::AfPacket { host_if_name }));
    Ok(())
}

/// Requests a kernel interface from the next hop and provides it with a veth pair
pub struct KernelVethClient;

#[async_trait]
impl ChainElement for KernelVethClient {
    async fn request(
        &self,
        scope: &mut CallScope,
        mut request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        request
            .mechanism_preferences
            .push(Mechanism::new(MechanismClass::Local, MechanismType::Kernel));
        let conn = next.request(scope, request).await?;
        if let Some(config) = scope.config_mut() {
            append_veth_pair(config, &conn, &client_name(&conn))?;
        }
        Ok(conn)
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        next.close(scope, conn).await?;
        if let Some(config) = scope.config_mut() {
            append_veth_pair(config, conn, &client_name(conn))?;
        }
        Ok(())
    }
}

/// Provides the kernel interface asked for by the requester with a veth pair
pub struct KernelVethServer;

#[async_trait]
impl ChainElement for KernelVethServer {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        if let Some(config) = scope.config_mut() {
            let conn = &request.connection;
            append_veth_pair(config, conn, &server_name(conn))?;
        }
        next.request(scope, request).await
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        if let Some(config) = scope.config_mut() {
            append_veth_pair(config, conn, &server_name(conn))?;
        }
        next.close(scope, conn).await
    }
}
