// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Vxlan tunnel mechanism, for connections between nodes.
//!
//! The addresses of the mechanism are those of the client side of the connection: the client
//! element uses them as they are, the server element swaps them.

use api::{
    Connection, Mechanism, MechanismClass, MechanismType, NetworkServiceRequest, VxlanMechanism,
};
use async_trait::async_trait;
use config::{DataplaneConfig, VppInterface, VppLink};
use pipeline::{CallScope, ChainElement, ChainError, Next};
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Initial configuration of the engine for tunnels, applied to the first configuration an
/// element sees
pub type VxlanInit = Arc<dyn Fn(&mut DataplaneConfig) -> Result<(), ChainError> + Send + Sync>;

#[derive(Default)]
struct InitOnce {
    hook: Option<VxlanInit>,
    done: AtomicBool,
}

impl InitOnce {
    fn new(hook: Option<VxlanInit>) -> Self {
        Self {
            hook,
            done: AtomicBool::new(false),
        }
    }

    fn run(&self, config: &mut DataplaneConfig) -> Result<(), ChainError> {
        let Some(hook) = &self.hook else {
            return Ok(());
        };
        if self.done.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("Applying initial vxlan configuration");
        // failed attempts are retried with the next config
        hook(config).inspect_err(|_| self.done.store(false, Ordering::Release))
    }
}

fn append_tunnel(
    config: &mut DataplaneConfig,
    conn: &Connection,
    swap: bool,
) -> Result<(), ChainError> {
    let Some(vxlan) = conn.mechanism.as_ref().and_then(Mechanism::vxlan) else {
        return Ok(());
    };
    let (mut src, mut dst) = (vxlan.src_ip()?, vxlan.dst_ip()?);
    let vni = vxlan.vni()?;
    if swap {
        std::mem::swap(&mut src, &mut dst);
    }
    debug!("{}: vxlan {src} -> {dst}, vni {vni}", conn.id);
    config.vpp.interfaces.push(VppInterface::new(
        conn.id.clone(),
        VppLink::Vxlan {
            src_address: src.to_string(),
            dst_address: dst.to_string(),
            vni,
        },
    ));
    Ok(())
}

/// Requests a vxlan tunnel from the next hop, originating from `tunnel_ip`
pub struct VxlanClient {
    tunnel_ip: IpAddr,
    init: InitOnce,
}

impl VxlanClient {
    #[must_use]
    pub fn new(tunnel_ip: IpAddr, init: Option<VxlanInit>) -> Self {
        Self {
            tunnel_ip,
            init: InitOnce::new(init),
        }
    }
}

#[async_trait]
impl ChainElement for VxlanClient {
    async fn request(
        &self,
        scope: &mut CallScope,
        mut request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        if let Some(config) = scope.config_mut() {
            self.init.run(config)?;
        }
        request.mechanism_preferences.push(
            Mechanism::new(MechanismClass::Remote, MechanismType::Vxlan)
                .with_parameter(VxlanMechanism::SRC_IP, self.tunnel_ip.to_string()),
        );
        let conn = next.request(scope, request).await?;
        if let Some(config) = scope.config_mut() {
            append_tunnel(config, &conn, false)?;
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
            append_tunnel(config, conn, false)?;
        }
        Ok(())
    }
}

/// Terminates the vxlan tunnel asked for by the requester on `tunnel_ip`
pub struct VxlanServer {
    tunnel_ip: IpAddr,
    init: InitOnce,
}

impl VxlanServer {
    #[must_use]
    pub fn new(tunnel_ip: IpAddr, init: Option<VxlanInit>) -> Self {
        Self {
            tunnel_ip,
            init: InitOnce::new(init),
        }
    }
}

#[async_trait]
impl ChainElement for VxlanServer {
    async fn request(
        &self,
        scope: &mut CallScope,
        mut request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        if let Some(mechanism) = request.connection.mechanism.as_mut()
            && mechanism.kind == MechanismType::Vxlan
            && mechanism
                .parameter(VxlanMechanism::DST_IP)
                .is_none_or(str::is_empty)
        {
            mechanism.set_parameter(VxlanMechanism::DST_IP, self.tunnel_ip.to_string());
        }
        if let Some(config) = scope.config_mut() {
            self.init.run(config)?;
            append_tunnel(config, &request.connection, true)?;
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
            append_tunnel(config, conn, true)?;
        }
        next.close(scope, conn).await
    }
}
