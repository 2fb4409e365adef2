// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Kernel interface mechanism.
//!
//! The interface handed to the client is either the kernel end of a vpp tap, when the host can
//! do tap (it has a vhost-net device), or one end of a veth pair whose other end vpp attaches
//! to as an af-packet interface.

mod tap;
mod veth;

pub use tap::{KernelTapClient, KernelTapServer};
pub use veth::{KernelVethClient, KernelVethServer};

use api::{Connection, KernelMechanism, NetworkServiceRequest};
use async_trait::async_trait;
use config::NetNamespace;
use pipeline::{CallScope, ChainElement, ChainError, Next};
use std::path::Path;
use tracing::debug;

/// Device whose presence tells tap interfaces can be used
pub const VHOST_NET: &str = "/dev/vhost-net";

fn namespace(kernel: &KernelMechanism<'_>) -> Result<NetNamespace, ChainError> {
    let url = kernel.netns_url()?;
    Ok(NetNamespace {
        path: url.path().to_owned(),
    })
}

fn has_vhost_net(vhost_net: &Path) -> bool {
    let exists = vhost_net.exists();
    debug!(
        "{} {}: using {} interfaces",
        vhost_net.display(),
        if exists { "exists" } else { "is missing" },
        if exists { "tap" } else { "veth pair" }
    );
    exists
}

/// Client side kernel mechanism, tap or veth pair depending on the host
pub enum KernelClient {
    Tap(KernelTapClient),
    Veth(KernelVethClient),
}

impl KernelClient {
    /// Pick the flavor from the presence of the vhost-net device at `vhost_net`
    #[must_use]
    pub fn new(vhost_net: impl AsRef<Path>) -> Self {
        if has_vhost_net(vhost_net.as_ref()) {
            KernelClient::Tap(KernelTapClient)
        } else {
            KernelClient::Veth(KernelVethClient)
        }
    }
}

impl Default for KernelClient {
    fn default() -> Self {
        Self::new(VHOST_NET)
    }
}

#[async_trait]
impl ChainElement for KernelClient {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        match self {
            KernelClient::Tap(tap) => tap.request(scope, request, next).await,
            KernelClient::Veth(veth) => veth.request(scope, request, next).await,
        }
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        match self {
            KernelClient::Tap(tap) => tap.close(scope, conn, next).await,
            KernelClient::Veth(veth) => veth.close(scope, conn, next).await,
        }
    }
}

/// Server side kernel mechanism, tap or veth pair depending on the host
pub enum KernelServer {
    Tap(KernelTapServer),
    Veth(KernelVethServer),
}

impl KernelServer {
    /// Pick the flavor from the presence of the vhost-net device at `vhost_net`
    #[must_use]
    pub fn new(vhost_net: impl AsRef<Path>) -> Self {
        if has_vhost_net(vhost_net.as_ref()) {
            KernelServer::Tap(KernelTapServer)
        } else {
            KernelServer::Veth(KernelVethServer)
        }
    }
}

impl Default for KernelServer {
    fn default() -> Self {
        Self::new(VHOST_NET)
    }
}

#[async_trait]
impl ChainElement for KernelServer {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        match self {
            KernelServer::Tap(tap) => tap.request(scope, request, next).await,
            KernelServer::Veth(veth) => veth.request(scope, request, next).await,
        }
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        match self {
            KernelServer::Tap(tap) => tap.close(scope, conn, next).await,
            KernelServer::Veth(veth) => veth.close(scope, conn, next).await,
        }
    }
}
