// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The cross-connecting network service: the chain a forwarder serves requests with

use api::MechanismType;
use concurrency::ExecutorError;
use config::AclRule;
use connctx::{kernel_client, kernel_server};
use derive_builder::Builder;
use mechanisms::kernel::VHOST_NET;
use mechanisms::{
    DirectMemif, KernelClient, KernelServer, MechanismSwitch, MemifClient, MemifServer,
    Srv6Client, Srv6Server, VxlanClient, VxlanInit, VxlanServer,
};
use mgmt::{Commit, Configurator, FreshConfig};
use pipeline::{Chain, PipelineError, StageId};
use proxy::SocketKind;
use stats::MetricsServer;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use xconnect::{AclServer, BridgeServer, L2XconnectClient};

use crate::connect::Connect;
use crate::path::UpdatePath;
use crate::peer::PeerClient;

/// Id of the [`Connect`] stage of the chain built by [`xconnect_ns`]
pub const CONNECT_STAGE: StageId =
    StageId::from_u128(0x6e73_6d2d_6677_642d_636f_6e6e_6563_7400);

#[derive(Debug, Error)]
pub enum XconnectError {
    #[error("Failed to start the direct memif registry: {0}")]
    Executor(#[from] ExecutorError),
    #[error(transparent)]
    Stage(#[from] PipelineError),
}

/// What the cross-connect chain is made of
#[derive(Builder, Clone)]
pub struct XconnectParams {
    /// Name of the forwarder on connection paths
    #[builder(setter(into), default = "\"forwarder\".to_string()")]
    pub name: String,

    /// Where the memif sockets served to requesters go
    #[builder(setter(into))]
    pub base_dir: PathBuf,

    /// Local end of vxlan tunnels
    pub tunnel_ip: IpAddr,

    #[builder(setter(strip_option), default)]
    pub vxlan_init: Option<VxlanInit>,

    /// Device telling whether kernel interfaces can be taps
    #[builder(setter(into), default = "PathBuf::from(VHOST_NET)")]
    pub vhost_net: PathBuf,

    /// Sockets of the direct memif proxies
    #[builder(default)]
    pub direct_memif_kind: SocketKind,

    /// Ingress access list on the interface of the requester
    #[builder(setter(strip_option), default)]
    pub acl_rules: Option<Vec<AclRule>>,

    /// Bridge domain to put the interface of the requester in
    #[builder(setter(into, strip_option), default)]
    pub bridge: Option<String>,

    /// Attach interface counters to the path of the connections
    #[builder(default = "true")]
    pub metrics: bool,

    pub engine: Arc<dyn Configurator>,

    pub peer: Arc<dyn PeerClient>,
}

/// Build the cross-connect chain.
///
/// A request goes through the server side of its mechanism, then gets connected to the next
/// hop with the client side of whatever mechanism the peer selects. The resulting
/// configuration is committed to the engine last, once every element had a chance to add to it
/// or, for direct memif, to take out of it.
///
/// The [`Connect`] stage can be fetched back with [`CONNECT_STAGE`].
pub fn xconnect_ns(params: XconnectParams) -> Result<Chain, XconnectError> {
    let XconnectParams {
        name,
        base_dir,
        tunnel_ip,
        vxlan_init,
        vhost_net,
        direct_memif_kind,
        acl_rules,
        bridge,
        metrics,
        engine,
        peer,
    } = params;

    let servers = MechanismSwitch::new()
        .with(MechanismType::Memif, MemifServer::new(&base_dir))
        .with(MechanismType::Kernel, KernelServer::new(&vhost_net))
        .with(
            MechanismType::Vxlan,
            VxlanServer::new(tunnel_ip, vxlan_init.clone()),
        )
        .with(MechanismType::Srv6, Srv6Server);

    // preference order of the outgoing mechanisms
    let client = Chain::new()
        .add_stage(L2XconnectClient)
        .add_stage(kernel_client())
        .add_stage(MemifClient)
        .add_stage(KernelClient::new(&vhost_net))
        .add_stage(VxlanClient::new(tunnel_ip, vxlan_init))
        .add_stage(Srv6Client);

    let mut chain = Chain::new()
        .add_stage(UpdatePath::new(&name))
        .add_stage(FreshConfig)
        .add_stage(servers);
    chain.add_stage_with_id(CONNECT_STAGE, Connect::new(client, peer))?;
    let mut chain = chain
        .add_stage(kernel_server())
        .add_stage(DirectMemif::new(direct_memif_kind)?);
    if let Some(rules) = acl_rules {
        chain = chain.add_stage(AclServer::new(rules));
    }
    if let Some(bridge) = bridge {
        chain = chain.add_stage(BridgeServer::new(bridge));
    }
    if metrics {
        chain = chain.add_stage(MetricsServer::new(engine.clone()));
    }
    let chain = chain.add_stage(Commit::new(engine));
    info!("{name}: cross-connect chain of {} elements", chain.len());
    Ok(chain)
}
