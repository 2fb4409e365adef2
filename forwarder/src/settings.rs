// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Settings of a forwarder, from a yaml file

use api::{ConnectionContext, Mechanism, NetworkServiceRequest};
use chains::{LoopbackPeer, XconnectParams, XconnectParamsBuilder, XconnectParamsBuilderError};
use mgmt::Configurator;
use proxy::{ProxyError, SocketKind};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use xconnect::{AclRuleError, parse_acl_rules};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read {}: {}", .0.display(), .1)]
    Read(PathBuf, std::io::Error),
    #[error("Invalid yaml in {}: {}", .0.display(), .1)]
    Yaml(PathBuf, serde_yaml_ng::Error),
    #[error("Invalid direct memif network: {0}")]
    Network(#[from] ProxyError),
    #[error("Invalid acl: {0}")]
    Acl(#[from] AclRuleError),
    #[error("Incomplete chain parameters: {0}")]
    Params(#[from] XconnectParamsBuilderError),
}

fn load<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, SettingsError> {
    let yaml =
        std::fs::read_to_string(path).map_err(|e| SettingsError::Read(path.to_owned(), e))?;
    serde_yaml_ng::from_str(&yaml).map_err(|e| SettingsError::Yaml(path.to_owned(), e))
}

/// How the loopback peer answers
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PeerSettings {
    pub mechanism: Option<Mechanism>,
    pub context: Option<ConnectionContext>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "Settings::default_name")]
    pub name: String,
    pub base_dir: PathBuf,
    pub tunnel_ip: IpAddr,
    /// `unix` or `unixpacket`, the default
    #[serde(default)]
    pub direct_memif_network: Option<String>,
    /// Access list rules by name
    #[serde(default)]
    pub acl: BTreeMap<String, String>,
    #[serde(default)]
    pub bridge: Option<String>,
    #[serde(default)]
    pub vhost_net: Option<PathBuf>,
    /// Wait for interface counters before answering
    #[serde(default)]
    pub metrics: bool,
    #[serde(default = "Settings::default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub peer: PeerSettings,
}

impl Settings {
    fn default_name() -> String {
        "forwarder".to_owned()
    }

    fn default_timeout() -> u64 {
        15
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        load(path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn peer(&self) -> LoopbackPeer {
        let mut peer = LoopbackPeer::new();
        if let Some(mechanism) = &self.peer.mechanism {
            peer = peer.with_mechanism(mechanism.clone());
        }
        if let Some(context) = &self.peer.context {
            peer = peer.with_context(context.clone());
        }
        peer
    }

    /// Parameters of the cross-connect chain, committing to `engine`
    pub fn params(
        &self,
        engine: Arc<dyn Configurator>,
        peer: Arc<LoopbackPeer>,
    ) -> Result<XconnectParams, SettingsError> {
        let mut builder = XconnectParamsBuilder::default();
        builder
            .name(&self.name)
            .base_dir(&self.base_dir)
            .tunnel_ip(self.tunnel_ip)
            .metrics(self.metrics)
            .engine(engine)
            .peer(peer);
        if let Some(network) = &self.direct_memif_network {
            builder.direct_memif_kind(network.parse::<SocketKind>()?);
        }
        if !self.acl.is_empty() {
            builder.acl_rules(parse_acl_rules(&self.acl)?);
        }
        if let Some(bridge) = &self.bridge {
            builder.bridge(bridge);
        }
        if let Some(vhost_net) = &self.vhost_net {
            builder.vhost_net(vhost_net);
        }
        Ok(builder.build()?)
    }
}

/// Read the request to serve from `path`
pub fn load_request(path: &Path) -> Result<NetworkServiceRequest, SettingsError> {
    load(path)
}
