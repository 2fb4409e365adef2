// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use async_trait::async_trait;
use config::DataplaneConfig;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::pin::Pin;
use tonic::Status;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceCounters {
    pub packets: u64,
    pub bytes: u64,
}

/// Counters of one engine interface, as reported by a stats poll
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceStats {
    pub name: String,
    pub rx: InterfaceCounters,
    pub tx: InterfaceCounters,
    pub rx_error: u64,
    pub tx_error: u64,
}

impl InterfaceStats {
    /// The counters as path segment metrics
    #[must_use]
    pub fn metrics(&self) -> BTreeMap<String, String> {
        [
            ("rx_bytes", self.rx.bytes),
            ("tx_bytes", self.tx.bytes),
            ("rx_packets", self.rx.packets),
            ("tx_packets", self.tx.packets),
            ("rx_error_packets", self.rx_error),
            ("tx_error_packets", self.tx_error),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_string()))
        .collect()
    }
}

pub type StatsStream = Pin<Box<dyn Stream<Item = Result<InterfaceStats, Status>> + Send>>;

/// The remote dataplane engine
#[async_trait]
pub trait Configurator: Send + Sync {
    /// Resolve once the engine accepts calls. Engines that are always there need not bother.
    async fn wait_ready(&self) -> Result<(), Status> {
        Ok(())
    }

    /// Push `config`. With `full_resync`, whatever the engine had that `config` does not
    /// mention is removed.
    async fn update(&self, config: &DataplaneConfig, full_resync: bool) -> Result<(), Status>;

    /// Remove the objects of `config`
    async fn delete(&self, config: &DataplaneConfig) -> Result<(), Status>;

    /// The configuration as the engine sees it, including what it filled in (e.g. mac addresses)
    async fn dump(&self) -> Result<DataplaneConfig, Status>;

    /// Interface counters, as they get published
    async fn poll_stats(&self) -> Result<StatsStream, Status>;
}
