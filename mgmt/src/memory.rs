// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! An engine living in memory, for tests and dry runs

use async_trait::async_trait;
use config::DataplaneConfig;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tonic::{Code, Status};
use tracing::debug;

use crate::configurator::{Configurator, InterfaceStats, StatsStream};

const STATS_CAPACITY: usize = 64;

/// A call the engine received
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCall {
    Update {
        config: DataplaneConfig,
        full_resync: bool,
    },
    Delete(DataplaneConfig),
}

#[derive(Default)]
struct Engine {
    calls: Vec<EngineCall>,
    state: DataplaneConfig,
    failure: Option<(Code, String)>,
    dump_failure: Option<(Code, String)>,
}

impl Engine {
    fn check(&self) -> Result<(), Status> {
        match &self.failure {
            Some((code, message)) => Err(Status::new(*code, message.clone())),
            None => Ok(()),
        }
    }
}

/// Records what it is told, keeps the merged state for dumps and publishes the stats it is handed
pub struct MemoryConfigurator {
    engine: Mutex<Engine>,
    ready: watch::Sender<bool>,
    stats: broadcast::Sender<InterfaceStats>,
}

impl Default for MemoryConfigurator {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConfigurator {
    /// An engine that is ready and accepts everything
    #[must_use]
    pub fn new() -> Self {
        let (stats, _) = broadcast::channel(STATS_CAPACITY);
        Self {
            engine: Mutex::new(Engine::default()),
            ready: watch::Sender::new(true),
            stats,
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.send_replace(ready);
    }

    /// Fail updates and deletes with `code` and `message` from now on
    pub fn fail_with(&self, code: Code, message: &str) {
        self.engine.lock().failure = Some((code, message.to_owned()));
    }

    pub fn fail_dumps_with(&self, code: Code, message: &str) {
        self.engine.lock().dump_failure = Some((code, message.to_owned()));
    }

    /// Accept calls again
    pub fn heal(&self) {
        let mut engine = self.engine.lock();
        engine.failure = None;
        engine.dump_failure = None;
    }

    /// The updates and deletes received so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.engine.lock().calls.clone()
    }

    /// Change the state as if the engine did it by itself
    pub fn edit_state(&self, edit: impl FnOnce(&mut DataplaneConfig)) {
        edit(&mut self.engine.lock().state);
    }

    /// Publish `stats` to the current pollers. Returns how many got it.
    pub fn publish_stats(&self, stats: InterfaceStats) -> usize {
        self.stats.send(stats).unwrap_or_default()
    }

    /// Number of streams returned by [`Configurator::poll_stats`] still open
    #[must_use]
    pub fn pollers(&self) -> usize {
        self.stats.receiver_count()
    }
}

#[async_trait]
impl Configurator for MemoryConfigurator {
    async fn wait_ready(&self) -> Result<(), Status> {
        let mut ready = self.ready.subscribe();
        ready
            .wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| Status::unavailable("engine is gone"))
    }

    async fn update(&self, config: &DataplaneConfig, full_resync: bool) -> Result<(), Status> {
        let mut engine = self.engine.lock();
        engine.check()?;
        if full_resync {
            engine.state = DataplaneConfig::default();
        }
        engine.state.merge(config);
        engine.calls.push(EngineCall::Update {
            config: config.clone(),
            full_resync,
        });
        debug!("Update (full resync: {full_resync}): {config}");
        Ok(())
    }

    async fn delete(&self, config: &DataplaneConfig) -> Result<(), Status> {
        let mut engine = self.engine.lock();
        engine.check()?;
        engine.state.remove(config);
        engine.calls.push(EngineCall::Delete(config.clone()));
        debug!("Delete: {config}");
        Ok(())
    }

    async fn dump(&self) -> Result<DataplaneConfig, Status> {
        let engine = self.engine.lock();
        match &engine.dump_failure {
            Some((code, message)) => Err(Status::new(*code, message.clone())),
            None => Ok(engine.state.clone()),
        }
    }

    async fn poll_stats(&self) -> Result<StatsStream, Status> {
        let stream = BroadcastStream::new(self.stats.subscribe())
            .map(|item| item.map_err(|e| Status::data_loss(e.to_string())));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod test {
    use config::{DataplaneConfig, VppInterface, VppLink};
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tonic::Code;

    use super::{EngineCall, MemoryConfigurator};
    use crate::configurator::{Configurator, InterfaceStats};

    fn config(name: &str) -> DataplaneConfig {
        let mut config = DataplaneConfig::default();
        config
            .vpp
            .interfaces
            .push(VppInterface::new(name, VppLink::Tap { version: 2 }));
        config
    }

    #[tokio::test]
    async fn updates_merge_and_deletes_remove() {
        let engine = MemoryConfigurator::new();
        engine.update(&config("a"), true).await.unwrap();
        engine.update(&config("b"), false).await.unwrap();
        assert_eq!(engine.dump().await.unwrap().vpp.interfaces.len(), 2);

        engine.delete(&config("a")).await.unwrap();
        let state = engine.dump().await.unwrap();
        assert_eq!(state.vpp.interfaces.len(), 1);
        assert_eq!(state.vpp.interfaces[0].name, "b");

        // a full resync drops what it does not mention
        engine.update(&config("c"), true).await.unwrap();
        let state = engine.dump().await.unwrap();
        assert_eq!(state.vpp.interfaces.len(), 1);
        assert_eq!(state.vpp.interfaces[0].name, "c");

        let calls = engine.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[2], EngineCall::Delete(config("a")));
    }

    #[tokio::test]
    async fn failures() {
        let engine = MemoryConfigurator::new();
        engine.fail_with(Code::Unavailable, "down");
        let err = engine.update(&config("a"), false).await.unwrap_err();
        assert_eq!(err.code(), Code::Unavailable);
        assert_eq!(err.message(), "down");
        assert!(engine.delete(&config("a")).await.is_err());
        assert!(engine.calls().is_empty());

        engine.fail_dumps_with(Code::Internal, "no dump");
        assert_eq!(engine.dump().await.unwrap_err().code(), Code::Internal);

        engine.heal();
        engine.update(&config("a"), false).await.unwrap();
        assert!(engine.dump().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn readiness() {
        let engine = MemoryConfigurator::new();
        engine.wait_ready().await.unwrap();
        engine.set_ready(false);
        let waiting = tokio::time::timeout(Duration::from_secs(1), engine.wait_ready()).await;
        assert!(waiting.is_err());
        engine.set_ready(true);
        engine.wait_ready().await.unwrap();
    }

    #[tokio::test]
    async fn stats_reach_pollers() {
        let engine = MemoryConfigurator::new();
        assert_eq!(engine.publish_stats(InterfaceStats::default()), 0);
        let mut stream = engine.poll_stats().await.unwrap();
        assert_eq!(engine.pollers(), 1);
        let stats = InterfaceStats {
            name: "server-c1".to_owned(),
            ..InterfaceStats::default()
        };
        assert_eq!(engine.publish_stats(stats.clone()), 1);
        assert_eq!(stream.next().await.unwrap().unwrap(), stats);
        drop(stream);
        assert_eq!(engine.pollers(), 0);
    }
}
