// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use api::{Connection, NetworkServiceRequest};
use async_trait::async_trait;
use futures::StreamExt;
use mgmt::Configurator;
use pipeline::{CallScope, ChainElement, ChainError, Next};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Server element attaching the counters of the connection's engine interface to the current
/// path segment of the connection it returns.
///
/// The interface is the first one of the engine configuration. Once the rest of the chain has
/// succeeded, stats are polled until a frame for that interface shows up or the call scope is
/// cancelled. Counters are best effort: not getting them never fails the Request.
pub struct MetricsServer<C: ?Sized> {
    sink: Arc<C>,
    retry_delay: Duration,
}

impl<C: Configurator + ?Sized> MetricsServer<C> {
    pub fn new(sink: Arc<C>) -> Self {
        Self {
            sink,
            retry_delay: RETRY_DELAY,
        }
    }

    /// Wait `delay` before polling again after a failed or finished poll
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn poll(&self, name: &str) -> BTreeMap<String, String> {
        loop {
            match self.sink.poll_stats().await {
                Ok(mut stream) => {
                    while let Some(item) = stream.next().await {
                        match item {
                            Ok(stats) if stats.name == name => return stats.metrics(),
                            Ok(stats) => trace!("Skipping stats of {}", stats.name),
                            Err(status) => warn!("Stats stream failure: {status}"),
                        }
                    }
                    debug!("Stats stream ended, polling again");
                }
                Err(status) => warn!("Failed to poll stats: {status}"),
            }
            tokio::time::sleep(self.retry_delay).await;
        }
    }
}

#[async_trait]
impl<C: Configurator + ?Sized + 'static> ChainElement for MetricsServer<C> {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        let iface = scope
            .config()
            .and_then(|config| config.vpp.interfaces.first())
            .map(|iface| iface.name.clone());
        let index = request.connection.path.index;
        let mut conn = next.request(scope, request).await?;

        let Some(iface) = iface else {
            warn!("{}: no engine interface to get stats of", conn.id);
            return Ok(conn);
        };
        tokio::select! {
            metrics = self.poll(&iface) => {
                match conn.path.path_segments.get_mut(index) {
                    Some(segment) => segment.metrics = metrics,
                    None => warn!("{}: no path segment at {index} for the stats of {iface}", conn.id),
                }
            }
            () = scope.cancelled() => info!("{}: cancelled while waiting for stats of {iface}", conn.id),
        }
        Ok(conn)
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        next.close(scope, conn).await
    }
}
