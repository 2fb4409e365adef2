// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Direct memif: when both sides of a connection are memif interfaces, the engine is left out
//! and a local [`Proxy`] relays between the two sockets instead.
//!
//! The proxies live in a registry keyed by connection id. The registry is only ever touched from
//! the tasks of a [`SerialExecutor`], be it on behalf of a Request, a Close or a proxy whose
//! worker went away.

use api::{Connection, NetworkServiceRequest};
use async_trait::async_trait;
use concurrency::{ExecutorError, SerialExecutor, WeakSerialExecutor};
use config::DataplaneConfig;
use pipeline::{CallScope, ChainElement, ChainError, Next};
use proxy::{Proxy, ProxyError, ProxyId, SocketKind, StopListener, StopListenerFn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default)]
struct ProxyRegistry {
    proxies: HashMap<String, Proxy>,
}

impl ProxyRegistry {
    /// Stop whatever proxy `conn_id` had, then start `proxy` and register it instead
    async fn install(&mut self, conn_id: String, mut proxy: Proxy) -> Result<(), ProxyError> {
        if let Some(mut prev) = self.proxies.remove(&conn_id) {
            debug!("{conn_id}: replacing proxy {}", prev.id());
            if let Err(e) = prev.stop().await {
                debug!("{conn_id}: previous proxy: {e}");
            }
        }
        proxy.start()?;
        self.proxies.insert(conn_id, proxy);
        Ok(())
    }

    async fn uninstall(&mut self, conn_id: &str) {
        let Some(mut proxy) = self.proxies.remove(conn_id) else {
            debug!("{conn_id}: no proxy to stop");
            return;
        };
        if let Err(e) = proxy.stop().await {
            debug!("{conn_id}: {e}");
        }
    }

    /// Drop the proxy of `conn_id` if it is still the one identified by `proxy`
    async fn remove_stopped(&mut self, conn_id: &str, proxy: ProxyId) {
        if self.proxies.get(conn_id).is_some_and(|p| p.id() == proxy) {
            info!("{conn_id}: proxy {proxy} went away");
            self.uninstall(conn_id).await;
        }
    }

    fn metrics(&self, conn_id: &str) -> Option<BTreeMap<String, String>> {
        self.proxies.get(conn_id).map(Proxy::metrics)
    }
}

/// Remove the last two vpp interfaces from `config` if they are both memif, along with the
/// cross-connects between them. Returns their socket files, requesting side first.
fn take_memif_pair(config: &mut DataplaneConfig) -> Option<(String, String)> {
    let (source, target) = config.vpp.last_two_interfaces()?;
    let sockets = (
        source.memif_socket()?.to_owned(),
        target.memif_socket()?.to_owned(),
    );
    let names = (source.name.clone(), target.name.clone());
    let vpp = &mut config.vpp;
    vpp.interfaces.truncate(vpp.interfaces.len() - 2);
    vpp.xconnect_pairs
        .retain(|pair| !pair.names(&names.0) && !pair.names(&names.1));
    debug!("Taking {} and {} out of the engine", names.0, names.1);
    Some(sockets)
}

fn proxy_error(e: impl std::error::Error + Send + Sync + 'static) -> ChainError {
    ChainError::Proxy(Box::new(e))
}

/// Short-circuits memif to memif connections through a local proxy
pub struct DirectMemif {
    kind: SocketKind,
    registry: SerialExecutor<ProxyRegistry>,
}

impl DirectMemif {
    /// Proxy with sockets of type `kind`. Memif uses [`SocketKind::SeqPacket`].
    pub fn new(kind: SocketKind) -> Result<Self, ExecutorError> {
        Ok(Self {
            kind,
            registry: SerialExecutor::start("direct-memif", ProxyRegistry::default())?,
        })
    }

    fn stop_listener(&self, conn_id: &str) -> Arc<dyn StopListener> {
        let registry: WeakSerialExecutor<ProxyRegistry> = self.registry.downgrade();
        let conn_id = conn_id.to_owned();
        Arc::new(StopListenerFn(move |proxy: ProxyId| {
            let Some(registry) = registry.upgrade() else {
                return;
            };
            let conn_id = conn_id.clone();
            // nobody waits for this one
            let _ = registry.async_exec(move |reg| {
                Box::pin(async move { reg.remove_stopped(&conn_id, proxy).await })
            });
        }))
    }

    async fn metrics(&self, conn_id: &str) -> Option<BTreeMap<String, String>> {
        let conn_id = conn_id.to_owned();
        match self.registry.exec(move |reg| reg.metrics(&conn_id)).wait().await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!("No proxy metrics: {e}");
                None
            }
        }
    }

    #[cfg(test)]
    async fn active(&self) -> usize {
        self.registry
            .exec(|reg| reg.proxies.len())
            .wait()
            .await
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChainElement for DirectMemif {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        let Some((source, target)) = scope.config_mut().and_then(take_memif_pair) else {
            return next.request(scope, request).await;
        };
        let conn_id = request.connection.id.clone();
        let proxy = Proxy::new(
            &source,
            &target,
            self.kind,
            Some(self.stop_listener(&conn_id)),
        )
        .map_err(proxy_error)?;
        info!("{conn_id}: proxying {source} to {target}");
        let id = conn_id.clone();
        self.registry
            .async_exec(move |reg| Box::pin(reg.install(id, proxy)))
            .wait()
            .await
            .map_err(proxy_error)?
            .map_err(proxy_error)?;

        let mut conn = next.request(scope, request).await?;
        if let Some(metrics) = self.metrics(&conn_id).await
            && let Some(segment) = conn.current_segment_mut()
        {
            segment.metrics.extend(metrics);
        }
        Ok(conn)
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        if scope.config_mut().and_then(take_memif_pair).is_some() {
            let conn_id = conn.id.clone();
            self.registry
                .async_exec(move |reg| {
                    Box::pin(async move { reg.uninstall(&conn_id).await })
                })
                .wait()
                .await
                .map_err(proxy_error)?;
        }
        next.close(scope, conn).await
    }
}

#[cfg(test)]
mod test {
    use api::{Connection, NetworkServiceRequest, PathSegment};
    use config::{DataplaneConfig, VppInterface, VppLink, XConnectPair};
    use pipeline::sample_elements::{AppendVppInterface, CaptureConfig};
    use pipeline::{CallScope, Chain, ChainError};
    use pretty_assertions::assert_eq;
    use proxy::{RX_BYTES, SocketKind, TX_BYTES};
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{UnixListener, UnixStream};

    use super::{DirectMemif, take_memif_pair};

    fn memif(name: &str, socket: &str) -> VppInterface {
        VppInterface::new(
            name,
            VppLink::Memif {
                master: false,
                socket_filename: socket.to_owned(),
            },
        )
    }

    fn conn() -> Connection {
        let mut conn = Connection::new("c1", "ns");
        conn.path.path_segments.push(PathSegment {
            name: "forwarder".to_owned(),
            id: "c1".to_owned(),
            ..PathSegment::default()
        });
        conn
    }

    fn chain(
        direct: Arc<DirectMemif>,
        source: &Path,
        target: &Path,
        capture: &CaptureConfig,
    ) -> Chain {
        Chain::new()
            .add_stage(AppendVppInterface::memif(
                "server-c1",
                true,
                &source.display().to_string(),
            ))
            .add_stage(AppendVppInterface::memif(
                "client-c1",
                false,
                &target.display().to_string(),
            ))
            .add_shared_stage(direct)
            .add_stage(capture.clone())
    }

    async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        cond()
    }

    #[test]
    fn memif_pair_is_taken_out() {
        let mut config = DataplaneConfig::default();
        config.vpp.interfaces = vec![
            VppInterface::new("tap", VppLink::Tap { version: 2 }),
            memif("a", "/run/a.sock"),
            memif("b", "/run/b.sock"),
        ];
        config.vpp.xconnect_pairs = vec![
            XConnectPair::new("a", "b"),
            XConnectPair::new("b", "a"),
            XConnectPair::new("tap", "x"),
        ];
        assert_eq!(
            take_memif_pair(&mut config),
            Some(("/run/a.sock".to_owned(), "/run/b.sock".to_owned()))
        );
        assert_eq!(config.vpp.interfaces.len(), 1);
        assert_eq!(config.vpp.xconnect_pairs, vec![XConnectPair::new("tap", "x")]);
        assert_eq!(take_memif_pair(&mut config), None);

        config.vpp.interfaces.push(memif("c", "/run/c.sock"));
        assert_eq!(take_memif_pair(&mut config), None);
        assert_eq!(config.vpp.interfaces.len(), 2);
    }

    #[tokio::test]
    async fn request_starts_and_close_stops() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("nsc.sock");
        let target = dir.path().join("nse.sock");
        let direct = Arc::new(DirectMemif::new(SocketKind::SeqPacket).unwrap());
        let capture = CaptureConfig::default();
        let chain = chain(direct.clone(), &source, &target, &capture);

        let mut scope = CallScope::new();
        scope.ensure_config();
        let conn = chain
            .run_request(&mut scope, NetworkServiceRequest::new(conn()))
            .await
            .unwrap();
        assert!(source.exists());
        assert!(capture.last().unwrap().vpp.interfaces.is_empty());
        let metrics = &conn.path.path_segments[0].metrics;
        assert_eq!(metrics[RX_BYTES], "0");
        assert_eq!(metrics[TX_BYTES], "0");

        let mut scope = CallScope::new();
        scope.ensure_config();
        chain.run_close(&mut scope, &conn).await.unwrap();
        assert!(!source.exists());
        assert!(capture.last().unwrap().vpp.interfaces.is_empty());
        assert_eq!(direct.active().await, 0);
    }

    #[tokio::test]
    async fn request_again_replaces_the_proxy() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("nsc.sock");
        let target = dir.path().join("nse.sock");
        let direct = Arc::new(DirectMemif::new(SocketKind::SeqPacket).unwrap());
        let chain = chain(direct.clone(), &source, &target, &CaptureConfig::default());

        for _ in 0..3 {
            let mut scope = CallScope::new();
            scope.ensure_config();
            chain
                .run_request(&mut scope, NetworkServiceRequest::new(conn()))
                .await
                .unwrap();
            assert!(source.exists());
            assert_eq!(direct.active().await, 1);
        }
    }

    #[tokio::test]
    async fn other_interfaces_are_left_alone() {
        let direct = DirectMemif::new(SocketKind::SeqPacket).unwrap();
        let capture = CaptureConfig::default();
        let chain = Chain::new()
            .add_stage(AppendVppInterface::tap("server-c1"))
            .add_stage(AppendVppInterface::memif("client-c1", false, "/run/nse.sock"))
            .add_stage(direct)
            .add_stage(capture.clone());
        let mut scope = CallScope::new();
        scope.ensure_config();
        chain
            .run_request(&mut scope, NetworkServiceRequest::new(conn()))
            .await
            .unwrap();
        assert_eq!(capture.last().unwrap().vpp.interfaces.len(), 2);
    }

    #[tokio::test]
    async fn bad_socket_path_fails() {
        let direct = Arc::new(DirectMemif::new(SocketKind::SeqPacket).unwrap());
        let long = Path::new("/tmp").join("x".repeat(200));
        let target = Path::new("/tmp/nse.sock");
        let chain = chain(direct.clone(), &long, target, &CaptureConfig::default());
        let mut scope = CallScope::new();
        scope.ensure_config();
        let err = chain
            .run_request(&mut scope, NetworkServiceRequest::new(conn()))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Proxy(_)));
        assert_eq!(direct.active().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn finished_proxy_deregisters() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("nsc.sock");
        let target = dir.path().join("nse.sock");
        let endpoint = UnixListener::bind(&target).unwrap();
        let direct = Arc::new(DirectMemif::new(SocketKind::Stream).unwrap());
        let chain = chain(direct.clone(), &source, &target, &CaptureConfig::default());

        let mut scope = CallScope::new();
        scope.ensure_config();
        chain
            .run_request(&mut scope, NetworkServiceRequest::new(conn()))
            .await
            .unwrap();

        let mut client = UnixStream::connect(&source).await.unwrap();
        client.write_all(b"secret").await.unwrap();
        let (mut server, _) = endpoint.accept().await.unwrap();
        let mut received = [0u8; 6];
        server.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"secret");

        drop(client);
        assert!(eventually(|| !source.exists()).await);
        assert_eq!(direct.active().await, 0);
    }
}
