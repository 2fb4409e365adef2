// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Layer 2 cross-connect between the last two vpp interfaces

use api::{Connection, NetworkServiceRequest};
use async_trait::async_trait;
use config::{DataplaneConfig, XConnectPair};
use pipeline::{CallScope, ChainElement, ChainError, Next};
use tracing::debug;

fn cross_connect(scope: &mut CallScope) {
    let Some(config) = scope.config_mut() else {
        return;
    };
    append_pairs(config);
}

fn append_pairs(config: &mut DataplaneConfig) {
    let Some((a, b)) = config.vpp.last_two_interfaces() else {
        return;
    };
    let (a, b) = (a.name.clone(), b.name.clone());
    debug!("Cross-connecting {a} and {b}");
    config.vpp.xconnect_pairs.push(XConnectPair::new(&a, &b));
    config.vpp.xconnect_pairs.push(XConnectPair::new(b, a));
}

/// Cross-connects, once the peer has answered, the interface of the incoming side with the one
/// the client mechanism just added
pub struct L2XconnectClient;

#[async_trait]
impl ChainElement for L2XconnectClient {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        let conn = next.request(scope, request).await?;
        cross_connect(scope);
        Ok(conn)
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        next.close(scope, conn).await?;
        cross_connect(scope);
        Ok(())
    }
}

/// Cross-connects the last two interfaces before handing the call over
pub struct L2XconnectServer;

#[async_trait]
impl ChainElement for L2XconnectServer {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        cross_connect(scope);
        next.request(scope, request).await
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        cross_connect(scope);
        next.close(scope, conn).await
    }
}

#[cfg(test)]
mod test {
    use api::{Connection, NetworkServiceRequest};
    use config::XConnectPair;
    use pipeline::sample_elements::{AppendVppInterface, CaptureConfig};
    use pipeline::{CallScope, Chain};
    use pretty_assertions::assert_eq;

    use super::{L2XconnectClient, L2XconnectServer};

    fn request() -> NetworkServiceRequest {
        NetworkServiceRequest::new(Connection::new("c1", "ns"))
    }

    fn pairs(a: &str, b: &str) -> Vec<XConnectPair> {
        vec![XConnectPair::new(a, b), XConnectPair::new(b, a)]
    }

    #[tokio::test]
    async fn client_connects_both_ways_after_the_peer() {
        let capture = CaptureConfig::default();
        let chain = Chain::new()
            .add_stage(AppendVppInterface::tap("x"))
            .add_stage(AppendVppInterface::tap("server-c1"))
            .add_stage(L2XconnectClient)
            .add_stage(capture.clone())
            .add_stage(AppendVppInterface::memif("client-c1", false, "/run/c1.sock"));
        let mut scope = CallScope::new();
        scope.ensure_config();
        chain.run_request(&mut scope, request()).await.unwrap();
        assert!(capture.last().unwrap().vpp.xconnect_pairs.is_empty());
        assert_eq!(
            scope.config().unwrap().vpp.xconnect_pairs,
            pairs("server-c1", "client-c1")
        );

        let mut scope = CallScope::new();
        scope.ensure_config();
        chain
            .run_close(&mut scope, &Connection::new("c1", "ns"))
            .await
            .unwrap();
        assert_eq!(
            scope.config().unwrap().vpp.xconnect_pairs,
            pairs("server-c1", "client-c1")
        );
    }

    #[tokio::test]
    async fn server_connects_before_handing_over() {
        let capture = CaptureConfig::default();
        let chain = Chain::new()
            .add_stage(AppendVppInterface::tap("a"))
            .add_stage(AppendVppInterface::tap("b"))
            .add_stage(L2XconnectServer)
            .add_stage(capture.clone());
        let mut scope = CallScope::new();
        scope.ensure_config();
        chain.run_request(&mut scope, request()).await.unwrap();
        assert_eq!(capture.last().unwrap().vpp.xconnect_pairs, pairs("a", "b"));
    }

    #[tokio::test]
    async fn needs_two_interfaces() {
        let chain = Chain::new()
            .add_stage(AppendVppInterface::tap("a"))
            .add_stage(L2XconnectServer)
            .add_stage(L2XconnectClient);
        let mut scope = CallScope::new();
        scope.ensure_config();
        chain.run_request(&mut scope, request()).await.unwrap();
        assert!(scope.config().unwrap().vpp.xconnect_pairs.is_empty());

        // no configuration at all
        let mut scope = CallScope::new();
        chain.run_request(&mut scope, request()).await.unwrap();
        assert!(scope.config().is_none());
    }
}
