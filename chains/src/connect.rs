// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use api::{Connection, NetworkServiceRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use pipeline::{CallScope, Chain, ChainElement, ChainError, Next};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::peer::{PeerClient, ToPeer};

/// Connects every incoming connection to the next hop through a client chain.
///
/// The client chain runs in the scope of the incoming call, so the configuration its elements
/// append lands in the same configuration as that of the server side. The outgoing connection
/// is kept until the incoming one is closed.
pub struct Connect {
    client: Chain,
    peer: Arc<dyn PeerClient>,
    outgoing: Mutex<HashMap<String, Connection>>,
}

impl Connect {
    /// Run `client` before calling `peer`
    #[must_use]
    pub fn new(client: Chain, peer: Arc<dyn PeerClient>) -> Self {
        Self {
            client: client.add_stage(ToPeer(peer.clone())),
            peer,
            outgoing: Mutex::new(HashMap::new()),
        }
    }

    /// Number of connections to the next hop currently open
    #[must_use]
    pub fn connections(&self) -> usize {
        self.outgoing.lock().len()
    }

    async fn disconnect(&self, conn_id: &str) {
        let Some(outgoing) = self.outgoing.lock().remove(conn_id) else {
            return;
        };
        if let Err(e) = self.peer.close(&outgoing).await {
            warn!("{conn_id}: failed to close the outgoing connection: {e}");
        }
    }
}

fn outgoing_request(incoming: &Connection) -> NetworkServiceRequest {
    NetworkServiceRequest::new(Connection {
        id: incoming.id.clone(),
        network_service: incoming.network_service.clone(),
        mechanism: None,
        context: incoming.context.clone(),
        path: incoming.path.clone(),
    })
}

#[async_trait]
impl ChainElement for Connect {
    async fn request(
        &self,
        scope: &mut CallScope,
        mut request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        let conn_id = request.connection.id.clone();
        let outgoing = self
            .client
            .run_request(scope, outgoing_request(&request.connection))
            .await?;
        debug!("{conn_id}: outgoing connection established");
        request.connection.context = outgoing.context.clone();
        self.outgoing.lock().insert(conn_id.clone(), outgoing);

        match next.request(scope, request).await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                self.disconnect(&conn_id).await;
                Err(e)
            }
        }
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        let outgoing = self.outgoing.lock().remove(&conn.id);
        match outgoing {
            Some(outgoing) => self.client.run_close(scope, &outgoing).await?,
            None => warn!("{}: no outgoing connection to close", conn.id),
        }
        next.close(scope, conn).await
    }
}

#[cfg(test)]
mod test {
    use api::{
        Connection, ConnectionContext, IpContext, Mechanism, MechanismClass, MechanismType,
        NetworkServiceRequest,
    };
    use async_trait::async_trait;
    use pipeline::sample_elements::{AppendVppInterface, CaptureConfig, FailRequest};
    use pipeline::{CallScope, Chain, ChainElement, ChainError, Next};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tracing_test::traced_test;

    use super::Connect;
    use crate::peer::LoopbackPeer;

    struct PreferKernel;

    #[async_trait]
    impl ChainElement for PreferKernel {
        async fn request(
            &self,
            scope: &mut CallScope,
            mut request: NetworkServiceRequest,
            next: Next<'_>,
        ) -> Result<Connection, ChainError> {
            request
                .mechanism_preferences
                .push(Mechanism::new(MechanismClass::Local, MechanismType::Kernel));
            next.request(scope, request).await
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

    fn peer() -> Arc<LoopbackPeer> {
        Arc::new(
            LoopbackPeer::new()
                .with_mechanism(Mechanism::new(MechanismClass::Local, MechanismType::Kernel))
                .with_context(ConnectionContext {
                    ip: IpContext {
                        dst_ip_addr: "10.0.0.2/30".to_owned(),
                        ..IpContext::default()
                    },
                    ..ConnectionContext::default()
                }),
        )
    }

    fn request() -> NetworkServiceRequest {
        let mut conn = Connection::new("c1", "ns");
        conn.mechanism = Some(Mechanism::new(MechanismClass::Local, MechanismType::Memif));
        NetworkServiceRequest::new(conn)
    }

    #[tokio::test]
    async fn context_comes_from_the_next_hop() {
        let peer = peer();
        let capture = CaptureConfig::default();
        let client = Chain::new()
            .add_stage(AppendVppInterface::tap("client-c1"))
            .add_stage(PreferKernel);
        let chain = Chain::new()
            .add_stage(AppendVppInterface::tap("server-c1"))
            .add_stage(Connect::new(client, peer.clone()))
            .add_stage(capture.clone());
        let mut scope = CallScope::new();
        scope.ensure_config();
        let conn = chain.run_request(&mut scope, request()).await.unwrap();

        // the incoming mechanism stays, the context is the one of the next hop
        assert_eq!(conn.mechanism.unwrap().kind, MechanismType::Memif);
        assert_eq!(conn.context.ip.dst_ip_addr, "10.0.0.2/30");
        let names: Vec<_> = capture
            .last()
            .unwrap()
            .vpp
            .interfaces
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["server-c1", "client-c1"]);

        let mut scope = CallScope::new();
        scope.ensure_config();
        chain
            .run_close(&mut scope, &Connection::new("c1", "ns"))
            .await
            .unwrap();
        assert_eq!(peer.closed(), vec!["c1".to_owned()]);
        assert_eq!(scope.config().unwrap().vpp.interfaces.len(), 2);
    }

    #[tokio::test]
    async fn downstream_failure_disconnects() {
        let peer = peer();
        let connect = Arc::new(Connect::new(
            Chain::new().add_stage(PreferKernel),
            peer.clone(),
        ));
        let chain = Chain::new()
            .add_shared_stage(connect.clone())
            .add_stage(FailRequest::peer("down"));
        let mut scope = CallScope::new();
        let err = chain.run_request(&mut scope, request()).await;
        assert!(matches!(err, Err(ChainError::Peer(_))));
        assert_eq!(connect.connections(), 0);
        assert_eq!(peer.closed(), vec!["c1".to_owned()]);
    }

    #[tokio::test]
    async fn peer_refusal_fails_the_request() {
        let connect = Arc::new(Connect::new(Chain::new(), peer()));
        let chain = Chain::new().add_shared_stage(connect.clone());
        let err = chain.run_request(&mut CallScope::new(), request()).await;
        assert!(matches!(err, Err(ChainError::Peer(_))));
        assert_eq!(connect.connections(), 0);
    }

    #[traced_test]
    #[tokio::test]
    async fn close_of_unknown_connection() {
        let peer = peer();
        let chain = Chain::new().add_stage(Connect::new(Chain::new(), peer.clone()));
        chain
            .run_close(&mut CallScope::new(), &Connection::new("c9", "ns"))
            .await
            .unwrap();
        assert!(peer.closed().is_empty());
        assert!(logs_contain("c9: no outgoing connection to close"));
    }
}
