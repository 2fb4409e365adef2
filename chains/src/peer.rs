// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The next hop of a connection

use api::{Connection, ConnectionContext, Mechanism, NetworkServiceRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use pipeline::{CallScope, ChainElement, ChainError, Next};
use std::sync::Arc;
use tracing::{debug, info};

/// Something that serves network service requests: the next forwarder or endpoint on the path
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Ask for a connection. The peer picks one of the mechanism preferences of `request`.
    async fn request(&self, request: NetworkServiceRequest) -> Result<Connection, ChainError>;
    async fn close(&self, conn: &Connection) -> Result<(), ChainError>;
}

/// A peer answering from a template: it selects the first preference of the type of its
/// mechanism, or the first preference at all when it has none, and fills in the parameters
/// of the template.
#[derive(Default)]
pub struct LoopbackPeer {
    mechanism: Option<Mechanism>,
    context: Option<ConnectionContext>,
    closed: Mutex<Vec<String>>,
}

impl LoopbackPeer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_mechanism(mut self, mechanism: Mechanism) -> Self {
        self.mechanism = Some(mechanism);
        self
    }

    /// Answer with `context` instead of the requested one
    #[must_use]
    pub fn with_context(mut self, context: ConnectionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Ids of the connections closed so far
    #[must_use]
    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().clone()
    }

    fn select(&self, preferences: Vec<Mechanism>) -> Option<Mechanism> {
        let mut selected = match &self.mechanism {
            Some(template) => preferences.into_iter().find(|m| m.kind == template.kind)?,
            None => preferences.into_iter().next()?,
        };
        if let Some(template) = &self.mechanism {
            selected.parameters.extend(template.parameters.clone());
        }
        Some(selected)
    }
}

#[async_trait]
impl PeerClient for LoopbackPeer {
    async fn request(&self, request: NetworkServiceRequest) -> Result<Connection, ChainError> {
        let NetworkServiceRequest {
            mut connection,
            mechanism_preferences,
        } = request;
        let offered: Vec<_> = mechanism_preferences.iter().map(|m| m.kind).collect();
        let mechanism = self.select(mechanism_preferences).ok_or_else(|| {
            ChainError::Peer(format!("{}: none of {offered:?} is acceptable", connection.id))
        })?;
        debug!("{}: peer selected {}", connection.id, mechanism.kind);
        connection.mechanism = Some(mechanism);
        if let Some(context) = &self.context {
            connection.context = context.clone();
        }
        Ok(connection)
    }

    async fn close(&self, conn: &Connection) -> Result<(), ChainError> {
        debug!("{}: peer closed", conn.id);
        self.closed.lock().push(conn.id.clone());
        Ok(())
    }
}

/// Last element of a client chain: hands the call over to the peer. Whatever follows it in the
/// chain is never called.
pub struct ToPeer(pub Arc<dyn PeerClient>);

#[async_trait]
impl ChainElement for ToPeer {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        _next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        let id = request.connection.id.clone();
        let conn = scope.until_cancelled(self.0.request(request)).await??;
        info!("{id}: connected to the next hop");
        Ok(conn)
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        _next: Next<'_>,
    ) -> Result<(), ChainError> {
        scope.until_cancelled(self.0.close(conn)).await?
    }
}
