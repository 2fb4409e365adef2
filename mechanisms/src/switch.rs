// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Dispatch on the type of the selected mechanism

use api::{Connection, MechanismType, NetworkServiceRequest};
use async_trait::async_trait;
use pipeline::{CallScope, ChainElement, ChainError, Next};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// Hands a call to the element registered for the type of the mechanism of the connection. A
/// connection with no mechanism, or one nobody registered for, just goes on down the chain.
#[derive(Default)]
pub struct MechanismSwitch {
    handlers: BTreeMap<MechanismType, Arc<dyn ChainElement>>,
}

impl MechanismSwitch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `element` for mechanisms of type `kind`, replacing any previous one
    #[must_use]
    pub fn with(mut self, kind: MechanismType, element: impl ChainElement) -> Self {
        self.handlers.insert(kind, Arc::new(element));
        self
    }

    fn handler(&self, conn: &Connection) -> Option<&Arc<dyn ChainElement>> {
        let kind = conn.mechanism.as_ref()?.kind;
        let handler = self.handlers.get(&kind);
        trace!("{}: {kind} handled: {}", conn.id, handler.is_some());
        handler
    }
}

#[async_trait]
impl ChainElement for MechanismSwitch {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        match self.handler(&request.connection) {
            Some(handler) => handler.request(scope, request, next).await,
            None => next.request(scope, request).await,
        }
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        match self.handler(conn) {
            Some(handler) => handler.close(scope, conn, next).await,
            None => next.close(scope, conn).await,
        }
    }
}
