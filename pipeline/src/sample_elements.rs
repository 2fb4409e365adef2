// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use api::{Connection, Mechanism, NetworkServiceRequest};
use async_trait::async_trait;
use config::{DataplaneConfig, VppInterface, VppLink};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::{CallScope, ChainElement, ChainError, Next};

/// Element that does nothing but delegate.
pub struct Passthrough;

#[async_trait]
impl ChainElement for Passthrough {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
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

/// Element that uses [`debug!`] to print the configuration built so far.
pub struct InspectConfig;

#[async_trait]
impl ChainElement for InspectConfig {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        if let Some(config) = scope.config() {
            debug!("{}: config: {config}", request.connection.id);
        }
        next.request(scope, request).await
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        if let Some(config) = scope.config() {
            debug!("{}: config: {config}", conn.id);
        }
        next.close(scope, conn).await
    }
}

/// Element appending a vpp interface before delegating, standing for whatever element would
/// create one.
pub struct AppendVppInterface {
    iface: VppInterface,
}

impl AppendVppInterface {
    /// Append a tap interface named `name`
    #[must_use]
    pub fn tap(name: &str) -> Self {
        Self {
            iface: VppInterface::new(name, VppLink::Tap { version: 2 }),
        }
    }

    /// Append a memif interface named `name` using socket file `socket`
    #[must_use]
    pub fn memif(name: &str, master: bool, socket: &str) -> Self {
        Self {
            iface: VppInterface::new(
                name,
                VppLink::Memif {
                    master,
                    socket_filename: socket.to_owned(),
                },
            ),
        }
    }

    /// Name of the interface appended
    #[must_use]
    pub fn name(&self) -> &str {
        &self.iface.name
    }

    fn append(&self, scope: &mut CallScope) {
        if let Some(config) = scope.config_mut() {
            config.vpp.interfaces.push(self.iface.clone());
        }
    }
}

#[async_trait]
impl ChainElement for AppendVppInterface {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        self.append(scope);
        next.request(scope, request).await
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        self.append(scope);
        next.close(scope, conn).await
    }
}

/// Element selecting a mechanism for the connection, the way an endpoint would
pub struct SelectMechanism(pub Mechanism);

#[async_trait]
impl ChainElement for SelectMechanism {
    async fn request(
        &self,
        scope: &mut CallScope,
        mut request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        request.connection.mechanism = Some(self.0.clone());
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

/// Element keeping a copy of the configuration it sees, for inspection by tests
#[derive(Clone, Default)]
pub struct CaptureConfig {
    seen: Arc<Mutex<Vec<DataplaneConfig>>>,
}

impl CaptureConfig {
    /// The configuration seen by the last call, if any
    #[must_use]
    pub fn last(&self) -> Option<DataplaneConfig> {
        self.seen.lock().last().cloned()
    }

    /// The configurations seen by all calls so far
    #[must_use]
    pub fn all(&self) -> Vec<DataplaneConfig> {
        self.seen.lock().clone()
    }

    fn capture(&self, scope: &CallScope) {
        if let Some(config) = scope.config() {
            self.seen.lock().push(config.clone());
        }
    }
}

#[async_trait]
impl ChainElement for CaptureConfig {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        self.capture(scope);
        next.request(scope, request).await
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        self.capture(scope);
        next.close(scope, conn).await
    }
}

/// Element failing every call without delegating
pub struct FailRequest {
    reason: String,
}

impl FailRequest {
    /// Fail as an unreachable peer would
    #[must_use]
    pub fn peer(reason: &str) -> Self {
        Self {
            reason: reason.to_owned(),
        }
    }
}

#[async_trait]
impl ChainElement for FailRequest {
    async fn request(
        &self,
        _scope: &mut CallScope,
        _request: NetworkServiceRequest,
        _next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        Err(ChainError::Peer(self.reason.clone()))
    }

    async fn close(
        &self,
        _scope: &mut CallScope,
        _conn: &Connection,
        _next: Next<'_>,
    ) -> Result<(), ChainError> {
        Err(ChainError::Peer(self.reason.clone()))
    }
}
