// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Chain elements pushing the configuration built by a chain to the engine

use api::{Connection, NetworkServiceRequest};
use async_trait::async_trait;
use config::DataplaneConfig;
use pipeline::{CallScope, ChainElement, ChainError, CommitOp, Next};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tonic::Status;
use tracing::{debug, error, info};

use crate::configurator::Configurator;

fn commit_error(op: CommitOp, status: &Status, config: &DataplaneConfig) -> ChainError {
    error!("Failed to {op} configuration: {status}");
    ChainError::Commit {
        op,
        reason: status.message().to_owned(),
        config: Box::new(config.clone()),
    }
}

/// Last element of a server chain: commits the configuration, then lets the call go on.
///
/// The first update a `Commit` sends is a full resync, so that whatever the engine kept from a
/// previous life of the forwarder goes away.
pub struct Commit<C: ?Sized> {
    sink: Arc<C>,
    resynced: AtomicBool,
}

impl<C: Configurator + ?Sized> Commit<C> {
    pub fn new(sink: Arc<C>) -> Self {
        Self {
            sink,
            resynced: AtomicBool::new(false),
        }
    }

    fn full_resync(&self) -> bool {
        self.resynced
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[async_trait]
impl<C: Configurator + ?Sized + 'static> ChainElement for Commit<C> {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        let Some(config) = scope.config() else {
            return next.request(scope, request).await;
        };
        let full_resync = self.full_resync();
        // the engine may still be starting
        scope
            .until_cancelled(self.sink.wait_ready())
            .await?
            .map_err(|status| commit_error(CommitOp::Update, &status, config))?;
        scope
            .until_cancelled(self.sink.update(config, full_resync))
            .await?
            .map_err(|status| commit_error(CommitOp::Update, &status, config))?;
        info!(
            "{}: committed (full resync: {full_resync})",
            request.connection.id
        );
        next.request(scope, request).await
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        if let Some(config) = scope.config() {
            scope
                .until_cancelled(self.sink.delete(config))
                .await?
                .map_err(|status| commit_error(CommitOp::Delete, &status, config))?;
            info!("{}: configuration removed", conn.id);
        }
        next.close(scope, conn).await
    }
}

/// Commit for client chains: once the peer has answered, the configuration built on the way
/// back is pushed as a plain update, on Close as well.
pub struct CommitClient<C: ?Sized> {
    sink: Arc<C>,
}

impl<C: Configurator + ?Sized> CommitClient<C> {
    pub fn new(sink: Arc<C>) -> Self {
        Self { sink }
    }

    async fn update(&self, scope: &CallScope) -> Result<(), ChainError> {
        let Some(config) = scope.config() else {
            return Ok(());
        };
        debug!("Committing client side configuration");
        scope
            .until_cancelled(self.sink.update(config, false))
            .await?
            .map_err(|status| commit_error(CommitOp::Update, &status, config))
    }
}

#[async_trait]
impl<C: Configurator + ?Sized + 'static> ChainElement for CommitClient<C> {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        let conn = next.request(scope, request).await?;
        self.update(scope).await?;
        Ok(conn)
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        next.close(scope, conn).await?;
        self.update(scope).await
    }
}
