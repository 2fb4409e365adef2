// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use api::{Connection, NetworkServiceRequest};
use async_trait::async_trait;
use pipeline::{CallScope, ChainElement, ChainError, Next};

/// First element of a chain committing to the engine: gives the call an empty configuration for
/// the rest of the chain to fill in. A configuration already attached is kept.
pub struct FreshConfig;

#[async_trait]
impl ChainElement for FreshConfig {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        scope.ensure_config();
        next.request(scope, request).await
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        scope.ensure_config();
        next.close(scope, conn).await
    }
}
