// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use api::{Connection, NetworkServiceRequest};
use config::DataplaneConfig;
use pipeline::{CallScope, ChainError, Next};

/// Where an applier sits in a call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Applies with the connection the peer returned, on Request and Close
    Client,
    /// Applies with the connection received, before the call goes on
    Server,
}

/// Copies part of the context of a connection into the configuration under construction
pub trait ContextApplier: Send + Sync {
    const SIDE: Side;

    fn apply(&self, config: &mut DataplaneConfig, conn: &Connection);
}

fn apply<A: ContextApplier>(applier: &A, scope: &mut CallScope, conn: &Connection) {
    if let Some(config) = scope.config_mut() {
        applier.apply(config, conn);
    }
}

pub(crate) async fn request<A: ContextApplier>(
    applier: &A,
    scope: &mut CallScope,
    request: NetworkServiceRequest,
    next: Next<'_>,
) -> Result<Connection, ChainError> {
    match A::SIDE {
        Side::Server => {
            apply(applier, scope, &request.connection);
            next.request(scope, request).await
        }
        Side::Client => {
            let conn = next.request(scope, request).await?;
            apply(applier, scope, &conn);
            Ok(conn)
        }
    }
}

pub(crate) async fn close<A: ContextApplier>(
    applier: &A,
    scope: &mut CallScope,
    conn: &Connection,
    next: Next<'_>,
) -> Result<(), ChainError> {
    match A::SIDE {
        Side::Server => {
            apply(applier, scope, conn);
            next.close(scope, conn).await
        }
        Side::Client => {
            next.close(scope, conn).await?;
            apply(applier, scope, conn);
            Ok(())
        }
    }
}

/// Make chain elements of context appliers
macro_rules! chain_elements {
    ($($applier:ty),+ $(,)?) => {$(
        #[async_trait::async_trait]
        impl pipeline::ChainElement for $applier {
            async fn request(
                &self,
                scope: &mut pipeline::CallScope,
                request: api::NetworkServiceRequest,
                next: pipeline::Next<'_>,
            ) -> Result<api::Connection, pipeline::ChainError> {
                $crate::apply::request(self, scope, request, next).await
            }

            async fn close(
                &self,
                scope: &mut pipeline::CallScope,
                conn: &api::Connection,
                next: pipeline::Next<'_>,
            ) -> Result<(), pipeline::ChainError> {
                $crate::apply::close(self, scope, conn, next).await
            }
        }
    )+};
}

pub(crate) use chain_elements;
