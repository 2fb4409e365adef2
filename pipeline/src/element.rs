// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use api::{Connection, NetworkServiceRequest};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

use crate::errors::ChainError;
use crate::scope::CallScope;

/// A chain element: one interceptor of Request and Close calls.
///
/// An element does its part of the work and hands the call over to the rest of the chain
/// through `next`, exactly once, unless it fails before doing so. Whether the element works
/// before or after delegating is up to the element: server-side elements usually work on the
/// way in, client-side ones on the way back, when the peer has filled in the connection.
///
/// Elements only append to the lists of the configuration in the [`CallScope`], or patch the
/// last entry of a list, so that later elements find what earlier ones added by position.
#[async_trait]
pub trait ChainElement: Any + Send + Sync {
    /// Handle a Request. Returns the connection as established by the rest of the chain.
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError>;

    /// Handle a Close
    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError>;
}

/// The rest of a chain, from the point of view of the element running.
///
/// Nested chains resume the outer chain when they run out of stages. Past the last stage of
/// the outermost chain, a Request returns the connection of the request and a Close succeeds.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn ChainElement>],
    then: Option<&'a Next<'a>>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(stages: &'a [Arc<dyn ChainElement>], then: Option<&'a Next<'a>>) -> Self {
        Self { stages, then }
    }

    /// The end of the chain
    #[must_use]
    pub fn tail() -> Next<'static> {
        Next {
            stages: &[],
            then: None,
        }
    }

    // the first level with stages left, if any
    fn resume(self) -> Option<(&'a Arc<dyn ChainElement>, Next<'a>)> {
        let mut next = self;
        loop {
            if let Some((stage, rest)) = next.stages.split_first() {
                return Some((stage, Next::new(rest, next.then)));
            }
            next = *next.then?;
        }
    }

    /// Hand a Request to the rest of the chain
    pub async fn request(
        self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
    ) -> Result<Connection, ChainError> {
        match self.resume() {
            Some((stage, next)) => stage.request(scope, request, next).await,
            None => Ok(request.connection),
        }
    }

    /// Hand a Close to the rest of the chain
    pub async fn close(self, scope: &mut CallScope, conn: &Connection) -> Result<(), ChainError> {
        match self.resume() {
            Some((stage, next)) => stage.close(scope, conn, next).await,
            None => Ok(()),
        }
    }
}
