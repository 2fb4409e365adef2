// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use api::{Connection, NetworkServiceRequest};
use async_trait::async_trait;
use id::Id;
use ordermap::OrderMap;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

use crate::element::{ChainElement, Next};
use crate::errors::{ChainError, PipelineError};
use crate::scope::CallScope;

/// A type that represents an Id for a stage of a [`Chain`]
pub type StageId = Id<dyn ChainElement>;

/// An ordered sequence of [`ChainElement`]s.
///
/// A chain is assembled once and then only read, so it can serve concurrent calls. A chain is
/// itself an element: a chain added as a stage of another runs its stages and then resumes the
/// outer chain.
#[derive(Default)]
pub struct Chain {
    stages: Vec<Arc<dyn ChainElement>>,
    ids: OrderMap<StageId, usize>,
}

impl Chain {
    /// Create an empty [`Chain`]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    #[must_use]
    pub fn add_stage<E: ChainElement>(mut self, element: E) -> Self {
        self.push(StageId::new(), Arc::new(element));
        self
    }

    /// Append a stage shared with other chains
    #[must_use]
    pub fn add_shared_stage(mut self, element: Arc<dyn ChainElement>) -> Self {
        self.push(StageId::new(), element);
        self
    }

    /// Append a stage under a given id, to retrieve it later with [`Chain::get_stage_by_id`]
    pub fn add_stage_with_id<E: ChainElement>(
        &mut self,
        id: StageId,
        element: E,
    ) -> Result<&mut Self, PipelineError> {
        if self.ids.contains_key(&id) {
            return Err(PipelineError::DuplicateStageId(id.to_string()));
        }
        self.push(id, Arc::new(element));
        Ok(self)
    }

    fn push(&mut self, id: StageId, element: Arc<dyn ChainElement>) {
        self.ids.insert(id, self.stages.len());
        self.stages.push(element);
    }

    /// Get a stage by id, if it has type `T`
    #[must_use]
    pub fn get_stage_by_id<T: ChainElement>(&self, id: &StageId) -> Option<&T> {
        let index = *self.ids.get(id)?;
        let stage: &dyn ChainElement = &*self.stages[index];
        (stage as &dyn Any).downcast_ref::<T>()
    }

    /// Number of stages
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Tell if the chain has no stages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run a Request through the chain
    pub async fn run_request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
    ) -> Result<Connection, ChainError> {
        debug!("Request for connection {}", request.connection.id);
        Next::new(&self.stages, None).request(scope, request).await
    }

    /// Run a Close through the chain
    pub async fn run_close(&self, scope: &mut CallScope, conn: &Connection) -> Result<(), ChainError> {
        debug!("Close of connection {}", conn.id);
        Next::new(&self.stages, None).close(scope, conn).await
    }
}

#[async_trait]
impl ChainElement for Chain {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        Next::new(&self.stages, Some(&next))
            .request(scope, request)
            .await
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        Next::new(&self.stages, Some(&next)).close(scope, conn).await
    }
}
