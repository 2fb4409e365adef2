// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use api::{Connection, Mechanism, NetworkServiceRequest};
use async_trait::async_trait;
use mgmt::Configurator;
use pipeline::{CallScope, ChainElement, ChainError, Next};
use std::sync::Arc;
use tracing::{debug, error};

/// Tells the requester the mac address the kernel gave to the interface of a kernel connection.
///
/// The address is only known once the engine created the interface, so the engine state is
/// dumped after the rest of the chain, commit included, has succeeded.
pub struct GetMacServer<C: ?Sized> {
    sink: Arc<C>,
}

impl<C: Configurator + ?Sized> GetMacServer<C> {
    pub fn new(sink: Arc<C>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl<C: Configurator + ?Sized + 'static> ChainElement for GetMacServer<C> {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        let iface = request
            .connection
            .mechanism
            .as_ref()
            .and_then(Mechanism::kernel)
            .and_then(|_| scope.config())
            .and_then(|config| config.linux.last_interface())
            .map(|iface| iface.name.clone());
        let mut conn = next.request(scope, request).await?;
        let Some(iface) = iface else {
            return Ok(conn);
        };
        let state = match self.sink.dump().await {
            Ok(state) => state,
            Err(status) => {
                error!("{}: failed to dump engine state: {status}", conn.id);
                return Ok(conn);
            }
        };
        if let Some(found) = state.linux.interfaces.iter().find(|i| i.name == iface) {
            debug!("{}: {iface} has mac address {}", conn.id, found.phys_address);
            conn.context.ethernet.dst_mac.clone_from(&found.phys_address);
        }
        Ok(conn)
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
