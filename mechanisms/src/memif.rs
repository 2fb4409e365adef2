// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Memif (shared memory packet interface) mechanism

use api::{Connection, Mechanism, MechanismClass, MechanismType, NetworkServiceRequest};
use async_trait::async_trait;
use config::{DataplaneConfig, VppInterface, VppLink};
use pipeline::{CallScope, ChainElement, ChainError, Next};
use std::path::PathBuf;
use tracing::debug;

use crate::{client_name, server_name};

/// Requests a memif from the next hop. Vpp is the slave of the memif, on the socket the peer
/// tells.
pub struct MemifClient;

impl MemifClient {
    fn append(config: &mut DataplaneConfig, conn: &Connection) -> Result<(), ChainError> {
        let Some(memif) = conn.mechanism.as_ref().and_then(Mechanism::memif) else {
            return Ok(());
        };
        let socket = memif.socket_file_url()?;
        let name = client_name(conn);
        debug!("{}: memif {name} (slave) on {socket}", conn.id);
        config.vpp.interfaces.push(VppInterface::new(
            name,
            VppLink::Memif {
                master: false,
                socket_filename: socket.path().to_owned(),
            },
        ));
        Ok(())
    }
}

#[async_trait]
impl ChainElement for MemifClient {
    async fn request(
        &self,
        scope: &mut CallScope,
        mut request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        request
            .mechanism_preferences
            .push(Mechanism::new(MechanismClass::Local, MechanismType::Memif));
        let conn = next.request(scope, request).await?;
        if let Some(config) = scope.config_mut() {
            Self::append(config, &conn)?;
        }
        Ok(conn)
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        next.close(scope, conn).await?;
        if let Some(config) = scope.config_mut() {
            Self::append(config, conn)?;
        }
        Ok(())
    }
}

/// Provides the memif asked for by the requester. Vpp is the master, with its socket under
/// `base_dir`.
pub struct MemifServer {
    base_dir: PathBuf,
}

impl MemifServer {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn append(&self, config: &mut DataplaneConfig, conn: &Connection) -> Result<(), ChainError> {
        let Some(memif) = conn.mechanism.as_ref().and_then(Mechanism::memif) else {
            return Ok(());
        };
        let socket = self.base_dir.join(memif.socket_filename()?);
        let name = server_name(conn);
        debug!("{}: memif {name} (master) on {}", conn.id, socket.display());
        config.vpp.interfaces.push(VppInterface::new(
            name,
            VppLink::Memif {
                master: true,
                socket_filename: socket.display().to_string(),
            },
        ));
        Ok(())
    }
}

#[async_trait]
impl ChainElement for MemifServer {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        if let Some(config) = scope.config_mut() {
            self.append(config, &request.connection)?;
        }
        next.request(scope, request).await
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        if let Some(config) = scope.config_mut() {
            self.append(config, conn)?;
        }
        next.close(scope, conn).await
    }
}
