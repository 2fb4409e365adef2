// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use api::{Connection, NetworkServiceRequest};
use async_trait::async_trait;
use config::{BridgeDomain, BridgeDomainInterface};
use pipeline::{CallScope, ChainElement, ChainError, Next};
use tracing::debug;

/// Puts the last vpp interface in the bridge domain `name`. The bridge learns and forwards, but
/// does not flood.
pub struct BridgeServer {
    name: String,
}

impl BridgeServer {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn append(&self, scope: &mut CallScope) {
        let Some(config) = scope.config_mut() else {
            return;
        };
        let Some(iface) = config.vpp.last_interface().map(|i| i.name.clone()) else {
            return;
        };
        debug!("Bridging {iface} in {}", self.name);
        config.vpp.bridge_domains.push(BridgeDomain {
            name: self.name.clone(),
            flood: false,
            unknown_unicast_flood: false,
            forward: true,
            learn: true,
            arp_termination: false,
            interfaces: vec![BridgeDomainInterface {
                name: iface,
                bridged_virtual_interface: false,
            }],
        });
    }
}

#[async_trait]
impl ChainElement for BridgeServer {
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

#[cfg(test)]
mod test {
    use api::{Connection, NetworkServiceRequest};
    use config::{BridgeDomain, BridgeDomainInterface};
    use pipeline::sample_elements::AppendVppInterface;
    use pipeline::{CallScope, Chain};
    use pretty_assertions::assert_eq;

    use super::BridgeServer;

    #[tokio::test]
    async fn last_interface_goes_in_the_bridge() {
        let chain = Chain::new()
            .add_stage(AppendVppInterface::tap("a"))
            .add_stage(AppendVppInterface::tap("server-c1"))
            .add_stage(BridgeServer::new("bd0"));
        let mut scope = CallScope::new();
        scope.ensure_config();
        chain
            .run_request(&mut scope, NetworkServiceRequest::new(Connection::new("c1", "ns")))
            .await
            .unwrap();
        assert_eq!(
            scope.config().unwrap().vpp.bridge_domains,
            vec![BridgeDomain {
                name: "bd0".to_owned(),
                forward: true,
                learn: true,
                interfaces: vec![BridgeDomainInterface {
                    name: "server-c1".to_owned(),
                    bridged_virtual_interface: false,
                }],
                ..BridgeDomain::default()
            }]
        );
    }

    #[tokio::test]
    async fn no_interface_no_bridge() {
        let chain = Chain::new().add_stage(BridgeServer::new("bd0"));
        let mut scope = CallScope::new();
        scope.ensure_config();
        chain
            .run_close(&mut scope, &Connection::new("c1", "ns"))
            .await
            .unwrap();
        assert!(scope.config().unwrap().vpp.bridge_domains.is_empty());
    }
}
