// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use api::{Connection, Mechanism, MechanismClass, MechanismType, NetworkServiceRequest};
use async_trait::async_trait;
use config::{DataplaneConfig, LinuxInterface, LinuxLink, VppInterface, VppLink};
use pipeline::{CallScope, ChainElement, ChainError, Next};
use tracing::debug;

use super::namespace;
use crate::{client_name, server_name};

/// Append a vpp tap interface named `name` and its kernel end, in the namespace of the kernel
/// mechanism of `conn`. Nothing to do for other mechanisms.
fn append_tap(
    config: &mut DataplaneConfig,
    conn: &Connection,
    name: &str,
) -> Result<(), ChainError> {
    let Some(kernel) = conn.mechanism.as_ref().and_then(Mechanism::kernel) else {
        return Ok(());
    };
    let namespace = namespace(&kernel)?;
    let host_if_name = kernel.interface_name(conn);
    debug!("{}: tap {name} as {host_if_name} in {}", conn.id, namespace.path);
    config
        .vpp
        .interfaces
        .push(VppInterface::new(name, VppLink::Tap { version: 2 }));
    config.linux.interfaces.push(LinuxInterface::new(
        name,
        host_if_name,
        Some(namespace),
        LinuxLink::TapToVpp {
            vpp_tap_if_name: name.to_owned(),
        },
    ));
    Ok(())
}

/// Requests a kernel interface from the next hop and provides it with a vpp tap
pub struct KernelTapClient;

#[async_trait]
impl ChainElement for KernelTapClient {
    async fn request(
        &self,
        scope: &mut CallScope,
        mut request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        request
            .mechanism_preferences
            .push(Mechanism::new(MechanismClass::Local, MechanismType::Kernel));
        let conn = next.request(scope, request).await?;
        if let Some(config) = scope.config_mut() {
            append_tap(config, &conn, &client_name(&conn))?;
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
            append_tap(config, conn, &client_name(conn))?;
        }
        Ok(())
    }
}

/// Provides the kernel interface asked for by the requester with a vpp tap
pub struct KernelTapServer;

#[async_trait]
impl ChainElement for KernelTapServer {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        if let Some(config) = scope.config_mut() {
            let conn = &request.connection;
            append_tap(config, conn, &server_name(conn))?;
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
            append_tap(config, conn, &server_name(conn))?;
        }
        next.close(scope, conn).await
    }
}

#[cfg(test)]
mod test {
    use api::{
        Connection, KernelMechanism, Mechanism, MechanismClass, MechanismType,
        NetworkServiceRequest,
    };
    use config::{LinuxLink, NetNamespace, VppLink};
    use pipeline::sample_elements::SelectMechanism;
    use pipeline::{CallScope, Chain, ChainError};
    use pretty_assertions::assert_eq;

    use super::{KernelTapClient, KernelTapServer};

    fn kernel(netns: &str) -> Mechanism {
        Mechanism::new(MechanismClass::Local, MechanismType::Kernel)
            .with_parameter(KernelMechanism::NETNS_URL, netns)
            .with_parameter(KernelMechanism::INTERFACE_NAME, "nsm-1")
    }

    #[tokio::test]
    async fn client_appends_after_selection() {
        let chain = Chain::new()
            .add_stage(KernelTapClient)
            .add_stage(SelectMechanism(kernel("file:///proc/12/ns/net")));
        let mut scope = CallScope::new();
        scope.ensure_config();
        let request = NetworkServiceRequest::new(Connection::new("c1", "ns"));
        let conn = chain.run_request(&mut scope, request).await.unwrap();
        assert_eq!(conn.mechanism.unwrap().kind, MechanismType::Kernel);

        let config = scope.config().unwrap();
        assert_eq!(config.vpp.interfaces.len(), 1);
        assert_eq!(config.vpp.interfaces[0].name, "client-c1");
        assert_eq!(config.vpp.interfaces[0].link, VppLink::Tap { version: 2 });
        let linux = &config.linux.interfaces[0];
        assert_eq!(linux.host_if_name, "nsm-1");
        assert_eq!(
            linux.namespace,
            Some(NetNamespace {
                path: "/proc/12/ns/net".to_owned()
            })
        );
        assert_eq!(
            linux.link,
            LinuxLink::TapToVpp {
                vpp_tap_if_name: "client-c1".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn server_checks_the_netns_url() {
        let chain = Chain::new().add_stage(KernelTapServer);
        let mut scope = CallScope::new();
        scope.ensure_config();
        let mut conn = Connection::new("c1", "ns");
        conn.mechanism = Some(kernel("unix:///proc/12/ns/net"));
        let err = chain
            .run_request(&mut scope, NetworkServiceRequest::new(conn.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Mechanism(_)));
        assert!(scope.config().unwrap().is_empty());

        conn.mechanism = Some(kernel("file:///proc/12/ns/net"));
        chain.run_close(&mut scope, &conn).await.unwrap();
        assert_eq!(scope.config().unwrap().vpp.interfaces[0].name, "server-c1");
    }

    #[tokio::test]
    async fn other_mechanisms_are_ignored() {
        let chain = Chain::new().add_stage(KernelTapServer);
        let mut scope = CallScope::new();
        scope.ensure_config();
        let mut conn = Connection::new("c1", "ns");
        conn.mechanism = Some(Mechanism::new(MechanismClass::Local, MechanismType::Memif));
        chain
            .run_request(&mut scope, NetworkServiceRequest::new(conn))
            .await
            .unwrap();
        assert!(scope.config().unwrap().is_empty());
    }
}
