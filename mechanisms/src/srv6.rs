// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Segment routing over ipv6 between nodes.
//!
//! The traffic of the single local interface is steered into a policy carrying it to the sid of
//! the remote end, and traffic for our own local sid is decapsulated onto that interface.

use api::{Connection, Mechanism, MechanismClass, MechanismType, NetworkServiceRequest};
use async_trait::async_trait;
use config::vpp::SRV6_VRF;
use config::{
    DataplaneConfig, LocalSid, LocalSidFunction, Srv6Policy, Srv6SegmentList, Srv6Steering,
    Srv6Traffic, VppArpEntry, VppRoute, VppRouteKind, VrfTable,
};
use pipeline::{CallScope, ChainElement, ChainError, Next};
use tracing::debug;

/// Interface of the engine facing the other nodes
const UPLINK: &str = "mgmt";

/// Program the srv6 objects of `conn`. `connect` also adds the vrf, the route and the neighbor
/// entry towards the remote host, which closing leaves in place.
fn apply(config: &mut DataplaneConfig, conn: &Connection, connect: bool) -> Result<(), ChainError> {
    let Some(srv6) = conn.mechanism.as_ref().and_then(Mechanism::srv6) else {
        return Ok(());
    };
    let local = match config.vpp.interfaces.as_slice() {
        [iface] => iface.name.clone(),
        _ => {
            return Err(ChainError::Config(
                "failed to choose local interface for srv6 mechanism".to_owned(),
            ));
        }
    };
    let src_bsid = srv6.src_bsid()?;
    let dst_host_local_sid = srv6.dst_host_local_sid()?;

    config.vpp.srv6_localsids = vec![LocalSid {
        sid: srv6.src_local_sid()?.to_owned(),
        end_function: LocalSidFunction::EndDx2 {
            vlan_tag: u32::MAX,
            outgoing_interface: local.clone(),
        },
    }];
    config.vpp.srv6_policies = vec![Srv6Policy {
        bsid: src_bsid.to_owned(),
        segment_lists: vec![Srv6SegmentList {
            segments: vec![
                dst_host_local_sid.to_owned(),
                srv6.dst_local_sid()?.to_owned(),
            ],
            weight: 0,
        }],
        srh_encapsulation: true,
    }];
    config.vpp.srv6_steerings = vec![Srv6Steering {
        name: conn.id.clone(),
        policy_bsid: src_bsid.to_owned(),
        traffic: Srv6Traffic::L2 {
            interface_name: local.clone(),
        },
    }];
    debug!("{}: srv6 steering of {local} through {src_bsid}", conn.id);

    if connect {
        let hardware_address = srv6.dst_hardware_address()?;
        config.vpp.vrfs = vec![VrfTable {
            id: SRV6_VRF,
            ipv6: true,
            label: "SRv6 steering of IP6 prefixes through BSIDs".to_owned(),
        }];
        config.vpp.routes.push(VppRoute {
            kind: VppRouteKind::InterVrf,
            dst_network: format!("{dst_host_local_sid}/128"),
            outgoing_interface: UPLINK.to_owned(),
            next_hop_addr: dst_host_local_sid.to_owned(),
            weight: 1,
            ..VppRoute::default()
        });
        config.vpp.arps.push(VppArpEntry {
            interface: UPLINK.to_owned(),
            ip_address: dst_host_local_sid.to_owned(),
            phys_address: hardware_address.to_owned(),
            is_static: true,
        });
    }
    Ok(())
}

/// Requests an srv6 connection and programs it once the peer has filled in its sids
pub struct Srv6Client;

#[async_trait]
impl ChainElement for Srv6Client {
    async fn request(
        &self,
        scope: &mut CallScope,
        mut request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        request
            .mechanism_preferences
            .push(Mechanism::new(MechanismClass::Remote, MechanismType::Srv6));
        let conn = next.request(scope, request).await?;
        if let Some(config) = scope.config_mut() {
            apply(config, &conn, true)?;
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
            apply(config, conn, false)?;
        }
        Ok(())
    }
}

/// Programs the srv6 connection offered by the requester
pub struct Srv6Server;

#[async_trait]
impl ChainElement for Srv6Server {
    async fn request(
        &self,
        scope: &mut CallScope,
        request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        if let Some(config) = scope.config_mut() {
            apply(config, &request.connection, true)?;
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
            apply(config, conn, false)?;
        }
        next.close(scope, conn).await
    }
}
