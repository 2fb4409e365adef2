// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use api::{
    Connection, ConnectionContext, IpContext, KernelMechanism, Mechanism, MechanismClass,
    MechanismType, MemifMechanism, NetworkServiceRequest, VxlanMechanism,
};
use config::{DataplaneConfig, VppLink, XConnectPair};
use forwarder_chains::{
    CONNECT_STAGE, Connect, LoopbackPeer, XconnectParamsBuilder, xconnect_ns,
};
use mgmt::{EngineCall, InterfaceCounters, InterfaceStats, MemoryConfigurator};
use nix::sys::socket::{
    AddressFamily, Backlog, SockFlag, SockType, UnixAddr, bind, connect, listen, socket,
};
use pipeline::{CallScope, Chain};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const TUNNEL_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1));

fn chain(
    dir: &Path,
    engine: &Arc<MemoryConfigurator>,
    peer: LoopbackPeer,
    metrics: bool,
) -> Chain {
    let params = XconnectParamsBuilder::default()
        .name("fwd")
        .base_dir(dir)
        .tunnel_ip(TUNNEL_IP)
        .vhost_net(dir.join("vhost-net"))
        .metrics(metrics)
        .engine(engine.clone())
        .peer(Arc::new(peer))
        .build()
        .unwrap();
    xconnect_ns(params).unwrap()
}

fn committed(engine: &MemoryConfigurator) -> Vec<(DataplaneConfig, bool)> {
    engine
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            EngineCall::Update {
                config,
                full_resync,
            } => Some((config, full_resync)),
            EngineCall::Delete(_) => None,
        })
        .collect()
}

fn seqpacket() -> OwnedFd {
    socket(
        AddressFamily::Unix,
        SockType::SeqPacket,
        SockFlag::SOCK_CLOEXEC,
        None,
    )
    .unwrap()
}

fn kernel_request(id: &str) -> NetworkServiceRequest {
    let mut conn = Connection::new(id, "secure-intranet");
    conn.mechanism = Some(
        Mechanism::new(MechanismClass::Local, MechanismType::Kernel)
            .with_parameter(KernelMechanism::NETNS_URL, "file:///var/run/netns/nsc")
            .with_parameter(KernelMechanism::INTERFACE_NAME, "nsm0"),
    );
    conn.context = ConnectionContext {
        ip: IpContext {
            src_ip_addr: "10.0.0.1/30".to_owned(),
            dst_ip_addr: "10.0.0.2/30".to_owned(),
            ..IpContext::default()
        },
        ..ConnectionContext::default()
    };
    NetworkServiceRequest::new(conn)
}

fn vxlan_peer() -> LoopbackPeer {
    LoopbackPeer::new().with_mechanism(
        Mechanism::new(MechanismClass::Remote, MechanismType::Vxlan)
            .with_parameter(VxlanMechanism::DST_IP, "192.168.0.2")
            .with_parameter(VxlanMechanism::VNI, "42"),
    )
}

#[tokio::test]
async fn memif_to_memif_goes_direct() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(MemoryConfigurator::new());
    let target = dir.path().join("target.sock");
    let endpoint = seqpacket();
    bind(endpoint.as_raw_fd(), &UnixAddr::new(&target).unwrap()).unwrap();
    listen(&endpoint, Backlog::new(1).unwrap()).unwrap();
    let peer = LoopbackPeer::new().with_mechanism(
        Mechanism::new(MechanismClass::Local, MechanismType::Memif).with_parameter(
            MemifMechanism::SOCKET_FILE_URL,
            format!("file://{}", target.display()),
        ),
    );
    let chain = chain(dir.path(), &engine, peer, false);

    let mut conn = Connection::new("c1", "memif-ns");
    conn.mechanism = Some(
        Mechanism::new(MechanismClass::Local, MechanismType::Memif)
            .with_parameter(MemifMechanism::SOCKET_FILENAME, "source.sock"),
    );
    let conn = chain
        .run_request(&mut CallScope::new(), NetworkServiceRequest::new(conn))
        .await
        .unwrap();

    // the engine is left out, a proxy serves the socket of the requester
    let commits = committed(&engine);
    assert_eq!(commits.len(), 1);
    let (config, full_resync) = &commits[0];
    assert!(full_resync);
    assert!(config.vpp.interfaces.is_empty());
    assert!(config.vpp.xconnect_pairs.is_empty());
    let source = dir.path().join("source.sock");
    assert!(source.exists());

    // memif peers use seqpacket sockets
    let requester = seqpacket();
    connect(requester.as_raw_fd(), &UnixAddr::new(&source).unwrap()).unwrap();

    chain.run_close(&mut CallScope::new(), &conn).await.unwrap();
    assert!(!source.exists());
    assert!(matches!(
        engine.calls().last(),
        Some(EngineCall::Delete(config)) if config.vpp.interfaces.is_empty()
    ));
}

#[tokio::test]
async fn kernel_to_vxlan() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(MemoryConfigurator::new());
    let chain = chain(dir.path(), &engine, vxlan_peer(), false);

    let conn = chain
        .run_request(&mut CallScope::new(), kernel_request("c2"))
        .await
        .unwrap();
    assert_eq!(conn.mechanism.unwrap().kind, MechanismType::Kernel);

    let commits = committed(&engine);
    let (config, _) = &commits[0];
    let vpp: Vec<_> = config.vpp.interfaces.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(vpp, vec!["server-c2", "c2"]);
    assert_eq!(
        config.vpp.interfaces[1].link,
        VppLink::Vxlan {
            src_address: "192.168.0.1".to_owned(),
            dst_address: "192.168.0.2".to_owned(),
            vni: 42,
        }
    );
    assert_eq!(
        config.vpp.xconnect_pairs,
        vec![
            XConnectPair::new("server-c2", "c2"),
            XConnectPair::new("c2", "server-c2")
        ]
    );

    // no vhost-net here, the requester gets one end of a veth pair
    let nsc = config.linux.last_interface().unwrap();
    assert_eq!(nsc.name, "server-c2");
    assert_eq!(nsc.host_if_name, "nsm0");
    assert_eq!(nsc.ip_addresses, vec!["10.0.0.2".to_owned()]);
}

#[tokio::test]
async fn only_the_first_commit_resyncs() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(MemoryConfigurator::new());
    let chain = chain(dir.path(), &engine, vxlan_peer(), false);
    for id in ["c1", "c2", "c3"] {
        chain
            .run_request(&mut CallScope::new(), kernel_request(id))
            .await
            .unwrap();
    }
    let resyncs: Vec<_> = committed(&engine).into_iter().map(|(_, full)| full).collect();
    assert_eq!(resyncs, vec![true, false, false]);
}

#[tokio::test]
async fn close_tears_down_both_sides() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(MemoryConfigurator::new());
    let peer = Arc::new(vxlan_peer());
    let params = XconnectParamsBuilder::default()
        .base_dir(dir.path())
        .tunnel_ip(TUNNEL_IP)
        .vhost_net(dir.path().join("vhost-net"))
        .metrics(false)
        .engine(engine.clone())
        .peer(peer.clone())
        .build()
        .unwrap();
    let chain = xconnect_ns(params).unwrap();

    let connect = chain.get_stage_by_id::<Connect>(&CONNECT_STAGE).unwrap();

    let conn = chain
        .run_request(&mut CallScope::new(), kernel_request("c4"))
        .await
        .unwrap();
    assert_eq!(connect.connections(), 1);
    chain.run_close(&mut CallScope::new(), &conn).await.unwrap();
    assert_eq!(connect.connections(), 0);

    assert_eq!(peer.closed(), vec!["c4".to_owned()]);
    let Some(EngineCall::Delete(deleted)) = engine.calls().pop() else {
        panic!("no delete");
    };
    let (added, _) = committed(&engine).remove(0);
    assert_eq!(deleted.vpp.interfaces, added.vpp.interfaces);
    assert_eq!(deleted.vpp.xconnect_pairs, added.vpp.xconnect_pairs);
    assert_eq!(deleted.linux.interfaces.len(), added.linux.interfaces.len());
}

#[tokio::test]
async fn acl_and_bridge_on_the_last_interface() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(MemoryConfigurator::new());
    let rules: BTreeMap<String, String> =
        [("allow-icmp".to_owned(), "action=permit,icmptype=8".to_owned())]
            .into_iter()
            .collect();
    let rules = xconnect::parse_acl_rules(&rules).unwrap();
    let params = XconnectParamsBuilder::default()
        .base_dir(dir.path())
        .tunnel_ip(TUNNEL_IP)
        .vhost_net(dir.path().join("vhost-net"))
        .acl_rules(rules)
        .bridge("bd0")
        .metrics(false)
        .engine(engine.clone())
        .peer(Arc::new(vxlan_peer()))
        .build()
        .unwrap();
    let chain = xconnect_ns(params).unwrap();
    chain
        .run_request(&mut CallScope::new(), kernel_request("c5"))
        .await
        .unwrap();

    // the interface added last is the one of the next hop
    let (config, _) = committed(&engine).remove(0);
    assert_eq!(config.vpp.acls[0].interfaces.ingress, vec!["c5".to_owned()]);
    assert_eq!(config.vpp.bridge_domains[0].name, "bd0");
    assert_eq!(config.vpp.bridge_domains[0].interfaces[0].name, "c5");
}

#[tokio::test(flavor = "multi_thread")]
async fn counters_land_on_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(MemoryConfigurator::new());
    let chain = Arc::new(chain(dir.path(), &engine, vxlan_peer(), true));

    let request = tokio::spawn({
        let chain = chain.clone();
        async move {
            chain
                .run_request(&mut CallScope::new(), kernel_request("c6"))
                .await
        }
    });
    while engine.pollers() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    engine.publish_stats(InterfaceStats {
        name: "server-c6".to_owned(),
        rx: InterfaceCounters {
            packets: 3,
            bytes: 300,
        },
        ..InterfaceStats::default()
    });

    let conn = request.await.unwrap().unwrap();
    assert_eq!(conn.path.index, 0);
    let segment = &conn.path.path_segments[0];
    assert_eq!(segment.name, "fwd");
    assert_eq!(segment.metrics["rx_bytes"], "300");
    assert_eq!(segment.metrics["rx_packets"], "3");
    assert_eq!(segment.metrics["tx_bytes"], "0");
}

#[tokio::test]
async fn engine_outage_fails_the_request() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(MemoryConfigurator::new());
    engine.fail_with(tonic::Code::Unavailable, "engine down");
    let chain = chain(dir.path(), &engine, vxlan_peer(), false);
    let err = chain
        .run_request(&mut CallScope::new(), kernel_request("c7"))
        .await
        .unwrap_err();
    let pipeline::ChainError::Commit { config, .. } = err else {
        panic!("not a commit error: {err}");
    };
    assert_eq!(config.vpp.interfaces.len(), 2);
}
