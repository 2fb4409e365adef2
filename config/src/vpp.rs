// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration of the vpp side of the engine

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::errors::{ConfigError, ConfigResult};
use crate::netalloc::{validate_address, validate_mac, validate_network};

/// Vrf used by srv6 to steer ip6 prefixes through binding sids
pub const SRV6_VRF: u32 = u32::MAX;

/// Highest valid vxlan network identifier (24 bits)
pub const MAX_VNI: u32 = (1 << 24) - 1;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VppConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<VppInterface>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<VppRoute>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arps: Vec<VppArpEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub xconnect_pairs: Vec<XConnectPair>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub acls: Vec<Acl>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bridge_domains: Vec<BridgeDomain>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vrfs: Vec<VrfTable>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub srv6_localsids: Vec<LocalSid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub srv6_policies: Vec<Srv6Policy>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub srv6_steerings: Vec<Srv6Steering>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VppLink {
    Memif {
        master: bool,
        socket_filename: String,
    },
    Tap {
        version: u32,
    },
    AfPacket {
        host_if_name: String,
    },
    Vxlan {
        src_address: String,
        dst_address: String,
        vni: u32,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VppInterface {
    pub name: String,
    pub enabled: bool,
    pub link: VppLink,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phys_address: String,
    #[serde(default)]
    pub vrf: u32,
}

impl VppInterface {
    /// An enabled interface with no addresses
    #[must_use]
    pub fn new(name: impl Into<String>, link: VppLink) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            link,
            ip_addresses: vec![],
            phys_address: String::new(),
            vrf: 0,
        }
    }

    #[must_use]
    pub fn is_memif(&self) -> bool {
        matches!(self.link, VppLink::Memif { .. })
    }

    /// Socket file of a memif interface
    #[must_use]
    pub fn memif_socket(&self) -> Option<&str> {
        match &self.link {
            VppLink::Memif {
                socket_filename, ..
            } => Some(socket_filename),
            _ => None,
        }
    }

    pub fn validate(&self) -> ConfigResult {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyInterfaceName);
        }
        self.ip_addresses
            .iter()
            .try_for_each(|a| validate_address(a))?;
        if !self.phys_address.is_empty() {
            validate_mac(&self.phys_address)?;
        }
        if let VppLink::Vxlan {
            src_address,
            dst_address,
            vni,
        } = &self.link
        {
            for addr in [src_address, dst_address] {
                addr.parse::<IpAddr>()
                    .map_err(|_| ConfigError::InvalidAddress(addr.clone()))?;
            }
            if *vni > MAX_VNI {
                return Err(ConfigError::InvalidVni(*vni));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VppRouteKind {
    #[default]
    IntraVrf,
    InterVrf,
    Drop,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VppRoute {
    pub kind: VppRouteKind,
    pub dst_network: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub outgoing_interface: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_hop_addr: String,
    pub vrf_id: u32,
    pub weight: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VppArpEntry {
    pub interface: String,
    pub ip_address: String,
    pub phys_address: String,
    #[serde(rename = "static")]
    pub is_static: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XConnectPair {
    pub receive_interface: String,
    pub transmit_interface: String,
}

impl XConnectPair {
    #[must_use]
    pub fn new(rx: impl Into<String>, tx: impl Into<String>) -> Self {
        Self {
            receive_interface: rx.into(),
            transmit_interface: tx.into(),
        }
    }

    #[must_use]
    pub fn names(&self, iface: &str) -> bool {
        self.receive_interface == iface || self.transmit_interface == iface
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclAction {
    #[default]
    Deny,
    Permit,
    Reflect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub lower: u16,
    pub upper: u16,
}

impl PortRange {
    pub const ANY: PortRange = PortRange {
        lower: 0,
        upper: u16::MAX,
    };
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpMatch {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_network: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub destination_network: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcmpMatch {
    pub icmpv6: bool,
    pub icmp_type: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMatch {
    pub source: PortRange,
    pub destination: PortRange,
}

/// L4 match of an acl rule. At most one protocol per rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpProtocol {
    Icmp(IcmpMatch),
    Tcp(PortMatch),
    Udp(PortMatch),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclRule {
    pub action: AclAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpMatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<IpProtocol>,
}

impl AclRule {
    pub fn validate(&self) -> ConfigResult {
        if let Some(ip) = &self.ip {
            for net in [&ip.source_network, &ip.destination_network] {
                if !net.is_empty() {
                    validate_network(net)?;
                }
            }
        }
        for proto in &self.protocols {
            if let IpProtocol::Tcp(ports) | IpProtocol::Udp(ports) = proto {
                for range in [ports.source, ports.destination] {
                    if range.lower > range.upper {
                        return Err(ConfigError::InvalidPortRange(range.lower, range.upper));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclInterfaces {
    pub ingress: Vec<String>,
    pub egress: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Acl {
    pub name: String,
    pub rules: Vec<AclRule>,
    pub interfaces: AclInterfaces,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeDomainInterface {
    pub name: String,
    #[serde(default)]
    pub bridged_virtual_interface: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeDomain {
    pub name: String,
    pub flood: bool,
    pub unknown_unicast_flood: bool,
    pub forward: bool,
    pub learn: bool,
    pub arp_termination: bool,
    pub interfaces: Vec<BridgeDomainInterface>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VrfTable {
    pub id: u32,
    pub ipv6: bool,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalSidFunction {
    /// Decapsulate and l2 cross-connect to an interface
    EndDx2 {
        vlan_tag: u32,
        outgoing_interface: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSid {
    pub sid: String,
    pub end_function: LocalSidFunction,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Srv6SegmentList {
    pub segments: Vec<String>,
    pub weight: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Srv6Policy {
    pub bsid: String,
    pub segment_lists: Vec<Srv6SegmentList>,
    pub srh_encapsulation: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Srv6Traffic {
    L2 { interface_name: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Srv6Steering {
    pub name: String,
    pub policy_bsid: String,
    pub traffic: Srv6Traffic,
}

impl VppConfig {
    /// The interface appended last, i.e. the one the element running now is about
    #[must_use]
    pub fn last_interface(&self) -> Option<&VppInterface> {
        self.interfaces.last()
    }

    pub fn last_interface_mut(&mut self) -> Option<&mut VppInterface> {
        self.interfaces.last_mut()
    }

    /// The last two interfaces appended, in append order
    #[must_use]
    pub fn last_two_interfaces(&self) -> Option<(&VppInterface, &VppInterface)> {
        match self.interfaces.as_slice() {
            [.., a, b] => Some((a, b)),
            _ => None,
        }
    }

    #[must_use]
    pub fn has_interface(&self, name: &str) -> bool {
        self.interfaces.iter().any(|i| i.name == name)
    }

    fn check_ref(&self, what: &'static str, name: &str, extra: &[&str]) -> ConfigResult {
        if self.has_interface(name) || extra.contains(&name) {
            Ok(())
        } else {
            Err(ConfigError::NoSuchInterface(what, name.to_owned()))
        }
    }

    /// Check the interface names are unique and the objects referring to interfaces refer to
    /// existing ones. `known` lists interfaces that the engine owns regardless of this config.
    pub fn validate(&self, known: &[&str]) -> ConfigResult {
        for (n, iface) in self.interfaces.iter().enumerate() {
            iface.validate()?;
            if self.interfaces[..n].iter().any(|i| i.name == iface.name) {
                return Err(ConfigError::DuplicateInterface(iface.name.clone()));
            }
        }
        for pair in &self.xconnect_pairs {
            self.check_ref("xconnect", &pair.receive_interface, known)?;
            self.check_ref("xconnect", &pair.transmit_interface, known)?;
        }
        for route in &self.routes {
            validate_network(&route.dst_network)?;
            if !route.outgoing_interface.is_empty() {
                self.check_ref("route", &route.outgoing_interface, known)?;
            }
        }
        for arp in &self.arps {
            self.check_ref("arp", &arp.interface, known)?;
            validate_mac(&arp.phys_address)?;
        }
        for acl in &self.acls {
            acl.rules.iter().try_for_each(AclRule::validate)?;
            for iface in acl.interfaces.ingress.iter().chain(&acl.interfaces.egress) {
                self.check_ref("acl", iface, known)?;
            }
        }
        for bd in &self.bridge_domains {
            for iface in &bd.interfaces {
                self.check_ref("bridge-domain", &iface.name, known)?;
            }
        }
        Ok(())
    }
}
