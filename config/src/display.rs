// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Display of model objects

use std::fmt::{Display, Formatter, Result};

use crate::dataplane::DataplaneConfig;
use crate::linux::{LinuxInterface, LinuxLink};
use crate::vpp::{VppInterface, VppLink};

impl Display for VppLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            VppLink::Memif {
                master,
                socket_filename,
            } => {
                let role = if *master { "master" } else { "slave" };
                write!(f, "memif({role} {socket_filename})")
            }
            VppLink::Tap { version } => write!(f, "tap(v{version})"),
            VppLink::AfPacket { host_if_name } => write!(f, "af-packet({host_if_name})"),
            VppLink::Vxlan {
                src_address,
                dst_address,
                vni,
            } => write!(f, "vxlan({src_address}->{dst_address} vni {vni})"),
        }
    }
}

impl Display for VppInterface {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{} {}", self.name, self.link)?;
        if !self.ip_addresses.is_empty() {
            write!(f, " {}", self.ip_addresses.join(","))?;
        }
        Ok(())
    }
}

impl Display for LinuxInterface {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let kind = match &self.link {
            LinuxLink::TapToVpp { .. } => "tap",
            LinuxLink::Veth { .. } => "veth",
        };
        write!(f, "{} {kind}({})", self.name, self.host_if_name)?;
        if let Some(ns) = &self.namespace {
            write!(f, " ns {}", ns.path)?;
        }
        if !self.ip_addresses.is_empty() {
            write!(f, " {}", self.ip_addresses.join(","))?;
        }
        Ok(())
    }
}

// writes ", <n> <what>" when there is something to count
fn count(f: &mut Formatter<'_>, n: usize, what: &str) -> Result {
    if n > 0 { write!(f, ", {n} {what}") } else { Ok(()) }
}

/// Compact, single-line summary
impl Display for DataplaneConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let vpp = &self.vpp;
        write!(f, "vpp: [")?;
        for (n, iface) in vpp.interfaces.iter().enumerate() {
            let sep = if n == 0 { "" } else { "; " };
            write!(f, "{sep}{iface}")?;
        }
        write!(f, "]")?;
        count(f, vpp.xconnect_pairs.len(), "xconnects")?;
        count(f, vpp.routes.len(), "routes")?;
        count(f, vpp.arps.len(), "arps")?;
        count(f, vpp.acls.len(), "acls")?;
        count(f, vpp.bridge_domains.len(), "bridge-domains")?;
        count(f, vpp.vrfs.len(), "vrfs")?;
        count(f, vpp.srv6_localsids.len(), "localsids")?;
        count(f, vpp.srv6_policies.len(), "policies")?;
        count(f, vpp.srv6_steerings.len(), "steerings")?;

        let linux = &self.linux;
        write!(f, " linux: [")?;
        for (n, iface) in linux.interfaces.iter().enumerate() {
            let sep = if n == 0 { "" } else { "; " };
            write!(f, "{sep}{iface}")?;
        }
        write!(f, "]")?;
        count(f, linux.routes.len(), "routes")?;
        count(f, linux.arp_entries.len(), "arps")?;
        count(f, self.netalloc.ip_addresses.len(), "allocations")
    }
}
