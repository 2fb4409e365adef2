// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The aggregate configuration built for one Request or Close call

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ConfigResult;
use crate::linux::LinuxConfig;
use crate::netalloc::NetallocConfig;
use crate::vpp::VppConfig;

/// Interfaces the engine always has, whether or not a config names them
pub const ENGINE_INTERFACES: &[&str] = &["mgmt"];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataplaneConfig {
    pub vpp: VppConfig,
    pub linux: LinuxConfig,
    pub netalloc: NetallocConfig,
}

/// Insert the elements of `from` missing in `into`, keeping the order of both
fn union<T: PartialEq + Clone>(into: &mut Vec<T>, from: &[T]) {
    for item in from {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

fn subtract<T: PartialEq>(from: &mut Vec<T>, what: &[T]) {
    from.retain(|item| !what.contains(item));
}

macro_rules! for_each_list {
    ($op:ident, $dst:expr, $src:expr) => {
        $op(&mut $dst.vpp.routes, &$src.vpp.routes);
        $op(&mut $dst.vpp.arps, &$src.vpp.arps);
        $op(&mut $dst.vpp.xconnect_pairs, &$src.vpp.xconnect_pairs);
        $op(&mut $dst.vpp.acls, &$src.vpp.acls);
        $op(&mut $dst.vpp.bridge_domains, &$src.vpp.bridge_domains);
        $op(&mut $dst.vpp.vrfs, &$src.vpp.vrfs);
        $op(&mut $dst.vpp.srv6_localsids, &$src.vpp.srv6_localsids);
        $op(&mut $dst.vpp.srv6_policies, &$src.vpp.srv6_policies);
        $op(&mut $dst.vpp.srv6_steerings, &$src.vpp.srv6_steerings);
        $op(&mut $dst.linux.routes, &$src.linux.routes);
        $op(&mut $dst.linux.arp_entries, &$src.linux.arp_entries);
        $op(&mut $dst.netalloc.ip_addresses, &$src.netalloc.ip_addresses);
    };
}

impl DataplaneConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validate the configuration as the engine would before applying it
    pub fn validate(&self) -> ConfigResult {
        debug!("Validating dataplane configuration...");
        self.vpp.validate(ENGINE_INTERFACES)?;
        self.linux.validate()?;
        self.netalloc.validate()
    }

    /// Apply `other` on top of this config. Interfaces are keyed by name and replaced, the
    /// rest of the objects are added unless already present.
    pub fn merge(&mut self, other: &DataplaneConfig) {
        for iface in &other.vpp.interfaces {
            match self.vpp.interfaces.iter_mut().find(|i| i.name == iface.name) {
                Some(existing) => *existing = iface.clone(),
                None => self.vpp.interfaces.push(iface.clone()),
            }
        }
        for iface in &other.linux.interfaces {
            match self
                .linux
                .interfaces
                .iter_mut()
                .find(|i| i.name == iface.name)
            {
                Some(existing) => *existing = iface.clone(),
                None => self.linux.interfaces.push(iface.clone()),
            }
        }
        for_each_list!(union, self, other);
    }

    /// Remove whatever `other` names from this config. Interfaces go by name.
    pub fn remove(&mut self, other: &DataplaneConfig) {
        self.vpp
            .interfaces
            .retain(|i| !other.vpp.interfaces.iter().any(|o| o.name == i.name));
        self.linux
            .interfaces
            .retain(|i| !other.linux.interfaces.iter().any(|o| o.name == i.name));
        for_each_list!(subtract, self, other);
    }
}
