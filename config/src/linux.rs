// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration of the kernel side of the engine

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, ConfigResult};
use crate::netalloc::{validate_address, validate_mac, validate_network};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinuxConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<LinuxInterface>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<LinuxRoute>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arp_entries: Vec<LinuxArpEntry>,
}

/// Network namespace, referenced by the path of its file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetNamespace {
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinuxLink {
    TapToVpp {
        vpp_tap_if_name: String,
    },
    Veth {
        peer_if_name: String,
        rx_checksum_offloading: bool,
        tx_checksum_offloading: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxInterface {
    pub name: String,
    pub enabled: bool,
    pub host_if_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<NetNamespace>,
    pub link: LinuxLink,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phys_address: String,
}

impl LinuxInterface {
    /// An enabled interface with no addresses
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        host_if_name: impl Into<String>,
        namespace: Option<NetNamespace>,
        link: LinuxLink,
    ) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            host_if_name: host_if_name.into(),
            namespace,
            link,
            ip_addresses: vec![],
            phys_address: String::new(),
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
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinuxRouteScope {
    #[default]
    Global,
    Link,
    Host,
    Nowhere,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinuxRoute {
    pub dst_network: String,
    pub outgoing_interface: String,
    pub scope: LinuxRouteScope,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gw_addr: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinuxArpEntry {
    pub interface: String,
    pub ip_address: String,
    pub hw_address: String,
}

impl LinuxConfig {
    #[must_use]
    pub fn first_interface(&self) -> Option<&LinuxInterface> {
        self.interfaces.first()
    }

    #[must_use]
    pub fn last_interface(&self) -> Option<&LinuxInterface> {
        self.interfaces.last()
    }

    pub fn last_interface_mut(&mut self) -> Option<&mut LinuxInterface> {
        self.interfaces.last_mut()
    }

    pub fn validate(&self) -> ConfigResult {
        for (n, iface) in self.interfaces.iter().enumerate() {
            iface.validate()?;
            if self.interfaces[..n].iter().any(|i| i.name == iface.name) {
                return Err(ConfigError::DuplicateInterface(iface.name.clone()));
            }
        }
        let known = |what: &'static str, name: &str| {
            if self.interfaces.iter().any(|i| i.name == name) {
                Ok(())
            } else {
                Err(ConfigError::NoSuchInterface(what, name.to_owned()))
            }
        };
        for route in &self.routes {
            validate_network(&route.dst_network)?;
            known("linux-route", &route.outgoing_interface)?;
        }
        for arp in &self.arp_entries {
            known("linux-arp", &arp.interface)?;
            validate_mac(&arp.hw_address)?;
        }
        Ok(())
    }
}
