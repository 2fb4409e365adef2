// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Address allocations and address validation helpers

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::errors::{ConfigError, ConfigResult};

/// An address handed out to an interface, to be resolved by the engine
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpAllocation {
    pub network_name: String,
    pub interface_name: String,
    pub address: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gw: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetallocConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<IpAllocation>,
}

impl NetallocConfig {
    pub fn validate(&self) -> ConfigResult {
        self.ip_addresses
            .iter()
            .try_for_each(|a| validate_address(&a.address))
    }
}

/// Interface addresses are either `a.b.c.d/len` or a bare address
pub(crate) fn validate_address(addr: &str) -> ConfigResult {
    if addr.parse::<IpNet>().is_ok() || addr.parse::<IpAddr>().is_ok() {
        Ok(())
    } else {
        Err(ConfigError::InvalidAddress(addr.to_owned()))
    }
}

pub(crate) fn validate_network(net: &str) -> ConfigResult {
    net.parse::<IpNet>()
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidNetwork(net.to_owned()))
}

pub(crate) fn validate_mac(mac: &str) -> ConfigResult {
    let octets: Vec<&str> = mac.split(':').collect();
    let valid = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && u8::from_str_radix(o, 16).is_ok());
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidMac(mac.to_owned()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn address_forms() {
        assert!(validate_address("10.0.0.1/24").is_ok());
        assert!(validate_address("10.0.0.1").is_ok());
        assert!(validate_address("fd00::1/64").is_ok());
        assert!(validate_address("10.0.0.1/33").is_err());
        assert!(validate_network("10.0.0.0/8").is_ok());
        assert!(validate_network("10.0.0.1").is_err());
        assert!(validate_mac("0a:1B:2c:3d:4e:5f").is_ok());
        assert!(validate_mac("0a:1b:2c:3d:4e").is_err());
        assert!(validate_mac("0a:1b:2c:3d:4e:zz").is_err());
    }
}
