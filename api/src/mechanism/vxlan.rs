// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::net::IpAddr;

use super::{Mechanism, MechanismError};

/// Vxlan tunnel between two nodes
#[derive(Clone, Copy, Debug)]
pub struct VxlanMechanism<'a>(pub(super) &'a Mechanism);

impl VxlanMechanism<'_> {
    pub const SRC_IP: &'static str = "src_ip";
    pub const DST_IP: &'static str = "dst_ip";
    pub const VNI: &'static str = "vni";

    fn ip(&self, param: &'static str) -> Result<IpAddr, MechanismError> {
        let value = self.0.required(param)?;
        value
            .parse()
            .map_err(|e| self.0.invalid(param, value, e))
    }

    /// Tunnel address of the requesting side
    pub fn src_ip(&self) -> Result<IpAddr, MechanismError> {
        self.ip(Self::SRC_IP)
    }

    /// Tunnel address of the serving side
    pub fn dst_ip(&self) -> Result<IpAddr, MechanismError> {
        self.ip(Self::DST_IP)
    }

    /// The 24-bit vxlan network identifier
    pub fn vni(&self) -> Result<u32, MechanismError> {
        let value = self.0.required(Self::VNI)?;
        let vni: u32 = value
            .parse()
            .map_err(|e| self.0.invalid(Self::VNI, value, e))?;
        if vni >= 1 << 24 {
            return Err(self.0.invalid(Self::VNI, value, "exceeds 24 bits"));
        }
        Ok(vni)
    }
}
