// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::net::Ipv6Addr;

use super::{Mechanism, MechanismError};

/// Segment routing over ipv6
#[derive(Clone, Copy, Debug)]
pub struct Srv6Mechanism<'a>(pub(super) &'a Mechanism);

impl<'a> Srv6Mechanism<'a> {
    // sids are ipv6 addresses
    fn sid(&self, param: &'static str) -> Result<&'a str, MechanismError> {
        let value = self.0.required(param)?;
        value
            .parse::<Ipv6Addr>()
            .map_err(|e| self.0.invalid(param, value, e))?;
        Ok(value)
    }

    pub const SRC_HOST_LOCAL_SID: &'static str = "srcHostLocalSID";
    pub const DST_HOST_LOCAL_SID: &'static str = "dstHostLocalSID";
    pub const SRC_BSID: &'static str = "srcBSID";
    pub const DST_BSID: &'static str = "dstBSID";
    pub const SRC_LOCAL_SID: &'static str = "srcLocalSID";
    pub const DST_LOCAL_SID: &'static str = "dstLocalSID";

    pub fn src_host_local_sid(&self) -> Result<&'a str, MechanismError> {
        self.sid(Self::SRC_HOST_LOCAL_SID)
    }

    /// Sid of the node hosting the serving side
    pub fn dst_host_local_sid(&self) -> Result<&'a str, MechanismError> {
        self.sid(Self::DST_HOST_LOCAL_SID)
    }

    /// Binding sid of the policy steering the traffic of the requesting side
    pub fn src_bsid(&self) -> Result<&'a str, MechanismError> {
        self.sid(Self::SRC_BSID)
    }

    pub fn dst_bsid(&self) -> Result<&'a str, MechanismError> {
        self.sid(Self::DST_BSID)
    }

    pub fn src_local_sid(&self) -> Result<&'a str, MechanismError> {
        self.sid(Self::SRC_LOCAL_SID)
    }

    pub fn dst_local_sid(&self) -> Result<&'a str, MechanismError> {
        self.sid(Self::DST_LOCAL_SID)
    }

    pub const SRC_HARDWARE_ADDRESS: &'static str = "srcHardwareAddress";
    pub const DST_HARDWARE_ADDRESS: &'static str = "dstHardwareAddress";

    pub fn src_hardware_address(&self) -> Result<&'a str, MechanismError> {
        self.0.required(Self::SRC_HARDWARE_ADDRESS)
    }

    /// MAC of the node hosting the serving side, for the static neighbor entry
    pub fn dst_hardware_address(&self) -> Result<&'a str, MechanismError> {
        self.0.required(Self::DST_HARDWARE_ADDRESS)
    }
}
