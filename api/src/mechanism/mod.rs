// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mechanisms: how the data path of a connection is realized.
//!
//! A [`Mechanism`] is a type plus a bag of string parameters. The typed views ([`KernelMechanism`]
//! and friends) read and check those parameters on demand, so a malformed parameter is only an
//! error for whoever handles that type of mechanism.

mod kernel;
mod memif;
mod srv6;
mod vxlan;

pub use kernel::KernelMechanism;
pub use memif::MemifMechanism;
pub use srv6::Srv6Mechanism;
pub use vxlan::VxlanMechanism;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use thiserror::Error;

use crate::url::{FileUrl, UrlError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MechanismClass {
    /// Both sides on the same node
    #[default]
    Local,
    Remote,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MechanismType {
    Kernel,
    Memif,
    Vxlan,
    Srv6,
}

impl Display for MechanismType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MechanismType::Kernel => "KERNEL_INTERFACE",
            MechanismType::Memif => "MEMIF",
            MechanismType::Vxlan => "VXLAN",
            MechanismType::Srv6 => "SRV6",
        };
        write!(f, "{name}")
    }
}

/// Errors reading the parameters of a mechanism
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MechanismError {
    #[error("{kind} mechanism lacks parameter '{param}'")]
    Missing {
        kind: MechanismType,
        param: &'static str,
    },
    #[error("{kind} mechanism has invalid '{param}' '{value}': {reason}")]
    Invalid {
        kind: MechanismType,
        param: &'static str,
        value: String,
        reason: String,
    },
    #[error("{kind} mechanism has bad '{param}': {source}")]
    Url {
        kind: MechanismType,
        param: &'static str,
        source: UrlError,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mechanism {
    #[serde(default)]
    pub cls: MechanismClass,
    pub kind: MechanismType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

impl Mechanism {
    #[must_use]
    pub fn new(cls: MechanismClass, kind: MechanismType) -> Self {
        Self {
            cls,
            kind,
            parameters: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn set_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn kernel(&self) -> Option<KernelMechanism<'_>> {
        (self.kind == MechanismType::Kernel).then_some(KernelMechanism(self))
    }

    #[must_use]
    pub fn memif(&self) -> Option<MemifMechanism<'_>> {
        (self.kind == MechanismType::Memif).then_some(MemifMechanism(self))
    }

    #[must_use]
    pub fn vxlan(&self) -> Option<VxlanMechanism<'_>> {
        (self.kind == MechanismType::Vxlan).then_some(VxlanMechanism(self))
    }

    #[must_use]
    pub fn srv6(&self) -> Option<Srv6Mechanism<'_>> {
        (self.kind == MechanismType::Srv6).then_some(Srv6Mechanism(self))
    }

    // a parameter that must be there and be non-empty
    fn required(&self, param: &'static str) -> Result<&str, MechanismError> {
        match self.parameter(param) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(MechanismError::Missing {
                kind: self.kind,
                param,
            }),
        }
    }

    fn file_url(&self, param: &'static str) -> Result<FileUrl, MechanismError> {
        FileUrl::parse(self.required(param)?).map_err(|source| MechanismError::Url {
            kind: self.kind,
            param,
            source,
        })
    }

    fn invalid(&self, param: &'static str, value: &str, reason: impl Display) -> MechanismError {
        MechanismError::Invalid {
            kind: self.kind,
            param,
            value: value.to_owned(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Mechanism, MechanismClass, MechanismError, MechanismType};
    use pretty_assertions::assert_eq;

    #[test]
    fn typed_views_match_the_type() {
        let m = Mechanism::new(MechanismClass::Local, MechanismType::Memif);
        assert!(m.memif().is_some());
        assert!(m.kernel().is_none());
        assert!(m.vxlan().is_none());
        assert!(m.srv6().is_none());
    }

    #[test]
    fn errors_are_lazy() {
        // building a mechanism with garbage is fine, reading it is not
        let m = Mechanism::new(MechanismClass::Remote, MechanismType::Vxlan)
            .with_parameter("vni", "lots");
        let vxlan = m.vxlan().unwrap();
        assert_eq!(
            vxlan.src_ip(),
            Err(MechanismError::Missing {
                kind: MechanismType::Vxlan,
                param: "src_ip"
            })
        );
        assert!(matches!(vxlan.vni(), Err(MechanismError::Invalid { .. })));
    }
}
