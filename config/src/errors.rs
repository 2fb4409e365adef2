// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Type for configuration validation failures.

use thiserror::Error;

/// The reasons why the engine may reject a configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("An interface with name '{0}' already exists")]
    DuplicateInterface(String),
    #[error("Interface name must not be empty")]
    EmptyInterfaceName,
    #[error("'{0}' refers to non-existent interface '{1}'")]
    NoSuchInterface(&'static str, String),
    #[error("Invalid interface address: {0}")]
    InvalidAddress(String),
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),
    #[error("Invalid VNI '{0}'")]
    InvalidVni(u32),
    #[error("Invalid port range {0}-{1}")]
    InvalidPortRange(u16, u16),
}

/// Result-like type for configurations
pub type ConfigResult = Result<(), ConfigError>;
