// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use nix::errno::Errno;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid socket path {path}: {source}")]
    InvalidAddress { path: String, source: Errno },
    #[error("Failed to remove stale socket file {path}: {source}")]
    RemoveStale {
        path: String,
        source: std::io::Error,
    },
    #[error("Unknown socket network '{0}'")]
    UnknownNetwork(String),
    #[error("Proxy already started")]
    AlreadyStarted,
    #[error("Proxy not started")]
    NotStarted,
    #[error("Failed to listen on {path}: {source}")]
    Listen {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to accept on {path}: {source}")]
    Accept {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to connect to {path}: {source}")]
    Connect {
        path: String,
        source: std::io::Error,
    },
    #[error("Relay {direction} failed: {source}")]
    Relay {
        direction: &'static str,
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
