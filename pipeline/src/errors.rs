// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use api::MechanismError;
use config::DataplaneConfig;
use std::fmt::Display;

/// The operation a commit failed to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOp {
    /// Pushing a configuration
    Update,
    /// Removing a configuration
    Delete,
}

impl Display for CommitOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitOp::Update => write!(f, "update"),
            CommitOp::Delete => write!(f, "delete"),
        }
    }
}

/// Why a Request or Close failed. Each variant names the aspect that failed. Elements return
/// the errors of the elements they delegate to unmodified.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// A mechanism lacks a parameter or has a malformed one
    #[error(transparent)]
    Mechanism(#[from] MechanismError),
    /// The configuration built so far does not allow the element to do its job
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// The dataplane engine refused a configuration
    #[error("Failed to {op} configuration: {reason}; configuration: {config}")]
    Commit {
        /// What was attempted
        op: CommitOp,
        /// What the engine said
        reason: String,
        /// The configuration that was rejected
        config: Box<DataplaneConfig>,
    },
    /// A local proxy could not be set up
    #[error("Proxy failure: {0}")]
    Proxy(Box<dyn std::error::Error + Send + Sync>),
    /// The downstream network service manager failed the call
    #[error("Peer failure: {0}")]
    Peer(String),
    /// The call scope got cancelled or its deadline passed
    #[error("Cancelled")]
    Cancelled,
}

/// Errors building a chain
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PipelineError {
    /// A stage was added with an id already in use
    #[error("Duplicate stage id: {0}")]
    DuplicateStageId(String),
}
