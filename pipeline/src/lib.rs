// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(
    unsafe_code,
    missing_docs,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]

//! # Chain Building Blocks
//!
//! This crate provides the building blocks for the chains handling network service Requests
//! and Closes.
//!
//! ## Chain elements
//!
//! A chain element is anything that implements the [`ChainElement`] trait. An element gets the
//! call, a [`CallScope`] and a [`Next`], the rest of the chain it hands the call over to. You can
//! look at the [`sample_elements`] module for some examples of simple elements.
//!
//! ## Chains
//!
//! A [`Chain`] is an ordered list of elements, assembled at startup.
//!
//! ```rust
//! use forwarder_pipeline::Chain;
//! use forwarder_pipeline::sample_elements::{AppendVppInterface, InspectConfig, Passthrough};
//!
//! let chain = Chain::new()
//!     .add_stage(AppendVppInterface::tap("server-1"))
//!     .add_stage(InspectConfig)
//!     .add_stage(Passthrough);
//! assert_eq!(chain.len(), 3);
//! ```
//!
//! A [`Chain`] is a [`ChainElement`] too: a chain added to another runs its own stages and then
//! continues with the rest of the outer chain.
//!
//! ## The call scope
//!
//! The [`CallScope`] of a call carries the [`config::DataplaneConfig`] under construction and the
//! cancellation of the call. The configuration is attached by the first element of the chain
//! ([`CallScope::ensure_config`]). An element finding no configuration has nothing to add to it
//! and just delegates.
//!
//! <div class="warning">
//!
//! Elements find the interfaces added by the elements before them by position, e.g. "the last
//! vpp interface". Reordering the stages of a chain changes what they operate on.
//!
//! </div>

mod chain;
mod element;
mod errors;
/// Sample chain elements
pub mod sample_elements;
mod scope;

pub use chain::{Chain, StageId};
pub use element::{ChainElement, Next};
pub use errors::{ChainError, CommitOp, PipelineError};
pub use scope::{CallScope, CancelHandle, Cancellation};

use tracectl::trace_target;
trace_target!("pipeline", LevelFilter::INFO, &["pipeline"]);
