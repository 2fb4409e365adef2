// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Runtime control of the forwarder's tracing targets.
//!
//! Every crate declares its target(s) with [`trace_target!`] or [`custom_target!`]. Declarations
//! are collected at link time, so the full set of targets is known when [`get_trace_ctl`] builds
//! the subscriber, and levels can be changed per target or per tag afterwards.

pub mod control;
pub mod display;
pub mod targets;

pub use control::{TraceCtlError, TracingControl, get_trace_ctl};
pub use tracing_subscriber::filter::LevelFilter;
