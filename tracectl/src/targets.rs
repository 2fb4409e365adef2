// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Link-time registry of tracing targets

use crate::LevelFilter;
use linkme::distributed_slice;

/// A statically declared tracing target
pub struct StaticTarget {
    pub(crate) target: &'static str,
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: &'static [&'static str],
    pub(crate) custom: bool,
}

impl StaticTarget {
    #[must_use]
    pub const fn new(
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
        custom: bool,
    ) -> Self {
        Self {
            target,
            name,
            level,
            tags,
            custom,
        }
    }
}

#[distributed_slice]
pub static TRACING_TARGETS: [StaticTarget];

#[doc(hidden)]
#[macro_export]
macro_rules! trace_target_deps {
    () => {
        use linkme::distributed_slice;
        use $crate::LevelFilter;
        use $crate::targets::{StaticTarget, TRACING_TARGETS};
    };
}

/// Declare the tracing target of the calling module, with a short name, a default level and tags.
///
/// The module path is the target, so plain `tracing` macros in that module are governed by it.
#[macro_export]
macro_rules! trace_target {
    // A fresh const scope per invocation keeps the imports and the static name local, so the
    // macro can be used more than once per crate.
    ($name:expr, $level:expr, $tags:expr) => {
        const _: () = {
            use $crate::trace_target_deps;
            trace_target_deps!();

            #[distributed_slice(TRACING_TARGETS)]
            static TRACE_TGT: StaticTarget =
                StaticTarget::new(module_path!(), $name, $level, $tags, false);
        };
    };
}

/// Declare a tracing target with an explicit name, used with `tracing::info!(target: ...)`.
#[macro_export]
macro_rules! custom_target {
    ($target:expr, $level:expr, $tags:expr) => {
        const _: () = {
            use $crate::trace_target_deps;
            trace_target_deps!();

            #[distributed_slice(TRACING_TARGETS)]
            static TRACE_TGT: StaticTarget = StaticTarget::new($target, $target, $level, $tags, true);
        };
    };
}
