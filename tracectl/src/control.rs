// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tracing runtime control.

use ordermap::OrderMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, Registry, filter::LevelFilter, prelude::*, reload};

use crate::display::TargetsByTag;
use crate::targets::TRACING_TARGETS;
use crate::trace_target;

trace_target!("tracectl", LevelFilter::INFO, &[]);

/// Errors when applying a tracing configuration
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TraceCtlError {
    #[error("Invalid syntax '{0}': expected tag=level")]
    Syntax(String),
    #[error("Invalid level '{level}' for '{tag}'")]
    Level { tag: String, level: String },
}

/// The runtime configuration of a tracing target
#[derive(Debug, Clone)]
pub struct TargetCfg {
    pub(crate) target: &'static str,
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: Vec<&'static str>,
    pub(crate) custom: bool,
}

impl TargetCfg {
    #[must_use]
    pub fn target(&self) -> &'static str {
        self.target
    }
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
    #[must_use]
    pub fn level(&self) -> LevelFilter {
        self.level
    }
    #[must_use]
    pub fn tags(&self) -> &[&'static str] {
        &self.tags
    }
    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.custom
    }
}

#[derive(Debug)]
pub(crate) struct TargetDb {
    pub(crate) level: LevelFilter,
    pub(crate) targets: OrderMap<&'static str, TargetCfg>,
    pub(crate) tags: OrderMap<&'static str, BTreeSet<&'static str>>,
}

impl TargetDb {
    fn new(level: LevelFilter) -> Self {
        let mut db = Self {
            level,
            targets: OrderMap::new(),
            tags: OrderMap::new(),
        };
        for t in TRACING_TARGETS {
            db.register(t.target, t.name, t.level, t.tags, t.custom);
        }
        db
    }

    fn register(
        &mut self,
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
        custom: bool,
    ) {
        // the name always works as a tag
        let mut tags = tags.to_vec();
        if !tags.contains(&name) {
            tags.push(name);
        }
        for tag in &tags {
            self.tags.entry(*tag).or_default().insert(target);
        }
        let cfg = TargetCfg {
            target,
            name,
            level,
            tags,
            custom,
        };
        if self.targets.insert(target, cfg).is_some() {
            warn!("Tracing target {target} is declared more than once");
        }
    }

    fn env_filter(&self) -> EnvFilter {
        self.targets.values().fold(
            EnvFilter::new(self.level.to_string()),
            |filter, t| match format!("{}={}", t.target, t.level).parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(e) => {
                    error!("Bad directive for target {}: {e}", t.target);
                    filter
                }
            },
        )
    }

    fn tagged(&self, tag: &str) -> Vec<&'static str> {
        self.tags
            .get(tag)
            .map(|targets| targets.iter().copied().collect())
            .unwrap_or_default()
    }

    /// A config string that, fed to [`TracingControl::setup_from_string`], reproduces the current
    /// levels. It lists every target by name and does not try to group them by tag.
    fn as_config_string(&self) -> String {
        self.targets
            .values()
            .fold(format!("default={}", self.level), |acc, t| {
                format!("{acc},{}={}", t.name, t.level)
            })
    }
}

/// Owner of the tracing subscriber and of the per-target levels
#[derive(Debug)]
pub struct TracingControl {
    db: Mutex<TargetDb>,
    handle: reload::Handle<EnvFilter, Registry>,
}

static TRACING_CTL: OnceLock<TracingControl> = OnceLock::new();

/// Get the process-wide [`TracingControl`], installing the subscriber on first use.
pub fn get_trace_ctl() -> &'static TracingControl {
    TRACING_CTL.get_or_init(TracingControl::new)
}

impl TracingControl {
    fn new() -> Self {
        let db = TargetDb::new(LevelFilter::INFO);
        let (filter, handle) = reload::Layer::new(db.env_filter());
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(true)
            .with_level(true);

        if let Err(e) = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
        {
            // a test harness, typically
            warn!("Tracing subscriber already installed: {e}");
        }
        Self {
            db: Mutex::new(db),
            handle,
        }
    }

    fn reload(&self, db: &TargetDb) {
        if let Err(e) = self.handle.reload(db.env_filter()) {
            error!("Failed to reload tracing filter: {e}");
        }
    }

    pub fn init() {
        get_trace_ctl();
    }

    /// Set the level of all the targets carrying `tag`. Returns how many targets changed.
    pub fn set_tag_level(&self, tag: &str, level: LevelFilter) -> usize {
        let mut db = self.db.lock();
        let mut changed = 0;
        for target in db.tagged(tag) {
            if let Some(cfg) = db.targets.get_mut(target)
                && cfg.level != level
            {
                cfg.level = level;
                changed += 1;
            }
        }
        if changed > 0 {
            self.reload(&db);
        }
        info!("Log level for tag '{tag}' set to {level} ({changed} targets changed)");
        changed
    }

    pub fn set_level_all(&self, level: LevelFilter) {
        let mut db = self.db.lock();
        db.targets.values_mut().for_each(|t| t.level = level);
        self.reload(&db);
    }

    pub fn set_default_level(&self, level: LevelFilter) {
        let mut db = self.db.lock();
        if db.level != level {
            db.level = level;
            self.reload(&db);
            info!("Default log level set to {level}");
        }
    }

    #[must_use]
    pub fn get_default_level(&self) -> LevelFilter {
        self.db.lock().level
    }

    fn parse_config(input: &str) -> Result<OrderMap<String, LevelFilter>, TraceCtlError> {
        let mut parsed = OrderMap::new();
        for item in input.split(',').map(str::trim) {
            let (tag, level) = item
                .split_once('=')
                .ok_or_else(|| TraceCtlError::Syntax(item.to_owned()))?;
            let (tag, level) = (tag.trim(), level.trim());
            let level = LevelFilter::from_str(level).map_err(|_| TraceCtlError::Level {
                tag: tag.to_owned(),
                level: level.to_owned(),
            })?;
            parsed.insert(tag.to_owned(), level);
        }
        Ok(parsed)
    }

    /// Apply a comma-separated list of `tag=level`.
    ///
    /// `default` sets the default level and `all` sets every target, before the remaining tags
    /// are applied, so `default=error,all=info,proxy=debug` does what it reads like.
    ///
    /// # Errors
    ///
    /// Fails without applying anything if an item is not `tag=level` or the level is unknown.
    pub fn setup_from_string(&self, input: &str) -> Result<(), TraceCtlError> {
        let config = Self::parse_config(input)?;
        if let Some(level) = config.get("default") {
            self.set_default_level(*level);
        }
        if let Some(level) = config.get("all") {
            self.set_level_all(*level);
        }
        config
            .iter()
            .filter(|(tag, _)| !matches!(tag.as_str(), "default" | "all"))
            .for_each(|(tag, level)| {
                self.set_tag_level(tag, *level);
            });
        Ok(())
    }

    #[must_use]
    pub fn get_target(&self, target: &str) -> Option<TargetCfg> {
        self.db.lock().targets.get(target).cloned()
    }

    #[must_use]
    pub fn get_targets_by_tag(&self, tag: &str) -> Vec<TargetCfg> {
        let db = self.db.lock();
        db.tagged(tag)
            .into_iter()
            .filter_map(|t| db.targets.get(t).cloned())
            .collect()
    }

    #[must_use]
    pub fn get_tags(&self) -> Vec<&'static str> {
        self.db.lock().tags.keys().copied().collect()
    }

    #[must_use]
    pub fn as_config_string(&self) -> String {
        self.db.lock().as_config_string()
    }

    pub fn dump(&self) {
        let db = self.db.lock();
        info!("{db}");
    }

    pub fn dump_targets_by_tag(&self) {
        let db = self.db.lock();
        info!("{}", TargetsByTag(&db));
    }
}
