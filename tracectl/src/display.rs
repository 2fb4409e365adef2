// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Display implementations

use crate::control::{TargetCfg, TargetDb};
use std::fmt::{Display, Formatter};

macro_rules! TARGET_FMT {
    () => {
        "{:>48} │ {:>8} │ {}"
    };
}

impl Display for TargetCfg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            TARGET_FMT!(),
            self.target(),
            self.level(),
            self.tags().join(",")
        )
    }
}

impl Display for TargetDb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{:>52}", "──────── Tracing targets ────────")?;
        writeln!(f, TARGET_FMT!(), "TARGET", "LEVEL", "TAGS")?;
        for target in self.targets.values() {
            writeln!(f, "{target}")?;
        }
        write!(f, TARGET_FMT!(), "(default)", self.level, "--")
    }
}

pub(crate) struct TargetsByTag<'a>(pub(crate) &'a TargetDb);

impl Display for TargetsByTag<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let db = self.0;
        writeln!(f)?;
        writeln!(f, "{:>52}", "──────── Tracing targets by tag ────────")?;
        for (tag, targets) in &db.tags {
            writeln!(f, " {tag}:")?;
            for cfg in targets.iter().filter_map(|t| db.targets.get(t)) {
                writeln!(f, "      {:<48} : {}", cfg.target(), cfg.level())?;
            }
        }
        Ok(())
    }
}
