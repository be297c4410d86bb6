//! Trend analysis over the build history: aggregation, summaries, ranking
//! and render views.

pub mod aggregator;
pub mod format;
pub mod ranking;
pub mod runner;
pub mod summary;
pub mod view;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Nesting level of a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Project,
    Feature,
    Scenario,
    Step,
}

impl Level {
    /// The level one up, `None` for the project.
    pub fn parent(self) -> Option<Level> {
        match self {
            Level::Project => None,
            Level::Feature => Some(Level::Project),
            Level::Scenario => Some(Level::Feature),
            Level::Step => Some(Level::Scenario),
        }
    }

    pub fn child(self) -> Option<Level> {
        match self {
            Level::Project => Some(Level::Feature),
            Level::Feature => Some(Level::Scenario),
            Level::Scenario => Some(Level::Step),
            Level::Step => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Project => "project",
            Level::Feature => "feature",
            Level::Scenario => "scenario",
            Level::Step => "step",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "project" => Ok(Level::Project),
            "feature" => Ok(Level::Feature),
            "scenario" => Ok(Level::Scenario),
            "step" => Ok(Level::Step),
            other => Err(format!(
                "unknown level '{}' (expected project, feature, scenario or step)",
                other
            )),
        }
    }
}

/// A recovered, non-fatal condition observed during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A step's result could not be read; it was counted as skipped.
    MalformedEntry { build: u32, id: String, reason: String },
    /// A build exists but had no results; it was left out of the window.
    MissingHistory { build: u32 },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::MalformedEntry { build, id, reason } => {
                write!(f, "build #{}: step '{}' treated as skipped: {}", build, id, reason)
            }
            Diagnostic::MissingHistory { build } => {
                write!(f, "build #{}: no results, excluded", build)
            }
        }
    }
}
