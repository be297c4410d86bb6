//! Execution record model -- one build's feature/scenario/step tree.
//!
//! Nodes keep the raw step result exactly as it was reported. Interpreting a
//! result (outcome + elapsed time) happens at aggregation time through
//! [`StepResult::measure`], so a single malformed step can be reported and
//! skipped without rejecting the rest of the build.

pub mod cucumber;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Outcome of one measured unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

impl Outcome {
    pub fn is_passed(self) -> bool {
        self == Outcome::Passed
    }

    /// Roll child outcomes up into the parent's outcome.
    ///
    /// Any failure fails the parent. Otherwise a parent with a skipped child
    /// (or no children at all) did not run completely and counts as skipped.
    pub fn rollup<I>(children: I) -> Outcome
    where
        I: IntoIterator<Item = Outcome>,
    {
        let mut seen_any = false;
        let mut skipped = false;
        for outcome in children {
            seen_any = true;
            match outcome {
                Outcome::Failed => return Outcome::Failed,
                Outcome::Skipped => skipped = true,
                Outcome::Passed => {}
            }
        }
        if !seen_any || skipped {
            Outcome::Skipped
        } else {
            Outcome::Passed
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Passed => write!(f, "passed"),
            Outcome::Failed => write!(f, "failed"),
            Outcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// A step result that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEntry {
    #[error("unrecognised step status '{0}'")]
    UnknownStatus(String),

    #[error("unparsable duration {0}")]
    BadDuration(String),
}

/// Elapsed time (nanoseconds) and outcome of one node in one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub elapsed: u64,
    pub outcome: Outcome,
}

impl Measurement {
    /// Stand-in for a node whose result could not be read.
    pub const SKIPPED: Measurement = Measurement {
        elapsed: 0,
        outcome: Outcome::Skipped,
    };

    /// Parent measurement: summed elapsed time, rolled-up outcome.
    pub fn combine(children: &[Measurement]) -> Measurement {
        let elapsed = children
            .iter()
            .fold(0u64, |acc, m| acc.saturating_add(m.elapsed));
        Measurement {
            elapsed,
            outcome: Outcome::rollup(children.iter().map(|m| m.outcome)),
        }
    }
}

/// Step result as reported by the test runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StepResult {
    pub fn new(status: &str, duration_ns: u64) -> Self {
        Self {
            status: status.to_string(),
            duration: Some(Value::from(duration_ns)),
            error_message: None,
        }
    }

    pub fn passed(duration_ns: u64) -> Self {
        Self::new("passed", duration_ns)
    }

    pub fn failed(duration_ns: u64) -> Self {
        Self::new("failed", duration_ns)
    }

    pub fn skipped() -> Self {
        Self {
            status: "skipped".to_string(),
            duration: None,
            error_message: None,
        }
    }

    /// Map the runner's status vocabulary onto [`Outcome`].
    pub fn outcome(&self) -> Result<Outcome, MalformedEntry> {
        match self.status.trim().to_ascii_lowercase().as_str() {
            "passed" => Ok(Outcome::Passed),
            "failed" | "ambiguous" => Ok(Outcome::Failed),
            "skipped" | "pending" | "undefined" => Ok(Outcome::Skipped),
            _ => Err(MalformedEntry::UnknownStatus(self.status.clone())),
        }
    }

    /// Elapsed time in nanoseconds. A missing duration is zero.
    pub fn elapsed(&self) -> Result<u64, MalformedEntry> {
        match &self.duration {
            None | Some(Value::Null) => Ok(0),
            Some(Value::Number(n)) => {
                if let Some(ns) = n.as_u64() {
                    return Ok(ns);
                }
                match n.as_f64() {
                    Some(f) if f.is_finite() && f >= 0.0 => Ok(f as u64),
                    _ => Err(MalformedEntry::BadDuration(n.to_string())),
                }
            }
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| MalformedEntry::BadDuration(format!("\"{}\"", s))),
            Some(other) => Err(MalformedEntry::BadDuration(other.to_string())),
        }
    }

    pub fn measure(&self) -> Result<Measurement, MalformedEntry> {
        Ok(Measurement {
            elapsed: self.elapsed()?,
            outcome: self.outcome()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub keyword: String,
    pub name: String,
    /// Data table attached to the step, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<String>>>,
    pub result: StepResult,
}

impl Step {
    pub fn new(keyword: &str, name: &str, result: StepResult) -> Self {
        Self {
            keyword: keyword.to_string(),
            name: name.to_string(),
            rows: None,
            result,
        }
    }

    /// Keyword and text, e.g. `Given a user exists`.
    pub fn text(&self) -> String {
        format!("{} {}", self.keyword.trim(), self.name.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn new(id: &str, name: &str, steps: Vec<Step>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            keyword: "Scenario".to_string(),
            steps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default)]
    pub elements: Vec<Scenario>,
}

impl Feature {
    pub fn new(id: &str, name: &str, elements: Vec<Scenario>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            uri: None,
            elements,
        }
    }
}

/// One build's complete, parsed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRun {
    pub build_number: u32,
    pub run_date: DateTime<Utc>,
    pub features: Vec<Feature>,
}

impl ProjectRun {
    pub fn new(build_number: u32, run_date: DateTime<Utc>, features: Vec<Feature>) -> Self {
        Self {
            build_number,
            run_date,
            features,
        }
    }

    /// True when the build produced nothing to aggregate.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Lowercase `text` and collapse whitespace runs into `-`.
pub fn slug(text: &str) -> String {
    text.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}
