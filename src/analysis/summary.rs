//! Rolled-up statistics for one identity across the history window.

use super::format::format_duration;
use super::Level;
use crate::record::{Measurement, Outcome};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Namespace for page-link tokens. Fixed so links survive re-renders.
const PAGE_LINK_NAMESPACE: Uuid = Uuid::from_u128(0x6b1d_52e4_93a0_4c55_8f0e_2d7a_91c3_f4b8);

/// One observation of an identity in one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceEntry {
    pub build_number: u32,
    /// Nanoseconds.
    pub elapsed: u64,
    pub outcome: Outcome,
}

impl PerformanceEntry {
    pub fn is_passed(&self) -> bool {
        self.outcome.is_passed()
    }
}

/// A chart point: build number and whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub build_number: u32,
    pub seconds: u64,
}

/// Step outcome counts, as shown in the project pie chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeBreakdown {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// Statistics for one project, feature, scenario or step.
///
/// Only [`Summary::record`] and [`Summary::add_step_outcome`] change the
/// statistics, which keeps `total_builds == passed_builds + failed_builds`
/// and the duration ordering intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub id: String,
    pub name: String,
    pub level: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub senior_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub senior_name: Option<String>,
    /// Rank among siblings, set by the ranker. Zero when unranked.
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub number_of_sub_items: u32,
    /// Step keyword (`Given`, `When`, ...). Steps only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    /// Latest data table seen on the step. Steps only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<String>>>,

    entries: Vec<PerformanceEntry>,
    shortest_duration: u64,
    longest_duration: u64,
    average_duration: u64,
    passed_duration: u64,
    total_builds: u32,
    passed_builds: u32,
    failed_builds: u32,
    reported_builds: u32,
    passed_steps: u32,
    failed_steps: u32,
    skipped_steps: u32,
}

impl Summary {
    pub fn new(id: &str, name: &str, level: Level) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            level,
            senior_id: None,
            senior_name: None,
            order: 0,
            number_of_sub_items: 0,
            keyword: None,
            rows: None,
            entries: Vec::new(),
            shortest_duration: 0,
            longest_duration: 0,
            average_duration: 0,
            passed_duration: 0,
            total_builds: 0,
            passed_builds: 0,
            failed_builds: 0,
            reported_builds: 0,
            passed_steps: 0,
            failed_steps: 0,
            skipped_steps: 0,
        }
    }

    pub fn with_senior(mut self, senior_id: &str, senior_name: &str) -> Self {
        self.senior_id = Some(senior_id.to_string());
        self.senior_name = Some(senior_name.to_string());
        self
    }

    /// Append this build's observation and update the running statistics.
    /// Builds must be recorded in ascending order.
    pub fn record(&mut self, build_number: u32, m: Measurement) {
        debug_assert!(
            self.entries.last().map_or(true, |e| e.build_number < build_number),
            "builds recorded out of order"
        );

        self.entries.push(PerformanceEntry {
            build_number,
            elapsed: m.elapsed,
            outcome: m.outcome,
        });
        self.reported_builds += 1;

        match m.outcome {
            Outcome::Passed => {
                if self.passed_builds == 0 {
                    self.shortest_duration = m.elapsed;
                    self.longest_duration = m.elapsed;
                } else {
                    self.shortest_duration = self.shortest_duration.min(m.elapsed);
                    self.longest_duration = self.longest_duration.max(m.elapsed);
                }
                self.passed_builds += 1;
                self.total_builds += 1;
                self.passed_duration = self.passed_duration.saturating_add(m.elapsed);
                self.average_duration = self.passed_duration / u64::from(self.passed_builds);
            }
            Outcome::Failed => {
                self.failed_builds += 1;
                self.total_builds += 1;
            }
            Outcome::Skipped => {}
        }
    }

    /// Count one step outcome towards this summary.
    pub fn add_step_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Passed => self.passed_steps += 1,
            Outcome::Failed => self.failed_steps += 1,
            Outcome::Skipped => self.skipped_steps += 1,
        }
    }

    pub fn entries(&self) -> &[PerformanceEntry] {
        &self.entries
    }

    pub fn latest_entry(&self) -> Option<&PerformanceEntry> {
        self.entries.last()
    }

    /// Fastest passed run in nanoseconds, zero if none passed.
    pub fn shortest_duration(&self) -> u64 {
        self.shortest_duration
    }

    pub fn longest_duration(&self) -> u64 {
        self.longest_duration
    }

    /// Mean of passed runs in nanoseconds, zero if none passed.
    pub fn average_duration(&self) -> u64 {
        self.average_duration
    }

    /// Recompute the mean from the stored entries.
    pub fn calculate_average_duration(&self) -> u64 {
        let (total, count) = self
            .entries
            .iter()
            .filter(|e| e.is_passed())
            .fold((0u64, 0u64), |(t, c), e| (t.saturating_add(e.elapsed), c + 1));
        if count == 0 {
            0
        } else {
            total / count
        }
    }

    pub fn total_builds(&self) -> u32 {
        self.total_builds
    }

    pub fn passed_builds(&self) -> u32 {
        self.passed_builds
    }

    pub fn failed_builds(&self) -> u32 {
        self.failed_builds
    }

    pub fn reported_builds(&self) -> u32 {
        self.reported_builds
    }

    pub fn passed_steps(&self) -> u32 {
        self.passed_steps
    }

    pub fn failed_steps(&self) -> u32 {
        self.failed_steps
    }

    pub fn skipped_steps(&self) -> u32 {
        self.skipped_steps
    }

    pub fn outcome_breakdown(&self) -> OutcomeBreakdown {
        OutcomeBreakdown {
            passed: self.passed_steps,
            failed: self.failed_steps,
            skipped: self.skipped_steps,
        }
    }

    pub fn page_link(&self) -> String {
        page_link(self.level, &self.id)
    }

    pub fn formatted_shortest_duration(&self) -> String {
        format_duration(self.shortest_duration)
    }

    pub fn formatted_longest_duration(&self) -> String {
        format_duration(self.longest_duration)
    }

    pub fn formatted_average_duration(&self) -> String {
        format_duration(self.average_duration)
    }

    /// Per-build duration of every passed run.
    pub fn graph_data(&self) -> Vec<TrendPoint> {
        self.entries
            .iter()
            .filter(|e| e.is_passed())
            .map(|e| TrendPoint {
                build_number: e.build_number,
                seconds: whole_seconds(e.elapsed),
            })
            .collect()
    }

    /// The overall average repeated at every passed build, for a trend line.
    pub fn average_data(&self) -> Vec<TrendPoint> {
        let seconds = whole_seconds(self.calculate_average_duration());
        self.entries
            .iter()
            .filter(|e| e.is_passed())
            .map(|e| TrendPoint {
                build_number: e.build_number,
                seconds,
            })
            .collect()
    }
}

/// Stable navigation token for a summary: the same level and id always give
/// the same link.
pub fn page_link(level: Level, id: &str) -> String {
    let name = format!("{}:{}", level, id);
    Uuid::new_v5(&PAGE_LINK_NAMESPACE, name.as_bytes())
        .simple()
        .to_string()
}

/// Nanoseconds to seconds, rounding half up.
pub fn whole_seconds(nanos: u64) -> u64 {
    nanos.saturating_add(NANOS_PER_SECOND / 2) / NANOS_PER_SECOND
}
