//! Historical window assembly -- every build of a project that has results,
//! in ascending build order.

pub mod directory;

pub use self::directory::DirectorySource;

use crate::record::ProjectRun;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode results in {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Access to the build history of projects.
pub trait BuildSource: Send + Sync {
    /// Build numbers known for `project`, in any order.
    fn builds(&self, project: &str) -> Result<Vec<u32>, HistoryError>;

    /// Load one build's results. `Ok(None)` means the build has none.
    fn load(&self, project: &str, build: u32) -> Result<Option<ProjectRun>, HistoryError>;
}

/// The ordered history handed to the aggregator.
#[derive(Debug, Clone, Default)]
pub struct Window {
    pub project: String,
    pub runs: Vec<ProjectRun>,
    /// Builds that exist but produced no results.
    pub missing: Vec<u32>,
}

impl Window {
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn build_numbers(&self) -> Vec<u32> {
        self.runs.iter().map(|r| r.build_number).collect()
    }
}

/// Collect every build of `project` that has results, ascending by build number.
///
/// Only I/O-level failures abort; builds without results are recorded in
/// [`Window::missing`] and otherwise ignored.
pub fn assemble(source: &dyn BuildSource, project: &str) -> Result<Window, HistoryError> {
    let listed = source.builds(project)?;

    let mut numbers = BTreeSet::new();
    for build in listed {
        if build == 0 {
            warn!(%project, "ignoring build number 0");
            continue;
        }
        if !numbers.insert(build) {
            warn!(%project, build, "duplicate build number, keeping first");
        }
    }

    let mut window = Window {
        project: project.to_string(),
        ..Window::default()
    };

    for build in numbers {
        match source.load(project, build)? {
            Some(mut run) if !run.is_empty() => {
                run.build_number = build;
                debug!(%project, build, features = run.features.len(), "build added to window");
                window.runs.push(run);
            }
            _ => {
                debug!(%project, build, "build has no results");
                window.missing.push(build);
            }
        }
    }

    info!(
        %project,
        builds = window.runs.len(),
        missing = window.missing.len(),
        "assembled history window"
    );
    Ok(window)
}

/// Build source over runs that were parsed elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    projects: HashMap<String, Vec<ProjectRun>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, project: &str, run: ProjectRun) {
        self.projects.entry(project.to_string()).or_default().push(run);
    }

    pub fn with_run(mut self, project: &str, run: ProjectRun) -> Self {
        self.insert(project, run);
        self
    }
}

impl BuildSource for MemorySource {
    fn builds(&self, project: &str) -> Result<Vec<u32>, HistoryError> {
        Ok(self
            .projects
            .get(project)
            .map(|runs| runs.iter().map(|r| r.build_number).collect())
            .unwrap_or_default())
    }

    fn load(&self, project: &str, build: u32) -> Result<Option<ProjectRun>, HistoryError> {
        Ok(self
            .projects
            .get(project)
            .and_then(|runs| runs.iter().find(|r| r.build_number == build))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Feature, Scenario, Step, StepResult};
    use chrono::Utc;

    fn run(build: u32, scenario_ns: Option<u64>) -> ProjectRun {
        let features = match scenario_ns {
            Some(ns) => vec![Feature::new(
                "f",
                "F",
                vec![Scenario::new(
                    "f;s",
                    "S",
                    vec![Step::new("Given", "x", StepResult::passed(ns))],
                )],
            )],
            None => Vec::new(),
        };
        ProjectRun::new(build, Utc::now(), features)
    }

    #[test]
    fn test_window_is_sorted_and_skips_empty_builds() {
        let source = MemorySource::new()
            .with_run("p", run(3, Some(30)))
            .with_run("p", run(1, Some(10)))
            .with_run("p", run(2, None));

        let window = assemble(&source, "p").unwrap();
        assert_eq!(window.build_numbers(), vec![1, 3]);
        assert_eq!(window.missing, vec![2]);
    }

    #[test]
    fn test_duplicates_and_zero_are_dropped() {
        let source = MemorySource::new()
            .with_run("p", run(0, Some(1)))
            .with_run("p", run(5, Some(10)))
            .with_run("p", run(5, Some(99)));

        let window = assemble(&source, "p").unwrap();
        assert_eq!(window.build_numbers(), vec![5]);
        let ns = window.runs[0].features[0].elements[0].steps[0]
            .result
            .elapsed()
            .unwrap();
        assert_eq!(ns, 10, "first occurrence wins");
    }

    #[test]
    fn test_unknown_project_is_empty() {
        let window = assemble(&MemorySource::new(), "nobody").unwrap();
        assert!(window.is_empty());
        assert!(window.missing.is_empty());
    }
}
