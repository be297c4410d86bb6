use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::aggregator::{aggregate, SummaryTree};
use crate::analysis::Diagnostic;
use crate::history::{assemble, BuildSource};
use crate::storage::SummaryStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct PassOptions {
    /// Also keep a point-in-time snapshot under this build number.
    pub snapshot_build: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Persistence {
    Saved,
    /// Nothing to store: the window held no results.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub project: String,
    pub tree: SummaryTree,
    pub diagnostics: Vec<Diagnostic>,
    pub persistence: Persistence,
}

/// Run one aggregation pass for `project`:
/// 1. Assemble the build window (I/O failure aborts before any write)
/// 2. Fold it into a fresh summary tree
/// 3. Persist the tree unless the window was empty
///
/// A store failure is reported in the returned [`PassReport`]; the tree
/// itself is still handed back.
pub fn run_pass(
    source: &dyn BuildSource,
    store: &SummaryStore,
    project: &str,
    options: PassOptions,
) -> Result<PassReport> {
    info!(%project, "Starting aggregation pass...");

    let window = assemble(source, project)
        .with_context(|| format!("Failed to assemble history for '{}'", project))?;

    let aggregation = aggregate(&window);

    let persistence = if window.is_empty() {
        info!(%project, "no build results, snapshot left untouched");
        Persistence::Skipped
    } else {
        match store.save(&aggregation.tree, options.snapshot_build) {
            Ok(()) => Persistence::Saved,
            Err(e) => {
                warn!(%project, error = %e, "Failed to persist summary snapshot");
                Persistence::Failed(e.to_string())
            }
        }
    };

    Ok(PassReport {
        project: project.to_string(),
        tree: aggregation.tree,
        diagnostics: aggregation.diagnostics,
        persistence,
    })
}
