//! buildperf -- performance trends across the build history of Cucumber suites.
//!
//! This crate reads each build's Cucumber JSON results, folds them into
//! per-project, per-feature, per-scenario and per-step summaries, ranks the
//! slowest items and keeps the resulting snapshots in SQLite.

pub mod analysis;
pub mod config;
pub mod history;
pub mod record;
pub mod storage;

pub use analysis::aggregator::{aggregate, Aggregation, Aggregator, SummaryTree};
pub use analysis::runner::{run_pass, PassOptions, PassReport, Persistence};
pub use analysis::summary::Summary;
pub use analysis::{Diagnostic, Level};
pub use storage::SummaryStore;
