use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use buildperf::analysis::format::{format_duration, format_table};
use buildperf::analysis::view::{ProjectContext, ProjectSummary};
use buildperf::config::BuildperfConfig;
use buildperf::history::DirectorySource;
use buildperf::{Level, PassOptions, Persistence, SummaryStore};

#[derive(Parser)]
#[command(
    name = "buildperf",
    about = "Performance trends across Cucumber build history",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate the build history of one or more projects and store the result
    Aggregate {
        /// Project name (repeatable)
        #[arg(long = "project", required = true)]
        projects: Vec<String>,

        /// Also keep a snapshot under this build number
        #[arg(long)]
        build: Option<u32>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Show the slowest items of a stored snapshot
    Show {
        #[arg(long)]
        project: String,

        /// Snapshot build number (latest when omitted)
        #[arg(long)]
        build: Option<u32>,

        /// project, feature, scenario or step
        #[arg(long, default_value = "feature")]
        level: Level,

        /// How many rows to show (config value when omitted)
        #[arg(long)]
        top: Option<i64>,

        #[arg(long)]
        json: bool,
    },

    /// Print the duration series of one item
    Trend {
        #[arg(long)]
        project: String,

        #[arg(long)]
        level: Level,

        /// Item id, e.g. `login;valid-user`
        #[arg(long)]
        id: String,
    },

    /// List stored point-in-time snapshots
    Snapshots {
        #[arg(long)]
        project: String,
    },
}

fn init_tracing(config: &BuildperfConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = BuildperfConfig::resolve(cli.config.as_deref())?;
    init_tracing(&config);

    let store = SummaryStore::open(&config.storage.db_path)
        .with_context(|| format!("Failed to open summary store at {}", config.storage.db_path))?;

    match cli.command {
        Commands::Aggregate {
            projects,
            build,
            json,
        } => {
            let source = Arc::new(DirectorySource::new(config.history.root.clone()));
            let options = PassOptions {
                snapshot_build: build,
            };

            let mut handles = Vec::new();
            for project in projects {
                let source = Arc::clone(&source);
                let store = store.clone();
                let task_project = project.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    buildperf::run_pass(source.as_ref(), &store, &task_project, options)
                });
                handles.push((project, handle));
            }

            // Report every project before failing.
            let mut reports = Vec::new();
            let mut failures = Vec::new();
            for (project, handle) in handles {
                let outcome = handle
                    .await
                    .context("aggregation task panicked")
                    .and_then(|result| result);
                match outcome {
                    Ok(report) => reports.push(report),
                    Err(e) => {
                        tracing::error!(%project, error = %e, "aggregation pass failed");
                        failures.push((project, e));
                    }
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                println!("{:<30} | {:>6} | {:>9} | {:>11} | Snapshot", "Project", "Builds", "Features", "Diagnostics");
                println!("{:-<30}-|-{:-<6}-|-{:-<9}-|-{:-<11}-|-{:-<20}", "", "", "", "", "");
                for report in &reports {
                    let snapshot = match &report.persistence {
                        Persistence::Saved => "saved".to_string(),
                        Persistence::Skipped => "skipped (no results)".to_string(),
                        Persistence::Failed(reason) => format!("FAILED: {}", reason),
                    };
                    println!(
                        "{:<30} | {:>6} | {:>9} | {:>11} | {}",
                        report.project,
                        report.tree.builds.len(),
                        report.tree.features.len(),
                        report.diagnostics.len(),
                        snapshot
                    );
                    for diagnostic in &report.diagnostics {
                        println!("  - {}", diagnostic);
                    }
                }
            }

            for (project, e) in &failures {
                eprintln!("{}: aggregation failed: {:#}", project, e);
            }
            if !failures.is_empty() {
                anyhow::bail!("{} of {} projects failed", failures.len(), failures.len() + reports.len());
            }
        }
        Commands::Show {
            project,
            build,
            level,
            top,
            json,
        } => {
            let Some(tree) = store.load(&project, build)? else {
                println!("No snapshot stored for '{}'.", project);
                return Ok(());
            };

            let mut context = ProjectContext::new(&project);
            context.url_name = config.display.url_name.clone();
            let count = top.unwrap_or(config.display.summaries_to_display);
            let summary = ProjectSummary::new(tree, context, count);
            let ranked = summary.top(level);

            if json {
                println!("{}", serde_json::to_string_pretty(&ranked)?);
            } else {
                if let Some(overall) = summary.overall() {
                    let s = overall.summary;
                    println!(
                        "\n{} -- {} builds ({} passed, {} failed), average {}",
                        summary.context().display_name,
                        s.total_builds(),
                        s.passed_builds(),
                        s.failed_builds(),
                        format_duration(s.average_duration())
                    );
                }
                println!("Slowest {} of {} ({}s):\n", ranked.len(), summary.tree().level(level).len(), level);
                print!("{}", format_table(&ranked));
            }
        }
        Commands::Trend { project, level, id } => {
            let tree = store
                .load(&project, None)?
                .with_context(|| format!("No snapshot stored for '{}'", project))?;
            let summary = tree
                .get(level, &id)
                .with_context(|| format!("No {} with id '{}' in '{}'", level, id, project))?;

            println!("{} ({})", summary.name, summary.level);
            println!("{:>8} | {:>8} | {:>8}", "Build", "Seconds", "Average");
            println!("{:->8}-|-{:->8}-|-{:->8}", "", "", "");
            for (raw, avg) in summary.graph_data().iter().zip(summary.average_data()) {
                println!("{:>8} | {:>8} | {:>8}", raw.build_number, raw.seconds, avg.seconds);
            }
        }
        Commands::Snapshots { project } => {
            let builds = store.list_snapshots(&project)?;
            if builds.is_empty() {
                println!("No build snapshots for '{}'.", project);
            } else {
                for build in builds {
                    println!("{}", build);
                }
            }
        }
    }

    Ok(())
}
