//! Filesystem build source.
//!
//! Layout: `<root>/<project>/builds/<build number>/*.json`, each file a
//! Cucumber JSON report. An optional `build.toml` in the build directory
//! carries the run date (`run_date = "2024-05-01T12:00:00Z"`); without it the
//! newest result file's modification time is used.

use super::{BuildSource, HistoryError};
use crate::record::{cucumber, ProjectRun};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const BUILD_META_FILE: &str = "build.toml";

#[derive(Debug, Deserialize)]
struct BuildMeta {
    run_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn builds_dir(&self, project: &str) -> PathBuf {
        self.root.join(project).join("builds")
    }

    fn result_files(dir: &Path) -> Result<Vec<PathBuf>, HistoryError> {
        let entries = fs::read_dir(dir).map_err(|source| HistoryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| HistoryError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn run_date(dir: &Path, files: &[PathBuf]) -> Result<DateTime<Utc>, HistoryError> {
        let meta_path = dir.join(BUILD_META_FILE);
        if meta_path.exists() {
            match fs::read_to_string(&meta_path)
                .map_err(|e| e.to_string())
                .and_then(|s| toml::from_str::<BuildMeta>(&s).map_err(|e| e.to_string()))
            {
                Ok(meta) => return Ok(meta.run_date),
                Err(error) => {
                    warn!(path = %meta_path.display(), %error, "unreadable build metadata, using file times");
                }
            }
        }

        let mut newest: Option<DateTime<Utc>> = None;
        for file in files {
            let modified = fs::metadata(file)
                .and_then(|m| m.modified())
                .map_err(|source| HistoryError::Io {
                    path: file.clone(),
                    source,
                })?;
            let modified: DateTime<Utc> = modified.into();
            newest = Some(newest.map_or(modified, |n| n.max(modified)));
        }
        Ok(newest.unwrap_or_else(Utc::now))
    }
}

impl BuildSource for DirectorySource {
    fn builds(&self, project: &str) -> Result<Vec<u32>, HistoryError> {
        let dir = self.builds_dir(project);
        if !dir.is_dir() {
            debug!(path = %dir.display(), "no build history directory");
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|source| HistoryError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut builds = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| HistoryError::Io {
                path: dir.clone(),
                source,
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            match entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) {
                Some(n) if n > 0 => builds.push(n),
                _ => debug!(path = %entry.path().display(), "not a build directory"),
            }
        }
        Ok(builds)
    }

    fn load(&self, project: &str, build: u32) -> Result<Option<ProjectRun>, HistoryError> {
        let dir = self.builds_dir(project).join(build.to_string());
        if !dir.is_dir() {
            return Ok(None);
        }

        let files = Self::result_files(&dir)?;
        if files.is_empty() {
            return Ok(None);
        }

        let mut features = Vec::new();
        for file in &files {
            let bytes = fs::read(file).map_err(|source| HistoryError::Io {
                path: file.clone(),
                source,
            })?;
            let parsed = cucumber::parse_report(&bytes).map_err(|source| HistoryError::Decode {
                path: file.clone(),
                source,
            })?;
            features.extend(parsed);
        }

        if features.is_empty() {
            return Ok(None);
        }

        let run_date = Self::run_date(&dir, &files)?;
        Ok(Some(ProjectRun::new(build, run_date, features)))
    }
}
