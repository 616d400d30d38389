//! # Index Builder
//!
//! Scans the package directory and assembles an [`IndexSnapshot`]: artifacts
//! grouped by package page key, in directory-listing order, plus the lookup
//! table of static download paths.
//!
//! Snapshots are immutable. A rebuild produces a brand new snapshot which the
//! [`IndexState`](crate::state::IndexState) publishes in one swap.
//!
//! ## Failure policy
//!
//! With [`ScanPolicy::Strict`] (the default) the first file that cannot be
//! parsed or read aborts the whole build, so a broken directory is noticed
//! immediately instead of silently missing packages.
//! [`ScanPolicy::SkipInvalid`] logs and skips such files instead.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::filename::is_artifact_filename;
use crate::metadata::MetadataCache;
use crate::types::ArtifactRecord;

/// Mount point of the simple repository.
pub const BASE_HREF: &str = "/simple";

/// Path that triggers a directory re-scan.
pub const REBUILD_PATH: &str = "/simple/rebuild-index";

/// Page key for a canonical package name, e.g. `/simple/demo`.
pub fn page_key(name: &str) -> String {
    format!("{BASE_HREF}/{name}")
}

/// Download path for an artifact, e.g. `/simple/demo-1.0.tar.gz`.
pub fn static_path(filename: &str) -> String {
    format!("{BASE_HREF}/{filename}")
}

/// What to do with a file that has an artifact extension but cannot be indexed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ScanPolicy {
    /// Abort the build; the previous snapshot stays active.
    #[default]
    Strict,
    /// Log a warning and leave the file out of the index.
    SkipInvalid,
}

/// A file left out of a lenient build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub filename: String,
    pub reason: String,
}

/// One immutable generation of the index.
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    generation: u64,
    packages: IndexMap<String, Vec<Arc<ArtifactRecord>>>,
    static_files: HashMap<String, Arc<ArtifactRecord>>,
    skipped: Vec<SkippedEntry>,
}

impl IndexSnapshot {
    /// Monotonic build counter; the initial build is generation 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Package pages in first-seen order, keyed by page key.
    pub fn packages(&self) -> impl Iterator<Item = (&str, &[Arc<ArtifactRecord>])> {
        self.packages
            .iter()
            .map(|(key, records)| (key.as_str(), records.as_slice()))
    }

    /// Artifacts of the package served at `key`.
    pub fn package(&self, key: &str) -> Option<&[Arc<ArtifactRecord>]> {
        self.packages.get(key).map(Vec::as_slice)
    }

    pub fn has_package(&self, key: &str) -> bool {
        self.packages.contains_key(key)
    }

    /// The artifact served at the static download path `path`.
    pub fn artifact(&self, path: &str) -> Option<&Arc<ArtifactRecord>> {
        self.static_files.get(path)
    }

    pub fn is_static_path(&self, path: &str) -> bool {
        self.static_files.contains_key(path)
    }

    pub fn static_paths(&self) -> impl Iterator<Item = &str> {
        self.static_files.keys().map(String::as_str)
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    pub fn artifact_count(&self) -> usize {
        self.static_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }
}

/// Builds snapshots of a package directory.
pub struct IndexBuilder<'a> {
    cache: &'a MetadataCache,
    policy: ScanPolicy,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(cache: &'a MetadataCache, policy: ScanPolicy) -> Self {
        Self { cache, policy }
    }

    /// Scan the directory behind the metadata cache.
    pub fn build(&self, generation: u64) -> AppResult<IndexSnapshot> {
        let dir = self.cache.package_dir();
        let unreadable = |source| AppError::DirectoryUnreadable {
            path: dir.to_path_buf(),
            source,
        };

        let mut snapshot = IndexSnapshot {
            generation,
            ..IndexSnapshot::default()
        };

        for entry in fs::read_dir(dir).map_err(unreadable)? {
            let entry = entry.map_err(unreadable)?;
            let Some(filename) = entry.file_name().to_str().map(str::to_owned) else {
                warn!(path = %entry.path().display(), "Skipping non UTF-8 file name");
                continue;
            };
            // Only directories are skipped here; dangling symlinks and other
            // unreadable artifacts must fail in extraction.
            if !is_artifact_filename(&filename) || entry.path().is_dir() {
                continue;
            }

            let record = match self.cache.extract(&filename) {
                Ok(record) => record,
                Err(e) if self.policy == ScanPolicy::SkipInvalid => {
                    warn!(filename = %filename, error = %e, "Skipping package file");
                    snapshot.skipped.push(SkippedEntry {
                        filename,
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            debug!(filename = %filename, package = %record.name, version = %record.version, "Indexed package file");
            snapshot
                .static_files
                .insert(static_path(&filename), Arc::clone(&record));
            snapshot
                .packages
                .entry(page_key(&record.name))
                .or_default()
                .push(record);
        }

        info!(
            generation,
            packages = snapshot.package_count(),
            files = snapshot.artifact_count(),
            skipped = snapshot.skipped.len(),
            "Built package index"
        );
        Ok(snapshot)
    }
}

impl fmt::Debug for IndexBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexBuilder")
            .field("package_dir", &self.cache.package_dir())
            .field("policy", &self.policy)
            .finish()
    }
}
