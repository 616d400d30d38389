//! # Application State Management
//!
//! [`IndexState`] owns the active [`IndexSnapshot`] and publishes a new one on
//! every successful rebuild. [`AppState`] bundles it with the configuration
//! and is shared across all request handlers behind an `Arc`.
//!
//! ## Consistency
//!
//! - A rebuild scans the directory without holding the snapshot lock, then
//!   swaps the `Arc` in a single write. Readers see the old snapshot or the
//!   new one, never a mix.
//! - A failed rebuild leaves the previous snapshot in place.
//! - Rebuilds are serialized, so generations are strictly increasing.
//! - Rendered pages are keyed by generation and pruned after each swap.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{error, info};

use crate::config::Config;
use crate::digest::DigestAlgorithm;
use crate::error::AppResult;
use crate::index::{IndexBuilder, IndexSnapshot, ScanPolicy};
use crate::metadata::MetadataCache;
use crate::render::PageCache;

/// Owner of the live package index.
#[derive(Debug)]
pub struct IndexState {
    metadata: MetadataCache,
    policy: ScanPolicy,
    current: RwLock<Arc<IndexSnapshot>>,
    pages: PageCache,
    rebuild_lock: Mutex<()>,
}

impl IndexState {
    /// Create the state and run the initial scan.
    pub fn open<P: AsRef<Path>>(
        package_dir: P,
        algorithm: DigestAlgorithm,
        policy: ScanPolicy,
    ) -> AppResult<Self> {
        let metadata = MetadataCache::new(package_dir.as_ref(), algorithm);
        let initial = IndexBuilder::new(&metadata, policy).build(1)?;
        Ok(Self {
            metadata,
            policy,
            current: RwLock::new(Arc::new(initial)),
            pages: PageCache::new(),
            rebuild_lock: Mutex::new(()),
        })
    }

    /// Re-scan the package directory and publish the result.
    pub fn rebuild(&self) -> AppResult<Arc<IndexSnapshot>> {
        let _guard = self
            .rebuild_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let generation = self.current().generation() + 1;
        let snapshot = match IndexBuilder::new(&self.metadata, self.policy).build(generation) {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                error!(generation, error = %e, "Index rebuild failed, keeping previous index");
                return Err(e);
            }
        };

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&snapshot);
        self.pages.retain_generation(generation);

        info!(
            generation,
            packages = snapshot.package_count(),
            "Published rebuilt index"
        );
        Ok(snapshot)
    }

    /// The snapshot currently being served.
    pub fn current(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Rendered root index of the current snapshot.
    pub fn root_page(&self) -> AppResult<Arc<str>> {
        self.pages.root(&self.current())
    }

    /// Rendered page for package `key` in the current snapshot.
    pub fn package_page(&self, key: &str) -> AppResult<Option<Arc<str>>> {
        self.pages.package(&self.current(), key)
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }

    pub fn package_dir(&self) -> &Path {
        self.metadata.package_dir()
    }

    pub fn policy(&self) -> ScanPolicy {
        self.policy
    }
}

/// Application state shared by all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub index: Arc<IndexState>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Open the index described by `config`.
    pub fn from_config(config: Config) -> AppResult<Self> {
        let index = IndexState::open(&config.package_dir, config.hash_algorithm, config.scan_policy)?;
        Ok(Self {
            index: Arc::new(index),
            config: Arc::new(config),
        })
    }
}
