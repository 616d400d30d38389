//! Memoized per-file metadata extraction.
//!
//! [`MetadataCache`] turns a filename in the package directory into an
//! [`ArtifactRecord`]: the filename is parsed and the file content hashed
//! exactly once per process. Artifacts are treated as immutable once placed
//! in the directory; replacing a file in place under the same name keeps
//! serving the old digest until the process restarts.
//!
//! The cache is append-only and safe to populate from several threads. Two
//! threads racing on the same new filename may both hash it, but only the
//! first inserted record is ever handed out.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::digest::{ContentDigest, DigestAlgorithm};
use crate::error::{AppError, AppResult};
use crate::filename::parse_filename;
use crate::types::ArtifactRecord;

pub struct MetadataCache {
    package_dir: PathBuf,
    algorithm: DigestAlgorithm,
    entries: RwLock<HashMap<String, Arc<ArtifactRecord>>>,
}

impl MetadataCache {
    pub fn new<P: Into<PathBuf>>(package_dir: P, algorithm: DigestAlgorithm) -> Self {
        Self {
            package_dir: package_dir.into(),
            algorithm,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Return the record for `filename`, parsing and hashing it on first use.
    pub fn extract(&self, filename: &str) -> AppResult<Arc<ArtifactRecord>> {
        if let Some(record) = self.get(filename) {
            return Ok(record);
        }

        let parsed = parse_filename(filename)?;
        let (digest, size) = self.hash_file(filename)?;
        let record = Arc::new(ArtifactRecord::new(parsed, filename, digest, size));

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(
            entries.entry(filename.to_string()).or_insert(record),
        ))
    }

    /// Content digest of `filename`, memoized with the rest of its record.
    pub fn digest(&self, filename: &str) -> AppResult<ContentDigest> {
        self.extract(filename).map(|record| record.digest.clone())
    }

    pub fn get(&self, filename: &str) -> Option<Arc<ArtifactRecord>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(filename)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn hash_file(&self, filename: &str) -> AppResult<(ContentDigest, u64)> {
        let path = self.package_dir.join(filename);
        let unreadable = |source| AppError::FileUnreadable {
            filename: filename.to_string(),
            source,
        };

        let mut file = File::open(&path).map_err(unreadable)?;
        let (digest, size) = self
            .algorithm
            .digest_reader(&mut file)
            .map_err(unreadable)?;
        debug!(filename = %filename, size, digest = %digest, "Hashed package file");
        Ok((digest, size))
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("package_dir", &self.package_dir)
            .field("algorithm", &self.algorithm)
            .field("entries", &self.len())
            .finish()
    }
}
