//! Shared data types for indexed artifacts.

use crate::digest::ContentDigest;
use crate::filename::{DistributionKind, ParsedFilename};

/// Identity of one package file in the backing directory.
///
/// Built once per filename and shared between snapshots while the file keeps
/// appearing in later scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    /// Canonical project name (PEP 503).
    pub name: String,
    /// Base release version, e.g. `1.0.0` for `1.0.0a1`.
    pub version: String,
    /// Full normalized version as encoded in the filename.
    pub full_version: String,
    /// On-disk file name.
    pub filename: String,
    pub digest: ContentDigest,
    pub kind: DistributionKind,
    /// Size in bytes at the time the digest was taken.
    pub size: u64,
}

impl ArtifactRecord {
    pub fn new(parsed: ParsedFilename, filename: &str, digest: ContentDigest, size: u64) -> Self {
        Self {
            name: parsed.name,
            version: parsed.version.base_version(),
            full_version: parsed.version.to_string(),
            filename: filename.to_string(),
            digest,
            kind: parsed.kind,
            size,
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.kind.content_type()
    }
}
