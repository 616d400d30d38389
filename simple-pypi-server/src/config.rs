//! # Configuration Management
//!
//! Server settings come from three layers, later layers winning:
//!
//! 1. built-in defaults (`127.0.0.1:8888`, SHA-1 digests, strict scanning)
//! 2. an optional JSON file passed with `--config` / `SIMPLE_PYPI_CONFIG`
//! 3. command-line flags and their `SIMPLE_PYPI_*` environment variables
//!
//! The package directory has no default. Starting without one is a
//! configuration error.
//!
//! ```json
//! {
//!   "host": "0.0.0.0",
//!   "port": 8888,
//!   "package_dir": "/srv/wheels",
//!   "hash_algorithm": "sha256",
//!   "scan_policy": "skip-invalid",
//!   "legacy_status_codes": false
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::digest::DigestAlgorithm;
use crate::error::{AppError, AppResult};
use crate::index::{ScanPolicy, BASE_HREF, REBUILD_PATH};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8888;

pub const ENV_PKG_DIR: &str = "SIMPLE_PYPI_PKG_DIR";

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Directory scanned for package files.
    pub package_dir: PathBuf,
    pub hash_algorithm: DigestAlgorithm,
    pub scan_policy: ScanPolicy,
    /// Answer every request with status 200, for clients that expect it.
    pub legacy_status_codes: bool,
}

/// Partial configuration as read from a JSON file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub package_dir: Option<PathBuf>,
    pub hash_algorithm: Option<DigestAlgorithm>,
    pub scan_policy: Option<ScanPolicy>,
    pub legacy_status_codes: Option<bool>,
}

impl ConfigFile {
    /// Load a configuration file; fails if it is missing or malformed.
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Layer `overrides` on top of this file and fill in defaults.
    pub fn resolve(self, overrides: ConfigFile) -> AppResult<Config> {
        let package_dir = overrides
            .package_dir
            .or(self.package_dir)
            .filter(|dir| !dir.as_os_str().is_empty())
            .ok_or_else(|| AppError::Config(format!("{ENV_PKG_DIR} must not be empty")))?;

        Ok(Config {
            host: overrides
                .host
                .or(self.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: overrides.port.or(self.port).unwrap_or(DEFAULT_PORT),
            package_dir,
            hash_algorithm: overrides
                .hash_algorithm
                .or(self.hash_algorithm)
                .unwrap_or_default(),
            scan_policy: overrides
                .scan_policy
                .or(self.scan_policy)
                .unwrap_or_default(),
            legacy_status_codes: overrides
                .legacy_status_codes
                .or(self.legacy_status_codes)
                .unwrap_or(false),
        })
    }
}

impl Config {
    /// Resolve a configuration from an optional file plus explicit overrides.
    pub fn resolve(file: Option<&Path>, overrides: ConfigFile) -> AppResult<Self> {
        let base = match file {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        base.resolve(overrides)
    }

    /// Configuration for a package directory with every other setting defaulted.
    pub fn for_package_dir<P: Into<PathBuf>>(package_dir: P) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            package_dir: package_dir.into(),
            hash_algorithm: DigestAlgorithm::default(),
            scan_policy: ScanPolicy::default(),
            legacy_status_codes: false,
        }
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn index_url(&self) -> String {
        format!("{}{BASE_HREF}", self.server_url())
    }

    pub fn rebuild_url(&self) -> String {
        format!("{}{REBUILD_PATH}", self.server_url())
    }
}
