//! # Simple PyPI Server
//!
//! A small PEP 503 "simple" package index for local development. Drop wheels
//! and source distributions into one directory and point `pip` at
//! `http://<host>:<port>/simple`.
//!
//! ## Features
//!
//! - **Filename parsing**: wheel and sdist names are parsed and normalized
//!   following the packaging rules pip uses
//! - **Memoized digests**: each file is hashed once per process
//! - **Atomic rebuilds**: `/simple/rebuild-index` re-scans the directory and
//!   swaps in the new index in a single step
//! - **Cached pages**: rendered HTML is reused until the next rebuild
//!
//! ## Key Modules
//!
//! - [`filename`]: wheel and sdist filename parsing
//! - [`version`]: PEP 440 versions and their base release
//! - [`metadata`]: memoized per-file metadata and digests
//! - [`index`]: directory scanning and immutable index snapshots
//! - [`render`]: HTML pages and their cache
//! - [`state`]: the live index and its rebuild protocol
//! - [`server`]: routes and the HTTP server
//! - [`client`]: blocking client used by the `rebuild` command

pub mod cli;
pub mod client;
pub mod config;
pub mod digest;
pub mod error;
pub mod filename;
pub mod index;
pub mod metadata;
pub mod render;
pub mod server;
pub mod state;
pub mod types;
pub mod version;

pub use client::IndexClient;
pub use config::{Config, ConfigFile};
pub use digest::{ContentDigest, DigestAlgorithm};
pub use error::{AppError, AppResult, ErrorCode};
pub use filename::{normalize_pypi_name, parse_filename, DistributionKind, ParsedFilename};
pub use index::{IndexBuilder, IndexSnapshot, ScanPolicy};
pub use server::{build_router, run_server, run_server_with_shutdown, serve};
pub use state::{AppState, IndexState};
pub use types::ArtifactRecord;
