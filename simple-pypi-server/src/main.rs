//! Standalone `simple-pypi` binary
//!
//! Serves a directory of Python package files as a simple index, checks such
//! a directory offline, or asks a running server to rebuild its index.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    simple_pypi_server::cli::run().await
}
