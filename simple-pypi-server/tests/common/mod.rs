//! Common test utilities and helpers
//!
//! Shared setup for the integration tests: a temporary package directory,
//! app state built over it, and an in-process test server.

#![allow(dead_code)]

use std::fs;
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use axum_test::TestServer;
use simple_pypi_server::{build_router, AppState, Config};
use tempfile::TempDir;

pub const DEMO_WHEEL: &str = "demo-1.0-py3-none-any.whl";
pub const DEMO_SDIST: &str = "demo-1.0.tar.gz";
pub const DEMO_WHEEL_BYTES: &[u8] = b"PK\x03\x04 not really a zip";
pub const DEMO_SDIST_BYTES: &[u8] = b"\x1f\x8b\x08\x00 not really a tarball";

/// Test server setup result
pub struct TestSetup {
    pub temp_dir: TempDir,
    pub app_state: Arc<AppState>,
    pub server: TestServer,
}

impl TestSetup {
    pub fn package_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Add a file to the package directory without rebuilding.
    pub fn add_file(&self, name: &str, content: &[u8]) {
        fs::write(self.package_dir().join(name), content).expect("should write package file");
    }
}

/// Write `files` into a fresh temporary package directory.
pub fn create_package_dir(files: &[(&str, &[u8])]) -> Result<TempDir> {
    let temp_dir = TempDir::new()?;
    for (name, content) in files {
        fs::write(temp_dir.path().join(name), content)?;
    }
    Ok(temp_dir)
}

/// Build app state and a test server over a directory holding `files`.
pub fn create_test_setup(files: &[(&str, &[u8])]) -> Result<TestSetup> {
    create_test_setup_with(files, |_| {})
}

/// Like [`create_test_setup`], with a hook to adjust the configuration.
pub fn create_test_setup_with<F>(files: &[(&str, &[u8])], configure: F) -> Result<TestSetup>
where
    F: FnOnce(&mut Config),
{
    let temp_dir = create_package_dir(files)?;
    let mut config = Config::for_package_dir(temp_dir.path());
    configure(&mut config);

    let app_state = Arc::new(AppState::from_config(config)?);
    let server = TestServer::new(build_router(Arc::clone(&app_state)))?;

    Ok(TestSetup {
        temp_dir,
        app_state,
        server,
    })
}

/// The demo wheel and sdist used by most end-to-end tests.
pub fn demo_files() -> Vec<(&'static str, &'static [u8])> {
    vec![(DEMO_WHEEL, DEMO_WHEEL_BYTES), (DEMO_SDIST, DEMO_SDIST_BYTES)]
}

/// All `href` attribute values in `html`, in document order.
pub fn hrefs(html: &str) -> Vec<String> {
    let re = regex::Regex::new(r#"href="([^"]*)""#).expect("href regex is valid");
    re.captures_iter(html).map(|c| c[1].to_string()).collect()
}

/// Find an available port for testing
pub fn find_available_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}
