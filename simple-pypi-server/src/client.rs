//! Blocking HTTP client for a running index server.
//!
//! Used by the `rebuild` command to trigger a re-scan without restarting the
//! server. Do not construct it on an async runtime thread; wrap calls in
//! `tokio::task::spawn_blocking` instead.

use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use tracing::{debug, error, info};
use url::Url;

use crate::index::{BASE_HREF, REBUILD_PATH};

static PACKAGE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<a href="/simple/([^"]+)">"#).expect("package link regex is valid")
});

/// Client for the simple repository endpoints.
#[derive(Debug, Clone)]
pub struct IndexClient {
    client: Client,
    base_url: Url,
}

impl IndexClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid server URL: {base_url}"))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check if the server answers on its index page.
    pub fn is_server_running(&self) -> bool {
        let Ok(url) = self.endpoint(BASE_HREF) else {
            return false;
        };
        self.client
            .get(url)
            .send()
            .map(|resp| resp.status().is_success())
            .unwrap_or(false)
    }

    /// Ask the server to re-scan its package directory.
    ///
    /// Returns the server's confirmation text. Note that a server running
    /// with legacy status codes reports failures with status 200, so the
    /// body is the only reliable signal in that mode.
    pub fn rebuild(&self) -> Result<String> {
        let url = self.endpoint(REBUILD_PATH)?;
        debug!(url = %url, "Requesting index rebuild");

        let response = self
            .client
            .get(url.clone())
            .send()
            .with_context(|| format!("Failed to reach {url}"))?;
        let status = response.status();
        let body = response
            .text()
            .unwrap_or_else(|_| "Unknown error".to_string());

        if !status.is_success() {
            error!(status = %status, body = %body, "Index rebuild failed");
            anyhow::bail!("Index rebuild failed ({status}): {body}");
        }

        info!(url = %url, "Index rebuilt");
        Ok(body)
    }

    /// Canonical names of all packages listed on the root index.
    pub fn list_packages(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.endpoint(BASE_HREF)?)
            .send()
            .context("Failed to get package index")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to get package index: {}", response.status());
        }

        let html = response.text().context("Failed to read package index")?;
        Ok(PACKAGE_LINK
            .captures_iter(&html)
            .map(|c| c[1].to_string())
            .collect())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid endpoint path: {path}"))
    }
}
