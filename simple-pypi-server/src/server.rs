//! HTTP server setup and route handlers for the simple repository.
//!
//! | Path | Response |
//! |---|---|
//! | `/simple` | root index |
//! | `/simple/{package}` | package links page |
//! | `/simple/{filename}` | raw artifact bytes |
//! | `/simple/rebuild-index` | re-scan the package directory |
//!
//! Trailing slashes are accepted everywhere. Every response carries
//! keep-alive hints, an explicit content length and a wildcard CORS header.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::HttpBody,
    extract::{Path as AxumPath, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::filename::normalize_pypi_name;
use crate::index::{page_key, BASE_HREF, REBUILD_PATH};
use crate::state::AppState;
use crate::types::ArtifactRecord;

/// Body returned after a successful re-scan.
pub const REBUILD_CONFIRMATION: &str = "Index was rebuilt successfully";

/// Build the router serving the simple repository for `state`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(BASE_HREF, get(root_index))
        .route("/simple/", get(root_index))
        .route("/simple/{entry}", get(simple_entry))
        .route("/simple/{entry}/", get(simple_entry))
        .fallback(not_found)
        .layer(middleware::map_response_with_state(
            Arc::clone(&state),
            finalize_response,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server and run until Ctrl-C.
pub async fn run_server(config: Config) -> Result<()> {
    run_server_with_shutdown(config, None).await
}

/// Start the server; stops when `shutdown_rx` fires, or on Ctrl-C when `None`.
pub async fn run_server_with_shutdown(
    config: Config,
    shutdown_rx: Option<oneshot::Receiver<()>>,
) -> Result<()> {
    info!(package_dir = %config.package_dir.display(), "Building initial package index");
    let state = tokio::task::spawn_blocking(move || AppState::from_config(config)).await??;
    let config = Arc::clone(&state.config);

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|e| {
            error!(host = %config.host, port = config.port, error = %e, "Failed to bind to address");
            anyhow::anyhow!("Failed to bind to {}:{}: {}", config.host, config.port, e)
        })?;

    info!(
        host = %config.host,
        port = config.port,
        index_url = %config.index_url(),
        rebuild_url = %config.rebuild_url(),
        "Listening for incoming requests"
    );
    println!("✅ Simple PyPI server is running on {}", config.server_url());
    println!("   Index:      {}", config.index_url());
    println!("   Rebuild:    {}", config.rebuild_url());
    println!();
    println!("📋 Install from it with:");
    println!("   pip install --index-url {} <package>", config.index_url());

    let shutdown = async move {
        match shutdown_rx {
            Some(rx) => {
                let _ = rx.await;
            }
            None => shutdown_signal().await,
        }
    };
    serve(listener, Arc::new(state), shutdown).await
}

/// Serve `state` on an already bound listener until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| {
            error!(error = %e, "Server error");
            anyhow::anyhow!("Server error: {}", e)
        })?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn root_index(State(state): State<Arc<AppState>>) -> AppResult<Html<String>> {
    debug!("Serving root index");
    Ok(Html(state.index.root_page()?.to_string()))
}

/// Resolve `/simple/{entry}`: package page, artifact download, or rebuild.
async fn simple_entry(
    AxumPath(entry): AxumPath<String>,
    State(state): State<Arc<AppState>>,
) -> AppResult<Response> {
    let path = format!("{BASE_HREF}/{entry}");

    if let Some(page) = state.index.package_page(&path)? {
        debug!(package = %entry, "Serving package page");
        return Ok(Html(page.to_string()).into_response());
    }

    let snapshot = state.index.current();
    if let Some(record) = snapshot.artifact(&path) {
        return download_artifact(&state, record).await;
    }

    if path == REBUILD_PATH {
        return rebuild_index(&state).await;
    }

    // Clients may ask for a non-canonical spelling such as `/simple/Foo_Bar`.
    let canonical = page_key(&normalize_pypi_name(&entry));
    if let Some(page) = state.index.package_page(&canonical)? {
        debug!(package = %entry, canonical = %canonical, "Serving package page for canonical name");
        return Ok(Html(page.to_string()).into_response());
    }

    Err(AppError::NotFound(path))
}

async fn download_artifact(state: &AppState, record: &ArtifactRecord) -> AppResult<Response> {
    let file_path = state.index.package_dir().join(&record.filename);
    let data = tokio::fs::read(&file_path).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound(format!("package file {} is gone", record.filename))
        } else {
            AppError::FileUnreadable {
                filename: record.filename.clone(),
                source,
            }
        }
    })?;

    info!(filename = %record.filename, size = data.len(), "Serving package file");
    Ok(([(header::CONTENT_TYPE, record.content_type())], data).into_response())
}

async fn rebuild_index(state: &AppState) -> AppResult<Response> {
    info!("Rebuild requested");
    let index = Arc::clone(&state.index);
    let snapshot = tokio::task::spawn_blocking(move || index.rebuild())
        .await
        .map_err(|e| AppError::InternalError(format!("rebuild task failed: {e}")))??;

    debug!(generation = snapshot.generation(), "Rebuild finished");
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        REBUILD_CONFIRMATION,
    )
        .into_response())
}

async fn not_found(uri: axum::http::Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

/// Add the common headers, and flatten the status in legacy mode.
async fn finalize_response(State(state): State<Arc<AppState>>, mut response: Response) -> Response {
    if state.config.legacy_status_codes && response.status() != StatusCode::OK {
        debug!(status = %response.status(), "Rewriting status to 200 for legacy clients");
        *response.status_mut() = StatusCode::OK;
    }

    let content_length = response.body().size_hint().exact();
    let headers = response.headers_mut();
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        HeaderName::from_static("keep-alive"),
        HeaderValue::from_static("timeout=5, max=1000"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    if let Some(len) = content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_state;
    use axum_test::TestServer;

    fn server_for(files: &[(&str, &[u8])], legacy: bool) -> (TestServer, tempfile::TempDir) {
        let (state, temp_dir) = create_test_state(files, legacy);
        let server = TestServer::new(build_router(state)).expect("should create test server");
        (server, temp_dir)
    }

    #[tokio::test]
    async fn test_root_index_with_and_without_slash() {
        let (server, _dir) = server_for(&[("demo-1.0.tar.gz", b"sdist")], false);

        for path in ["/simple", "/simple/"] {
            let response = server.get(path).await;
            response.assert_status_ok();
            assert!(response.text().contains(r#"<a href="/simple/demo">demo</a>"#));
        }
    }

    #[tokio::test]
    async fn test_package_page_by_canonical_and_raw_name() {
        let (server, _dir) = server_for(&[("Demo_Pkg-1.0.tar.gz", b"sdist")], false);

        let response = server.get("/simple/demo-pkg/").await;
        response.assert_status_ok();
        assert!(response.text().contains("Links for demo-pkg"));

        let response = server.get("/simple/Demo_Pkg").await;
        response.assert_status_ok();
        assert!(response.text().contains("Demo_Pkg-1.0.tar.gz#sha1="));
    }

    #[tokio::test]
    async fn test_unknown_path_is_404_with_plain_body() {
        let (server, _dir) = server_for(&[], false);

        let response = server.get("/simple/nothing-here").await;
        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_text("Not Found");

        let response = server.get("/elsewhere").await;
        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_text("Not Found");
    }

    #[tokio::test]
    async fn test_legacy_mode_always_answers_200() {
        let (server, _dir) = server_for(&[], true);

        let response = server.get("/nowhere").await;
        response.assert_status_ok();
        response.assert_text("Not Found");
    }

    #[tokio::test]
    async fn test_common_headers_present() {
        let (server, _dir) = server_for(&[("demo-1.0.tar.gz", b"sdist")], false);

        for path in ["/simple", "/simple/demo", "/simple/demo-1.0.tar.gz", "/missing"] {
            let response = server.get(path).await;
            let headers = response.headers();
            assert_eq!(headers["access-control-allow-origin"], "*", "{path}");
            assert_eq!(headers["keep-alive"], "timeout=5, max=1000", "{path}");
            assert_eq!(headers["connection"], "keep-alive", "{path}");
            assert_eq!(
                headers["content-length"],
                response.as_bytes().len().to_string().as_str(),
                "{path}"
            );
        }
    }
}
