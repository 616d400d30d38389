//! HTML rendering for the simple repository pages.
//!
//! The root index lists one link per package; each package page lists one
//! link per artifact with the content digest in the URL fragment, the layout
//! pip and other installers expect from a PEP 503 index.
//!
//! Rendered pages are memoized in a [`PageCache`] keyed by snapshot
//! generation, so a rebuild can never serve a page derived from an older
//! snapshot.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use askama::Template;
use tracing::error;

use crate::error::{AppError, AppResult};
use crate::index::{IndexSnapshot, BASE_HREF};

#[derive(Template)]
#[template(path = "simple_index.html")]
struct RootIndexTemplate<'a> {
    base: &'a str,
    packages: Vec<&'a str>,
}

#[derive(Template)]
#[template(path = "simple_package.html")]
struct PackagePageTemplate<'a> {
    base: &'a str,
    name: &'a str,
    files: Vec<FileLink<'a>>,
}

struct FileLink<'a> {
    filename: &'a str,
    fragment: String,
}

fn template_error(e: askama::Error) -> AppError {
    error!("Template render error: {}", e);
    AppError::InternalError(format!("Template render error: {e}"))
}

/// Root index listing every package, in snapshot order.
pub fn render_root_index(snapshot: &IndexSnapshot) -> AppResult<String> {
    let packages = snapshot
        .packages()
        .filter_map(|(_, records)| records.first().map(|record| record.name.as_str()))
        .collect();

    RootIndexTemplate {
        base: BASE_HREF,
        packages,
    }
    .render()
    .map_err(template_error)
}

/// Links page for the package served at `key`, or `None` if it is unknown.
pub fn render_package_page(snapshot: &IndexSnapshot, key: &str) -> AppResult<Option<String>> {
    let Some(records) = snapshot.package(key) else {
        return Ok(None);
    };
    let Some(first) = records.first() else {
        return Ok(None);
    };

    let files = records
        .iter()
        .map(|record| FileLink {
            filename: &record.filename,
            fragment: record.digest.fragment(),
        })
        .collect();

    PackagePageTemplate {
        base: BASE_HREF,
        name: &first.name,
        files,
    }
    .render()
    .map(Some)
    .map_err(template_error)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Page {
    Root,
    Package(String),
}

#[derive(Debug, Default)]
struct PageStore {
    /// Newest generation published so far; older pages are never stored.
    newest: u64,
    pages: HashMap<(u64, Page), Arc<str>>,
}

/// Memoized pages, keyed by snapshot generation and page.
#[derive(Debug, Default)]
pub struct PageCache {
    store: RwLock<PageStore>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self, snapshot: &IndexSnapshot) -> AppResult<Arc<str>> {
        let key = (snapshot.generation(), Page::Root);
        if let Some(page) = self.lookup(&key) {
            return Ok(page);
        }
        Ok(self.insert(key, render_root_index(snapshot)?))
    }

    pub fn package(&self, snapshot: &IndexSnapshot, key: &str) -> AppResult<Option<Arc<str>>> {
        let cache_key = (snapshot.generation(), Page::Package(key.to_string()));
        if let Some(page) = self.lookup(&cache_key) {
            return Ok(Some(page));
        }
        Ok(render_package_page(snapshot, key)?.map(|page| self.insert(cache_key, page)))
    }

    /// Drop every page older than `generation` and refuse to store them later.
    pub fn retain_generation(&self, generation: u64) {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        store.newest = store.newest.max(generation);
        let newest = store.newest;
        store.pages.retain(|(g, _), _| *g >= newest);
    }

    pub fn len(&self) -> usize {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .pages
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &(u64, Page)) -> Option<Arc<str>> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .pages
            .get(key)
            .cloned()
    }

    fn insert(&self, key: (u64, Page), page: String) -> Arc<str> {
        let page: Arc<str> = Arc::from(page);
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        // A reader still holding a replaced snapshot gets its page uncached.
        if key.0 < store.newest {
            return page;
        }
        Arc::clone(store.pages.entry(key).or_insert(page))
    }
}
