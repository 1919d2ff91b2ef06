//! Byte sources the loaders fetch from.

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::error::ResourceError;

/// Fetches the raw bytes behind an asset url.
pub trait AssetSource {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, ResourceError>>;
}

/// Serves urls as paths relative to an asset root directory.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map `url` to a path under the root. Urls that would leave the root
    /// (`..` segments, drive prefixes) are rejected.
    pub fn resolve(&self, url: &str) -> Result<PathBuf, ResourceError> {
        let relative = Path::new(url.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(ResourceError::load_failure(url, "path escapes the asset root"));
        }
        Ok(self.root.join(relative))
    }
}

impl AssetSource for FsSource {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, ResourceError>> {
        async move {
            let path = self.resolve(url)?;
            tracing::trace!(path = %path.display(), "reading asset");
            tokio::fs::read(&path)
                .await
                .map_err(|e| ResourceError::load_failure(url, e))
        }
        .boxed_local()
    }
}

/// In-memory source for embedded assets and tests.
///
/// Counts fetches per url and can simulate transfer latency.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: RefCell<HashMap<String, Vec<u8>>>,
    fetches: RefCell<HashMap<String, usize>>,
    latency: Option<Duration>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch by `latency` before answering.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn insert(&self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(url.into(), bytes.into());
    }

    /// Number of times `url` has been fetched, whether or not it existed.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.borrow().get(url).copied().unwrap_or(0)
    }
}

impl AssetSource for MemorySource {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, ResourceError>> {
        async move {
            *self.fetches.borrow_mut().entry(url.to_string()).or_default() += 1;
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            self.files
                .borrow()
                .get(url)
                .cloned()
                .ok_or_else(|| ResourceError::load_failure(url, "404 not found"))
        }
        .boxed_local()
    }
}
