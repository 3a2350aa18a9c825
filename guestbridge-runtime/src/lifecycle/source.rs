//! Collaborators a module slot talks to: where bytes come from and where
//! load failures go.

use dashmap::DashMap;
use guestbridge_core::error::{BridgeError, Result};
use guestbridge_core::logging::{LogCollector, LogLine};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by [`BinarySource::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>>;

/// Produces module bytes for an opaque reference.
pub trait BinarySource: Send + Sync {
    /// Fetch the bytes behind `reference`.
    fn fetch<'a>(&'a self, reference: &'a str) -> FetchFuture<'a>;
}

/// Reads modules from the file system, optionally under a root directory.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    root: Option<PathBuf>,
}

impl FileSource {
    /// Resolve references as plain paths.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve references relative to `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(reference),
            None => PathBuf::from(reference),
        }
    }
}

impl BinarySource for FileSource {
    fn fetch<'a>(&'a self, reference: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            let path = self.resolve(reference);
            tokio::fs::read(&path)
                .await
                .map_err(|e| BridgeError::ModuleFetch {
                    reference: reference.to_string(),
                    cause: format!("{}: {e}", path.display()),
                })
        })
    }
}

/// In-memory modules keyed by reference.
#[derive(Debug, Default)]
pub struct MemorySource {
    modules: DashMap<String, Arc<Vec<u8>>>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the bytes for `reference`.
    pub fn insert(&self, reference: impl Into<String>, bytes: Vec<u8>) {
        self.modules.insert(reference.into(), Arc::new(bytes));
    }

    /// Forget `reference`.
    pub fn remove(&self, reference: &str) -> bool {
        self.modules.remove(reference).is_some()
    }
}

impl BinarySource for MemorySource {
    fn fetch<'a>(&'a self, reference: &'a str) -> FetchFuture<'a> {
        let found = self.modules.get(reference).map(|bytes| Arc::clone(&bytes));
        Box::pin(async move {
            found
                .map(|bytes| bytes.as_ref().clone())
                .ok_or_else(|| BridgeError::ModuleFetch {
                    reference: reference.to_string(),
                    cause: "no such module".to_string(),
                })
        })
    }
}

/// Receives human-readable load failures.
pub trait ErrorSink: Send + Sync {
    /// Report a failure for `module`.
    fn report(&self, module: &str, message: &str);
}

/// Forwards failures into a [`LogCollector`].
#[derive(Debug, Clone)]
pub struct CollectorSink(pub Arc<LogCollector>);

impl ErrorSink for CollectorSink {
    fn report(&self, module: &str, message: &str) {
        self.0.collect(LogLine::error(format!("[{module}] {message}")));
    }
}

/// Emits failures as `tracing` errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, module: &str, message: &str) {
        tracing::error!(module, "{message}");
    }
}
