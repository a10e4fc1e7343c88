//! # Application State
//!
//! Shared state handed to every handler: the block store and the upload
//! authenticator.

use std::sync::Arc;

use cairn_core::config::DEFAULT_MAX_UPLOAD_BYTES;
use cairn_core::{CairnConfig, Result, Secret};
use cairn_store::{DiskStore, Store};
use subtle::ConstantTimeEq;

/// Shared application state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Store blocks are served from and uploaded to.
    pub store: Arc<Store>,
    authenticator: Arc<Secret>,
    /// Cap on request bodies.
    pub max_upload_bytes: usize,
}

impl AppState {
    /// State over an existing store.
    pub fn new(store: Arc<Store>, authenticator: Secret) -> Self {
        Self {
            store,
            authenticator: Arc::new(authenticator),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Override the request body cap.
    pub fn with_max_upload(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Open the store described by `config`.
    ///
    /// `server.directory` takes precedence over `store.directory`. Blocks
    /// are written straight to disk with no memory cache in front, so
    /// uploads are not retained in RAM. The server never chains to a
    /// remote store.
    pub fn open(config: &CairnConfig) -> Result<Self> {
        let directory = config
            .server
            .directory
            .as_ref()
            .or(config.store.directory.as_ref());
        let store = match directory {
            Some(dir) => Store::new(
                DiskStore::open(dir)?.with_mmap_threshold(config.store.mmap_threshold),
            ),
            None => Store::memory(),
        };
        tracing::info!(store = ?store, "opened block store");
        Ok(Self::new(Arc::new(store), config.server.authenticator.clone())
            .with_max_upload(config.server.max_upload_bytes))
    }

    /// Whether `provided` matches the configured authenticator. Always
    /// false when no authenticator is configured.
    pub fn authenticate(&self, provided: &str) -> bool {
        if self.authenticator.is_empty() {
            return false;
        }
        bool::from(
            provided
                .as_bytes()
                .ct_eq(self.authenticator.expose().as_bytes()),
        )
    }
}
