//! # Store — Cache Chains over a Backing Medium
//!
//! A [`Store`] wraps one [`Backend`] (the backing medium) and optionally a
//! cache, which is itself a `Store`. Writes land in the cache and are
//! journaled; [`Store::flush`] drains the journal into the backend. Reads
//! consult the cache chain first and fall through to the backend when the
//! cache does not have the block.
//!
//! ```text
//!   store_block ──▶ cache (MemoryStore) ──journal──▶ backend (DiskStore)
//!   retrieve    ──▶ cache? ── NoSuchBlock ──▶ backend
//! ```
//!
//! ## Consistency Invariant
//!
//! A name is appended to the journal only after the cache write succeeds,
//! so every journaled name is retrievable from the cache. A flush that
//! finds otherwise fails with [`CairnError::CacheInconsistency`]: that is
//! a logic bug, never retried.

use std::path::Path;

use cairn_block::{Block, EncryptedBlock, FileBlocks};
use cairn_core::{CairnError, Result, StoreConfig};

use crate::bytes::BlockBytes;
use crate::disk::DiskStore;
use crate::journal::Journal;
use crate::memory::MemoryStore;
use crate::remote::RemoteStore;

/// A backing medium. `put` and `get` are the only obligations.
///
/// Implementations must be safe to call from multiple threads and may
/// block on disk or network I/O.
pub trait Backend: Send + Sync {
    /// Persist `bytes` under `name`. Writing the same name twice is a no-op
    /// or an overwrite with identical bytes.
    fn put(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Read the bytes stored under `name`.
    ///
    /// Fails with [`CairnError::NoSuchBlock`] if absent and with an
    /// I/O-class error if the medium fails.
    fn get(&self, name: &str) -> Result<BlockBytes>;

    /// Enumerate stored names, if the medium supports it.
    fn list(&self) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    /// Short label for log lines.
    fn kind(&self) -> &'static str;
}

/// A backing medium plus an optional write-back cache chain.
pub struct Store {
    backend: Box<dyn Backend>,
    cache: Option<Box<Store>>,
    journal: Journal,
}

impl Store {
    /// A store that writes straight to `backend`.
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            cache: None,
            journal: Journal::new(),
        }
    }

    /// A store that writes to `cache` first and to `backend` on flush.
    pub fn with_cache(backend: impl Backend + 'static, cache: Store) -> Self {
        Self {
            backend: Box::new(backend),
            cache: Some(Box::new(cache)),
            journal: Journal::new(),
        }
    }

    /// An in-memory store with no cache.
    pub fn memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// A memory cache over a disk store rooted at `dir`.
    pub fn cached_disk(dir: &Path) -> Result<Self> {
        Ok(Self::with_cache(DiskStore::open(dir)?, Self::memory()))
    }

    /// Assemble the chain described by `config`:
    ///
    /// | directory | remote | chain |
    /// |---|---|---|
    /// | no | no | memory |
    /// | yes | no | memory → disk |
    /// | no | yes | memory → remote |
    /// | yes | yes | memory → disk → remote |
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let local = match &config.directory {
            Some(dir) => Self::with_cache(
                DiskStore::open(dir)?.with_mmap_threshold(config.mmap_threshold),
                Self::memory(),
            ),
            None => Self::memory(),
        };
        match &config.remote {
            Some(remote) => Ok(Self::with_cache(RemoteStore::new(remote)?, local)),
            None => Ok(local),
        }
    }

    /// The cache, if configured.
    pub fn cache(&self) -> Option<&Store> {
        self.cache.as_deref()
    }

    /// Names written to the cache but not yet to this store's backend.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Label of this store's backing medium.
    pub fn kind(&self) -> &'static str {
        self.backend.kind()
    }

    /// Store a plaintext block under its name.
    pub fn store_block(&self, block: &Block) -> Result<()> {
        self.store_bytes(block.name(), block.bytes())
    }

    /// Store ciphertext under the fingerprint of the ciphertext.
    pub fn store_encrypted(&self, block: &EncryptedBlock) -> Result<()> {
        self.store_bytes(&block.name().encode(), block.ciphertext())
    }

    /// Store several plaintext blocks, stopping at the first failure.
    pub fn store_all<'a>(&self, blocks: impl IntoIterator<Item = &'a Block>) -> Result<()> {
        for block in blocks {
            self.store_block(block)?;
        }
        Ok(())
    }

    /// Store every block of a chunked file.
    pub fn store_file(&self, file: &FileBlocks) -> Result<()> {
        self.store_all(&file.plaintext)?;
        for block in &file.encrypted {
            self.store_encrypted(block)?;
        }
        Ok(())
    }

    /// Write `bytes` under `name` through the cache chain.
    ///
    /// Without a cache this is a synchronous backend `put`. With a cache the
    /// bytes go to the cache and `name` is journaled for the next flush.
    pub fn store_bytes(&self, name: &str, bytes: &[u8]) -> Result<()> {
        match &self.cache {
            None => self.backend.put(name, bytes),
            Some(cache) => {
                cache.store_bytes(name, bytes)?;
                self.journal.append(name);
                Ok(())
            }
        }
    }

    /// Read the bytes stored under `name`, cache chain first.
    pub fn retrieve(&self, name: &str) -> Result<BlockBytes> {
        if let Some(cache) = &self.cache {
            match cache.retrieve(name) {
                Ok(bytes) => return Ok(bytes),
                Err(CairnError::NoSuchBlock { .. }) => {
                    tracing::trace!(name, "cache miss");
                }
                Err(e) => return Err(e),
            }
        }
        self.backend.get(name)
    }

    /// Drain the journal into the backend, then flush the cache chain.
    ///
    /// Only one flush drains at a time; the lock is held across the backend
    /// writes. A failed `put` puts its name back at the head of the journal
    /// and returns the error.
    pub fn flush(&self) -> Result<()> {
        {
            let _drain = self.journal.begin_flush();
            let mut written = 0usize;
            while let Some(name) = self.journal.pop_front() {
                let bytes = match self.cache.as_ref().map(|c| c.retrieve(&name)) {
                    Some(Ok(bytes)) => bytes,
                    Some(Err(CairnError::NoSuchBlock { .. })) | None => {
                        tracing::error!(
                            name = %name,
                            backend = self.kind(),
                            "journaled block missing from cache"
                        );
                        return Err(CairnError::CacheInconsistency { name });
                    }
                    Some(Err(e)) => {
                        self.journal.requeue(name);
                        return Err(e);
                    }
                };
                if let Err(e) = self.backend.put(&name, &bytes) {
                    tracing::warn!(
                        name = %name,
                        backend = self.kind(),
                        error = %e,
                        "flush write failed"
                    );
                    self.journal.requeue(name);
                    return Err(e);
                }
                written += 1;
            }
            if written > 0 {
                tracing::debug!(backend = self.kind(), written, "flushed journal");
            }
        }
        match &self.cache {
            Some(cache) => cache.flush(),
            None => Ok(()),
        }
    }

    /// Names held by this store's backend, if it can enumerate them.
    pub fn list(&self) -> Result<Option<Vec<String>>> {
        self.backend.list()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.kind())
            .field("cache", &self.cache)
            .field("pending", &self.journal.len())
            .finish()
    }
}
