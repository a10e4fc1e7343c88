//! In-process backing medium.

use std::collections::HashMap;
use std::sync::Arc;

use cairn_core::{CairnError, Result};
use parking_lot::RwLock;

use crate::bytes::BlockBytes;
use crate::store::Backend;

/// A map from name to shared bytes. Used as the innermost cache layer and
/// as a standalone store in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    /// Whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.blocks.read().contains_key(name)
    }
}

impl Backend for MemoryStore {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.blocks
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::from(bytes));
        Ok(())
    }

    fn get(&self, name: &str) -> Result<BlockBytes> {
        self.blocks
            .read()
            .get(name)
            .map(|bytes| BlockBytes::Shared(Arc::clone(bytes)))
            .ok_or_else(|| CairnError::no_such_block(name))
    }

    fn list(&self) -> Result<Option<Vec<String>>> {
        let mut names: Vec<String> = self.blocks.read().keys().cloned().collect();
        names.sort();
        Ok(Some(names))
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
