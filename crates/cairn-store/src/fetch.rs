//! # Fetcher — Link Graph Walks
//!
//! Resolves a [`Link`] and everything reachable from it, depth-first and
//! sequentially, through a [`Store`].
//!
//! For each node:
//!
//! 1. Retrieve the bytes stored under the link target.
//! 2. If the target is a fingerprint, verify the bytes against it. A
//!    mismatch fails the walk with [`CairnError::Integrity`]; substituted
//!    bytes are never parsed.
//! 3. Parse the bytes as a plaintext block.
//! 4. Failing that, decrypt with the link's key, then with the key the
//!    [`KeyLookup`] returns for the target. Decryption failures are logged
//!    and the node is kept as an opaque blob.
//! 5. Blocks are recorded and their links walked; opaque blobs end the
//!    branch.
//!
//! Storage errors (`NoSuchBlock`, I/O) propagate and end the walk.
//!
//! ## Termination
//!
//! Each name is resolved at most once per walk, so shared children are
//! fetched once and cyclic graphs terminate. An optional depth limit
//! rejects graphs deeper than the caller is willing to follow. Depth is
//! measured along the shortest path, so a node first met down a long
//! branch is walked again from its shallower position when one turns up.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cairn_block::{Block, Link};
use cairn_core::{CairnError, Result};
use cairn_crypto::KeyLookup;

use crate::bytes::BlockBytes;
use crate::store::Store;

/// Walks link graphs through a store.
#[derive(Clone)]
pub struct Fetcher {
    store: Arc<Store>,
    keys: Option<Arc<dyn KeyLookup>>,
    max_depth: Option<usize>,
}

impl Fetcher {
    /// A fetcher with no key lookup and no depth limit.
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            keys: None,
            max_depth: None,
        }
    }

    /// Consult `keys` for nodes the link's own key cannot open.
    pub fn with_keys(mut self, keys: Arc<dyn KeyLookup>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Fail with [`CairnError::DepthExceeded`] when a node's shortest path
    /// from the root is longer than `limit` links.
    pub fn max_depth(mut self, limit: usize) -> Self {
        self.max_depth = Some(limit);
        self
    }

    /// The store this fetcher reads from.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Resolve `root` and everything reachable from it.
    pub fn fetch(&self, root: &Link) -> Result<FetchResult> {
        let mut result = FetchResult::default();
        let mut pending = vec![(root.clone(), 0usize)];
        // Shallowest depth each resolved name has been reached at.
        let mut depths: HashMap<String, usize> = HashMap::new();
        // Names seen only beyond the limit so far.
        let mut too_deep: HashSet<String> = HashSet::new();

        while let Some((link, depth)) = pending.pop() {
            let name = link.target().to_string();
            if self.max_depth.is_some_and(|limit| depth > limit) {
                too_deep.insert(name);
                continue;
            }
            match depths.get(&name) {
                Some(&seen) if self.max_depth.is_none() || depth >= seen => continue,
                Some(_) => {
                    // Reached again by a shorter path: revisit the children
                    // at their new depth without fetching the node again.
                    depths.insert(name.clone(), depth);
                    if let Some(block) = result.block(&name) {
                        for child in block.links().iter().rev() {
                            pending.push((child.clone(), depth + 1));
                        }
                    }
                    continue;
                }
                None => {
                    depths.insert(name.clone(), depth);
                }
            }

            let bytes = self.store.retrieve(&name)?;
            if let Some(fingerprint) = link.fingerprint() {
                if !fingerprint.matches(&bytes) {
                    tracing::warn!(name = %name, "retrieved bytes do not match their name");
                    return Err(CairnError::Integrity { name });
                }
            }

            match self.open(&link, &bytes) {
                Some(block) => {
                    // Reverse so the stack pops children in link order.
                    for child in block.links().iter().rev() {
                        pending.push((child.clone(), depth + 1));
                    }
                    result.insert_block(name, block);
                }
                None => result.insert_blob(name, bytes),
            }
        }

        if let Some(limit) = self.max_depth {
            if too_deep.iter().any(|name| !result.contains(name)) {
                return Err(CairnError::DepthExceeded { limit });
            }
        }

        tracing::debug!(
            root = root.target(),
            plaintext = result.plaintext.len(),
            opaque = result.opaque.len(),
            "fetch complete"
        );
        Ok(result)
    }

    /// Turn stored bytes into a block, or `None` if no available key opens
    /// them.
    fn open(&self, link: &Link, bytes: &[u8]) -> Option<Block> {
        if let Ok(block) = Block::parse_with(bytes, link.digest_algorithm()) {
            return Some(block);
        }

        if link.has_key() {
            match link.decrypt(bytes) {
                Ok(block) => return Some(block),
                Err(e) => {
                    tracing::warn!(name = link.target(), error = %e, "link key did not open block");
                }
            }
        }

        let key = self
            .keys
            .as_ref()
            .zip(link.fingerprint())
            .and_then(|(keys, fingerprint)| keys.lookup(&fingerprint))?;
        match link.with_key(&key).and_then(|keyed| keyed.decrypt(bytes)) {
            Ok(block) => Some(block),
            Err(e) => {
                tracing::warn!(
                    name = link.target(),
                    key = %key.fingerprint(),
                    error = %e,
                    "keychain key did not open block"
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("store", &self.store)
            .field("keys", &self.keys.is_some())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// FetchResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Slot {
    Plain(usize),
    Opaque(usize),
}

/// Everything a walk resolved, keyed by the name each node was fetched
/// under, in the order nodes were reached.
#[derive(Debug, Default, Clone)]
pub struct FetchResult {
    plaintext: Vec<(String, Block)>,
    opaque: Vec<(String, BlockBytes)>,
    index: HashMap<String, Slot>,
}

impl FetchResult {
    fn insert_block(&mut self, name: String, block: Block) {
        self.index
            .insert(name.clone(), Slot::Plain(self.plaintext.len()));
        self.plaintext.push((name, block));
    }

    fn insert_blob(&mut self, name: String, bytes: BlockBytes) {
        self.index.insert(name.clone(), Slot::Opaque(self.opaque.len()));
        self.opaque.push((name, bytes));
    }

    /// Nodes that parsed (directly or after decryption) as blocks.
    pub fn plaintext_blocks(&self) -> impl Iterator<Item = (&str, &Block)> {
        self.plaintext.iter().map(|(n, b)| (n.as_str(), b))
    }

    /// Nodes no available key could open.
    pub fn encrypted_blobs(&self) -> impl Iterator<Item = (&str, &BlockBytes)> {
        self.opaque.iter().map(|(n, b)| (n.as_str(), b))
    }

    /// The block fetched under `name`.
    pub fn block(&self, name: &str) -> Option<&Block> {
        match self.index.get(name)? {
            Slot::Plain(i) => Some(&self.plaintext[*i].1),
            Slot::Opaque(_) => None,
        }
    }

    /// The opaque bytes fetched under `name`.
    pub fn blob(&self, name: &str) -> Option<&BlockBytes> {
        match self.index.get(name)? {
            Slot::Opaque(i) => Some(&self.opaque[*i].1),
            Slot::Plain(_) => None,
        }
    }

    /// Whether `name` was reached, as either kind.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names of the plaintext blocks, in walk order.
    pub fn plaintext_names(&self) -> Vec<&str> {
        self.plaintext.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Names of the opaque blobs, in walk order.
    pub fn opaque_names(&self) -> Vec<&str> {
        self.opaque.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Total nodes reached.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether nothing was reached.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Concatenate the content of the block under `name` followed by the
    /// assembled content of each linked block, in link order.
    ///
    /// Fails with [`CairnError::InvalidArgument`] if a needed node is
    /// missing or opaque, or if the graph below `name` is cyclic.
    pub fn assemble(&self, name: &str) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut path = HashSet::new();
        self.assemble_into(name, &mut out, &mut path)?;
        Ok(out)
    }

    fn assemble_into<'a>(
        &'a self,
        name: &'a str,
        out: &mut Vec<u8>,
        path: &mut HashSet<&'a str>,
    ) -> Result<()> {
        let block = match self.index.get(name) {
            Some(Slot::Plain(i)) => &self.plaintext[*i].1,
            Some(Slot::Opaque(_)) => {
                return Err(CairnError::InvalidArgument(format!(
                    "block '{name}' could not be decrypted"
                )))
            }
            None => {
                return Err(CairnError::InvalidArgument(format!(
                    "block '{name}' was not fetched"
                )))
            }
        };
        if !path.insert(name) {
            return Err(CairnError::InvalidArgument(format!(
                "block '{name}' links back to itself"
            )));
        }
        out.extend_from_slice(block.content());
        for link in block.links() {
            self.assemble_into(link.target(), out, path)?;
        }
        path.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::CryptoConfig;

    fn leaf(content: &[u8]) -> Block {
        Block::builder().content(content).build().unwrap()
    }

    #[test]
    fn single_plaintext_block() {
        let store = Arc::new(Store::memory());
        let b = leaf(b"only");
        store.store_block(&b).unwrap();

        let result = Fetcher::new(store).fetch(&b.link()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.block(b.name()), Some(&b));
        assert_eq!(result.assemble(b.name()).unwrap(), b"only");
    }

    #[test]
    fn missing_root_propagates() {
        let store = Arc::new(Store::memory());
        let b = leaf(b"never stored");
        assert!(matches!(
            Fetcher::new(store).fetch(&b.link()),
            Err(CairnError::NoSuchBlock { .. })
        ));
    }

    #[test]
    fn encrypted_node_opens_with_link_key() {
        let store = Arc::new(Store::memory());
        let b = leaf(b"secret");
        let e = b.encrypt(&CryptoConfig::default()).unwrap();
        store.store_encrypted(&e).unwrap();

        let result = Fetcher::new(store).fetch(e.link()).unwrap();
        let name = e.name().encode();
        assert_eq!(result.block(&name), Some(&b));
        assert!(result.blob(&name).is_none());
        assert_eq!(result.opaque_names(), Vec::<&str>::new());
    }

    #[test]
    fn assemble_rejects_opaque_and_missing() {
        let store = Arc::new(Store::memory());
        let b = leaf(b"locked");
        let e = b.encrypt(&CryptoConfig::default()).unwrap();
        store.store_encrypted(&e).unwrap();

        let bare = Link::to(e.name());
        let result = Fetcher::new(store).fetch(&bare).unwrap();
        let name = e.name().encode();
        assert!(result.blob(&name).is_some());
        assert!(matches!(
            result.assemble(&name),
            Err(CairnError::InvalidArgument(_))
        ));
        assert!(matches!(
            result.assemble("sha-256:absent"),
            Err(CairnError::InvalidArgument(_))
        ));
    }
}
