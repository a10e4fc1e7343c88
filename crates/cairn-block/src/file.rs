//! # File Chunking
//!
//! Splits a byte sequence into a tree of blocks: leaf blocks carry the
//! data, index blocks carry only links to the level below, and a single
//! root link names the whole file. Reading the tree depth-first in link
//! order and concatenating the content reproduces the input.
//!
//! With encryption enabled every block is convergently encrypted and each
//! index block's links carry the keys of its children, so the root link's
//! key unlocks the whole file and nothing else is needed.

use cairn_core::config::DEFAULT_BLOCK_SIZE;
use cairn_core::{CairnError, CryptoConfig, Result};

use crate::block::{Block, BlockBuilder, HEADER_LEN, MAX_EXPONENT, MAX_LINKS};
use crate::encrypted::EncryptedBlock;
use crate::link::Link;

/// The blocks produced for one file.
#[derive(Debug, Clone)]
pub struct FileBlocks {
    /// Link to the root block. Carries the root key when encrypted.
    pub root: Link,
    /// Plaintext blocks to store (empty when encrypted).
    pub plaintext: Vec<Block>,
    /// Encrypted blocks to store (empty when not encrypted).
    pub encrypted: Vec<EncryptedBlock>,
}

impl FileBlocks {
    /// Number of blocks that must be stored.
    pub fn len(&self) -> usize {
        self.plaintext.len() + self.encrypted.len()
    }

    /// Whether no blocks were produced. Never true for a built file.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct Sink {
    plaintext: Vec<Block>,
    encrypted: Vec<EncryptedBlock>,
}

/// Chunks byte sequences into block trees.
#[derive(Debug, Clone)]
pub struct FileBuilder {
    crypto: CryptoConfig,
    block_size: usize,
    encrypt: bool,
}

impl FileBuilder {
    /// A builder naming blocks with `crypto.digest`, 4 KiB frames, no
    /// encryption.
    pub fn new(crypto: CryptoConfig) -> Self {
        Self {
            crypto,
            block_size: DEFAULT_BLOCK_SIZE,
            encrypt: false,
        }
    }

    /// Target frame size for leaf blocks.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Convergently encrypt every block.
    pub fn encrypted(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    /// Chunk `data`.
    ///
    /// Fails with [`CairnError::InvalidArgument`] if the block size is not a
    /// power of two between 32 bytes and 2 GiB.
    pub fn build(&self, data: &[u8]) -> Result<FileBlocks> {
        if !self.block_size.is_power_of_two()
            || self.block_size < 2 * HEADER_LEN
            || self.block_size > 1usize << MAX_EXPONENT
        {
            return Err(CairnError::InvalidArgument(format!(
                "block size {} must be a power of two between {} and 2^{MAX_EXPONENT}",
                self.block_size,
                2 * HEADER_LEN
            )));
        }

        let mut sink = Sink::default();
        let capacity = self.block_size - HEADER_LEN;
        let mut level = Vec::new();
        if data.is_empty() {
            level.push(self.emit(Block::builder(), &mut sink)?);
        } else {
            for chunk in data.chunks(capacity) {
                level.push(self.emit(Block::builder().content(chunk), &mut sink)?);
            }
        }

        while level.len() > 1 {
            let mut next = Vec::new();
            for group in self.group(level) {
                next.push(self.emit(Block::builder().links(group), &mut sink)?);
            }
            level = next;
        }

        let root = level
            .pop()
            .ok_or_else(|| CairnError::InvalidArgument("file produced no root block".into()))?;
        let out = FileBlocks {
            root,
            plaintext: sink.plaintext,
            encrypted: sink.encrypted,
        };
        tracing::debug!(
            root = out.root.target(),
            blocks = out.len(),
            bytes = data.len(),
            encrypted = self.encrypt,
            "chunked file"
        );
        Ok(out)
    }

    /// Build one block, record it, and return the link that reaches it.
    fn emit(&self, builder: BlockBuilder, sink: &mut Sink) -> Result<Link> {
        let block = builder.digest_algorithm(self.crypto.digest).build()?;
        if self.encrypt {
            let encrypted = block.encrypt(&self.crypto)?;
            let link = encrypted.link().clone();
            sink.encrypted.push(encrypted);
            Ok(link)
        } else {
            let link = block.link();
            sink.plaintext.push(block);
            Ok(link)
        }
    }

    /// Pack links into index groups: at most 255 per group, and no more
    /// bytes than fit the target frame unless the group would otherwise
    /// hold fewer than two links.
    fn group(&self, links: Vec<Link>) -> Vec<Vec<Link>> {
        let capacity = self.block_size - HEADER_LEN;
        let mut groups = Vec::new();
        let mut current: Vec<Link> = Vec::new();
        let mut used = 0;
        for link in links {
            let len = link.byte_len();
            let full =
                current.len() == MAX_LINKS || (current.len() >= 2 && used + len > capacity);
            if full {
                groups.push(std::mem::take(&mut current));
                used = 0;
            }
            used += len;
            current.push(link);
        }
        if !current.is_empty() {
            groups.push(current);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(files: &FileBlocks, link: &Link, out: &mut Vec<u8>) {
        let block = if let Some(encrypted) = files
            .encrypted
            .iter()
            .find(|e| e.name().encode() == link.target())
        {
            link.decrypt(encrypted.ciphertext()).unwrap()
        } else {
            files
                .plaintext
                .iter()
                .find(|b| b.name() == link.target())
                .unwrap()
                .clone()
        };
        out.extend_from_slice(block.content());
        for child in block.links() {
            collect(files, child, out);
        }
    }

    fn data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn small_file_is_one_block() {
        let files = FileBuilder::new(CryptoConfig::default()).build(b"hello").unwrap();
        assert_eq!(files.plaintext.len(), 1);
        assert!(files.encrypted.is_empty());
        assert_eq!(files.root.target(), files.plaintext[0].name());
    }

    #[test]
    fn empty_file_is_one_empty_block() {
        let files = FileBuilder::new(CryptoConfig::default()).build(b"").unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.plaintext[0].content().is_empty());
    }

    #[test]
    fn leaves_fill_the_target_frame() {
        let files = FileBuilder::new(CryptoConfig::default())
            .block_size(64)
            .build(&data(48 * 3))
            .unwrap();
        let leaves: Vec<_> = files.plaintext.iter().filter(|b| b.links().is_empty()).collect();
        assert_eq!(leaves.len(), 3);
        assert!(leaves.iter().all(|b| b.frame_len() == 64));
    }

    #[test]
    fn plaintext_tree_reassembles() {
        let input = data(10_000);
        let files = FileBuilder::new(CryptoConfig::default())
            .block_size(256)
            .build(&input)
            .unwrap();
        assert!(files.plaintext.len() > 40);
        let mut out = Vec::new();
        collect(&files, &files.root, &mut out);
        assert_eq!(out, input);
    }

    #[test]
    fn encrypted_tree_reassembles_from_root_key() {
        let input = data(5_000);
        let files = FileBuilder::new(CryptoConfig::default())
            .block_size(128)
            .encrypted(true)
            .build(&input)
            .unwrap();
        assert!(files.plaintext.is_empty());
        assert!(files.root.has_key());
        let mut out = Vec::new();
        collect(&files, &files.root, &mut out);
        assert_eq!(out, input);
    }

    #[test]
    fn every_build_decrypts_to_the_same_content() {
        let builder = FileBuilder::new(CryptoConfig::default()).encrypted(true);
        let a = builder.build(b"identical").unwrap();
        let b = builder.build(b"identical").unwrap();
        assert_eq!(a.encrypted.len(), 1);
        assert_eq!(
            a.encrypted[0].decrypt().unwrap(),
            b.encrypted[0].decrypt().unwrap()
        );
    }

    #[test]
    fn index_groups_hold_at_most_255_links() {
        let builder = FileBuilder::new(CryptoConfig::default()).block_size(1 << 24);
        let link = Block::builder().build().unwrap().link();
        let groups = builder.group(vec![link; 600]);
        let sizes: Vec<_> = groups.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![255, 255, 90]);
    }

    #[test]
    fn narrow_frames_still_build_a_tree() {
        let input = data(16 * 300);
        let files = FileBuilder::new(CryptoConfig::default())
            .block_size(32)
            .build(&input)
            .unwrap();
        let mut out = Vec::new();
        collect(&files, &files.root, &mut out);
        assert_eq!(out, input);
    }

    #[test]
    fn invalid_block_size_rejected() {
        for size in [0, 16, 100] {
            let err = FileBuilder::new(CryptoConfig::default())
                .block_size(size)
                .build(b"x")
                .unwrap_err();
            assert!(matches!(err, CairnError::InvalidArgument(_)), "size {size}");
        }
    }
}
