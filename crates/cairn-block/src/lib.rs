//! # cairn-block — Block and Link Wire Formats
//!
//! Everything Cairn stores is a **block**: a power-of-two frame holding
//! content and outbound **links**. A block names itself by the fingerprint
//! of its frame; a link names its target and may carry the key that
//! decrypts it.
//!
//! ## Modules
//!
//! - [`link`]: the link frame, builder and decryption.
//! - [`block`]: the block frame, builder, parser and convergent
//!   encryption.
//! - [`encrypted`]: ciphertext plus its decrypting link.
//! - [`file`]: chunking byte sequences into block trees.
//!
//! ## Convergent Encryption
//!
//! `Block::encrypt` derives the key from the block's own name, so the same
//! frame always encrypts to the same ciphertext. Anyone who holds the
//! plaintext can compute the key; anyone who only holds the ciphertext
//! cannot.
//!
//! ## Crate Policy
//!
//! - Frames are bit-exact and little-endian.
//! - Parsing never panics on hostile input; every malformed frame is a
//!   [`CairnError::Format`](cairn_core::CairnError::Format).

pub mod block;
pub mod encrypted;
pub mod file;
pub mod link;
mod wire;

pub use block::{Block, BlockBuilder, BLOCK_MAGIC};
pub use encrypted::{EncryptedBlock, EncryptedBlockBuilder};
pub use file::{FileBlocks, FileBuilder};
pub use link::{Decryption, Link, LinkBuilder, LINK_MAGIC};
