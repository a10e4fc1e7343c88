//! # Block — Self-Naming Framed Content
//!
//! A block is an immutable unit of content plus zero or more outbound
//! [`Link`]s, serialized into a frame whose total size is a power of two.
//! The block's name is the fingerprint of the complete frame, so changing
//! any byte (links, content or padding) changes the name.
//!
//! ## Wire Format
//!
//! All integers little-endian:
//!
//! ```text
//! 0               6   7            8             12            16
//! | F0 07 DA 7A 0D 0A | N | link_count | data_offset | data_length |
//! | links ... | content (data_length) | padding up to 2^N |
//! ```
//!
//! `4 <= N <= 31`. The position after the last link must equal
//! `data_offset`, and `data_offset + data_length` must not exceed `2^N`.
//!
//! ## Equality
//!
//! Padding is random filler. Two blocks are equal when their links and
//! content are equal; raw bytes and names may differ.

use std::fmt;
use std::ops::Range;

use cairn_core::{CairnError, CryptoConfig, DigestAlgorithm, Fingerprint, Result};
use cairn_crypto::CipherSpec;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::encrypted::EncryptedBlock;
use crate::link::Link;
use crate::wire::Reader;

/// Block frame marker.
pub const BLOCK_MAGIC: [u8; 6] = [0xF0, 0x07, 0xDA, 0x7A, 0x0D, 0x0A];

/// Fixed header length; also the smallest legal frame.
pub const HEADER_LEN: usize = 16;

/// Smallest frame exponent (16 bytes).
pub const MIN_EXPONENT: u8 = 4;

/// Largest frame exponent (2 GiB).
pub const MAX_EXPONENT: u8 = 31;

/// Most links a single frame can carry.
pub const MAX_LINKS: usize = u8::MAX as usize;

/// An immutable, parsed or freshly built block.
#[derive(Clone)]
pub struct Block {
    links: Vec<Link>,
    content: Range<usize>,
    raw: Vec<u8>,
    fingerprint: Fingerprint,
    name: String,
}

impl Block {
    /// Start building a block.
    pub fn builder() -> BlockBuilder {
        BlockBuilder::default()
    }

    /// Parse a frame, naming it with the default digest.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::parse_with(bytes, DigestAlgorithm::default())
    }

    /// Parse a frame, naming it with `algorithm`.
    pub fn parse_with(bytes: &[u8], algorithm: DigestAlgorithm) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        reader.expect_magic(&BLOCK_MAGIC, "block")?;

        let exponent = reader.u8("block size exponent")?;
        if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
            return Err(CairnError::Format(format!(
                "block size exponent {exponent} outside {MIN_EXPONENT}..={MAX_EXPONENT}"
            )));
        }
        let frame_len = 1usize << exponent;
        if bytes.len() != frame_len {
            return Err(CairnError::Format(format!(
                "block header declares 2^{exponent} = {frame_len} bytes, buffer holds {}",
                bytes.len()
            )));
        }

        let link_count = usize::from(reader.u8("block link count")?);
        let data_offset = reader.u32_le("block data offset")? as usize;
        let data_length = reader.u32_le("block data length")? as usize;

        let data_end = data_offset
            .checked_add(data_length)
            .filter(|end| *end <= frame_len)
            .ok_or_else(|| {
                CairnError::Format(format!(
                    "block content {data_offset}+{data_length} overruns {frame_len}-byte frame"
                ))
            })?;

        let mut links = Vec::with_capacity(link_count);
        for _ in 0..link_count {
            links.push(Link::read(&mut reader)?);
        }
        if reader.position() != data_offset {
            return Err(CairnError::Format(format!(
                "links end at offset {}, header declares data at {data_offset}",
                reader.position()
            )));
        }

        let fingerprint = Fingerprint::of(algorithm, bytes);
        Ok(Self {
            links,
            content: data_offset..data_end,
            raw: bytes.to_vec(),
            name: fingerprint.encode(),
            fingerprint,
        })
    }

    /// Outbound links, in order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// User content.
    pub fn content(&self) -> &[u8] {
        &self.raw[self.content.clone()]
    }

    /// The encoded name (fingerprint of the frame).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The frame fingerprint.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// The complete frame, padding included.
    pub fn bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Frame length, always a power of two.
    pub fn frame_len(&self) -> usize {
        self.raw.len()
    }

    /// A link to this block carrying no key.
    pub fn link(&self) -> Link {
        Link::to(&self.fingerprint)
    }

    /// Convergently encrypt this block.
    ///
    /// The key is the first `key_bits / 8` bytes of this block's digest and
    /// the IV is all zero, so the result is a pure function of the frame:
    /// the same block always yields the same ciphertext and key. The
    /// ciphertext is named by its own fingerprint under `config.digest`.
    pub fn encrypt(&self, config: &CryptoConfig) -> Result<EncryptedBlock> {
        config.validate()?;
        let cipher = CipherSpec::parse(&config.cipher)?;
        let key_len = config.key_bytes();
        let digest = self.fingerprint.digest();
        if digest.len() < key_len {
            return Err(CairnError::InvalidArgument(format!(
                "{} digest has {} bytes, cannot derive a {}-bit key",
                self.fingerprint.algorithm(),
                digest.len(),
                config.key_bits
            )));
        }
        let key = Zeroizing::new(digest[..key_len].to_vec());
        let ciphertext = cipher.encrypt(&key, &[], &self.raw)?;
        let name = Fingerprint::of(config.digest, &ciphertext);
        let link = Link::builder()
            .target(&name)
            .decryption(cipher.transformation(), key.to_vec(), Vec::new())
            .build()?;

        EncryptedBlock::builder()
            .ciphertext(ciphertext)
            .name(name)
            .link(link)
            .plaintext_name(self.fingerprint.clone())
            .build()
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.links == other.links && self.content() == other.content()
    }
}

impl Eq for Block {}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("name", &self.name)
            .field("links", &self.links.len())
            .field("content_len", &self.content.len())
            .field("frame_len", &self.raw.len())
            .finish()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block {{ {} B, {} links, {} B content }}",
            self.raw.len(),
            self.links.len(),
            self.content.len()
        )
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Accumulates links and content for a new [`Block`].
#[derive(Debug, Clone, Default)]
pub struct BlockBuilder {
    links: Vec<Link>,
    content: Vec<u8>,
    desired_size: Option<usize>,
    digest: DigestAlgorithm,
}

impl BlockBuilder {
    /// Append one link.
    pub fn link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    /// Append several links.
    pub fn links(mut self, links: impl IntoIterator<Item = Link>) -> Self {
        self.links.extend(links);
        self
    }

    /// Append content. Repeated calls concatenate.
    pub fn content(mut self, bytes: &[u8]) -> Self {
        self.content.extend_from_slice(bytes);
        self
    }

    /// Request an exact frame size instead of the smallest fitting one.
    pub fn desired_size(mut self, size: usize) -> Self {
        self.desired_size = Some(size);
        self
    }

    /// Digest used to name the block.
    pub fn digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest = algorithm;
        self
    }

    /// Bytes needed for header, links and content.
    pub fn minimum_size(&self) -> usize {
        HEADER_LEN + self.links.iter().map(Link::byte_len).sum::<usize>() + self.content.len()
    }

    /// Content bytes that still fit without growing the frame: up to the
    /// desired size if one is set, else up to the next power of two.
    pub fn remaining(&self) -> usize {
        let min = self.minimum_size();
        let target = self
            .desired_size
            .unwrap_or_else(|| min.next_power_of_two().max(HEADER_LEN));
        target.saturating_sub(min)
    }

    /// Serialize and name the block.
    ///
    /// Fails with [`CairnError::InvalidArgument`] for more than 255 links,
    /// a frame over 2^31 bytes, or a desired size that is not a power of
    /// two large enough to hold the block.
    pub fn build(self) -> Result<Block> {
        if self.links.len() > MAX_LINKS {
            return Err(CairnError::InvalidArgument(format!(
                "block has {} links, at most {MAX_LINKS} allowed",
                self.links.len()
            )));
        }

        let links_len: usize = self.links.iter().map(Link::byte_len).sum();
        let min = self.minimum_size();
        let frame_len = match self.desired_size {
            Some(size) => {
                if !size.is_power_of_two() || size < min.max(HEADER_LEN) {
                    return Err(CairnError::InvalidArgument(format!(
                        "desired size {size} must be a power of two of at least {min}"
                    )));
                }
                size
            }
            None => min.next_power_of_two().max(HEADER_LEN),
        };
        if frame_len > 1usize << MAX_EXPONENT {
            return Err(CairnError::InvalidArgument(format!(
                "block of {min} bytes exceeds the 2^{MAX_EXPONENT}-byte frame limit"
            )));
        }

        let data_offset = HEADER_LEN + links_len;
        let mut raw = Vec::with_capacity(frame_len);
        raw.extend_from_slice(&BLOCK_MAGIC);
        raw.push(frame_len.trailing_zeros() as u8);
        raw.push(self.links.len() as u8);
        raw.extend_from_slice(&(data_offset as u32).to_le_bytes());
        raw.extend_from_slice(&(self.content.len() as u32).to_le_bytes());
        for link in &self.links {
            link.write_to(&mut raw);
        }
        raw.extend_from_slice(&self.content);

        let padding_start = raw.len();
        raw.resize(frame_len, 0);
        rand::thread_rng().fill_bytes(&mut raw[padding_start..]);

        let fingerprint = Fingerprint::of(self.digest, &raw);
        tracing::trace!(name = %fingerprint, frame_len, links = self.links.len(), "built block");
        Ok(Block {
            content: data_offset..data_offset + self.content.len(),
            links: self.links,
            raw,
            name: fingerprint.encode(),
            fingerprint,
        })
    }
}
