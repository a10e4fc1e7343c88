//! # Link — Key-Carrying Block Reference
//!
//! A link names a block (normally by its encoded [`Fingerprint`], but any
//! URI is accepted) and may carry the symmetric algorithm, key and IV
//! needed to decrypt it.
//!
//! ## Wire Format
//!
//! All integers little-endian:
//!
//! ```text
//! 0        6             8                10            12        14       16
//! | LINK\r\n | body_length | algorithm_len | target_len | key_bits | iv_bits |
//! | algorithm | target | key (ceil(key_bits/8)) | iv (ceil(iv_bits/8)) |
//! ```
//!
//! `body_length` is the sum of the four variable field lengths and is
//! cross-checked on parse. The target is never empty.
//!
//! ## Security Invariant
//!
//! Key bytes are zeroized on drop and never appear in `Debug` output.

use std::fmt;

use cairn_core::{CairnError, CryptoError, DigestAlgorithm, Fingerprint, Result};
use cairn_crypto::{CipherSpec, SecretKey};
use zeroize::Zeroizing;

use crate::block::Block;
use crate::wire::Reader;

/// Link frame marker.
pub const LINK_MAGIC: [u8; 6] = *b"LINK\r\n";

/// Fixed part of a link frame.
pub const LINK_HEADER_LEN: usize = 16;

/// Decryption parameters carried by a link.
#[derive(Clone, PartialEq, Eq)]
pub struct Decryption {
    algorithm: String,
    key: Zeroizing<Vec<u8>>,
    key_bits: u16,
    iv: Vec<u8>,
    iv_bits: u16,
}

impl Decryption {
    /// Cipher transformation, e.g. `AES/CTR/NoPadding`. Empty means the
    /// default transformation.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Raw key bytes.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Raw IV bytes; empty means an all-zero IV.
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Key length in bits as written on the wire.
    pub fn key_bits(&self) -> u16 {
        self.key_bits
    }

    /// The parsed cipher transformation.
    pub fn cipher(&self) -> std::result::Result<CipherSpec, CryptoError> {
        if self.algorithm.is_empty() {
            Ok(CipherSpec::default())
        } else {
            CipherSpec::parse(&self.algorithm)
        }
    }
}

impl fmt::Debug for Decryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decryption")
            .field("algorithm", &self.algorithm)
            .field("key_bits", &self.key_bits)
            .field("iv_bits", &self.iv_bits)
            .finish_non_exhaustive()
    }
}

/// An immutable reference to a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    target: String,
    decryption: Option<Decryption>,
}

impl Link {
    /// Start building a link.
    pub fn builder() -> LinkBuilder {
        LinkBuilder::default()
    }

    /// Link to `fingerprint` with no key.
    pub fn to(fingerprint: &Fingerprint) -> Self {
        Self {
            target: fingerprint.encode(),
            decryption: None,
        }
    }

    /// The encoded target name or URI.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The target as a fingerprint, if it is one.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        Fingerprint::decode(&self.target).ok()
    }

    /// The digest algorithm of the target, defaulting when the target is
    /// not a fingerprint.
    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.fingerprint().map(|fp| fp.algorithm()).unwrap_or_default()
    }

    /// Decryption parameters, if the link carries any.
    pub fn decryption(&self) -> Option<&Decryption> {
        self.decryption.as_ref()
    }

    /// Whether the link carries key material.
    pub fn has_key(&self) -> bool {
        self.decryption.as_ref().is_some_and(|d| !d.key.is_empty())
    }

    /// A copy of this link carrying `key` instead of its own parameters.
    pub fn with_key(&self, key: &SecretKey) -> Result<Self> {
        Self::builder()
            .uri(self.target.clone())
            .decryption(key.cipher().transformation(), key.bytes().to_vec(), Vec::new())
            .build()
    }

    /// Serialized length in bytes.
    pub fn byte_len(&self) -> usize {
        LINK_HEADER_LEN + self.body_len()
    }

    fn body_len(&self) -> usize {
        let (alg, key, iv) = match &self.decryption {
            Some(d) => (d.algorithm.len(), d.key.len(), d.iv.len()),
            None => (0, 0, 0),
        };
        alg + self.target.len() + key + iv
    }

    /// Append the wire encoding to `out`.
    ///
    /// Field lengths were validated by [`LinkBuilder::build`] or
    /// [`Link::parse`], so the narrowing casts cannot truncate.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        let (algorithm, key, key_bits, iv, iv_bits): (&[u8], &[u8], u16, &[u8], u16) =
            match &self.decryption {
                Some(d) => (
                    d.algorithm.as_bytes(),
                    d.key.as_slice(),
                    d.key_bits,
                    d.iv.as_slice(),
                    d.iv_bits,
                ),
                None => (&[][..], &[][..], 0, &[][..], 0),
            };

        out.reserve(self.byte_len());
        out.extend_from_slice(&LINK_MAGIC);
        out.extend_from_slice(&(self.body_len() as u16).to_le_bytes());
        out.extend_from_slice(&(algorithm.len() as u16).to_le_bytes());
        out.extend_from_slice(&(self.target.len() as u16).to_le_bytes());
        out.extend_from_slice(&key_bits.to_le_bytes());
        out.extend_from_slice(&iv_bits.to_le_bytes());
        out.extend_from_slice(algorithm);
        out.extend_from_slice(self.target.as_bytes());
        out.extend_from_slice(key);
        out.extend_from_slice(iv);
    }

    /// The wire encoding as a fresh buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        self.write_to(&mut out);
        out
    }

    /// Parse a buffer holding exactly one link.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let link = Self::read(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(CairnError::Format(format!(
                "{} trailing bytes after link",
                reader.remaining()
            )));
        }
        Ok(link)
    }

    /// Parse one link at the reader's position.
    pub(crate) fn read(reader: &mut Reader<'_>) -> Result<Self> {
        reader.expect_magic(&LINK_MAGIC, "link")?;
        let body_length = usize::from(reader.u16_le("link body length")?);
        let algorithm_len = usize::from(reader.u16_le("link algorithm length")?);
        let target_len = usize::from(reader.u16_le("link target length")?);
        let key_bits = reader.u16_le("link key bits")?;
        let iv_bits = reader.u16_le("link iv bits")?;
        let key_len = usize::from(key_bits).div_ceil(8);
        let iv_len = usize::from(iv_bits).div_ceil(8);

        let sum = algorithm_len + target_len + key_len + iv_len;
        if body_length != sum {
            return Err(CairnError::Format(format!(
                "link body length {body_length} does not match field lengths {sum}"
            )));
        }

        let algorithm = reader.ascii(algorithm_len, "link algorithm")?.to_string();
        let target = reader.ascii(target_len, "link target")?.to_string();
        let key = Zeroizing::new(reader.take(key_len, "link key")?.to_vec());
        let iv = reader.take(iv_len, "link iv")?.to_vec();

        if target.is_empty() {
            return Err(CairnError::Format("link target is empty".into()));
        }

        let decryption = if algorithm.is_empty() && key.is_empty() && iv.is_empty() {
            None
        } else {
            Some(Decryption {
                algorithm,
                key,
                key_bits,
                iv,
                iv_bits,
            })
        };
        Ok(Self { target, decryption })
    }

    /// Decrypt `ciphertext` with this link's key and parse the result as a
    /// block.
    ///
    /// Fails with [`CairnError::Decryption`] when the link has no key, the
    /// transformation is unknown, or the cipher rejects the input, and with
    /// [`CairnError::Format`] when the plaintext is not a block frame (the
    /// usual symptom of a wrong key under CTR).
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Block> {
        let d = self
            .decryption
            .as_ref()
            .filter(|d| !d.key.is_empty())
            .ok_or(CryptoError::MissingKey)?;
        let cipher = d.cipher()?;
        let plaintext = Zeroizing::new(cipher.decrypt(&d.key, &d.iv, ciphertext)?);
        Block::parse_with(&plaintext, self.plaintext_algorithm(&d.key, &plaintext))
    }

    /// Digest algorithm that names a decrypted frame.
    ///
    /// A convergent key is a prefix of the plaintext's own digest, which
    /// identifies the algorithm. Keys from elsewhere fall back to the
    /// target's algorithm.
    fn plaintext_algorithm(&self, key: &[u8], plaintext: &[u8]) -> DigestAlgorithm {
        let target = self.digest_algorithm();
        std::iter::once(target)
            .chain(DigestAlgorithm::ALL.into_iter().filter(|alg| *alg != target))
            .find(|alg| {
                alg.output_len() >= key.len() && alg.digest(plaintext)[..key.len()] == *key
            })
            .unwrap_or(target)
    }
}

/// Builder for [`Link`].
#[derive(Default)]
pub struct LinkBuilder {
    target: Option<String>,
    decryption: Option<(String, Vec<u8>, Vec<u8>)>,
}

impl LinkBuilder {
    /// Target a block by fingerprint.
    pub fn target(mut self, fingerprint: &Fingerprint) -> Self {
        self.target = Some(fingerprint.encode());
        self
    }

    /// Target an arbitrary URI.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.target = Some(uri.into());
        self
    }

    /// Attach decryption parameters.
    pub fn decryption(mut self, algorithm: impl Into<String>, key: Vec<u8>, iv: Vec<u8>) -> Self {
        self.decryption = Some((algorithm.into(), key, iv));
        self
    }

    /// Validate and build.
    ///
    /// Fails with [`CairnError::InvalidArgument`] when the target is
    /// missing or empty, a text field is not printable ASCII, or a field
    /// is too long for its 16-bit length slot.
    pub fn build(self) -> Result<Link> {
        let target = self
            .target
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CairnError::InvalidArgument("link has no target".into()))?;
        check_ascii("target", &target)?;

        let decryption = match self.decryption {
            None => None,
            Some((algorithm, key, iv)) => {
                check_ascii("algorithm", &algorithm)?;
                let key = Zeroizing::new(key);
                let key_bits = bits("key", key.len())?;
                let iv_bits = bits("iv", iv.len())?;
                Some(Decryption {
                    algorithm,
                    key,
                    key_bits,
                    iv,
                    iv_bits,
                })
            }
        };

        let link = Link { target, decryption };
        if link.body_len() > usize::from(u16::MAX) {
            return Err(CairnError::InvalidArgument(format!(
                "link body of {} bytes exceeds {}",
                link.body_len(),
                u16::MAX
            )));
        }
        Ok(link)
    }
}

fn check_ascii(what: &str, value: &str) -> Result<()> {
    if value.bytes().all(|b| b.is_ascii() && !b.is_ascii_control()) {
        Ok(())
    } else {
        Err(CairnError::InvalidArgument(format!(
            "link {what} must be printable ASCII"
        )))
    }
}

fn bits(what: &str, len: usize) -> Result<u16> {
    len.checked_mul(8)
        .and_then(|b| u16::try_from(b).ok())
        .ok_or_else(|| CairnError::InvalidArgument(format!("link {what} of {len} bytes is too long")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(data: &[u8]) -> Fingerprint {
        Fingerprint::of(DigestAlgorithm::Sha256, data)
    }

    #[test]
    fn build_requires_target() {
        assert!(matches!(
            Link::builder().build(),
            Err(CairnError::InvalidArgument(_))
        ));
        assert!(matches!(
            Link::builder().uri("").build(),
            Err(CairnError::InvalidArgument(_))
        ));
    }

    #[test]
    fn plain_link_wire_layout() {
        let link = Link::builder().uri("abc").build().unwrap();
        let bytes = link.to_bytes();
        assert_eq!(&bytes[..6], b"LINK\r\n");
        assert_eq!(&bytes[6..8], &3u16.to_le_bytes());
        assert_eq!(&bytes[8..10], &0u16.to_le_bytes());
        assert_eq!(&bytes[10..12], &3u16.to_le_bytes());
        assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
        assert_eq!(&bytes[16..], b"abc");
        assert_eq!(bytes.len(), link.byte_len());
    }

    #[test]
    fn keyed_link_parses_back() {
        let link = Link::builder()
            .target(&fp(b"x"))
            .decryption("AES/CTR/NoPadding", vec![9u8; 16], vec![1u8; 16])
            .build()
            .unwrap();
        let bytes = link.to_bytes();
        assert_eq!(&bytes[12..14], &128u16.to_le_bytes());
        let parsed = Link::parse(&bytes).unwrap();
        assert_eq!(parsed, link);
        assert!(parsed.has_key());
        assert_eq!(parsed.fingerprint(), Some(fp(b"x")));
    }

    #[test]
    fn odd_bit_lengths_round_up_to_bytes() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&LINK_MAGIC);
        // body = 0 + 1 + 2 + 0
        bytes.extend_from_slice(&3u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&12u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(b"t");
        bytes.extend_from_slice(&[0xAA, 0x0B]);
        let link = Link::parse(&bytes).unwrap();
        let d = link.decryption().unwrap();
        assert_eq!(d.key(), &[0xAA, 0x0B]);
        assert_eq!(d.key_bits(), 12);
        assert_eq!(link.to_bytes(), bytes);
    }

    #[test]
    fn body_length_mismatch_rejected() {
        let mut bytes = Link::builder().uri("abc").build().unwrap().to_bytes();
        bytes[6] = 4;
        assert!(matches!(Link::parse(&bytes), Err(CairnError::Format(_))));
    }

    #[test]
    fn truncated_link_rejected() {
        let bytes = Link::builder().uri("abcdef").build().unwrap().to_bytes();
        for cut in [0, 5, 15, bytes.len() - 1] {
            assert!(
                matches!(Link::parse(&bytes[..cut]), Err(CairnError::Format(_))),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = Link::builder().uri("a").build().unwrap().to_bytes();
        bytes[0] = b'l';
        assert!(matches!(Link::parse(&bytes), Err(CairnError::Format(_))));
    }

    #[test]
    fn empty_target_rejected_on_parse() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&LINK_MAGIC);
        bytes.extend_from_slice(&[0u8; 10]);
        assert!(matches!(Link::parse(&bytes), Err(CairnError::Format(_))));
    }

    #[test]
    fn oversized_fields_rejected() {
        let huge = "x".repeat(usize::from(u16::MAX) + 1);
        assert!(matches!(
            Link::builder().uri(huge).build(),
            Err(CairnError::InvalidArgument(_))
        ));
        assert!(matches!(
            Link::builder()
                .uri("t")
                .decryption("AES", vec![0u8; 9000], Vec::new())
                .build(),
            Err(CairnError::InvalidArgument(_))
        ));
    }

    #[test]
    fn debug_hides_key() {
        let link = Link::builder()
            .uri("t")
            .decryption("AES", vec![0x5A; 16], Vec::new())
            .build()
            .unwrap();
        let rendered = format!("{link:?}");
        assert!(!rendered.contains("90"));
        assert!(rendered.contains("key_bits: 128"));
    }

    #[test]
    fn decrypt_without_key_is_decryption_error() {
        let link = Link::to(&fp(b"x"));
        assert!(matches!(
            link.decrypt(b"anything"),
            Err(CairnError::Decryption(CryptoError::MissingKey))
        ));
    }

    #[test]
    fn decrypt_unknown_cipher_is_decryption_error() {
        let link = Link::builder()
            .uri("t")
            .decryption("Twofish", vec![1u8; 16], Vec::new())
            .build()
            .unwrap();
        assert!(matches!(
            link.decrypt(&[0u8; 32]),
            Err(CairnError::Decryption(CryptoError::UnsupportedCipher(_)))
        ));
    }

    #[test]
    fn with_key_replaces_parameters() {
        let key = SecretKey::new(CipherSpec::CBC, vec![3u8; 24], DigestAlgorithm::Sha256);
        let link = Link::to(&fp(b"y")).with_key(&key).unwrap();
        let d = link.decryption().unwrap();
        assert_eq!(d.algorithm(), "AES/CBC/PKCS5Padding");
        assert_eq!(d.key(), &[3u8; 24]);
        assert!(d.iv().is_empty());
        assert_eq!(link.digest_algorithm(), DigestAlgorithm::Sha256);
    }
}
