//! # Fingerprint — Content-Addressed Identifiers
//!
//! Defines `Fingerprint` and `DigestAlgorithm`. A fingerprint is a digest
//! together with the name of the algorithm that produced it; its encoded
//! form is the name under which a block is stored and linked.
//!
//! ## Encoding
//!
//! `algorithm ":" base64(digest)`, algorithm lowercased. The base64
//! alphabet is the standard one except that the two symbol positions are
//! written `-` (62) and `+` (63), so an encoded name never contains `/`
//! and can be used verbatim as a file name. Decoding also accepts `/` in
//! position 63.
//!
//! ## Security Invariant
//!
//! [`Fingerprint::matches`] recomputes the digest and compares in constant
//! time; it never trusts a digest supplied alongside the content.

use std::fmt;
use std::str::FromStr;

use base64::alphabet::Alphabet;
use base64::engine::general_purpose::{GeneralPurpose, PAD};
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

use crate::error::{CairnError, Result};

const NAME_ALPHABET: Alphabet =
    match Alphabet::new("ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-+") {
        Ok(alphabet) => alphabet,
        Err(_) => panic!("fingerprint alphabet must be 64 distinct printable characters"),
    };

const NAME_ENGINE: GeneralPurpose = GeneralPurpose::new(&NAME_ALPHABET, PAD);

/// The hash algorithm used to produce a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestAlgorithm {
    /// SHA-1. Kept for reading names produced by older stores.
    Sha1,
    /// SHA-256, the default naming algorithm.
    #[default]
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl DigestAlgorithm {
    /// Every supported algorithm, oldest first.
    pub const ALL: [DigestAlgorithm; 4] = [Self::Sha1, Self::Sha256, Self::Sha384, Self::Sha512];

    /// Returns the canonical (lowercase) algorithm identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha-1",
            Self::Sha256 => "sha-256",
            Self::Sha384 => "sha-384",
            Self::Sha512 => "sha-512",
        }
    }

    /// Length of a digest produced by this algorithm, in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Look up an algorithm by name. Case-insensitive; `SHA-256`,
    /// `sha256` and `Sha-256` all name the same algorithm.
    pub fn from_name(name: &str) -> Result<Self> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(CairnError::UnsupportedAlgorithm(format!(
                "unknown digest algorithm '{name}'"
            ))),
        }
    }

    /// Compute the digest of `bytes`.
    pub fn digest(&self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(bytes).to_vec(),
            Self::Sha256 => Sha256::digest(bytes).to_vec(),
            Self::Sha384 => Sha384::digest(bytes).to_vec(),
            Self::Sha512 => Sha512::digest(bytes).to_vec(),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl Serialize for DigestAlgorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DigestAlgorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_name(&s).map_err(serde::de::Error::custom)
    }
}

/// A named cryptographic digest over a byte sequence.
///
/// Two fingerprints are equal when both the algorithm and the digest bytes
/// are equal, regardless of how either was produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    algorithm: DigestAlgorithm,
    digest: Vec<u8>,
}

impl Fingerprint {
    /// Hash `bytes` with the algorithm named `algorithm`.
    ///
    /// Fails with [`CairnError::UnsupportedAlgorithm`] if the name is
    /// unknown.
    pub fn build(algorithm: &str, bytes: &[u8]) -> Result<Self> {
        Ok(Self::of(DigestAlgorithm::from_name(algorithm)?, bytes))
    }

    /// Hash `bytes` with a known algorithm.
    pub fn of(algorithm: DigestAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            digest: algorithm.digest(bytes),
        }
    }

    /// Reassemble a fingerprint from a previously computed digest.
    pub fn from_digest(algorithm: DigestAlgorithm, digest: Vec<u8>) -> Result<Self> {
        if digest.len() != algorithm.output_len() {
            return Err(CairnError::Format(format!(
                "{algorithm} digest must be {} bytes, got {}",
                algorithm.output_len(),
                digest.len()
            )));
        }
        Ok(Self { algorithm, digest })
    }

    /// Parse the textual form produced by [`Fingerprint::encode`].
    pub fn decode(name: &str) -> Result<Self> {
        let (algorithm, encoded) = name
            .split_once(':')
            .ok_or_else(|| CairnError::Format(format!("fingerprint '{name}' has no ':'")))?;
        if encoded.contains(':') {
            return Err(CairnError::Format(format!(
                "fingerprint '{name}' has more than one ':'"
            )));
        }
        let algorithm = DigestAlgorithm::from_name(algorithm)?;
        let encoded = encoded.replace('/', "+");
        let digest = NAME_ENGINE
            .decode(encoded.as_bytes())
            .map_err(|e| CairnError::Format(format!("fingerprint '{name}': {e}")))?;
        Self::from_digest(algorithm, digest)
    }

    /// Render as `algorithm:base64(digest)`.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.algorithm, NAME_ENGINE.encode(&self.digest))
    }

    /// Whether `bytes` hash to this fingerprint under its own algorithm.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        let recomputed = self.algorithm.digest(bytes);
        bool::from(recomputed.ct_eq(&self.digest))
    }

    /// The algorithm that produced this fingerprint.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// The raw digest bytes.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Fingerprint {
    type Err = CairnError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}
