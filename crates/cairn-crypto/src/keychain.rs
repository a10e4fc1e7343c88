//! # Keys and Key Lookup
//!
//! The fetcher needs exactly one key capability: given the fingerprint of
//! an encrypted block, produce the key that decrypts it. [`KeyLookup`] is
//! that capability. Key generation, certificates and keystore files live
//! outside Cairn and plug in by implementing the trait.
//!
//! [`Keychain`] is the in-process implementation: a thread-safe map from
//! block fingerprint to [`SecretKey`].

use std::collections::HashMap;
use std::fmt;

use cairn_core::{CairnError, CryptoConfig, DigestAlgorithm, Fingerprint, Result};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::cipher::CipherSpec;

// ---------------------------------------------------------------------------
// SecretKey
// ---------------------------------------------------------------------------

/// Symmetric key material tagged with the transformation it is used with.
///
/// `fingerprint` identifies the key itself (the digest of its bytes), not
/// the block it decrypts.
#[derive(Clone)]
pub struct SecretKey {
    cipher: CipherSpec,
    bytes: Zeroizing<Vec<u8>>,
    fingerprint: Fingerprint,
}

impl SecretKey {
    /// Wrap existing key bytes.
    pub fn new(cipher: CipherSpec, bytes: Vec<u8>, digest: DigestAlgorithm) -> Self {
        let bytes = Zeroizing::new(bytes);
        let fingerprint = Fingerprint::of(digest, &bytes);
        Self {
            cipher,
            bytes,
            fingerprint,
        }
    }

    /// Draw a fresh key from the OS RNG using the configured cipher and
    /// key size.
    pub fn generate(config: &CryptoConfig) -> Result<Self> {
        config.validate()?;
        let cipher = CipherSpec::parse(&config.cipher)?;
        let mut bytes = vec![0u8; config.key_bytes()];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CairnError::Io(std::io::Error::other(e.to_string())))?;
        Ok(Self::new(cipher, bytes, config.digest))
    }

    /// The transformation this key is used with.
    pub fn cipher(&self) -> CipherSpec {
        self.cipher
    }

    /// Raw key bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bits.
    pub fn bits(&self) -> usize {
        self.bytes.len() * 8
    }

    /// Digest of the key bytes.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("cipher", &self.cipher.transformation())
            .field("bits", &self.bits())
            .field("fingerprint", &self.fingerprint.encode())
            .finish_non_exhaustive()
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.cipher == other.cipher && self.fingerprint == other.fingerprint
    }
}

impl Eq for SecretKey {}

// ---------------------------------------------------------------------------
// KeyLookup
// ---------------------------------------------------------------------------

/// Find the key for an encrypted block.
///
/// Implementations must be cheap to call repeatedly: the fetcher consults
/// the lookup once per undecryptable node.
pub trait KeyLookup: Send + Sync {
    /// Return the key that decrypts the block named `fingerprint`, if known.
    fn lookup(&self, fingerprint: &Fingerprint) -> Option<SecretKey>;
}

/// In-memory, thread-safe [`KeyLookup`].
#[derive(Default)]
pub struct Keychain {
    keys: RwLock<HashMap<Fingerprint, SecretKey>>,
}

impl Keychain {
    /// Create an empty keychain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the key for the block named `fingerprint`, replacing any
    /// previous entry.
    pub fn insert(&self, fingerprint: Fingerprint, key: SecretKey) {
        tracing::debug!(block = %fingerprint, key = %key.fingerprint(), "keychain insert");
        self.keys.write().insert(fingerprint, key);
    }

    /// Forget the key for `fingerprint`.
    pub fn remove(&self, fingerprint: &Fingerprint) -> Option<SecretKey> {
        self.keys.write().remove(fingerprint)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Whether the keychain is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl KeyLookup for Keychain {
    fn lookup(&self, fingerprint: &Fingerprint) -> Option<SecretKey> {
        self.keys.read().get(fingerprint).cloned()
    }
}

impl fmt::Debug for Keychain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keychain")
            .field("key_count", &self.len())
            .finish()
    }
}
