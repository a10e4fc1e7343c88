//! # Error Types — Structured Error Hierarchy
//!
//! Defines the error taxonomy used throughout Cairn. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Propagation Rules
//!
//! - `Format` errors describe malformed wire bytes. They are never retried.
//! - `NoSuchBlock` is recoverable: the caller decides on a fallback.
//! - `Decryption` errors are caught by the fetcher and folded into a
//!   partial result; everywhere else they propagate.
//! - `Io`, `Network` and `CacheInconsistency` are the I/O class. The
//!   inconsistency case signals a logic error in the cache chain and must
//!   be treated as fatal.

use thiserror::Error;

/// Convenience alias used by every Cairn crate.
pub type Result<T> = std::result::Result<T, CairnError>;

/// Top-level error type for Cairn.
#[derive(Error, Debug)]
pub enum CairnError {
    /// Malformed wire bytes (block frame, link frame, fingerprint text).
    #[error("format error: {0}")]
    Format(String),

    /// Unknown digest or cipher algorithm name.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A builder or constructor was given an unusable value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Key/IV mismatch or cipher failure.
    #[error("decryption failed: {0}")]
    Decryption(#[from] CryptoError),

    /// The name is absent from the store (and its whole cache chain).
    #[error("no such block: {name}")]
    NoSuchBlock {
        /// The encoded name that was requested.
        name: String,
    },

    /// Storage medium failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport or protocol failure talking to a remote block store.
    #[error("network error calling {endpoint}: {reason}")]
    Network {
        /// The URL that was being called.
        endpoint: String,
        /// What went wrong.
        reason: String,
    },

    /// A journaled name was missing from the cache during a flush.
    #[error("cache inconsistency: block '{name}' is journaled but not in cache")]
    CacheInconsistency {
        /// The journaled name.
        name: String,
    },

    /// Retrieved bytes do not hash to the name they were requested under.
    #[error("integrity violation: bytes stored under '{name}' do not match its fingerprint")]
    Integrity {
        /// The requested name.
        name: String,
    },

    /// A link graph walk went deeper than the configured limit.
    #[error("link graph deeper than the configured limit of {limit}")]
    DepthExceeded {
        /// The configured maximum depth.
        limit: usize,
    },

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CairnError {
    /// Construct a [`CairnError::NoSuchBlock`] for `name`.
    pub fn no_such_block(name: impl Into<String>) -> Self {
        Self::NoSuchBlock { name: name.into() }
    }

    /// Whether this error belongs to the I/O class (medium, network, or
    /// cache inconsistency).
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Network { .. } | Self::CacheInconsistency { .. }
        )
    }

    /// Whether this error signals a logic bug that must not be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CacheInconsistency { .. })
    }
}

/// Error in symmetric cipher operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The link or key carries no key material.
    #[error("no key material available")]
    MissingKey,

    /// Cipher transformation is not supported.
    #[error("unsupported cipher transformation: {0}")]
    UnsupportedCipher(String),

    /// Key or IV length does not suit the cipher.
    #[error("invalid key or IV length: {0}")]
    InvalidKeyLength(String),

    /// Padding check failed after decryption (wrong key or corrupted data).
    #[error("bad padding: {0}")]
    BadPadding(String),
}
