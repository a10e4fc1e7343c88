//! # Configuration
//!
//! Explicitly constructed configuration for every Cairn component. A
//! [`CairnConfig`] is loaded once (usually from YAML) and the relevant
//! section is handed to each constructor; nothing here is global.
//!
//! ```yaml
//! crypto:
//!   digest: sha-256
//!   cipher: AES/CTR/NoPadding
//!   key_bits: 128
//! store:
//!   directory: /var/lib/cairn
//!   remote:
//!     download_base: https://blocks.example.org/blocks
//!     upload_url: https://blocks.example.org/upload
//!     authenticator: s3cret
//! server:
//!   bind: 0.0.0.0:8090
//!   directory: /var/lib/cairn-blockd
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CairnError, Result};
use crate::fingerprint::DigestAlgorithm;

/// Frames at or below this size are copied into memory on read.
pub const DEFAULT_MMAP_THRESHOLD: u64 = 1 << 20;

/// Target frame size for file chunking.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Default cap on the body of an upload request.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 << 20;

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Complete configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CairnConfig {
    /// Digest and cipher defaults.
    #[serde(default)]
    pub crypto: CryptoConfig,
    /// Local and remote store layout.
    #[serde(default)]
    pub store: StoreConfig,
    /// Block server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl CairnConfig {
    /// Load and validate a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CairnError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Parse and validate a YAML configuration document.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| CairnError::Config(format!("invalid YAML: {e}")))?;
        config.crypto.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Crypto
// ---------------------------------------------------------------------------

/// Defaults for naming and convergent encryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// Digest used to name new blocks.
    #[serde(default)]
    pub digest: DigestAlgorithm,
    /// Cipher transformation, e.g. `AES/CTR/NoPadding`.
    #[serde(default = "default_cipher")]
    pub cipher: String,
    /// Symmetric key size in bits.
    #[serde(default = "default_key_bits")]
    pub key_bits: u16,
}

impl CryptoConfig {
    /// Key size in bytes.
    pub fn key_bytes(&self) -> usize {
        usize::from(self.key_bits).div_ceil(8)
    }

    /// Reject key sizes the AES family cannot use.
    pub fn validate(&self) -> Result<()> {
        match self.key_bits {
            128 | 192 | 256 => Ok(()),
            other => Err(CairnError::Config(format!(
                "key_bits must be 128, 192 or 256, got {other}"
            ))),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            digest: DigestAlgorithm::default(),
            cipher: default_cipher(),
            key_bits: default_key_bits(),
        }
    }
}

fn default_cipher() -> String {
    "AES/CTR/NoPadding".to_string()
}

fn default_key_bits() -> u16 {
    128
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Layout of the local store chain and the optional remote backing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory for the disk store. `None` keeps everything in memory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Files larger than this are memory-mapped instead of copied.
    #[serde(default = "default_mmap_threshold")]
    pub mmap_threshold: u64,
    /// Target frame size used when chunking files.
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Remote block server used as the backing medium, if any.
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: None,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            block_size: DEFAULT_BLOCK_SIZE,
            remote: None,
        }
    }
}

fn default_mmap_threshold() -> u64 {
    DEFAULT_MMAP_THRESHOLD
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

/// Connection settings for a remote block server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL blocks are downloaded from; the encoded name is appended.
    pub download_base: String,
    /// Multipart upload endpoint.
    pub upload_url: String,
    /// Shared secret sent with every upload.
    #[serde(default)]
    pub authenticator: Secret,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl RemoteConfig {
    /// Create a configuration with the default timeout.
    pub fn new(
        download_base: impl Into<String>,
        upload_url: impl Into<String>,
        authenticator: impl Into<String>,
    ) -> Self {
        Self {
            download_base: download_base.into(),
            upload_url: upload_url.into(),
            authenticator: Secret::new(authenticator),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Settings for the `cairn-blockd` upload/download server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory blocks are persisted in. `None` serves from memory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Shared secret uploads must present.
    #[serde(default)]
    pub authenticator: Secret,
    /// Maximum accepted request body.
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Apply `CAIRN_BIND`, `CAIRN_DATA_DIR` and `CAIRN_AUTHENTICATOR`
    /// from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup("CAIRN_BIND") {
            self.bind = bind;
        }
        if let Some(dir) = lookup("CAIRN_DATA_DIR") {
            self.directory = Some(PathBuf::from(dir));
        }
        if let Some(secret) = lookup("CAIRN_AUTHENTICATOR") {
            self.authenticator = Secret::new(secret);
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            directory: None,
            authenticator: Secret::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8090".to_string()
}

fn default_max_upload() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A shared secret string. Zeroed on drop, redacted in `Debug`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the secret for transmission or comparison.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether no secret was configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}
