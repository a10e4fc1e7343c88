//! # cairn-core — Foundational Types for Cairn
//!
//! This crate is the leaf of the Cairn dependency graph. It defines the
//! primitives every other crate builds on:
//!
//! 1. **`Fingerprint`** — a named cryptographic digest that doubles as the
//!    content address of every block. Its encoded form
//!    (`sha-256:<base64>`) is the name blocks are stored and linked under.
//!
//! 2. **`CairnError`** — the single error taxonomy shared by the block
//!    codec, the store hierarchy and the fetcher. Each variant corresponds
//!    to one failure class callers are expected to handle differently.
//!
//! 3. **`CairnConfig`** — explicitly constructed configuration. There is
//!    no process-wide configuration singleton; callers pass the relevant
//!    section to the constructor that needs it.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `cairn-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` reachable at run time outside tests.
//!   Checks in `const` items fail the build instead.

pub mod config;
pub mod error;
pub mod fingerprint;

// Re-export primary types for ergonomic imports.
pub use config::{CairnConfig, CryptoConfig, RemoteConfig, Secret, ServerConfig, StoreConfig};
pub use error::{CairnError, CryptoError, Result};
pub use fingerprint::{DigestAlgorithm, Fingerprint};
