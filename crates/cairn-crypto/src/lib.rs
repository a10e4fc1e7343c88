//! # cairn-crypto — Symmetric Encryption for Cairn
//!
//! Provides the pieces convergent encryption needs:
//!
//! - **`CipherSpec`**: a parsed cipher transformation (`AES/CTR/NoPadding`,
//!   `AES/CBC/PKCS5Padding`) that encrypts and decrypts with raw key and
//!   IV bytes. The key length selects AES-128, AES-192 or AES-256.
//! - **`SecretKey`**: key material tagged with its transformation,
//!   zeroized on drop and never printed.
//! - **`KeyLookup`**: the single key capability the fetcher consumes,
//!   "given a block fingerprint, find its key", and `Keychain`, an
//!   in-memory implementation.
//!
//! ## Security Invariant
//!
//! Key bytes never appear in `Debug` output or log lines. Every owned copy
//! of key material lives in a `Zeroizing` buffer.

pub mod cipher;
pub mod keychain;

pub use cipher::{CipherMode, CipherSpec, AES_BLOCK_SIZE};
pub use keychain::{KeyLookup, Keychain, SecretKey};
