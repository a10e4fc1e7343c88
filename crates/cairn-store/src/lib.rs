//! # cairn-store — Block Storage and Retrieval
//!
//! Stores hold block bytes under their encoded names. A [`Store`] is a
//! backing medium plus an optional cache chain: writes land in the cache
//! and are journaled until [`Store::flush`] pushes them to the medium.
//!
//! ## Backends
//!
//! | Backend | Medium | Enumerable |
//! |---------|--------|------------|
//! | [`MemoryStore`] | in-process map | yes |
//! | [`DiskStore`] | one file per block, mmap for large reads | yes |
//! | [`RemoteStore`] | HTTP GET/multipart POST | no |
//!
//! ## Fetching
//!
//! [`Fetcher`] walks the link graph below a root link, decrypting where a
//! key is available and recording undecryptable nodes as opaque blobs
//! instead of failing.
//!
//! ## Crate Policy
//!
//! - Every operation blocks. Async callers use `spawn_blocking`.
//! - `Store` is `Send + Sync`; share it behind `Arc`.

pub mod bytes;
pub mod disk;
pub mod fetch;
pub mod journal;
pub mod memory;
pub mod remote;
pub mod store;

pub use bytes::BlockBytes;
pub use disk::DiskStore;
pub use fetch::{FetchResult, Fetcher};
pub use journal::Journal;
pub use memory::MemoryStore;
pub use remote::RemoteStore;
pub use store::{Backend, Store};
