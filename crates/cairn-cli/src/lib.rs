//! # cairn-cli — Command-Line Access to a Block Store
//!
//! Provides the `cairn` command-line interface.
//!
//! ## Subcommands
//!
//! - `cairn put` — Chunk a file into blocks, store and flush them.
//! - `cairn get` — Print or save the raw bytes of one block.
//! - `cairn fetch` — Walk the link graph below a root and report it.
//! - `cairn list` — List locally stored block names.
//!
//! ```bash
//! cairn --store ./blocks put report.pdf --encrypt
//! cairn --store ./blocks fetch --link <base64> --out report.pdf
//! ```
//!
//! Every subcommand writes its report to the writer it is given and
//! returns a process exit code.

pub mod fetch;
pub mod get;
pub mod list;
pub mod put;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cairn_core::CairnConfig;
use cairn_store::Store;

/// Load the configuration file, if any, and apply the `--store` override.
pub fn load_config(path: Option<&Path>, store_dir: Option<&Path>) -> Result<CairnConfig> {
    let mut config = match path {
        Some(path) => CairnConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CairnConfig::default(),
    };
    if let Some(dir) = store_dir {
        config.store.directory = Some(dir.to_path_buf());
    }
    Ok(config)
}

/// Open the store chain the configuration describes.
///
/// A purely in-memory store would lose everything on exit, so at least a
/// directory or a remote must be configured.
pub fn open_store(config: &CairnConfig) -> Result<Store> {
    if config.store.directory.is_none() && config.store.remote.is_none() {
        bail!("no store configured: pass --store DIR or set store.directory in the config file");
    }
    Store::open(&config.store).context("failed to open block store")
}

/// Write `bytes` to `path`, or to `out` when no path is given.
pub fn write_output(path: Option<&PathBuf>, bytes: &[u8], out: &mut dyn Write) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, bytes)
            .with_context(|| format!("failed to write {}", path.display())),
        None => out.write_all(bytes).context("failed to write output"),
    }
}
