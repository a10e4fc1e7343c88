//! # Put Subcommand
//!
//! Chunks a file into a block tree, stores every block and flushes the
//! store chain. Prints the root name and the base64 link that reaches the
//! root (carrying its key when the file is encrypted).

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cairn_block::FileBuilder;
use cairn_core::CairnConfig;
use cairn_store::Store;
use clap::Args;
use serde::Serialize;

/// Arguments for `cairn put`.
#[derive(Args, Debug)]
pub struct PutArgs {
    /// File to store.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Convergently encrypt every block.
    #[arg(long)]
    pub encrypt: bool,

    /// Target frame size in bytes (power of two). Defaults to
    /// `store.block_size` from the config.
    #[arg(long, value_name = "BYTES")]
    pub block_size: Option<usize>,
}

/// Report printed after a successful put.
#[derive(Debug, Serialize)]
pub struct PutReport {
    /// Name of the root block.
    pub root: String,
    /// Base64 of the root link's wire bytes.
    pub link: String,
    /// Blocks written.
    pub blocks: usize,
    /// Size of the input file.
    pub bytes: usize,
}

/// Execute `cairn put`.
pub fn run_put(args: &PutArgs, config: &CairnConfig, out: &mut dyn Write) -> Result<u8> {
    let store = crate::open_store(config)?;
    let report = put_file(args, config, &store)?;
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(0)
}

/// Chunk, store and flush `args.file` into `store`.
pub fn put_file(args: &PutArgs, config: &CairnConfig, store: &Store) -> Result<PutReport> {
    let data = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let file = FileBuilder::new(config.crypto.clone())
        .block_size(args.block_size.unwrap_or(config.store.block_size))
        .encrypted(args.encrypt)
        .build(&data)?;

    store.store_file(&file)?;
    store.flush().context("failed to flush blocks")?;
    tracing::info!(root = file.root.target(), blocks = file.len(), "stored file");

    Ok(PutReport {
        root: file.root.target().to_string(),
        link: STANDARD.encode(file.root.to_bytes()),
        blocks: file.len(),
        bytes: data.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_block::Link;

    fn config_for(dir: &std::path::Path) -> CairnConfig {
        crate::load_config(None, Some(dir)).unwrap()
    }

    #[test]
    fn put_writes_blocks_and_reports_root() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        std::fs::write(&input, vec![b'z'; 10_000]).unwrap();
        let config = config_for(&dir.path().join("blocks"));

        let args = PutArgs {
            file: input,
            encrypt: false,
            block_size: Some(1024),
        };
        let mut out = Vec::new();
        assert_eq!(run_put(&args, &config, &mut out).unwrap(), 0);

        let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let root = report["root"].as_str().unwrap();
        assert!(dir.path().join("blocks").join(root).exists());
        assert_eq!(report["bytes"], 10_000);

        let link = Link::parse(&STANDARD.decode(report["link"].as_str().unwrap()).unwrap()).unwrap();
        assert_eq!(link.target(), root);
        assert!(!link.has_key());
    }

    #[test]
    fn encrypted_put_link_carries_key() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("secret.txt");
        std::fs::write(&input, b"attack at dawn").unwrap();
        let config = config_for(&dir.path().join("blocks"));
        let store = crate::open_store(&config).unwrap();

        let args = PutArgs {
            file: input,
            encrypt: true,
            block_size: None,
        };
        let report = put_file(&args, &config, &store).unwrap();
        let link = Link::parse(&STANDARD.decode(&report.link).unwrap()).unwrap();
        assert!(link.has_key());
        assert_eq!(report.blocks, 1);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let args = PutArgs {
            file: dir.path().join("absent"),
            encrypt: false,
            block_size: None,
        };
        let err = run_put(&args, &config, &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
