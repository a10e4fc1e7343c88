//! # Fetch Subcommand
//!
//! Walks the link graph below a root and prints which nodes opened as
//! blocks and which stayed opaque. With `--out`, also writes the
//! assembled content of the root.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cairn_block::Link;
use cairn_core::CairnConfig;
use cairn_store::{Fetcher, Store};
use clap::Args;
use serde::Serialize;

/// Arguments for `cairn fetch`.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Base64 link wire bytes, as printed by `cairn put`.
    #[arg(
        long,
        value_name = "B64",
        required_unless_present = "name",
        conflicts_with = "name"
    )]
    pub link: Option<String>,

    /// Encoded block name (no key).
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Write the assembled content here.
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Give up on graphs deeper than this.
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,
}

/// Summary printed after a walk.
#[derive(Debug, Serialize)]
pub struct FetchReport {
    /// Name the walk started from.
    pub root: String,
    /// Nodes that opened as blocks, in walk order.
    pub plaintext: Vec<String>,
    /// Nodes no available key opened.
    pub opaque: Vec<String>,
    /// Bytes written to `--out`, if requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembled_bytes: Option<usize>,
}

impl FetchArgs {
    /// The root link named by `--link` or `--name`.
    pub fn root_link(&self) -> Result<Link> {
        match (&self.link, &self.name) {
            (Some(b64), _) => {
                let bytes = STANDARD
                    .decode(b64.trim())
                    .context("--link is not valid base64")?;
                Link::parse(&bytes).context("--link is not a link frame")
            }
            (None, Some(name)) => Ok(Link::builder().uri(name.clone()).build()?),
            (None, None) => anyhow::bail!("one of --link or --name is required"),
        }
    }
}

/// Execute `cairn fetch`. Exits 2 when some nodes stayed opaque.
pub fn run_fetch(args: &FetchArgs, config: &CairnConfig, out: &mut dyn Write) -> Result<u8> {
    let store = Arc::new(crate::open_store(config)?);
    let report = fetch(args, store)?;
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(if report.opaque.is_empty() { 0 } else { 2 })
}

/// Walk from the root named in `args`, writing assembled content if asked.
pub fn fetch(args: &FetchArgs, store: Arc<Store>) -> Result<FetchReport> {
    let root = args.root_link()?;
    let mut fetcher = Fetcher::new(store);
    if let Some(limit) = args.max_depth {
        fetcher = fetcher.max_depth(limit);
    }
    let result = fetcher.fetch(&root)?;

    let assembled_bytes = match &args.out {
        Some(path) => {
            let content = result.assemble(root.target())?;
            std::fs::write(path, &content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            Some(content.len())
        }
        None => None,
    };

    Ok(FetchReport {
        root: root.target().to_string(),
        plaintext: result.plaintext_names().into_iter().map(String::from).collect(),
        opaque: result.opaque_names().into_iter().map(String::from).collect(),
        assembled_bytes,
    })
}
