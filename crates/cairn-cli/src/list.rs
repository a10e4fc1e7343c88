//! # List Subcommand
//!
//! Names held by the first medium in the store chain that can enumerate
//! them, one per line.

use std::io::Write;

use anyhow::{bail, Result};
use cairn_core::CairnConfig;
use cairn_store::Store;
use clap::Args;

/// Arguments for `cairn list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Print only the number of blocks.
    #[arg(long)]
    pub count: bool,
}

/// Execute `cairn list`.
pub fn run_list(args: &ListArgs, config: &CairnConfig, out: &mut dyn Write) -> Result<u8> {
    let store = crate::open_store(config)?;
    let names = local_names(&store)?;
    if args.count {
        writeln!(out, "{}", names.len())?;
    } else {
        for name in &names {
            writeln!(out, "{name}")?;
        }
    }
    Ok(0)
}

/// Walk from the outermost store inward and return the first listing.
pub fn local_names(store: &Store) -> Result<Vec<String>> {
    let mut current = Some(store);
    while let Some(s) = current {
        if let Some(names) = s.list()? {
            return Ok(names);
        }
        current = s.cache();
    }
    bail!("no store in the chain can enumerate its blocks")
}
