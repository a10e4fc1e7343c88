//! # Get Subcommand
//!
//! Raw bytes of a single block, exactly as stored.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use cairn_core::{CairnConfig, CairnError};
use clap::Args;

/// Arguments for `cairn get`.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Encoded block name, e.g. `sha-256:...`.
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Write the bytes here instead of stdout.
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// Execute `cairn get`. Exits 1 when the block is absent.
pub fn run_get(args: &GetArgs, config: &CairnConfig, out: &mut dyn Write) -> Result<u8> {
    let store = crate::open_store(config)?;
    match store.retrieve(&args.name) {
        Ok(bytes) => {
            crate::write_output(args.out.as_ref(), &bytes, out)?;
            Ok(0)
        }
        Err(CairnError::NoSuchBlock { name }) => {
            eprintln!("NOT FOUND: {name}");
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}
