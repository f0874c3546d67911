//! CLI argument definitions using clap derive macros.
//!
//! Options that can also come from the config file are `Option`s so an
//! absent flag falls through to the file value and then the built-in default.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Relay files from public URLs into resumable-upload storage.
///
/// Each URL is streamed into the sink in fixed-size chunks without touching
/// local disk, and the resulting artifact is recorded in a local database.
#[derive(Parser, Debug)]
#[command(name = "url-relay")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file to load instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Metadata database path
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Relay URLs (arguments, or one per line on stdin) into the sink
    Upload(UploadArgs),
    /// Print every recorded artifact as a JSON line
    List,
    /// Delete the artifact recorded for a source URL, remotely and locally
    Delete {
        /// Source URL the artifact was relayed from
        url: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct UploadArgs {
    /// Source URLs; read from stdin when omitted
    pub urls: Vec<String>,

    /// Maximum concurrent transfers (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Transfer attempts per URL (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_attempts: Option<u8>,

    /// Chunk size in KiB (multiple of 256, 256-65536)
    #[arg(long, value_parser = parse_chunk_size_kib)]
    pub chunk_size_kib: Option<u32>,

    /// Keep uploaded artifacts private
    #[arg(long)]
    pub no_share: bool,
}

fn parse_chunk_size_kib(raw: &str) -> Result<u32, String> {
    let kib: u32 = raw.parse().map_err(|e| format!("{e}"))?;
    crate::app_config::validate_chunk_size_kib(kib).map_err(|e| e.to_string())?;
    Ok(kib)
}
