//! CLI argument definitions using clap
//!
//! Commands:
//! - aerodoc compile-read --config <path>
//! - aerodoc compile-write --config <path>
//! - aerodoc find --config <path> --data <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aerodoc - a document-store access layer
#[derive(Parser, Debug)]
#[command(name = "aerodoc")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a read request from stdin into a native filter and options
    CompileRead {
        /// Path to configuration file
        #[arg(long, default_value = "./aerodoc.json")]
        config: PathBuf,
    },

    /// Compile a write request from stdin into a native filter and update
    CompileWrite {
        /// Path to configuration file
        #[arg(long, default_value = "./aerodoc.json")]
        config: PathBuf,
    },

    /// Run a read request from stdin against documents loaded from a file
    Find {
        /// Path to configuration file
        #[arg(long, default_value = "./aerodoc.json")]
        config: PathBuf,

        /// JSON object mapping collection names to document arrays
        #[arg(long)]
        data: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
