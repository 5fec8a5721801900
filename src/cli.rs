//! Command-line surface.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "docshelf", version, about = "Keep a directory of documents and its content-hash index in step")]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Document directory, overriding the configuration
    #[arg(long, global = true, value_name = "PATH")]
    pub docs: Option<PathBuf>,

    /// More logging; repeat for more detail
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Copy files into the document directory and record them
    Add {
        #[arg(required = true, value_name = "FILES")]
        files: Vec<PathBuf>,
        /// Store the file even if its content is already tracked
        #[arg(short, long)]
        force: bool,
    },
    /// Report whether a file's content is already tracked
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Delete documents and their records
    Remove {
        #[arg(required = true, value_name = "NAMES")]
        names: Vec<String>,
    },
    /// List tracked documents, newest first
    List,
    /// Reconcile the records with the directory
    Sync,
    /// Show totals for tracked documents
    Stats,
    /// Delete recognized files that have no record
    Cleanup,
}

impl Cli {
    /// Log filter implied by `-v` flags, if any were given.
    pub fn log_level(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    }
}
