mod cli;
mod commands;
mod error;

use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use clap::Parser;
use docshelf_config::Config;
use docshelf_library::Library;
use docshelf_storage::backend::LocalBackend;
use exn::ResultExt;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    if let Some(docs) = cli.docs {
        config.docs_path = docs;
    }
    let root = std::path::absolute(&config.docs_path).or_raise(|| ErrorKind::DocsPath(config.docs_path.clone()))?;
    let backend = LocalBackend::new("local", &root).or_raise(|| ErrorKind::DocsPath(root.clone()))?;
    tracing::debug!(root = %root.display(), sidecar = %config.metadata_file.display(), "Opening document directory");

    let library = Library::open(Arc::new(backend), &config.metadata_file, config.library_options()).await;
    commands::run(&library, cli.command).await
}

/// Logs go to stderr so command output on stdout stays clean. `-v` wins over
/// `RUST_LOG`, which wins over the `info` default.
fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}
