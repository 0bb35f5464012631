//! Picstash CLI - Image ingestion service.
//!
//! Picstash accepts images as URLs, base64 data URIs or multipart uploads,
//! verifies each one by sniffing its content, and stores it under a freshly
//! generated name.
//!
//! # Usage
//!
//! ```bash
//! # Run the HTTP front end
//! picstash serve --port 8080
//!
//! # Ingest directly from the command line
//! picstash ingest https://example.com/cat.png --file ./dog.jpg
//!
//! # View configuration
//! picstash config show
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod cli;
mod logging;
mod server;

/// Picstash - Fetch, verify and store images from URLs, data URIs and uploads.
#[derive(Parser, Debug)]
#[command(name = "picstash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true, env = "PICSTASH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP ingestion server
    Serve(cli::serve::ServeArgs),

    /// Ingest URLs, data URIs and local files
    Ingest(cli::ingest::IngestArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = cli::load_config(cli.config.as_deref())?;
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Picstash v{}", picstash_core::VERSION);

    match cli.command {
        Commands::Serve(args) => cli::serve::execute(args, config).await,
        Commands::Ingest(args) => cli::ingest::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config, cli.config).await,
    }
}
