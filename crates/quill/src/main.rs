//! Quill CLI - headless driver for the draft/publish engine.
//!
//! Provides commands for:
//! - `save`: Apply edits to a document and save it as a draft
//! - `publish`: Apply edits and publish the document as a post
//! - `compose`: Stream paragraphs from stdin with autosave running
//! - `show`: Print a stored record as JSON
//! - `list`: List drafts or posts, newest first
//! - `sweep`: Delete drafts left behind by a publish

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ComposeArgs, GlobalArgs, ListArgs, PublishArgs, SaveArgs, ShowArgs, SweepArgs};
use error::CliError;
use output::Output;

/// Quill - draft/publish engine.
#[derive(Parser)]
#[command(name = "quill", version, about)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a document as a draft.
    Save(SaveArgs),
    /// Publish a document.
    Publish(PublishArgs),
    /// Write a document paragraph by paragraph from stdin.
    Compose(ComposeArgs),
    /// Print a stored draft or post.
    Show(ShowArgs),
    /// List drafts or posts.
    List(ListArgs),
    /// Delete drafts whose content matches a published post.
    Sweep(SweepArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.global.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli) {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let rt = tokio::runtime::Runtime::new()?;
    let global = cli.global;
    rt.block_on(async move {
        match cli.command {
            Commands::Save(args) => args.execute(&global).await,
            Commands::Publish(args) => args.execute(&global).await,
            Commands::Compose(args) => args.execute(&global).await,
            Commands::Show(args) => args.execute(&global).await,
            Commands::List(args) => args.execute(&global).await,
            Commands::Sweep(args) => args.execute(&global).await,
        }
    })
}
