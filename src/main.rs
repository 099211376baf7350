//! docloader CLI
//!
//! Provides commands for:
//! - (default): load documents into the configured table
//! - `version`: print the version
//! - `formats`: list supported file extensions

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docloader::config::{CliSettings, Config};
use docloader::database::Database;
use docloader::document_type::supported_extensions;
use docloader::git::GitSource;
use docloader::processor::{ProcessOptions, process_sources};
use docloader::types::{Document, Stats};

/// Application version from Cargo.toml.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Load documents into PostgreSQL.
///
/// HTML, Markdown, reStructuredText and SGML/DocBook files are converted to
/// Markdown, their titles extracted, and the results written to a table
/// under a configurable column mapping.
#[derive(Parser)]
#[command(name = "docloader", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    settings: CliSettings,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version information.
    Version,
    /// List supported document formats.
    Formats,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise progress at info level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docloader=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("docloader {VERSION}");
            Ok(())
        }
        Some(Commands::Formats) => {
            println!("Supported document formats:");
            for ext in supported_extensions() {
                println!("  {ext}");
            }
            Ok(())
        }
        None => run(&cli.settings),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &CliSettings) -> anyhow::Result<()> {
    let config = Config::load(settings).context("failed to load configuration")?;
    let (documents, mut stats) = collect_documents(&config)?;

    if documents.is_empty() {
        println!("No documents to process.");
        print_summary(&stats);
        return Ok(());
    }

    tracing::info!(
        processed = stats.files_processed,
        skipped = stats.files_skipped,
        "converted files"
    );

    let runtime = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;
    runtime.block_on(async {
        let database = Database::connect(&config)
            .await
            .context("failed to connect to database")?;
        let stored = database
            .store_documents(&documents, &mut stats)
            .await
            .context("failed to insert documents");
        database.close().await;
        stored
    })?;

    print_summary(&stats);
    Ok(())
}

/// Convert every file from the local sources or the git working tree.
fn collect_documents(config: &Config) -> anyhow::Result<(Vec<Document>, Stats)> {
    let Some(git_config) = &config.git else {
        let options = ProcessOptions {
            strip_path: config.strip_path,
            base_dir: None,
        };
        return process_sources(&config.sources, options).context("failed to process files");
    };

    let git = GitSource::open(git_config).context("failed to prepare git source")?;
    let options = ProcessOptions {
        strip_path: config.strip_path,
        base_dir: Some(git.repo_path()),
    };
    let processed = process_sources(&git.source_paths(), options);

    if let Err(err) = git.cleanup() {
        tracing::warn!(error = %err, "failed to remove cloned repository");
    }
    processed.context("failed to process files")
}

fn print_summary(stats: &Stats) {
    println!();
    println!("=== Processing Summary ===");
    println!("Files processed: {}", stats.files_processed);
    println!("Files skipped:   {}", stats.files_skipped);
    println!("Rows inserted:   {}", stats.rows_inserted);
    println!("Rows updated:    {}", stats.rows_updated);

    if stats.has_errors() {
        println!();
        println!("Errors encountered: {}", stats.errors.len());
        for (i, err) in stats.errors.iter().enumerate() {
            println!("  {}. {err}", i + 1);
        }
    }
    println!("==========================");
}
