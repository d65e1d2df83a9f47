//! Samovar CLI
//!
//! Imports tea catalogs from vendor websites into the local database.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use samovar::{error::Result, models::Config, pipeline, storage::Catalog, vendors};

/// Samovar - Tea Catalog Importer
#[derive(Parser, Debug)]
#[command(
    name = "samovar",
    version,
    about = "Imports tea vendor catalogs into a unified local database"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "samovar.toml")]
    config: PathBuf,

    /// Path to the catalog database
    #[arg(long, default_value = "catalog.db")]
    db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import teas from the given vendors ("all" imports every vendor)
    Import {
        /// Run the whole pipeline but roll the changes back at the end
        #[arg(long)]
        dry_run: bool,

        /// Importer names to run
        importer: Vec<String>,
    },

    /// List the registered vendor importers
    Vendors,

    /// Show catalog row counts
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    config.validate()?;

    match cli.command {
        Command::Import { dry_run, importer } => {
            let summary = pipeline::run_import(&config, &cli.db, &importer, dry_run).await?;
            log::info!(
                "Run summary: {} references ({} failed), {} item failures, {} inserted, {} updated.",
                summary.references_count,
                summary.reference_errors.len(),
                summary.crawl_errors.len(),
                summary.inserted,
                summary.updated
            );
        }

        Command::Vendors => {
            for name in vendors::names() {
                println!("{name}");
            }
        }

        Command::Info => {
            let catalog = Catalog::open(&cli.db)?;
            let stats = catalog.stats()?;
            log::info!("Vendors: {}", stats.vendors);
            log::info!("Categories: {}", stats.categories);
            log::info!("Active teas: {}", stats.active_teas);
            log::info!("Deleted teas: {}", stats.deleted_teas);
        }
    }

    Ok(())
}
