mod pipeline;
mod report;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kantoi_core::{ProcessingStatus, SignalStore};
use kantoi_db::PgStore;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "kantoi-cli")]
#[command(about = "Kantoi trust monitor command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database utilities
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Load a scraper JSON dump into the source record queue
    Ingest {
        /// Path to the dump (a JSON array of scraper items)
        #[arg(long)]
        file: PathBuf,
    },
    /// Classify and score pending source records
    Score {
        /// Maximum records to take from the queue (defaults to `KANTOI_CLASSIFY_BATCH_SIZE`)
        #[arg(long)]
        limit: Option<usize>,

        /// Classify and print results without writing to the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Narrative brief commands
    Brief {
        #[command(subcommand)]
        command: BriefCommands,
    },
    /// Print a markdown report for a window
    Report {
        /// One of 24h, 3d, 7d, 30d, 90d
        #[arg(long, default_value = "7d")]
        window: String,
    },
    /// Show source record queue counts
    Status,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
}

#[derive(Debug, Subcommand)]
enum BriefCommands {
    /// Generate and store a brief for the last 24 hours
    Generate,
    /// Print the latest stored brief
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("kantoi-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = kantoi_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = kantoi_db::PoolConfig::from_app_config(&config);
    let pool = kantoi_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                kantoi_db::ping(&pool).await?;
                println!("database ok");
            }
            DbCommands::Migrate => {
                let applied = kantoi_db::run_migrations(&pool).await?;
                println!("applied {applied} migration(s)");
            }
        },
        Commands::Ingest { file } => run_ingest(&PgStore::new(pool), &file).await?,
        Commands::Score { limit, dry_run } => {
            pipeline::run_score(&PgStore::new(pool), &config, limit, dry_run).await?;
        }
        Commands::Brief { command } => match command {
            BriefCommands::Generate => {
                pipeline::run_brief_generate(&PgStore::new(pool), &config).await?;
            }
            BriefCommands::Show => pipeline::run_brief_show(&PgStore::new(pool)).await?,
        },
        Commands::Report { window } => {
            let preset = kantoi_core::WindowPreset::parse(&window).ok_or_else(|| {
                anyhow::anyhow!("unknown window '{window}'; expected one of 24h, 3d, 7d, 30d, 90d")
            })?;
            report::run_report(&PgStore::new(pool), preset).await?;
        }
        Commands::Status => run_status(&PgStore::new(pool)).await?,
    }

    Ok(())
}

async fn run_ingest(store: &PgStore, file: &std::path::Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", file.display()))?;
    let records = kantoi_sentiment::parse_source_dump(&text)?;
    if records.is_empty() {
        println!("no usable items in {}", file.display());
        return Ok(());
    }
    let written = kantoi_sentiment::ingest_records(store, &records).await?;
    println!("ingested {written} source record(s) from {}", file.display());
    Ok(())
}

async fn run_status(store: &PgStore) -> anyhow::Result<()> {
    let counts = store.source_status_counts().await?;
    println!("{:<12}COUNT", "STATUS");
    for status in [
        ProcessingStatus::Pending,
        ProcessingStatus::Processed,
        ProcessingStatus::Skipped,
        ProcessingStatus::Failed,
    ] {
        println!("{:<12}{}", status.as_str(), counts.get(&status).copied().unwrap_or(0));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
