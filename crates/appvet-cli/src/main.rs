use anyhow::Result;
use appvet_crawl::CrawlConfig;
use appvet_fetch::{FetchConfig, HttpFetcher};
use appvet_store::{RecordFilter, RecordStore};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "appvet")]
#[command(about = "Curated app-directory security dataset tooling")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Crawl the directory and reconcile the curated dataset.
    Crawl,
    /// Query the curated dataset.
    Query {
        /// Case-insensitive app name substring.
        #[arg(long)]
        name: Option<String>,
        /// Case-insensitive category substring.
        #[arg(long)]
        category: Option<String>,
        /// Only verified apps.
        #[arg(long)]
        verified: bool,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Crawl) {
        Commands::Crawl => {
            let config = CrawlConfig::from_env();
            let fetcher = HttpFetcher::new(FetchConfig::from_env())?;
            let summary = appvet_crawl::run(&fetcher, &config).await?;
            println!(
                "crawl complete: run_id={} passes={} scraped={} added={} total={} written={}",
                summary.run_id,
                summary.passes,
                summary.scraped,
                summary.added,
                summary.total,
                summary.written
            );
        }
        Commands::Query {
            name,
            category,
            verified,
            page,
        } => {
            let config = CrawlConfig::from_env();
            let store = RecordStore::from_path(&config.dataset_path)?;
            let result = store.query(&RecordFilter {
                name_contains: name,
                category_contains: category,
                verified_only: verified,
                page,
                ..Default::default()
            });
            for record in &result.records {
                println!(
                    "{} [{}] verified={} {}",
                    record.app_name, record.category, record.verified, record.source_url
                );
            }
            println!(
                "page {}/{} ({} matching)",
                result.page, result.total_pages, result.total
            );
        }
    }

    Ok(())
}
