use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use utrp::catalog::{extract_rows, CatalogFetcher, CourseCatalogScraper, SiteSupport};
use utrp::migration::{import_link, load_saved_courses};
use utrp::{CatalogClient, EngineConfig, Migrator, NamePolicy, ScheduleStore};

#[derive(Parser)]
#[command(name = "utrp", about = "UT course catalog scraper and v1 schedule migration")]
struct Cli {
    /// JSON configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate a v1 savedCourses export into a new schedule
    Migrate {
        /// JSON file holding `savedCourses` (or a bare array of `{ "link": ... }`)
        saved_courses: PathBuf,
    },
    /// Add a single course by its catalog link
    Add {
        link: String,
        /// Schedule to add the course to
        #[arg(short, long, default_value = "My Schedule")]
        schedule: String,
    },
    /// Scrape a catalog page and print every row
    Scrape {
        link: String,
        /// Read the page from a local file instead of fetching it
        #[arg(long)]
        file: Option<PathBuf>,
        /// Take the first section of rows that list several
        #[arg(long)]
        include_ambiguous: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::default(),
    };

    let client = Arc::new(
        CatalogClient::with_config(config.catalog.clone()).context("building catalog client")?,
    );
    let store = Arc::new(ScheduleStore::new());

    match cli.command {
        Commands::Migrate { saved_courses } => {
            let legacy = load_saved_courses(&saved_courses)?;
            if legacy.is_empty() {
                info!("No v1 courses found");
            }

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, finishing with partial results");
                    on_ctrl_c.cancel();
                }
            });

            let migrator = Migrator::new(Arc::clone(&store), client, config.migration.clone());
            let report = migrator.migrate_with_cancel(&legacy, cancel).await?;
            let schedule = store.schedule(&report.schedule_id);

            print_json(&json!({ "report": report, "schedule": schedule }))?;
        }
        Commands::Add { link, schedule } => {
            let id = store.create_schedule(&schedule, NamePolicy::AllowDuplicates)?;
            store.switch_to(&id)?;

            let outcome = import_link(
                &store,
                client.as_ref(),
                &id,
                &link,
                config.migration.link_timeout(),
            )
            .await?;

            print_json(&json!({ "outcome": outcome, "schedule": store.schedule(&id) }))?;
        }
        Commands::Scrape {
            link,
            file,
            include_ambiguous,
        } => {
            let html = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => client.fetch(&link).await?,
            };

            let support = SiteSupport::detect(&link).unwrap_or(SiteSupport::CourseCatalogDetails);
            let document = scraper::Html::parse_document(&html);
            let rows = extract_rows(&document, support);
            let scraper = CourseCatalogScraper::new(support, &document, link.as_str());
            let results = scraper.scrape(&rows, include_ambiguous);

            print_json(&json!({ "support": support, "rows": results }))?;
        }
    }

    Ok(())
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
