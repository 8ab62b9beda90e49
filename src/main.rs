//! CLI entry point: scraper dispatch, ETL runs, and analysis commands.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use autodata::analysis;
use autodata::config::Settings;
use autodata::db::clean::CleanStore;
use autodata::db::raw::RawStore;
use autodata::etl::pipeline::EtlPipeline;
use autodata::models::Recommendations;
use autodata::scrapers;

#[derive(Parser)]
#[command(name = "autodata", about = "Used-vehicle marketplace data pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a marketplace scraper into the raw store
    Scrape {
        /// Scraper name (e.g. "crautos")
        #[arg(long, default_value = "crautos")]
        scraper: String,
    },
    /// Run the ETL pipeline from the raw store into the clean store
    Etl {
        #[arg(long, value_enum, default_value = "full")]
        mode: EtlMode,
        /// Lookback window for incremental runs
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
    /// Evaluate the baseline price models and write the recommendations
    /// artifact for the dashboards
    Analyze,
    /// Predict a USD price for one vehicle
    Predict {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        engine_cc: i32,
        #[arg(long, default_value_t = false)]
        luxury: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EtlMode {
    Full,
    Incremental,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Scrape { scraper } => run_scrape(&settings, &scraper).await,
        Commands::Etl { mode, hours } => run_etl(&settings, mode, hours).await,
        Commands::Analyze => run_analyze(&settings).await,
        Commands::Predict {
            year,
            engine_cc,
            luxury,
        } => run_predict(&settings, year, engine_cc, luxury).await,
    }
}

async fn run_scrape(settings: &Settings, name: &str) -> Result<()> {
    let store = RawStore::new(&settings.raw_database_url, &settings.raw_json_dir).await?;
    let scraper = scrapers::by_name(name, settings)?;

    let summary = scraper.run(&store).await?;
    info!("Scrape finished: {summary}");
    println!("{summary}");
    Ok(())
}

async fn run_etl(settings: &Settings, mode: EtlMode, hours: i64) -> Result<()> {
    let raw = RawStore::new(&settings.raw_database_url, &settings.raw_json_dir).await?;
    let clean = CleanStore::new(&settings.clean_database_url).await?;
    let pipeline = EtlPipeline::new(raw, clean, settings.reference_year);

    match mode {
        EtlMode::Full => {
            let stats = pipeline.run_full().await?;
            println!("Processed {} records", stats.total_records);
        }
        EtlMode::Incremental => {
            let loaded = pipeline.run_incremental(hours).await?;
            println!("Appended {loaded} records (last {hours}h)");
        }
    }
    Ok(())
}

async fn run_analyze(settings: &Settings) -> Result<()> {
    let clean = CleanStore::new(&settings.clean_database_url).await?;
    let records = clean.fetch_all().await?;

    let Some(market) = analysis::market_summary(&records) else {
        println!("Clean store is empty, nothing to analyze");
        return Ok(());
    };

    println!(
        "Market: {} vehicles, avg ${:.0}, leader {} ({:.1}%)",
        market.total_vehicles,
        market.avg_price_usd,
        market.market_leader.as_deref().unwrap_or("-"),
        market.market_share_pct
    );

    match analysis::evaluate_models(&records)? {
        Some((choice, features)) => {
            println!(
                "Best model: {} (r2 {:.4}, mae ${:.0}); alternative: {}",
                choice.primary, choice.r2, choice.mae, choice.alternative
            );
            println!("Top features: {}", features.join(", "));

            let recommendations = Recommendations {
                ml_models: choice,
                key_features: features,
                market_insights: market,
            };
            let path = analysis::write_recommendations(&settings.reports_dir, &recommendations)?;
            println!("Recommendations written to {}", path.display());
        }
        None => println!("Not enough clean data for model evaluation"),
    }
    Ok(())
}

async fn run_predict(settings: &Settings, year: i32, engine_cc: i32, luxury: bool) -> Result<()> {
    let clean = CleanStore::new(&settings.clean_database_url).await?;
    let records = clean.fetch_all().await?;

    let age = settings.reference_year - year;
    let predicted = analysis::predict_price(&records, age, engine_cc, luxury)?;
    println!("Predicted price: ${predicted:.0}");
    Ok(())
}
