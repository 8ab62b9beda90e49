//! Process configuration, loaded once from the environment and threaded
//! through constructors so tests can inject temporary stores.

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{Datelike, Utc};

#[derive(Debug, Clone)]
pub struct Settings {
    /// Raw store connection string (`sqlite:...`).
    pub raw_database_url: String,
    /// Clean store connection string (`sqlite:...`).
    pub clean_database_url: String,
    /// Directory for the one-JSON-file-per-vehicle interchange records.
    pub raw_json_dir: PathBuf,
    /// Directory for analysis artifacts (recommendations JSON).
    pub reports_dir: PathBuf,
    /// Delay between detail-page fetches.
    pub scrape_delay_ms: u64,
    /// Delay between listing-index pages.
    pub page_delay_ms: u64,
    /// Pagination safety cap.
    pub max_pages: u32,
    /// Skip re-fetching detail pages scraped within this window; zero
    /// disables skipping.
    pub rescrape_hours: i64,
    pub user_agent: String,
    /// Year used for vehicle-age derivation.
    pub reference_year: i32,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            raw_database_url: env_or("RAW_DATABASE_URL", "sqlite:data/vehicles_raw.db"),
            clean_database_url: env_or("CLEAN_DATABASE_URL", "sqlite:data/vehicles_clean.db"),
            raw_json_dir: PathBuf::from(env_or("RAW_JSON_DIR", "data/raw_json")),
            reports_dir: PathBuf::from(env_or("REPORTS_DIR", "reports")),
            scrape_delay_ms: env_or("SCRAPE_DELAY_MS", "2000").parse()?,
            page_delay_ms: env_or("PAGE_DELAY_MS", "1000").parse()?,
            max_pages: env_or("MAX_PAGES", "50").parse()?,
            rescrape_hours: env_or("RESCRAPE_HOURS", "24").parse()?,
            user_agent: env_or(
                "USER_AGENT",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
            ),
            reference_year: Utc::now().year(),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
