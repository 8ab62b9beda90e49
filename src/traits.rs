//! Traits and interfaces for marketplace-agnostic scraping

use anyhow::Result;
use async_trait::async_trait;

use crate::db::raw::RawStore;
use crate::models::ScrapeSummary;

/// Configuration for a marketplace scraper
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Display name for the marketplace
    pub name: String,
    /// Base URL for relative-link resolution
    pub base_url: String,
    /// Paginated listing-index URL
    pub listing_url: String,
    /// Safety cap on listing-index pages per run
    pub max_pages: u32,
    /// Fixed delay between listing-index fetches
    pub page_delay_ms: u64,
    /// Fixed delay between detail-page fetches
    pub detail_delay_ms: u64,
    /// Detail pages fetched within this window are skipped, not re-fetched.
    /// Zero disables skipping.
    pub rescrape_hours: i64,
    pub user_agent: String,
}

/// Trait for marketplace-specific scrapers
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Get the configuration for this scraper
    fn config(&self) -> &SiteConfig;

    /// Registry name used by the CLI to select this scraper
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Run one full crawl: paginate the listing index, fetch and parse
    /// every discovered detail page, and persist each record to `store`
    /// before moving on.
    ///
    /// # Returns
    /// * `Result<ScrapeSummary>` - aggregate counts, or a crawl-level error
    ///   when the listing index itself cannot be reached
    async fn run(&self, store: &RawStore) -> Result<ScrapeSummary>;
}
