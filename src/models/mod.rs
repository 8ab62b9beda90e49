//! Data models for vehicle listings, pipeline reports and analysis output

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scraped detail page, as extracted. Every field beyond the source URL
/// is optional: the parser returns `None` wherever the markup gave no match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub url: String,
    pub vehicle_id: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub price_colones: Option<i64>,
    pub price_usd: Option<i64>,
    pub mileage: Option<i64>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub engine_cc: Option<i32>,
    pub doors: Option<i32>,
    pub style: Option<String>,
    pub color_exterior: Option<String>,
    pub color_interior: Option<String>,
    pub location: Option<String>,
    pub province: Option<String>,
    pub seller_phone: Option<String>,
    pub seller_whatsapp: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub scraped_at: DateTime<Utc>,
}

/// A raw record admitted past cleaning, one-to-one, with derived features.
/// Columns that are always empty at the source (doors, style, location,
/// province, features) are dropped here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanVehicle {
    pub url: String,
    pub vehicle_id: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub price_colones: Option<i64>,
    pub price_usd: Option<i64>,
    pub mileage: Option<i64>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub engine_cc: Option<i32>,
    pub color_exterior: Option<String>,
    pub color_interior: Option<String>,
    pub seller_phone: Option<String>,
    pub seller_whatsapp: Option<String>,
    pub description: Option<String>,
    pub images: Vec<String>,
    /// `price_colones / price_usd`, when both are positive.
    pub exchange_rate: Option<f64>,
    /// Set when the exchange rate falls outside [400, 600].
    pub price_flag: bool,
    pub vehicle_age: Option<i32>,
    pub price_per_year: Option<f64>,
    pub is_luxury: bool,
    pub scraped_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
}

/// Outcome of one scrape run.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeSummary {
    pub vehicles_scraped: usize,
    /// Detail pages not re-fetched because they fell inside the rescrape
    /// window.
    pub skipped: usize,
    pub errors: usize,
    pub status: String,
}

impl std::fmt::Display for ScrapeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scraped: {}, skipped: {}, errors: {}, status: {}",
            self.vehicles_scraped, self.skipped, self.errors, self.status
        )
    }
}

/// Per-URL fetch outcome recorded in the raw store's operation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Success,
    Error,
    Skipped,
}

impl FetchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

/// Result of one validation pass. Produced fresh per call, never persisted.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub total_records: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub passed: bool,
}

/// Clean-store summary, produced after load for logging and reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityStats {
    pub total_records: i64,
    /// Records with the exchange-rate flag set.
    pub price_issues: i64,
    /// Field name -> percent missing.
    pub missing_percentages: Vec<(String, f64)>,
    /// Top brands by listing count.
    pub brand_distribution: Vec<BrandCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrandCount {
    pub brand: String,
    pub count: i64,
}

/// How cleaned batches land in the clean store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Destructive rebuild: drop and recreate the table, then insert.
    Replace,
    /// Append to the existing table (incremental runs).
    Append,
}

/// Aggregate market view computed from the clean store.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSummary {
    pub total_vehicles: usize,
    pub avg_price_usd: f64,
    pub min_price_usd: i64,
    pub max_price_usd: i64,
    pub market_leader: Option<String>,
    pub market_share_pct: f64,
    pub luxury_pct: f64,
    pub automatic_pct: f64,
    pub median_age: Option<f64>,
    /// Median luxury price over median non-luxury price, as a percentage
    /// premium. `None` when either side is empty.
    pub luxury_premium_pct: Option<f64>,
    pub top_brands: Vec<BrandCount>,
}

/// Precomputed recommendations written as a JSON side artifact for the
/// dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    pub ml_models: ModelChoice,
    pub key_features: Vec<String>,
    pub market_insights: MarketSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelChoice {
    pub primary: String,
    pub r2: f64,
    pub mae: f64,
    pub alternative: String,
}
