//! Used-vehicle marketplace data pipeline: scrape listings into a raw
//! sqlite store, clean and validate them into a clean store, and serve
//! analytics (quality stats, market summary, baseline price models) on
//! top of the cleaned data.

pub mod analysis;
pub mod config;
pub mod db;
pub mod etl;
pub mod extract;
pub mod models;
pub mod scrapers;
pub mod traits;
