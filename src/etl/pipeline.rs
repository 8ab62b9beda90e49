//! Extract -> validate -> clean -> validate -> load orchestration over the
//! raw and clean stores.
//!
//! Full runs rebuild the clean store and validate the batch on both sides
//! of cleaning; incremental runs take a trailing time window and append
//! without validation, mirroring how full and incremental processing have
//! always differed in this pipeline.

use anyhow::Result;
use tracing::{info, warn};

use crate::db::clean::CleanStore;
use crate::db::raw::RawStore;
use crate::etl::{cleaner, validator};
use crate::models::{LoadMode, QualityStats, ValidationReport};

pub struct EtlPipeline {
    raw: RawStore,
    clean: CleanStore,
    reference_year: i32,
}

impl EtlPipeline {
    pub fn new(raw: RawStore, clean: CleanStore, reference_year: i32) -> Self {
        Self {
            raw,
            clean,
            reference_year,
        }
    }

    /// Full run: the whole raw store, validated before and after cleaning,
    /// loaded with table-replace semantics. A failed validation report
    /// aborts the run.
    pub async fn run_full(&self) -> Result<QualityStats> {
        info!("Starting full ETL run");

        let raw_records = self.raw.fetch_all().await?;
        info!("Extracted {} raw records", raw_records.len());
        if raw_records.is_empty() {
            warn!("No data to process");
            return Ok(QualityStats::default());
        }

        let report = validator::validate(&raw_records);
        log_report(&report, "raw data");
        if !report.passed {
            anyhow::bail!("raw data validation failed: {}", report.errors.join("; "));
        }

        let clean_records = cleaner::clean_batch(raw_records, self.reference_year);
        info!("Cleaned {} records", clean_records.len());

        let clean_report = validator::validate(&clean_records);
        log_report(&clean_report, "clean data");
        if !clean_report.passed {
            anyhow::bail!(
                "clean data validation failed: {}",
                clean_report.errors.join("; ")
            );
        }

        let loaded = self.clean.load(&clean_records, LoadMode::Replace).await?;
        info!("Loaded {loaded} records (replace)");

        let stats = self.clean.quality_stats().await?;
        log_quality_stats(&stats);

        info!("Full ETL run completed");
        Ok(stats)
    }

    /// Incremental run: records scraped within the trailing window,
    /// cleaned and appended. No validation passes in this mode.
    pub async fn run_incremental(&self, hours: i64) -> Result<usize> {
        info!("Starting incremental ETL run (last {hours}h)");

        let raw_records = self.raw.fetch_recent(hours).await?;
        info!("Extracted {} recent raw records", raw_records.len());
        if raw_records.is_empty() {
            info!("No new data to process");
            return Ok(0);
        }

        let clean_records = cleaner::clean_batch(raw_records, self.reference_year);
        let loaded = self.clean.load(&clean_records, LoadMode::Append).await?;
        info!("Loaded {loaded} records (append)");

        info!("Incremental ETL run completed");
        Ok(loaded)
    }
}

fn log_report(report: &ValidationReport, title: &str) {
    info!(
        "=== {title} validation: {} records, passed: {} ===",
        report.total_records, report.passed
    );
    for error in &report.errors {
        warn!("validation error: {error}");
    }
    for warning in &report.warnings {
        warn!("validation warning: {warning}");
    }
}

fn log_quality_stats(stats: &QualityStats) {
    info!("=== data quality report ===");
    info!("Total records: {}", stats.total_records);
    info!("Price issues: {}", stats.price_issues);
    for (field, pct) in &stats.missing_percentages {
        info!("  {field} missing: {pct:.2}%");
    }
    for brand in stats.brand_distribution.iter().take(5) {
        info!("  {}: {} vehicles", brand.brand, brand.count);
    }
}
