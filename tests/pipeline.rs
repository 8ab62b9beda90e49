//! End-to-end ETL runs against temporary sqlite stores.

use anyhow::Result;
use chrono::Utc;
use tempfile::TempDir;

use autodata::db::clean::CleanStore;
use autodata::db::raw::RawStore;
use autodata::etl::pipeline::EtlPipeline;
use autodata::etl::validator;
use autodata::models::{FetchOutcome, Vehicle};

const REFERENCE_YEAR: i32 = 2025;

struct Stores {
    raw: RawStore,
    clean_url: String,
    _dir: TempDir,
}

async fn temp_stores() -> Result<Stores> {
    let dir = TempDir::new()?;
    let raw_url = format!("sqlite:{}", dir.path().join("raw.db").display());
    let clean_url = format!("sqlite:{}", dir.path().join("clean.db").display());
    let raw = RawStore::new(&raw_url, &dir.path().join("json")).await?;
    Ok(Stores {
        raw,
        clean_url,
        _dir: dir,
    })
}

fn valid_bmw() -> Vehicle {
    Vehicle {
        url: "https://crautos.com/autosusados/cardetail.cfm?c=100".to_string(),
        vehicle_id: Some("100".to_string()),
        brand: Some("bmw".to_string()),
        model: Some("320i".to_string()),
        year: Some(2020),
        price_colones: Some(15_000_000),
        price_usd: Some(30_000),
        mileage: Some(40_000),
        fuel_type: Some("gasolina".to_string()),
        transmission: Some("Automática".to_string()),
        engine_cc: Some(2000),
        scraped_at: Utc::now(),
        ..Vehicle::default()
    }
}

fn out_of_range_record() -> Vehicle {
    Vehicle {
        url: "https://crautos.com/autosusados/cardetail.cfm?c=200".to_string(),
        vehicle_id: Some("200".to_string()),
        brand: Some("toyota".to_string()),
        year: Some(1800),
        mileage: Some(600_000),
        price_colones: Some(5_000_000),
        price_usd: Some(10_000),
        scraped_at: Utc::now(),
        ..Vehicle::default()
    }
}

fn missing_price_record() -> Vehicle {
    Vehicle {
        url: "https://crautos.com/autosusados/cardetail.cfm?c=300".to_string(),
        vehicle_id: Some("300".to_string()),
        brand: Some("honda".to_string()),
        year: Some(2019),
        price_colones: Some(8_000_000),
        price_usd: None,
        scraped_at: Utc::now(),
        ..Vehicle::default()
    }
}

#[tokio::test]
async fn full_run_aborts_on_missing_required_field() -> Result<()> {
    let stores = temp_stores().await?;
    for vehicle in [valid_bmw(), out_of_range_record(), missing_price_record()] {
        stores.raw.upsert_vehicle(&vehicle).await?;
    }

    let clean = CleanStore::new(&stores.clean_url).await?;
    let pipeline = EtlPipeline::new(stores.raw, clean, REFERENCE_YEAR);

    let err = pipeline.run_full().await.unwrap_err();
    assert!(err.to_string().contains("price_usd"));
    Ok(())
}

#[tokio::test]
async fn full_run_cleans_and_loads_valid_batch() -> Result<()> {
    let stores = temp_stores().await?;
    stores.raw.upsert_vehicle(&valid_bmw()).await?;
    stores.raw.upsert_vehicle(&out_of_range_record()).await?;

    let clean = CleanStore::new(&stores.clean_url).await?;
    let pipeline = EtlPipeline::new(stores.raw, clean, REFERENCE_YEAR);
    let stats = pipeline.run_full().await?;
    assert_eq!(stats.total_records, 2);

    let clean = CleanStore::new(&stores.clean_url).await?;
    let records = clean.fetch_all().await?;
    assert_eq!(records.len(), 2);

    let bmw = records
        .iter()
        .find(|r| r.vehicle_id.as_deref() == Some("100"))
        .unwrap();
    assert_eq!(bmw.brand.as_deref(), Some("BMW"));
    assert!(bmw.is_luxury);
    assert_eq!(bmw.vehicle_age, Some(5));
    assert_eq!(bmw.exchange_rate, Some(500.0));
    assert!(!bmw.price_flag);
    assert_eq!(bmw.fuel_type.as_deref(), Some("Gasoline"));

    let toyota = records
        .iter()
        .find(|r| r.vehicle_id.as_deref() == Some("200"))
        .unwrap();
    assert_eq!(toyota.year, None);
    assert_eq!(toyota.mileage, None);
    assert!(!toyota.is_luxury);

    // Post-clean validation no longer sees any range findings for the
    // fields the cleaner nulled; the nulls themselves surface as
    // null-count warnings instead.
    let report = validator::validate(&records);
    assert!(report.passed);
    assert!(!report.warnings.iter().any(|w| w.contains("outside valid range")));
    assert!(
        report
            .warnings
            .contains(&"year has 1 null values".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn duplicate_vehicle_ids_load_with_last_write_winning() -> Result<()> {
    let stores = temp_stores().await?;

    // A re-listed vehicle: two distinct URLs carrying the same
    // marketplace id. The validator reports this as a warning, so the
    // run must still complete.
    let first = Vehicle {
        url: "https://crautos.com/autosusados/cardetail.cfm?c=555".to_string(),
        vehicle_id: Some("555".to_string()),
        ..valid_bmw()
    };
    let relisted = Vehicle {
        url: "https://crautos.com/autosusados/cardetail.cfm?c=555&relist=1".to_string(),
        vehicle_id: Some("555".to_string()),
        price_usd: Some(28_000),
        ..valid_bmw()
    };
    stores.raw.upsert_vehicle(&first).await?;
    stores.raw.upsert_vehicle(&relisted).await?;

    let report = validator::validate(&stores.raw.fetch_all().await?);
    assert!(report.passed);
    assert!(
        report
            .warnings
            .contains(&"found 1 duplicate vehicle IDs".to_string())
    );

    let clean = CleanStore::new(&stores.clean_url).await?;
    let pipeline = EtlPipeline::new(stores.raw, clean, REFERENCE_YEAR);
    let stats = pipeline.run_full().await?;
    assert_eq!(stats.total_records, 1);

    let clean = CleanStore::new(&stores.clean_url).await?;
    let records = clean.fetch_all().await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].vehicle_id.as_deref(), Some("555"));
    assert_eq!(records[0].url, relisted.url);
    assert_eq!(records[0].price_usd, Some(28_000));
    Ok(())
}

#[tokio::test]
async fn incremental_run_appends_recent_records() -> Result<()> {
    let stores = temp_stores().await?;
    stores.raw.upsert_vehicle(&valid_bmw()).await?;

    let clean = CleanStore::new(&stores.clean_url).await?;
    let pipeline = EtlPipeline::new(stores.raw, clean, REFERENCE_YEAR);

    let stats = pipeline.run_full().await?;
    assert_eq!(stats.total_records, 1);

    // The same record falls inside the lookback window, so an incremental
    // run picks it up again and updates the existing clean row in place.
    let appended = pipeline.run_incremental(24).await?;
    assert_eq!(appended, 1);

    let clean = CleanStore::new(&stores.clean_url).await?;
    assert_eq!(clean.fetch_all().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn upsert_replaces_rescraped_url_and_logs_outcomes() -> Result<()> {
    let stores = temp_stores().await?;

    let mut vehicle = valid_bmw();
    stores.raw.upsert_vehicle(&vehicle).await?;
    vehicle.price_usd = Some(28_000);
    stores.raw.upsert_vehicle(&vehicle).await?;

    assert_eq!(stores.raw.count().await?, 1);
    let records = stores.raw.fetch_all().await?;
    assert_eq!(records[0].price_usd, Some(28_000));

    stores
        .raw
        .log_outcome(&vehicle.url, FetchOutcome::Success, None)
        .await?;
    stores
        .raw
        .log_outcome(&vehicle.url, FetchOutcome::Error, Some("timeout"))
        .await?;

    let recent = stores.raw.fetch_recent(1).await?;
    assert_eq!(recent.len(), 1);
    let path = stores.raw.save_json_record("crautos", &vehicle)?;
    assert!(path.exists());
    Ok(())
}

#[tokio::test]
async fn rescrape_window_lookup_matches_stored_fetches() -> Result<()> {
    let stores = temp_stores().await?;
    let vehicle = valid_bmw();
    stores.raw.upsert_vehicle(&vehicle).await?;

    assert!(stores.raw.fetched_since(&vehicle.url, 24).await?);
    assert!(
        !stores
            .raw
            .fetched_since("https://crautos.com/autosusados/cardetail.cfm?c=999", 24)
            .await?
    );
    // A zero-hour window never matches, so skipping stays disabled.
    assert!(!stores.raw.fetched_since(&vehicle.url, 0).await?);
    Ok(())
}

#[tokio::test]
async fn quality_stats_track_missing_fields_and_flags() -> Result<()> {
    let stores = temp_stores().await?;
    stores.raw.upsert_vehicle(&valid_bmw()).await?;

    let mut flagged = valid_bmw();
    flagged.url = "https://crautos.com/autosusados/cardetail.cfm?c=101".to_string();
    flagged.vehicle_id = Some("101".to_string());
    flagged.price_usd = Some(5_000); // implied rate 3000, flagged
    flagged.engine_cc = None;
    stores.raw.upsert_vehicle(&flagged).await?;

    let clean = CleanStore::new(&stores.clean_url).await?;
    let pipeline = EtlPipeline::new(stores.raw, clean, REFERENCE_YEAR);
    let stats = pipeline.run_full().await?;

    assert_eq!(stats.total_records, 2);
    assert_eq!(stats.price_issues, 1);
    let engine_missing = stats
        .missing_percentages
        .iter()
        .find(|(field, _)| field == "engine_cc")
        .map(|(_, pct)| *pct)
        .unwrap();
    assert!((engine_missing - 50.0).abs() < 1e-9);
    assert_eq!(stats.brand_distribution[0].brand, "BMW");
    Ok(())
}

#[tokio::test]
async fn clean_store_filtered_reads() -> Result<()> {
    let stores = temp_stores().await?;
    stores.raw.upsert_vehicle(&valid_bmw()).await?;
    stores.raw.upsert_vehicle(&out_of_range_record()).await?;

    let clean = CleanStore::new(&stores.clean_url).await?;
    let pipeline = EtlPipeline::new(stores.raw, clean, REFERENCE_YEAR);
    pipeline.run_full().await?;

    let clean = CleanStore::new(&stores.clean_url).await?;
    let luxury = clean.fetch_filtered(None, true).await?;
    assert_eq!(luxury.len(), 1);
    assert_eq!(luxury[0].brand.as_deref(), Some("BMW"));

    let toyotas = clean.fetch_filtered(Some("Toyota"), false).await?;
    assert_eq!(toyotas.len(), 1);
    Ok(())
}
