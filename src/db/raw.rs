//! Raw store: as-scraped listing records plus an append-only fetch log,
//! backed by a single sqlite file. One JSON interchange file is written
//! per persisted record so a crash mid-run loses at most the in-flight
//! vehicle.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase};
use tracing::info;

use crate::models::{FetchOutcome, Vehicle};

pub struct RawStore {
    pool: SqlitePool,
    json_dir: PathBuf,
}

impl RawStore {
    pub async fn new(database_url: &str, json_dir: &Path) -> Result<Self> {
        if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
            info!("Creating raw store at {database_url}");
            Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePool::connect(database_url).await?;
        fs::create_dir_all(json_dir)?;

        let store = Self {
            pool,
            json_dir: json_dir.to_path_buf(),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS vehicles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                vehicle_id TEXT,
                brand TEXT,
                model TEXT,
                year INTEGER,
                price_colones INTEGER,
                price_usd INTEGER,
                mileage INTEGER,
                fuel_type TEXT,
                transmission TEXT,
                engine_cc INTEGER,
                doors INTEGER,
                style TEXT,
                color_exterior TEXT,
                color_interior TEXT,
                location TEXT,
                province TEXT,
                seller_phone TEXT,
                seller_whatsapp TEXT,
                description TEXT,
                features TEXT,
                images TEXT,
                scraped_at DATETIME NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_raw_vehicle_id ON vehicles(vehicle_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_raw_scraped_at ON vehicles(scraped_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS scrape_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT,
                scraped_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or, on a re-scrape of the same URL, replace the record.
    pub async fn upsert_vehicle(&self, vehicle: &Vehicle) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO vehicles (
                url, vehicle_id, brand, model, year, price_colones, price_usd,
                mileage, fuel_type, transmission, engine_cc, doors, style,
                color_exterior, color_interior, location, province,
                seller_phone, seller_whatsapp, description, features, images,
                scraped_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                vehicle_id = excluded.vehicle_id,
                brand = excluded.brand,
                model = excluded.model,
                year = excluded.year,
                price_colones = excluded.price_colones,
                price_usd = excluded.price_usd,
                mileage = excluded.mileage,
                fuel_type = excluded.fuel_type,
                transmission = excluded.transmission,
                engine_cc = excluded.engine_cc,
                doors = excluded.doors,
                style = excluded.style,
                color_exterior = excluded.color_exterior,
                color_interior = excluded.color_interior,
                location = excluded.location,
                province = excluded.province,
                seller_phone = excluded.seller_phone,
                seller_whatsapp = excluded.seller_whatsapp,
                description = excluded.description,
                features = excluded.features,
                images = excluded.images,
                scraped_at = excluded.scraped_at,
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(&vehicle.url)
        .bind(&vehicle.vehicle_id)
        .bind(&vehicle.brand)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(vehicle.price_colones)
        .bind(vehicle.price_usd)
        .bind(vehicle.mileage)
        .bind(&vehicle.fuel_type)
        .bind(&vehicle.transmission)
        .bind(vehicle.engine_cc)
        .bind(vehicle.doors)
        .bind(&vehicle.style)
        .bind(&vehicle.color_exterior)
        .bind(&vehicle.color_interior)
        .bind(&vehicle.location)
        .bind(&vehicle.province)
        .bind(&vehicle.seller_phone)
        .bind(&vehicle.seller_whatsapp)
        .bind(&vehicle.description)
        .bind(vehicle.features.join(","))
        .bind(vehicle.images.join(","))
        .bind(vehicle.scraped_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Write the self-describing interchange file for one record.
    pub fn save_json_record(&self, prefix: &str, vehicle: &Vehicle) -> Result<PathBuf> {
        let stamp = vehicle.scraped_at.format("%Y%m%d_%H%M%S");
        let id = vehicle.vehicle_id.as_deref().unwrap_or("unknown");
        let path = self.json_dir.join(format!("{prefix}_{id}_{stamp}.json"));
        fs::write(&path, serde_json::to_string_pretty(vehicle)?)?;
        Ok(path)
    }

    /// Append a per-URL fetch outcome to the operation log.
    pub async fn log_outcome(
        &self,
        url: &str,
        outcome: FetchOutcome,
        message: Option<&str>,
    ) -> Result<()> {
        sqlx::query("INSERT INTO scrape_log (url, status, error_message) VALUES (?, ?, ?)")
            .bind(url)
            .bind(outcome.as_str())
            .bind(message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn fetch_all(&self) -> Result<Vec<Vehicle>> {
        let rows = sqlx::query("SELECT * FROM vehicles ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(vehicle_from_row).collect())
    }

    /// Records scraped within the trailing time window.
    pub async fn fetch_recent(&self, hours: i64) -> Result<Vec<Vehicle>> {
        let cutoff: DateTime<Utc> = Utc::now() - Duration::hours(hours);
        let rows = sqlx::query("SELECT * FROM vehicles WHERE scraped_at >= ? ORDER BY id")
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(vehicle_from_row).collect())
    }

    /// Whether a URL was already fetched within the trailing window.
    pub async fn fetched_since(&self, url: &str, hours: i64) -> Result<bool> {
        let cutoff: DateTime<Utc> = Utc::now() - Duration::hours(hours);
        let row = sqlx::query(
            "SELECT 1 AS one FROM vehicles WHERE url = ? AND scraped_at >= ? LIMIT 1",
        )
        .bind(url)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM vehicles")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

fn vehicle_from_row(row: &SqliteRow) -> Vehicle {
    Vehicle {
        url: row.get("url"),
        vehicle_id: row.get("vehicle_id"),
        brand: row.get("brand"),
        model: row.get("model"),
        year: row.get("year"),
        price_colones: row.get("price_colones"),
        price_usd: row.get("price_usd"),
        mileage: row.get("mileage"),
        fuel_type: row.get("fuel_type"),
        transmission: row.get("transmission"),
        engine_cc: row.get("engine_cc"),
        doors: row.get("doors"),
        style: row.get("style"),
        color_exterior: row.get("color_exterior"),
        color_interior: row.get("color_interior"),
        location: row.get("location"),
        province: row.get("province"),
        seller_phone: row.get("seller_phone"),
        seller_whatsapp: row.get("seller_whatsapp"),
        description: row.get("description"),
        features: split_list(row.get("features")),
        images: split_list(row.get("images")),
        scraped_at: row.get("scraped_at"),
    }
}

fn split_list(joined: Option<String>) -> Vec<String> {
    joined
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
