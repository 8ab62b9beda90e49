//! Clean store: post-cleaning, feature-augmented listings with a fixed
//! schema and the lookup indexes the dashboards read through. Full ETL
//! runs rebuild the table from scratch; incremental runs append.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase};
use tracing::info;

use crate::models::{BrandCount, CleanVehicle, LoadMode, QualityStats};

/// Fields tracked in the missing-data portion of the quality report.
const MISSING_TRACKED: [&str; 5] = ["model", "year", "mileage", "fuel_type", "engine_cc"];

pub struct CleanStore {
    pool: SqlitePool,
}

impl CleanStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
            info!("Creating clean store at {database_url}");
            Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Load a cleaned batch. `Replace` drops and recreates the table first;
    /// `Append` only makes sure the schema exists.
    pub async fn load(&self, records: &[CleanVehicle], mode: LoadMode) -> Result<usize> {
        match mode {
            LoadMode::Replace => self.rebuild_schema().await?,
            LoadMode::Append => self.ensure_schema().await?,
        }

        for record in records {
            self.insert(record).await?;
        }

        info!("Loaded {} records into clean store ({mode:?})", records.len());
        Ok(records.len())
    }

    async fn rebuild_schema(&self) -> Result<()> {
        sqlx::query("DROP TABLE IF EXISTS vehicles_clean")
            .execute(&self.pool)
            .await?;
        self.ensure_schema().await
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS vehicles_clean (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                vehicle_id TEXT UNIQUE,
                brand TEXT,
                model TEXT,
                year INTEGER,
                price_colones INTEGER,
                price_usd INTEGER,
                mileage INTEGER,
                fuel_type TEXT,
                transmission TEXT,
                engine_cc INTEGER,
                color_exterior TEXT,
                color_interior TEXT,
                seller_phone TEXT,
                seller_whatsapp TEXT,
                description TEXT,
                images TEXT,
                exchange_rate REAL,
                price_flag BOOLEAN NOT NULL DEFAULT 0,
                vehicle_age INTEGER,
                price_per_year REAL,
                is_luxury BOOLEAN NOT NULL DEFAULT 0,
                scraped_at DATETIME NOT NULL,
                processed_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        for ddl in [
            "CREATE INDEX IF NOT EXISTS idx_clean_brand ON vehicles_clean(brand)",
            "CREATE INDEX IF NOT EXISTS idx_clean_year ON vehicles_clean(year)",
            "CREATE INDEX IF NOT EXISTS idx_clean_price_usd ON vehicles_clean(price_usd)",
            "CREATE INDEX IF NOT EXISTS idx_clean_fuel_type ON vehicles_clean(fuel_type)",
            "CREATE INDEX IF NOT EXISTS idx_clean_is_luxury ON vehicles_clean(is_luxury)",
            "CREATE INDEX IF NOT EXISTS idx_clean_scraped_at ON vehicles_clean(scraped_at)",
        ] {
            sqlx::query(ddl).execute(&self.pool).await?;
        }

        Ok(())
    }

    // Upsert on url so incremental appends of a rescraped listing update
    // the existing row instead of tripping the unique constraint. A
    // re-listed vehicle can also reappear under a new URL with the same
    // marketplace id; the newest row wins the unique id slot.
    async fn insert(&self, record: &CleanVehicle) -> Result<()> {
        if let Some(id) = &record.vehicle_id {
            sqlx::query("DELETE FROM vehicles_clean WHERE vehicle_id = ? AND url <> ?")
                .bind(id)
                .bind(&record.url)
                .execute(&self.pool)
                .await?;
        }

        sqlx::query(
            r"
            INSERT INTO vehicles_clean (
                url, vehicle_id, brand, model, year, price_colones, price_usd,
                mileage, fuel_type, transmission, engine_cc,
                color_exterior, color_interior, seller_phone, seller_whatsapp,
                description, images, exchange_rate, price_flag, vehicle_age,
                price_per_year, is_luxury, scraped_at, processed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
                color_exterior = excluded.color_exterior,
                color_interior = excluded.color_interior,
                seller_phone = excluded.seller_phone,
                seller_whatsapp = excluded.seller_whatsapp,
                description = excluded.description,
                images = excluded.images,
                exchange_rate = excluded.exchange_rate,
                price_flag = excluded.price_flag,
                vehicle_age = excluded.vehicle_age,
                price_per_year = excluded.price_per_year,
                is_luxury = excluded.is_luxury,
                scraped_at = excluded.scraped_at,
                processed_at = excluded.processed_at
            ",
        )
        .bind(&record.url)
        .bind(&record.vehicle_id)
        .bind(&record.brand)
        .bind(&record.model)
        .bind(record.year)
        .bind(record.price_colones)
        .bind(record.price_usd)
        .bind(record.mileage)
        .bind(&record.fuel_type)
        .bind(&record.transmission)
        .bind(record.engine_cc)
        .bind(&record.color_exterior)
        .bind(&record.color_interior)
        .bind(&record.seller_phone)
        .bind(&record.seller_whatsapp)
        .bind(&record.description)
        .bind(record.images.join(","))
        .bind(record.exchange_rate)
        .bind(record.price_flag)
        .bind(record.vehicle_age)
        .bind(record.price_per_year)
        .bind(record.is_luxury)
        .bind(record.scraped_at)
        .bind(record.processed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Read interface for dashboards and model code: the full listing set.
    pub async fn fetch_all(&self) -> Result<Vec<CleanVehicle>> {
        let rows = sqlx::query("SELECT * FROM vehicles_clean ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(clean_from_row).collect())
    }

    /// Filtered subset by brand and/or luxury flag.
    pub async fn fetch_filtered(
        &self,
        brand: Option<&str>,
        luxury_only: bool,
    ) -> Result<Vec<CleanVehicle>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM vehicles_clean
            WHERE (? IS NULL OR brand = ?)
              AND (? = 0 OR is_luxury = 1)
            ORDER BY id
            ",
        )
        .bind(brand)
        .bind(brand)
        .bind(luxury_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(clean_from_row).collect())
    }

    /// Summary used for post-load logging and reporting.
    pub async fn quality_stats(&self) -> Result<QualityStats> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS n FROM vehicles_clean")
            .fetch_one(&self.pool)
            .await?
            .get("n");

        let price_issues: i64 =
            sqlx::query("SELECT COUNT(*) AS n FROM vehicles_clean WHERE price_flag = 1")
                .fetch_one(&self.pool)
                .await?
                .get("n");

        let mut missing_percentages = Vec::new();
        if total > 0 {
            for field in MISSING_TRACKED {
                let query = format!(
                    "SELECT SUM(CASE WHEN {field} IS NULL THEN 1 ELSE 0 END) * 100.0 / COUNT(*) \
                     AS pct FROM vehicles_clean"
                );
                let pct: f64 = sqlx::query(&query).fetch_one(&self.pool).await?.get("pct");
                missing_percentages.push((field.to_string(), pct));
            }
        }

        let brand_rows = sqlx::query(
            r"
            SELECT brand, COUNT(*) AS n FROM vehicles_clean
            WHERE brand IS NOT NULL
            GROUP BY brand ORDER BY n DESC LIMIT 10
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let brand_distribution = brand_rows
            .iter()
            .map(|row| BrandCount {
                brand: row.get("brand"),
                count: row.get("n"),
            })
            .collect();

        Ok(QualityStats {
            total_records: total,
            price_issues,
            missing_percentages,
            brand_distribution,
        })
    }
}

fn clean_from_row(row: &SqliteRow) -> CleanVehicle {
    CleanVehicle {
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
        color_exterior: row.get("color_exterior"),
        color_interior: row.get("color_interior"),
        seller_phone: row.get("seller_phone"),
        seller_whatsapp: row.get("seller_whatsapp"),
        description: row.get("description"),
        images: row
            .get::<Option<String>, _>("images")
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        exchange_rate: row.get("exchange_rate"),
        price_flag: row.get("price_flag"),
        vehicle_age: row.get("vehicle_age"),
        price_per_year: row.get("price_per_year"),
        is_luxury: row.get("is_luxury"),
        scraped_at: row.get("scraped_at"),
        processed_at: row.get("processed_at"),
    }
}
