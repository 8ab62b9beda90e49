//! Market analysis over the clean store: aggregate summary, baseline
//! price-regression models, and the recommendations JSON artifact the
//! dashboards consume.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{LinearRegression, LinearRegressionParameters};
use smartcore::linear::ridge_regression::{RidgeRegression, RidgeRegressionParameters};
use tracing::info;

use crate::models::{
    BrandCount, CleanVehicle, MarketSummary, ModelChoice, Recommendations,
};

/// Feature columns fed to the baseline models, in matrix order.
pub const FEATURE_NAMES: [&str; 3] = ["vehicle_age", "engine_cc", "is_luxury"];

/// Minimum usable rows before model evaluation is attempted.
const MIN_MODEL_ROWS: usize = 10;

/// Baseline regression interface: one variant per stock algorithm.
pub trait PriceModel {
    fn name(&self) -> &'static str;
    fn fit(&mut self, x: &DenseMatrix<f64>, y: &[f64]) -> Result<()>;
    fn predict(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>>;
}

#[derive(Default)]
pub struct LinearPriceModel {
    inner: Option<LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>>,
}

impl PriceModel for LinearPriceModel {
    fn name(&self) -> &'static str {
        "linear_regression"
    }

    fn fit(&mut self, x: &DenseMatrix<f64>, y: &[f64]) -> Result<()> {
        self.inner = Some(LinearRegression::fit(
            x,
            &y.to_vec(),
            LinearRegressionParameters::default(),
        )?);
        Ok(())
    }

    fn predict(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>> {
        let model = self
            .inner
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("model not fitted"))?;
        Ok(model.predict(x)?)
    }
}

#[derive(Default)]
pub struct RidgePriceModel {
    inner: Option<RidgeRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>>,
}

impl PriceModel for RidgePriceModel {
    fn name(&self) -> &'static str {
        "ridge_regression"
    }

    fn fit(&mut self, x: &DenseMatrix<f64>, y: &[f64]) -> Result<()> {
        self.inner = Some(RidgeRegression::fit(
            x,
            &y.to_vec(),
            RidgeRegressionParameters::default(),
        )?);
        Ok(())
    }

    fn predict(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>> {
        let model = self
            .inner
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("model not fitted"))?;
        Ok(model.predict(x)?)
    }
}

/// Rows with a USD price and all model features present, as
/// (feature rows, prices).
pub fn prepare_features(records: &[CleanVehicle]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rows = Vec::new();
    let mut prices = Vec::new();

    for record in records {
        if let (Some(price), Some(age), Some(cc)) =
            (record.price_usd, record.vehicle_age, record.engine_cc)
        {
            rows.push(vec![
                f64::from(age),
                f64::from(cc),
                f64::from(u8::from(record.is_luxury)),
            ]);
            prices.push(price as f64);
        }
    }

    (rows, prices)
}

/// Fit the baseline models on an 80/20 ordered split, score them on the
/// holdout, and rank features by absolute correlation with price.
pub fn evaluate_models(records: &[CleanVehicle]) -> Result<Option<(ModelChoice, Vec<String>)>> {
    let (rows, prices) = prepare_features(records);
    if rows.len() < MIN_MODEL_ROWS {
        info!(
            "Only {} usable rows, skipping model evaluation",
            rows.len()
        );
        return Ok(None);
    }

    let split = rows.len() * 4 / 5;
    let x_train = DenseMatrix::from_2d_vec(&rows[..split].to_vec());
    let x_test = DenseMatrix::from_2d_vec(&rows[split..].to_vec());
    let y_train = &prices[..split];
    let y_test = &prices[split..];

    let mut scored: Vec<(String, f64, f64)> = Vec::new();
    let mut linear = LinearPriceModel::default();
    let mut ridge = RidgePriceModel::default();
    for model in [&mut linear as &mut dyn PriceModel, &mut ridge] {
        model.fit(&x_train, y_train)?;
        let predicted = model.predict(&x_test)?;
        let r2 = r2_score(y_test, &predicted);
        let mae = mean_absolute_error(y_test, &predicted);
        info!("{}: r2 {r2:.4}, mae {mae:.0}", model.name());
        scored.push((model.name().to_string(), r2, mae));
    }

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    let choice = ModelChoice {
        primary: scored[0].0.clone(),
        r2: scored[0].1,
        mae: scored[0].2,
        alternative: scored[1].0.clone(),
    };

    Ok(Some((choice, rank_features(&rows, &prices))))
}

/// Fit on everything and predict one vehicle's USD price.
pub fn predict_price(
    records: &[CleanVehicle],
    vehicle_age: i32,
    engine_cc: i32,
    is_luxury: bool,
) -> Result<f64> {
    let (rows, prices) = prepare_features(records);
    if rows.len() < MIN_MODEL_ROWS {
        anyhow::bail!("not enough clean data to fit a price model");
    }

    let x = DenseMatrix::from_2d_vec(&rows);
    let mut model = LinearPriceModel::default();
    model.fit(&x, &prices)?;

    let query = DenseMatrix::from_2d_vec(&vec![vec![
        f64::from(vehicle_age),
        f64::from(engine_cc),
        f64::from(u8::from(is_luxury)),
    ]]);
    let predicted = model.predict(&query)?;
    predicted
        .first()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("empty prediction"))
}

/// Aggregate market view of the clean store.
pub fn market_summary(records: &[CleanVehicle]) -> Option<MarketSummary> {
    let prices: Vec<i64> = records.iter().filter_map(|r| r.price_usd).collect();
    if records.is_empty() || prices.is_empty() {
        return None;
    }

    let mut brand_counts: Vec<BrandCount> = Vec::new();
    for record in records {
        let Some(brand) = record.brand.as_deref() else {
            continue;
        };
        match brand_counts.iter_mut().find(|b| b.brand == brand) {
            Some(entry) => entry.count += 1,
            None => brand_counts.push(BrandCount {
                brand: brand.to_string(),
                count: 1,
            }),
        }
    }
    brand_counts.sort_by(|a, b| b.count.cmp(&a.count));

    let total = records.len();
    let luxury = records.iter().filter(|r| r.is_luxury).count();
    let automatic = records
        .iter()
        .filter(|r| {
            r.transmission
                .as_deref()
                .is_some_and(|t| t.starts_with("Autom"))
        })
        .count();

    let ages: Vec<f64> = records
        .iter()
        .filter_map(|r| r.vehicle_age.map(f64::from))
        .collect();

    let luxury_median = median(
        records
            .iter()
            .filter(|r| r.is_luxury)
            .filter_map(|r| r.price_usd.map(|p| p as f64))
            .collect(),
    );
    let regular_median = median(
        records
            .iter()
            .filter(|r| !r.is_luxury)
            .filter_map(|r| r.price_usd.map(|p| p as f64))
            .collect(),
    );
    let luxury_premium_pct = match (luxury_median, regular_median) {
        (Some(l), Some(r)) if r > 0.0 => Some((l / r - 1.0) * 100.0),
        _ => None,
    };

    let leader = brand_counts.first();
    Some(MarketSummary {
        total_vehicles: total,
        avg_price_usd: prices.iter().sum::<i64>() as f64 / prices.len() as f64,
        min_price_usd: prices.iter().copied().min().unwrap_or(0),
        max_price_usd: prices.iter().copied().max().unwrap_or(0),
        market_leader: leader.map(|b| b.brand.clone()),
        market_share_pct: leader.map_or(0.0, |b| b.count as f64 * 100.0 / total as f64),
        luxury_pct: luxury as f64 * 100.0 / total as f64,
        automatic_pct: automatic as f64 * 100.0 / total as f64,
        median_age: median(ages),
        luxury_premium_pct,
        top_brands: brand_counts.into_iter().take(5).collect(),
    })
}

/// Write the recommendations side artifact for dashboard consumption.
pub fn write_recommendations(
    reports_dir: &Path,
    recommendations: &Recommendations,
) -> Result<PathBuf> {
    fs::create_dir_all(reports_dir)?;
    let path = reports_dir.join("recommendations.json");
    fs::write(&path, serde_json::to_string_pretty(recommendations)?)?;
    info!("Wrote recommendations to {}", path.display());
    Ok(path)
}

/// Feature names sorted by absolute Pearson correlation with price.
fn rank_features(rows: &[Vec<f64>], prices: &[f64]) -> Vec<String> {
    let mut ranked: Vec<(String, f64)> = FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let column: Vec<f64> = rows.iter().map(|r| r[i]).collect();
            ((*name).to_string(), pearson(&column, prices).abs())
        })
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.into_iter().map(|(name, _)| name).collect()
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|y| (y - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(y, p)| (y - p).powi(2))
        .sum();
    1.0 - ss_res / ss_tot
}

fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(y, p)| (y - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn clean(brand: &str, price: i64, age: i32, cc: i32, luxury: bool) -> CleanVehicle {
        CleanVehicle {
            url: format!("https://crautos.com/autosusados/cardetail.cfm?c={price}"),
            vehicle_id: Some(price.to_string()),
            brand: Some(brand.to_string()),
            price_usd: Some(price),
            price_colones: Some(price * 500),
            vehicle_age: Some(age),
            engine_cc: Some(cc),
            is_luxury: luxury,
            scraped_at: Utc::now(),
            processed_at: Utc::now(),
            ..CleanVehicle::default()
        }
    }

    #[test]
    fn market_summary_basics() {
        let records = vec![
            clean("Toyota", 10_000, 5, 1600, false),
            clean("Toyota", 12_000, 3, 1800, false),
            clean("BMW", 30_000, 2, 3000, true),
        ];
        let summary = market_summary(&records).unwrap();
        assert_eq!(summary.total_vehicles, 3);
        assert_eq!(summary.market_leader.as_deref(), Some("Toyota"));
        assert_eq!(summary.min_price_usd, 10_000);
        assert_eq!(summary.max_price_usd, 30_000);
        assert!((summary.luxury_pct - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.median_age, Some(3.0));
    }

    #[test]
    fn market_summary_empty_is_none() {
        assert!(market_summary(&[]).is_none());
    }

    #[test]
    fn prepare_features_skips_incomplete_rows() {
        let mut incomplete = clean("Toyota", 10_000, 5, 1600, false);
        incomplete.engine_cc = None;
        let records = vec![clean("Toyota", 12_000, 3, 1800, false), incomplete];
        let (rows, prices) = prepare_features(&records);
        assert_eq!(rows.len(), 1);
        assert_eq!(prices, vec![12_000.0]);
    }

    #[test]
    fn model_fits_and_predicts_on_synthetic_data() {
        // price = 30000 - 2000 * age, exactly linear
        let records: Vec<CleanVehicle> = (0..12)
            .map(|age| clean("Toyota", 30_000 - 2_000 * i64::from(age), age, 1800, false))
            .collect();

        let (choice, features) = evaluate_models(&records).unwrap().unwrap();
        assert!(choice.r2 > 0.9);
        assert_eq!(features[0], "vehicle_age");

        let predicted = predict_price(&records, 5, 1800, false).unwrap();
        assert!((predicted - 20_000.0).abs() < 500.0);
    }
}
