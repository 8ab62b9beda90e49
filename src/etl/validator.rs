//! Rule-driven consistency checks over listing batches.
//!
//! The validator never mutates its input and never fails on data-quality
//! findings. Only a record missing a required field marks the report as
//! failed, which the pipeline treats as fatal.

use crate::models::{CleanVehicle, ValidationReport, Vehicle};

/// Field accessors shared by raw and clean records so one rule engine
/// serves both validation passes.
pub trait ListingFields {
    fn url(&self) -> &str;
    fn vehicle_id(&self) -> Option<&str>;
    fn brand(&self) -> Option<&str>;
    fn year(&self) -> Option<i32>;
    fn price_usd(&self) -> Option<i64>;
    fn price_colones(&self) -> Option<i64>;
    fn mileage(&self) -> Option<i64>;
    fn engine_cc(&self) -> Option<i32>;
    fn exchange_rate(&self) -> Option<f64>;
}

impl ListingFields for Vehicle {
    fn url(&self) -> &str {
        &self.url
    }
    fn vehicle_id(&self) -> Option<&str> {
        self.vehicle_id.as_deref()
    }
    fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }
    fn year(&self) -> Option<i32> {
        self.year
    }
    fn price_usd(&self) -> Option<i64> {
        self.price_usd
    }
    fn price_colones(&self) -> Option<i64> {
        self.price_colones
    }
    fn mileage(&self) -> Option<i64> {
        self.mileage
    }
    fn engine_cc(&self) -> Option<i32> {
        self.engine_cc
    }
    fn exchange_rate(&self) -> Option<f64> {
        None
    }
}

impl ListingFields for CleanVehicle {
    fn url(&self) -> &str {
        &self.url
    }
    fn vehicle_id(&self) -> Option<&str> {
        self.vehicle_id.as_deref()
    }
    fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }
    fn year(&self) -> Option<i32> {
        self.year
    }
    fn price_usd(&self) -> Option<i64> {
        self.price_usd
    }
    fn price_colones(&self) -> Option<i64> {
        self.price_colones
    }
    fn mileage(&self) -> Option<i64> {
        self.mileage
    }
    fn engine_cc(&self) -> Option<i32> {
        self.engine_cc
    }
    fn exchange_rate(&self) -> Option<f64> {
        self.exchange_rate
    }
}

/// Non-required fields whose null counts are reported as warnings.
const NULL_TRACKED: [&str; 3] = ["year", "mileage", "engine_cc"];

/// Numeric range rules: (field, min, max), nulls skipped.
const RANGE_RULES: [(&str, f64, f64); 6] = [
    ("year", 1950.0, 2026.0),
    ("price_usd", 1000.0, 500_000.0),
    ("price_colones", 500_000.0, 250_000_000.0),
    ("mileage", 0.0, 500_000.0),
    ("engine_cc", 500.0, 6000.0),
    ("exchange_rate", 400.0, 600.0),
];

pub fn validate<T: ListingFields>(records: &[T]) -> ValidationReport {
    let mut report = ValidationReport {
        total_records: records.len(),
        ..ValidationReport::default()
    };

    check_required_fields(records, &mut report);
    check_null_rates(records, &mut report);
    check_numeric_ranges(records, &mut report);
    check_duplicate_ids(records, &mut report);
    check_price_consistency(records, &mut report);

    report.passed = report.errors.is_empty();
    report
}

/// A record missing a required field is the typed analogue of a missing
/// column: the pipeline cannot proceed on it.
fn check_required_fields<T: ListingFields>(records: &[T], report: &mut ValidationReport) {
    let checks: [(&str, fn(&T) -> bool); 4] = [
        ("vehicle_id", |r| r.vehicle_id().is_none()),
        ("brand", |r| r.brand().is_none()),
        ("price_usd", |r| r.price_usd().is_none()),
        ("price_colones", |r| r.price_colones().is_none()),
    ];

    for (field, is_missing) in checks {
        let missing = records.iter().filter(|r| is_missing(r)).count();
        if missing > 0 {
            report
                .errors
                .push(format!("missing required field: {field} ({missing} records)"));
        }
    }
}

/// Null counts in non-required fields are data-quality findings, not
/// failures.
fn check_null_rates<T: ListingFields>(records: &[T], report: &mut ValidationReport) {
    for field in NULL_TRACKED {
        let nulls = records
            .iter()
            .filter(|r| numeric_field(*r, field).is_none())
            .count();
        if nulls > 0 {
            report
                .warnings
                .push(format!("{field} has {nulls} null values"));
        }
    }
}

fn check_numeric_ranges<T: ListingFields>(records: &[T], report: &mut ValidationReport) {
    for (field, min, max) in RANGE_RULES {
        let out_of_range = records
            .iter()
            .filter_map(|r| numeric_field(r, field))
            .filter(|v| *v < min || *v > max)
            .count();
        if out_of_range > 0 {
            report
                .warnings
                .push(format!("{field} has {out_of_range} values outside valid range"));
        }
    }
}

fn numeric_field<T: ListingFields>(record: &T, field: &str) -> Option<f64> {
    match field {
        "year" => record.year().map(f64::from),
        "price_usd" => record.price_usd().map(|v| v as f64),
        "price_colones" => record.price_colones().map(|v| v as f64),
        "mileage" => record.mileage().map(|v| v as f64),
        "engine_cc" => record.engine_cc().map(f64::from),
        "exchange_rate" => record.exchange_rate(),
        _ => None,
    }
}

fn check_duplicate_ids<T: ListingFields>(records: &[T], report: &mut ValidationReport) {
    let mut seen = std::collections::HashSet::new();
    let mut duplicates = 0;
    for id in records.iter().filter_map(ListingFields::vehicle_id) {
        if !seen.insert(id) {
            duplicates += 1;
        }
    }
    if duplicates > 0 {
        report
            .warnings
            .push(format!("found {duplicates} duplicate vehicle IDs"));
    }
}

/// Cross-field check: for rows with both prices positive, an implied
/// exchange rate outside [400, 600] marks the pair as inconsistent.
fn check_price_consistency<T: ListingFields>(records: &[T], report: &mut ValidationReport) {
    let inconsistent = records
        .iter()
        .filter_map(|r| match (r.price_colones(), r.price_usd()) {
            (Some(c), Some(u)) if c > 0 && u > 0 => Some(c as f64 / u as f64),
            _ => None,
        })
        .filter(|rate| *rate < 400.0 || *rate > 600.0)
        .count();
    if inconsistent > 0 {
        report.warnings.push(format!(
            "{inconsistent} records have inconsistent USD/Colones prices"
        ));
    }
}
