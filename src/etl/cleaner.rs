//! Column-by-column repair and standardization of raw listing batches.
//!
//! Every step is deterministic and skips fields the scraper never found.
//! Running the cleaner over already-clean values changes nothing.

use chrono::Utc;

use crate::models::{CleanVehicle, Vehicle};

/// Common misspellings/abbreviations mapped to canonical brand names.
const BRAND_ALIASES: [(&str, &str); 5] = [
    ("bmw", "BMW"),
    ("mercedes", "Mercedes-Benz"),
    ("mercedes benz", "Mercedes-Benz"),
    ("volkswagen", "Volkswagen"),
    ("vw", "Volkswagen"),
];

const FUEL_LABELS: [(&str, &str); 6] = [
    ("gasolina", "Gasoline"),
    ("gasoline", "Gasoline"),
    ("diesel", "Diesel"),
    ("híbrido", "Hybrid"),
    ("hibrido", "Hybrid"),
    ("hybrid", "Hybrid"),
];

/// Localized color names, replaced as substrings before title-casing.
const COLOR_NAMES: [(&str, &str); 8] = [
    ("negro", "black"),
    ("blanco", "white"),
    ("gris", "gray"),
    ("azul", "blue"),
    ("rojo", "red"),
    ("plateado", "silver"),
    ("café", "brown"),
    ("vino", "burgundy"),
];

const LUXURY_BRANDS: [&str; 7] = [
    "BMW",
    "Mercedes-Benz",
    "Audi",
    "Porsche",
    "Lexus",
    "Jaguar",
    "Land Rover",
];

pub const MIN_YEAR: i32 = 1950;
pub const MAX_YEAR: i32 = 2026;
pub const MAX_MILEAGE: i64 = 500_000;
pub const MIN_ENGINE_CC: i32 = 500;
pub const MAX_ENGINE_CC: i32 = 6000;
pub const MIN_EXCHANGE_RATE: f64 = 400.0;
pub const MAX_EXCHANGE_RATE: f64 = 600.0;

/// Clean a whole raw batch. `reference_year` anchors the age derivation so
/// runs are reproducible.
pub fn clean_batch(records: Vec<Vehicle>, reference_year: i32) -> Vec<CleanVehicle> {
    records
        .into_iter()
        .map(|v| clean_record(v, reference_year))
        .collect()
}

/// Clean one record. Order matters only where a later step reads an
/// earlier one's output: brand before model stripping, year before age.
pub fn clean_record(raw: Vehicle, reference_year: i32) -> CleanVehicle {
    let brand = raw.brand.as_deref().and_then(normalize_brand);
    let model = raw
        .model
        .as_deref()
        .and_then(|m| normalize_model(m, brand.as_deref()));
    let fuel_type = raw.fuel_type.as_deref().and_then(normalize_fuel);
    let year = raw.year.filter(|y| (MIN_YEAR..=MAX_YEAR).contains(y));
    // Zero mileage on a used listing means "not reported", not "zero".
    let mileage = raw.mileage.filter(|m| *m > 0 && *m <= MAX_MILEAGE);
    let engine_cc = raw
        .engine_cc
        .filter(|cc| (MIN_ENGINE_CC..=MAX_ENGINE_CC).contains(cc));
    let color_exterior = raw.color_exterior.as_deref().and_then(normalize_color);
    let color_interior = raw.color_interior.as_deref().and_then(normalize_color);
    let seller_phone = raw.seller_phone.as_deref().and_then(sanitize_phone);

    let (exchange_rate, price_flag) = exchange_rate(raw.price_colones, raw.price_usd);

    let vehicle_age = year.map(|y| reference_year - y);
    let price_per_year = match (raw.price_usd, vehicle_age) {
        (Some(price), Some(age)) if age + 1 != 0 => Some(price as f64 / f64::from(age + 1)),
        _ => None,
    };
    let is_luxury = brand
        .as_deref()
        .is_some_and(|b| LUXURY_BRANDS.contains(&b));

    CleanVehicle {
        url: raw.url,
        vehicle_id: raw.vehicle_id,
        brand,
        model,
        year,
        price_colones: raw.price_colones,
        price_usd: raw.price_usd,
        mileage,
        fuel_type,
        transmission: raw.transmission.filter(|t| !t.trim().is_empty()),
        engine_cc,
        color_exterior,
        color_interior,
        seller_phone,
        seller_whatsapp: raw.seller_whatsapp.filter(|w| !w.trim().is_empty()),
        description: raw.description.filter(|d| !d.trim().is_empty()),
        images: raw.images,
        exchange_rate,
        price_flag,
        vehicle_age,
        price_per_year,
        is_luxury,
        scraped_at: raw.scraped_at,
        processed_at: Utc::now(),
    }
}

/// Lower-case, trim, alias-map, title-case.
pub fn normalize_brand(brand: &str) -> Option<String> {
    let lowered = brand.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    for (alias, canonical) in BRAND_ALIASES {
        if lowered == alias {
            return Some(canonical.to_string());
        }
    }
    Some(title_case(&lowered))
}

/// Trim + upper-case; Mercedes-Benz catalog names embed the brand token,
/// which is stripped once the brand is known.
pub fn normalize_model(model: &str, brand: Option<&str>) -> Option<String> {
    let mut upper = model.trim().to_uppercase();
    if upper.is_empty() {
        return None;
    }
    if brand == Some("Mercedes-Benz") {
        upper = upper.replace("BENZ ", "");
    }
    Some(upper)
}

pub fn normalize_fuel(fuel: &str) -> Option<String> {
    let lowered = fuel.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    for (localized, canonical) in FUEL_LABELS {
        if lowered == localized {
            return Some(canonical.to_string());
        }
    }
    Some(title_case(&lowered))
}

pub fn normalize_color(color: &str) -> Option<String> {
    let mut lowered = color.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    for (localized, english) in COLOR_NAMES {
        lowered = lowered.replace(localized, english);
    }
    Some(title_case(&lowered))
}

/// Keep digits and hyphens only.
pub fn sanitize_phone(phone: &str) -> Option<String> {
    let cleaned: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Ratio of the two listed prices, flagged when implausible as an exchange
/// rate. Both prices must be positive.
pub fn exchange_rate(colones: Option<i64>, usd: Option<i64>) -> (Option<f64>, bool) {
    match (colones, usd) {
        (Some(c), Some(u)) if c > 0 && u > 0 => {
            let rate = c as f64 / u as f64;
            let flag = !(MIN_EXCHANGE_RATE..=MAX_EXCHANGE_RATE).contains(&rate);
            (Some(rate), flag)
        }
        _ => (None, false),
    }
}

/// Capitalize the letter after every non-alphanumeric boundary, so
/// hyphenated names come out as "Mercedes-Benz" and "Land Rover".
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        at_word_start = !c.is_alphanumeric();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn raw(brand: &str, year: Option<i32>) -> Vehicle {
        Vehicle {
            url: "https://crautos.com/autosusados/cardetail.cfm?c=1".to_string(),
            vehicle_id: Some("1".to_string()),
            brand: Some(brand.to_string()),
            year,
            price_colones: Some(10_000_000),
            price_usd: Some(20_000),
            scraped_at: Utc::now(),
            ..Vehicle::default()
        }
    }

    #[test]
    fn brand_aliases_map_to_canonical() {
        assert_eq!(normalize_brand(" vw "), Some("Volkswagen".to_string()));
        assert_eq!(normalize_brand("mercedes benz"), Some("Mercedes-Benz".to_string()));
        assert_eq!(normalize_brand("BMW"), Some("BMW".to_string()));
        assert_eq!(normalize_brand("toyota"), Some("Toyota".to_string()));
    }

    #[test]
    fn cleaning_is_idempotent() {
        for value in ["Toyota", "BMW", "Mercedes-Benz", "Land Rover"] {
            let once = normalize_brand(value).unwrap();
            assert_eq!(normalize_brand(&once).unwrap(), once);
        }
        for value in ["Gasoline", "Diesel", "Hybrid"] {
            let once = normalize_fuel(value).unwrap();
            assert_eq!(normalize_fuel(&once).unwrap(), once);
        }
        for value in ["Black", "Silver", "Burgundy"] {
            let once = normalize_color(value).unwrap();
            assert_eq!(normalize_color(&once).unwrap(), once);
        }
    }

    #[test]
    fn mercedes_models_drop_redundant_token() {
        assert_eq!(
            normalize_model("benz c200", Some("Mercedes-Benz")),
            Some("C200".to_string())
        );
        assert_eq!(
            normalize_model("corolla", Some("Toyota")),
            Some("COROLLA".to_string())
        );
    }

    #[test]
    fn fuel_and_colors_localized_to_english() {
        assert_eq!(normalize_fuel("gasolina"), Some("Gasoline".to_string()));
        assert_eq!(normalize_fuel("híbrido"), Some("Hybrid".to_string()));
        assert_eq!(normalize_color("negro"), Some("Black".to_string()));
        assert_eq!(normalize_color(" plateado "), Some("Silver".to_string()));
    }

    #[test]
    fn out_of_range_values_nulled() {
        let mut vehicle = raw("toyota", Some(1920));
        vehicle.mileage = Some(600_000);
        vehicle.engine_cc = Some(9000);
        let clean = clean_record(vehicle, 2025);
        assert_eq!(clean.year, None);
        assert_eq!(clean.mileage, None);
        assert_eq!(clean.engine_cc, None);

        let mut vehicle = raw("toyota", Some(2023));
        vehicle.mileage = Some(0);
        let clean = clean_record(vehicle, 2025);
        assert_eq!(clean.year, Some(2023));
        // 0 km on a used listing is "not reported"
        assert_eq!(clean.mileage, None);
    }

    #[test]
    fn exchange_rate_and_flag() {
        let clean = clean_record(raw("bmw", Some(2020)), 2025);
        assert_eq!(clean.exchange_rate, Some(500.0));
        assert!(!clean.price_flag);

        let mut vehicle = raw("bmw", Some(2020));
        vehicle.price_usd = Some(5_000);
        let clean = clean_record(vehicle, 2025);
        assert_eq!(clean.exchange_rate, Some(2000.0));
        assert!(clean.price_flag);

        let mut vehicle = raw("bmw", Some(2020));
        vehicle.price_usd = None;
        let clean = clean_record(vehicle, 2025);
        assert_eq!(clean.exchange_rate, None);
        assert!(!clean.price_flag);
    }

    #[test]
    fn derived_age_and_price_per_year() {
        let clean = clean_record(raw("toyota", Some(2020)), 2025);
        assert_eq!(clean.vehicle_age, Some(5));
        assert_eq!(clean.price_per_year, Some(20_000.0 / 6.0));

        // Brand-new vehicle: age 0, no division by zero.
        let clean = clean_record(raw("toyota", Some(2025)), 2025);
        assert_eq!(clean.vehicle_age, Some(0));
        assert_eq!(clean.price_per_year, Some(20_000.0));

        let clean = clean_record(raw("toyota", None), 2025);
        assert_eq!(clean.vehicle_age, None);
        assert_eq!(clean.price_per_year, None);
    }

    #[test]
    fn luxury_flag_from_brand_membership() {
        assert!(clean_record(raw("porsche", Some(2020)), 2025).is_luxury);
        assert!(!clean_record(raw("toyota", Some(2020)), 2025).is_luxury);
    }

    #[test]
    fn phone_sanitization_keeps_digits_and_hyphens() {
        assert_eq!(
            sanitize_phone("tel: 8888-1234 (cel)"),
            Some("8888-1234".to_string())
        );
        assert_eq!(sanitize_phone("sin numero"), None);
    }
}
