//! Regex field extractors for loosely-structured listing text.
//!
//! All extractors are best-effort: they return `None` (or an empty vec)
//! when nothing matches and keep only the first match when the text is
//! ambiguous. Callers lower-case the input where matching is
//! case-insensitive.

use std::sync::LazyLock;

use regex::Regex;

static PRICE_COLONES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"¢\s*([\d.,]+)").expect("valid regex"));
static PRICE_USD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*([\d.,]+)").expect("valid regex"));
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("valid regex"));
static MILEAGE_KM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*km\b").expect("valid regex"));
static MILEAGE_MIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*mil\b").expect("valid regex"));
static ENGINE_CC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*c[cm]\b").expect("valid regex"));
static ENGINE_L_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*l\b").expect("valid regex"));

/// Ordered phone patterns: dash-separated local, plain 8-digit,
/// country-code prefixed. Order decides which match is primary.
static PHONE_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"\b\d{4}-\d{4}\b").expect("valid regex"),
        Regex::new(r"\b\d{8}\b").expect("valid regex"),
        Regex::new(r"\+506\s*\d{8}").expect("valid regex"),
    ]
});

/// Extract a colones price: `¢` prefix, thousands separators stripped.
pub fn extract_price_colones(text: &str) -> Option<i64> {
    extract_symbol_price(&PRICE_COLONES_RE, text)
}

/// Extract a USD price: `$` prefix, thousands separators stripped.
pub fn extract_price_usd(text: &str) -> Option<i64> {
    extract_symbol_price(&PRICE_USD_RE, text)
}

fn extract_symbol_price(re: &Regex, text: &str) -> Option<i64> {
    let caps = re.captures(text)?;
    let digits: String = caps[1].chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// First plausible 4-digit year in the text.
pub fn extract_year(text: &str) -> Option<i32> {
    YEAR_RE.captures(text).and_then(|c| c[1].parse().ok())
}

/// Mileage in kilometers. A number followed by a `km` unit is taken as-is;
/// the Spanish "mil" (thousand) form is multiplied by 1000. The km pattern
/// is tried first; within a pattern, first match wins.
pub fn extract_mileage(text: &str) -> Option<i64> {
    if let Some(caps) = MILEAGE_KM_RE.captures(text) {
        return caps[1].parse().ok();
    }
    if let Some(caps) = MILEAGE_MIL_RE.captures(text) {
        return caps[1].parse::<i64>().ok().map(|n| n * 1000);
    }
    None
}

/// Engine displacement in cc. A liter-unit match is converted to cc.
pub fn extract_engine_cc(text: &str) -> Option<i32> {
    if let Some(caps) = ENGINE_CC_RE.captures(text) {
        return caps[1].parse().ok();
    }
    if let Some(caps) = ENGINE_L_RE.captures(text) {
        return caps[1]
            .parse::<f64>()
            .ok()
            .map(|liters| (liters * 1000.0).round() as i32);
    }
    None
}

/// All distinct phone numbers, in first-seen order (first is primary).
pub fn extract_phone_numbers(text: &str) -> Vec<String> {
    let mut phones: Vec<String> = Vec::new();
    for re in PHONE_RES.iter() {
        for m in re.find_iter(text) {
            let candidate = m.as_str().to_string();
            if !phones.contains(&candidate) {
                phones.push(candidate);
            }
        }
    }
    phones
}

/// Collapse runs of whitespace into single spaces.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
