//! Marketplace-specific scraper implementations and the name registry the
//! CLI dispatches through.

use crate::config::Settings;
use crate::traits::Scraper;

pub mod crautos;

/// Look up a scraper by registry name.
pub fn by_name(name: &str, settings: &Settings) -> anyhow::Result<Box<dyn Scraper>> {
    match name {
        "crautos" => Ok(Box::new(crautos::CrautosScraper::new(settings)?)),
        other => anyhow::bail!("unknown scraper: {other}"),
    }
}
