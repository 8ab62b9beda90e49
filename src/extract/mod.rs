//! Extraction helpers shared by the site scrapers: stateless field parsers
//! and link/image isolation over parsed HTML.

pub mod fields;
pub mod links;
