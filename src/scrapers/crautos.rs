//! crautos.com used-vehicle scraper

use std::sync::LazyLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{error, info};

use crate::config::Settings;
use crate::db::raw::RawStore;
use crate::extract::fields;
use crate::extract::links;
use crate::models::{FetchOutcome, ScrapeSummary, Vehicle};
use crate::traits::{Scraper, SiteConfig};

static VEHICLE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"c=(\d+)").expect("valid regex"));
static COLOR_EXTERIOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"color\s+exterior[:\s]+([^,\n]+)").expect("valid regex"));
static COLOR_INTERIOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"color\s+interior[:\s]+([^,\n]+)").expect("valid regex"));

/// Scraper implementation for crautos.com
pub struct CrautosScraper {
    client: Client,
    config: SiteConfig,
}

impl CrautosScraper {
    pub fn new(settings: &Settings) -> Result<Self> {
        let config = SiteConfig {
            name: "crautos".to_string(),
            base_url: "https://crautos.com".to_string(),
            listing_url: "https://crautos.com/autosusados/index.cfm".to_string(),
            max_pages: settings.max_pages,
            page_delay_ms: settings.page_delay_ms,
            detail_delay_ms: settings.scrape_delay_ms,
            rescrape_hours: settings.rescrape_hours,
            user_agent: settings.user_agent.clone(),
        };

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("request to {url} returned {}", response.status());
        }
        Ok(response.text().await?)
    }

    /// Walk the listing index page by page, collecting detail links until a
    /// page yields nothing new or the page cap is hit. An unreachable first
    /// page is a crawl-level error.
    async fn collect_detail_links(&self) -> Result<Vec<String>> {
        let mut all_links: Vec<String> = Vec::new();
        let mut page = 1;

        while page <= self.config.max_pages {
            let page_url = if page == 1 {
                self.config.listing_url.clone()
            } else {
                format!("{}?p={page}", self.config.listing_url)
            };

            let html = match self.fetch_page(&page_url).await {
                Ok(html) => html,
                Err(e) if page == 1 => {
                    return Err(e).context("listing index unreachable");
                }
                Err(e) => {
                    error!("Error fetching listing page {page}: {e}");
                    break;
                }
            };

            // Parse in a scope so the document is dropped before the await.
            let page_links = {
                let document = Html::parse_document(&html);
                links::extract_vehicle_links(&document, &self.config.base_url)
            };

            if page_links.is_empty() {
                info!("No vehicles found on page {page}, stopping");
                break;
            }

            let new_links: Vec<String> = page_links
                .into_iter()
                .filter(|l| !all_links.contains(l))
                .collect();
            if new_links.is_empty() {
                info!("No new vehicles on page {page}, stopping");
                break;
            }

            info!(
                "Found {} new vehicles on page {page} (total: {})",
                new_links.len(),
                all_links.len() + new_links.len()
            );
            all_links.extend(new_links);
            page += 1;

            tokio::time::sleep(tokio::time::Duration::from_millis(self.config.page_delay_ms))
                .await;
        }

        Ok(all_links)
    }

    async fn scrape_detail(&self, url: &str) -> Result<Vehicle> {
        let html = self.fetch_page(url).await?;
        Ok(parse_detail(url, &html, &self.config.base_url, Utc::now()))
    }
}

#[async_trait]
impl Scraper for CrautosScraper {
    fn config(&self) -> &SiteConfig {
        &self.config
    }

    async fn run(&self, store: &RawStore) -> Result<ScrapeSummary> {
        info!("Starting {} scrape", self.config.name);

        let links = self.collect_detail_links().await?;
        info!("Found {} vehicle links", links.len());

        let mut scraped = 0;
        let mut skipped = 0;
        let mut errors = 0;

        for link in &links {
            if self.config.rescrape_hours > 0
                && store.fetched_since(link, self.config.rescrape_hours).await?
            {
                info!(
                    "Skipping {link}, fetched within the last {}h",
                    self.config.rescrape_hours
                );
                store.log_outcome(link, FetchOutcome::Skipped, None).await?;
                skipped += 1;
                continue;
            }

            match self.scrape_detail(link).await {
                Ok(vehicle) => {
                    // Persist before moving on so a crash mid-run loses at
                    // most the in-flight record.
                    store.upsert_vehicle(&vehicle).await?;
                    store.save_json_record(&self.config.name, &vehicle)?;
                    store.log_outcome(link, FetchOutcome::Success, None).await?;
                    scraped += 1;
                    info!(
                        "Scraped vehicle {}: {} {}",
                        vehicle.vehicle_id.as_deref().unwrap_or("?"),
                        vehicle.brand.as_deref().unwrap_or("?"),
                        vehicle.model.as_deref().unwrap_or("?")
                    );
                }
                Err(e) => {
                    error!("Error scraping {link}: {e}");
                    store
                        .log_outcome(link, FetchOutcome::Error, Some(&e.to_string()))
                        .await?;
                    errors += 1;
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_millis(
                self.config.detail_delay_ms,
            ))
            .await;
        }

        Ok(ScrapeSummary {
            vehicles_scraped: scraped,
            skipped,
            errors,
            status: "completed".to_string(),
        })
    }
}

/// Parse one detail page into a raw record. Pure and synchronous so the
/// `Html` document never crosses an await point.
pub fn parse_detail(url: &str, html: &str, base_url: &str, scraped_at: DateTime<Utc>) -> Vehicle {
    let document = Html::parse_document(html);

    let mut vehicle = Vehicle {
        url: url.to_string(),
        vehicle_id: extract_vehicle_id(url),
        scraped_at,
        ..Vehicle::default()
    };

    let title_selector = Selector::parse("title").expect("valid selector");
    if let Some(title) = document.select(&title_selector).next() {
        parse_title(&mut vehicle, &title.text().collect::<String>());
    }

    let text: String = document.root_element().text().collect::<Vec<_>>().join(" ");
    let lower = text.to_lowercase();

    vehicle.price_colones = fields::extract_price_colones(&text);
    vehicle.price_usd = fields::extract_price_usd(&text);
    if vehicle.year.is_none() {
        vehicle.year = fields::extract_year(&text);
    }
    vehicle.mileage = fields::extract_mileage(&lower);
    vehicle.engine_cc = fields::extract_engine_cc(&lower);

    vehicle.fuel_type = if lower.contains("diesel") {
        Some("Diesel".to_string())
    } else if lower.contains("gasolina") || lower.contains("gasoline") {
        Some("Gasolina".to_string())
    } else if lower.contains("híbrido") || lower.contains("hybrid") {
        Some("Híbrido".to_string())
    } else {
        None
    };

    vehicle.transmission = if lower.contains("manual") {
        Some("Manual".to_string())
    } else if lower.contains("automática") || lower.contains("automatic") {
        Some("Automática".to_string())
    } else {
        None
    };

    vehicle.color_exterior = COLOR_EXTERIOR_RE
        .captures(&lower)
        .map(|c| c[1].trim().to_string());
    vehicle.color_interior = COLOR_INTERIOR_RE
        .captures(&lower)
        .map(|c| c[1].trim().to_string());

    let phones = fields::extract_phone_numbers(&text);
    vehicle.seller_phone = phones.into_iter().next();
    vehicle.seller_whatsapp = extract_whatsapp_link(&document);

    vehicle.images = links::extract_vehicle_images(&document, base_url);
    vehicle.description = extract_description(&document);

    vehicle
}

/// Listing id out of the `c=` query parameter, falling back to an md5 of
/// the URL when the parameter is missing.
fn extract_vehicle_id(url: &str) -> Option<String> {
    VEHICLE_ID_RE
        .captures(url)
        .map(|c| c[1].to_string())
        .or_else(|| Some(format!("{:x}", md5::compute(url))))
}

/// Title format: "crautos.com Brand MODEL Year ¢ price ($ usd)*". The first
/// 4-digit token is the year; everything between the site name and the year
/// is brand then model.
fn parse_title(vehicle: &mut Vehicle, title: &str) {
    let parts: Vec<&str> = title.split_whitespace().collect();

    for (i, part) in parts.iter().enumerate() {
        if part.len() == 4 && part.chars().all(|c| c.is_ascii_digit()) {
            vehicle.year = part.parse().ok();
            if i > 1 {
                vehicle.brand = parts.get(1).map(|b| b.trim().to_string());
                if i > 2 {
                    vehicle.model = Some(parts[2..i].join(" "));
                }
            }
            break;
        }
    }
}

fn extract_whatsapp_link(document: &Html) -> Option<String> {
    let anchor_selector = Selector::parse("a[href]").expect("valid selector");
    document
        .select(&anchor_selector)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| href.contains("whatsapp.com") || href.contains("wa.me"))
        .map(str::to_string)
}

/// Best-effort description: texts of plausible length from common
/// containers, first two joined.
fn extract_description(document: &Html) -> Option<String> {
    let selector =
        Selector::parse("div.description, div.details, p").expect("valid selector");

    let mut candidates = Vec::new();
    for element in document.select(&selector) {
        let text = fields::clean_text(&element.text().collect::<String>());
        if text.len() > 50 && text.len() < 1000 && !candidates.contains(&text) {
            candidates.push(text);
            if candidates.len() == 2 {
                break;
            }
        }
    }

    if candidates.is_empty() {
        None
    } else {
        Some(candidates.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_PAGE: &str = r#"
        <html>
        <head><title>crautos.com Toyota COROLLA XLI 2018 ¢ 9,500,000 ($ 19,000)*</title></head>
        <body>
          <h1>Toyota Corolla XLI</h1>
          <p>Vehiculo en excelente estado, unico dueno, mantenimiento al dia en agencia,
             llantas nuevas y revision tecnica al dia. Se recibe vehiculo de menor valor.</p>
          <table>
            <tr><td>Kilometraje</td><td>85000 km</td></tr>
            <tr><td>Cilindrada</td><td>1800 cc</td></tr>
            <tr><td>Combustible</td><td>Gasolina</td></tr>
            <tr><td>Transmision</td><td>Manual</td></tr>
          </table>
          <div>Color exterior: gris, Color interior: negro</div>
          <span>Tel: 8888-1234</span>
          <a href="https://wa.me/50688881234">WhatsApp</a>
          <img src="/fotos/412345_1.jpg">
          <img src="/fotos/412345_2.jpg">
          <img src="/assets/banner.png">
        </body></html>"#;

    #[test]
    fn parse_detail_extracts_typed_record() {
        let scraped_at = Utc::now();
        let vehicle = parse_detail(
            "https://crautos.com/autosusados/cardetail.cfm?c=412345",
            DETAIL_PAGE,
            "https://crautos.com",
            scraped_at,
        );

        assert_eq!(vehicle.vehicle_id.as_deref(), Some("412345"));
        assert_eq!(vehicle.brand.as_deref(), Some("Toyota"));
        assert_eq!(vehicle.model.as_deref(), Some("COROLLA XLI"));
        assert_eq!(vehicle.year, Some(2018));
        assert_eq!(vehicle.price_colones, Some(9_500_000));
        assert_eq!(vehicle.price_usd, Some(19_000));
        assert_eq!(vehicle.mileage, Some(85_000));
        assert_eq!(vehicle.engine_cc, Some(1800));
        assert_eq!(vehicle.fuel_type.as_deref(), Some("Gasolina"));
        assert_eq!(vehicle.transmission.as_deref(), Some("Manual"));
        assert_eq!(vehicle.color_exterior.as_deref(), Some("gris"));
        assert_eq!(vehicle.color_interior.as_deref(), Some("negro"));
        assert_eq!(vehicle.seller_phone.as_deref(), Some("8888-1234"));
        assert_eq!(
            vehicle.seller_whatsapp.as_deref(),
            Some("https://wa.me/50688881234")
        );
        assert_eq!(vehicle.images.len(), 2);
        assert!(vehicle.description.is_some());
    }

    #[test]
    fn site_config_mirrors_settings() {
        let settings = Settings::from_env().unwrap();
        let scraper = CrautosScraper::new(&settings).unwrap();
        assert_eq!(scraper.name(), "crautos");
        assert_eq!(scraper.config().user_agent, settings.user_agent);
        assert_eq!(scraper.config().rescrape_hours, settings.rescrape_hours);
    }

    #[test]
    fn vehicle_id_falls_back_to_url_hash() {
        let id = extract_vehicle_id("https://crautos.com/autosusados/somepage.cfm").unwrap();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn title_without_year_leaves_fields_empty() {
        let mut vehicle = Vehicle::default();
        parse_title(&mut vehicle, "crautos.com - autos usados");
        assert!(vehicle.year.is_none());
        assert!(vehicle.brand.is_none());
    }
}
