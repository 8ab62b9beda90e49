//! Link and image extraction from parsed listing-index and detail pages.

use scraper::{Html, Selector};

use super::fields::clean_text;

/// Pagination anchors classified by link text, plus a flag for the
/// form-based paging some ColdFusion sites use instead of anchors.
#[derive(Debug, Clone, Default)]
pub struct PaginationLinks {
    pub next: Option<String>,
    pub prev: Option<String>,
    pub pages: Vec<String>,
    pub has_form_pagination: bool,
}

const NEXT_WORDS: [&str; 3] = ["siguiente", "next", ">"];
const PREV_WORDS: [&str; 3] = ["anterior", "prev", "<"];
const IMAGE_KEYWORDS: [&str; 4] = ["vehicle", "car", "auto", "foto"];

/// Anchors pointing at vehicle detail pages: href carries the detail-page
/// route marker and a listing-id query parameter. Absolute, deduplicated,
/// in document order.
pub fn extract_vehicle_links(document: &Html, base_url: &str) -> Vec<String> {
    let anchor_selector = Selector::parse("a[href]").expect("valid selector");

    let mut links = Vec::new();
    for anchor in document.select(&anchor_selector) {
        if let Some(href) = anchor.value().attr("href")
            && href.contains("cardetail.cfm")
            && href.contains("c=")
        {
            let url = absolutize(base_url, href);
            if !links.contains(&url) {
                links.push(url);
            }
        }
    }
    links
}

/// Classify pagination anchors and detect form-based paging.
pub fn extract_pagination_links(document: &Html, base_url: &str) -> PaginationLinks {
    let anchor_selector = Selector::parse("a, button").expect("valid selector");
    let form_selector = Selector::parse("form").expect("valid selector");

    let mut pagination = PaginationLinks::default();

    for element in document.select(&anchor_selector) {
        let text = clean_text(&element.text().collect::<String>()).to_lowercase();
        let href = element.value().attr("href");

        if NEXT_WORDS.iter().any(|w| text.contains(w)) {
            pagination.next = href.map(|h| absolutize(base_url, h));
        } else if PREV_WORDS.iter().any(|w| text.contains(w)) {
            pagination.prev = href.map(|h| absolutize(base_url, h));
        } else if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
            if let Some(h) = href {
                pagination.pages.push(absolutize(base_url, h));
            }
        }
    }

    for form in document.select(&form_selector) {
        let form_html = form.html().to_lowercase();
        if form_html.contains("page") || form_html.contains("siguiente") {
            pagination.has_form_pagination = true;
            break;
        }
    }

    pagination
}

/// Image elements whose source path carries a vehicle/photo keyword.
pub fn extract_vehicle_images(document: &Html, base_url: &str) -> Vec<String> {
    let img_selector = Selector::parse("img[src]").expect("valid selector");

    let mut images = Vec::new();
    for img in document.select(&img_selector) {
        if let Some(src) = img.value().attr("src") {
            let lower = src.to_lowercase();
            if IMAGE_KEYWORDS.iter().any(|k| lower.contains(k)) {
                let url = absolutize(base_url, src);
                if !images.contains(&url) {
                    images.push(url);
                }
            }
        }
    }
    images
}

/// Resolve a possibly-relative href against the site base URL.
pub fn absolutize(base_url: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), href)
    }
}
