//! Listing field extraction
//!
//! Pulls normalized fields out of a fetched listing page. Both portals bury
//! the interesting values in the page title and body text, so extraction is
//! a title lookup plus a handful of validated patterns over the text. A page
//! yielding neither a title nor a price is treated as unextractable.

use crate::source::SourceId;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Payload yielded no usable fields")]
    NoFields,
}

/// Fields extracted from one listing page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFields {
    pub title: Option<String>,
    pub price_text: Option<String>,
    /// Monthly rent in pence
    pub price_pence: Option<i64>,
    pub bedrooms: Option<u32>,
    pub property_type: Option<String>,
    pub address: Option<String>,
    pub postcode: Option<String>,
}

fn price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)£([\d,]+)\s*(?:pcm|per month)").expect("valid pattern")
    })
}

fn bedrooms_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*bedroom").expect("valid pattern"))
}

fn postcode_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Z]{1,2}\d[A-Z\d]?\s*\d[A-Z]{2}\b").expect("valid pattern")
    })
}

fn address_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:to rent in|for rent in|in)\s+(.+?)(?:\s*\||$)").expect("valid pattern")
    })
}

fn property_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(flat|apartment|house|studio|maisonette|bungalow)\b")
            .expect("valid pattern")
    })
}

/// Extracts listing fields from a fetched payload
///
/// The source is accepted for future per-portal specialization; the current
/// patterns hold for both portals' markup.
pub fn extract(payload: &str, _source: SourceId) -> Result<ListingFields, ExtractError> {
    let document = Html::parse_document(payload);

    let title = extract_title(&document);
    let text = page_text(&document);

    let (price_text, price_pence) = match price_re().captures(&text) {
        Some(caps) => {
            let whole = caps.get(0).map(|m| m.as_str().to_string());
            let pence = caps
                .get(1)
                .and_then(|m| m.as_str().replace(',', "").parse::<i64>().ok())
                .map(|pounds| pounds * 100);
            (whole, pence)
        }
        None => (None, None),
    };

    if title.is_none() && price_text.is_none() {
        return Err(ExtractError::NoFields);
    }

    let bedrooms = bedrooms_re()
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok());

    let property_type = title
        .as_deref()
        .and_then(|t| property_type_re().captures(t))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase());

    let address = title
        .as_deref()
        .and_then(|t| address_re().captures(t))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|a| !a.is_empty());

    let postcode = postcode_re()
        .find(&text)
        .map(|m| m.as_str().to_string());

    Ok(ListingFields {
        title,
        price_text,
        price_pence,
        bedrooms,
        property_type,
        address,
        postcode,
    })
}

/// Extracts the page title, falling back to the first h1
fn extract_title(document: &Html) -> Option<String> {
    for selector in ["title", "h1"] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Flattens the document body to text for the pattern matchers
fn page_text(document: &Html) -> String {
    document.root_element().text().collect::<Vec<_>>().join(" ")
}
