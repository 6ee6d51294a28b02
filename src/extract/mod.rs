//! HTML extraction for search-result and detail pages
//!
//! This module turns fetched page bodies into records:
//! - Listing URLs from a search-result page
//! - One property record from a detail page
//! - Zero or more unit records from the same detail page
//!
//! Documents are parsed with `scraper`. `scraper::Html` is not `Send`, so every
//! entry point takes the raw body and returns owned records.

mod listing;
mod property;
mod unit;

pub use listing::extract_listing_urls;
pub use property::{extract_property, extract_property_name, Amenity};
pub use unit::{extract_units, find_unit_blocks, UnitLayout};

use crate::storage::{PropertyRecord, UnitRecord};
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// Availability text marking a placeholder unit that cannot be rented
pub const NOT_AVAILABLE: &str = "Not Available";

/// Structural problems that make a detail page unusable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("property name heading not found")]
    MissingPropertyName,

    #[error("zipcode not found")]
    MissingZipcode,
}

/// Everything extracted from one detail page
#[derive(Debug, Clone, PartialEq)]
pub struct DetailPage {
    pub property: PropertyRecord,

    /// Units left after dropping the ones marked "Not Available"
    pub units: Vec<UnitRecord>,

    /// Units dropped for being "Not Available"
    pub units_discarded: u64,

    /// Markup variant the units were found in, if any
    pub layout: Option<UnitLayout>,
}

/// Extracts the property and its available units from a detail page
///
/// # Arguments
///
/// * `html` - The detail page body
/// * `url` - The URL the page was fetched from
/// * `city` - The job's city name, stored on the property row
///
/// # Returns
///
/// * `Ok(DetailPage)` - The property was identified
/// * `Err(ExtractError)` - The property name or zipcode is missing
pub fn extract_detail(html: &str, url: &str, city: &str) -> Result<DetailPage, ExtractError> {
    let document = Html::parse_document(html);
    let scraped_at = Utc::now().to_rfc3339();

    let property_name =
        extract_property_name(&document).ok_or(ExtractError::MissingPropertyName)?;
    let property = extract_property(&document, &property_name, city, url, &scraped_at)?;

    let (layout, units) =
        match extract_units(&document, &property.property_name, &property.zipcode, &scraped_at) {
            Some((layout, units)) => (Some(layout), units),
            None => {
                tracing::debug!("No unit layout matched on {}, storing property only", url);
                (None, Vec::new())
            }
        };

    let (units, units_discarded) = partition_available(units);

    Ok(DetailPage {
        property,
        units,
        units_discarded,
        layout,
    })
}

/// Drops units whose availability is exactly "Not Available"
///
/// Returns the kept units and the number dropped.
pub fn partition_available(units: Vec<UnitRecord>) -> (Vec<UnitRecord>, u64) {
    let total = units.len();
    let kept: Vec<UnitRecord> = units.into_iter().filter(UnitRecord::is_available).collect();
    let discarded = (total - kept.len()) as u64;
    (kept, discarded)
}

/// Selects all matches of `css` under `scope`
///
/// An unparseable selector matches nothing.
fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => scope.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Whitespace-normalized text content of an element
fn clean_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first non-empty match among `selectors`, tried in order
fn first_text(scope: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        select_all(scope, css)
            .into_iter()
            .map(clean_text)
            .find(|text| !text.is_empty())
    })
}

/// Value of `attr` on the first match of `css` that carries it
fn first_attr(scope: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    select_all(scope, css).into_iter().find_map(|element| {
        element
            .value()
            .attr(attr)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

/// Removes a leading label such as the site's screen-reader "price" prefix
fn strip_label<'a>(text: &'a str, labels: &[&str]) -> &'a str {
    let lowered = text.to_lowercase();
    for label in labels {
        if lowered.starts_with(label) && text.is_char_boundary(label.len()) {
            return text[label.len()..].trim_start();
        }
    }
    text
}

/// First number in `text`, ignoring thousands separators
fn first_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(|c| *c != ',')
        .collect();
    digits.trim_end_matches('.').parse().ok()
}
