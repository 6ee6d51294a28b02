//! Unit-level extraction for detail pages
//!
//! The site renders floorplans and units in several markup variants depending
//! on the property. Each variant is a [`UnitLayout`]; layouts are tried in a
//! fixed order and the first one that finds any blocks is used.

use crate::extract::{first_attr, first_number, first_text, select_all, strip_label};
use crate::storage::UnitRecord;
use scraper::{ElementRef, Html};

const MODEL_NAME: &[&str] = &[".modelName", ".floorplanTitle", ".modelLabel"];
const PRICE: &[&str] = &[".pricingColumn", ".rentLabel", ".rentText"];
const BEDS: &[&str] = &[".bedsColumn", ".bedsLabel"];
const BATHS: &[&str] = &[".bathsColumn", ".bathsLabel"];
const SQFT: &[&str] = &[".sqftColumn", ".sqftLabel"];
const DETAILS: &[&str] = &[".detailsTextWrapper", ".detailsLabel"];
const AVAILABILITY: &[&str] = &[
    ".availableColumn .dateAvailable",
    ".availableColumn",
    ".availabilityInfo",
];

/// Markup variants of a detail page's unit list, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitLayout {
    /// Individual units in the "all" tab
    UnitContainer,

    /// Pricing-grid items in the "all" tab
    PricingGrid,

    /// Floorplan model wrappers anywhere on the page
    ModelWrapper,
}

impl UnitLayout {
    pub const ORDER: [UnitLayout; 3] = [Self::UnitContainer, Self::PricingGrid, Self::ModelWrapper];

    pub fn selector(&self) -> &'static str {
        match self {
            Self::UnitContainer => {
                "div[data-tab-content-id='all'] li.unitContainer.js-unitContainer"
            }
            Self::PricingGrid => "div[data-tab-content-id='all'] div.pricingGridItem.multiFamily",
            Self::ModelWrapper => "div.priceGridModelWrapper.js-unitContainer.mortar-wrapper",
        }
    }

    /// Unit blocks of this variant; empty means the layout does not apply
    pub fn blocks<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        select_all(document.root_element(), self.selector())
    }
}

/// Finds unit blocks with the first layout that yields any
///
/// Returns `None` when no layout matches.
pub fn find_unit_blocks(document: &Html) -> Option<(UnitLayout, Vec<ElementRef<'_>>)> {
    UnitLayout::ORDER.into_iter().find_map(|layout| {
        let blocks = layout.blocks(document);
        (!blocks.is_empty()).then_some((layout, blocks))
    })
}

/// Parses every unit block of a detail page
///
/// Units are not filtered for availability here.
pub fn extract_units(
    document: &Html,
    property_name: &str,
    zipcode: &str,
    scraped_at: &str,
) -> Option<(UnitLayout, Vec<UnitRecord>)> {
    let (layout, blocks) = find_unit_blocks(document)?;
    tracing::trace!("Found {} unit blocks using {:?}", blocks.len(), layout);

    let units = blocks
        .into_iter()
        .map(|block| parse_unit(block, property_name, zipcode, scraped_at))
        .collect();

    Some((layout, units))
}

/// Parses one unit block
///
/// Data attributes on the block win over column text, and the free-form
/// details line fills whatever the columns did not provide.
fn parse_unit(
    block: ElementRef<'_>,
    property_name: &str,
    zipcode: &str,
    scraped_at: &str,
) -> UnitRecord {
    let attr = |name: &str| block.value().attr(name).map(str::trim).filter(|v| !v.is_empty());
    let details = Details::parse(first_text(block, DETAILS).as_deref().unwrap_or(""));

    let price_text = attr("data-maxrent")
        .map(str::to_string)
        .or_else(|| first_text(block, PRICE));
    let (price, price_is_range) = price_text
        .as_deref()
        .map(|text| parse_price(strip_label(text, &["price"])))
        .unwrap_or((None, false));

    let beds = attr("data-beds")
        .and_then(|v| v.parse().ok())
        .or_else(|| {
            first_text(block, BEDS).and_then(|text| parse_beds(strip_label(&text, &["beds"])))
        })
        .or(details.beds);

    let baths = attr("data-baths")
        .and_then(|v| v.parse().ok())
        .or_else(|| {
            first_text(block, BATHS)
                .and_then(|text| first_number(strip_label(&text, &["baths"])))
        })
        .or(details.baths);

    let sqft = first_text(block, SQFT)
        .and_then(|text| first_number(strip_label(&text, &["square feet"])))
        .or(details.sqft)
        .map(|value| value as i64);

    let date_available = first_text(block, AVAILABILITY)
        .map(|text| strip_label(&text, &["availability"]).to_string())
        .filter(|text| !text.is_empty());

    UnitRecord {
        property_name: property_name.to_string(),
        zipcode: zipcode.to_string(),
        model_name: attr("data-model")
            .map(str::to_string)
            .or_else(|| first_text(block, MODEL_NAME)),
        unit_number: first_attr(block, ".unitColumn span[title]", "title")
            .or_else(|| attr("data-unit").map(str::to_string)),
        price,
        beds,
        baths,
        sqft,
        date_available,
        studio: beds == Some(0.0),
        price_is_range,
        scraped_at: scraped_at.to_string(),
    }
}

/// Beds, baths and square feet from a line like "Studio, 1 Bath, 450 Sq Ft"
#[derive(Debug, Default, PartialEq)]
struct Details {
    beds: Option<f64>,
    baths: Option<f64>,
    sqft: Option<f64>,
}

impl Details {
    fn parse(text: &str) -> Self {
        let mut details = Self::default();

        // ", " keeps thousands separators like "1,800" intact
        for part in text.split('•').flat_map(|segment| segment.split(", ")) {
            let lowered = part.to_lowercase();
            if lowered.contains("studio") || lowered.contains("bed") {
                details.beds = details.beds.or_else(|| parse_beds(part));
            } else if lowered.contains("bath") {
                details.baths = details.baths.or_else(|| first_number(part));
            } else if lowered.contains("sq ft") || lowered.contains("sqft") {
                details.sqft = details.sqft.or_else(|| first_number(part));
            }
        }

        details
    }
}

fn parse_beds(text: &str) -> Option<f64> {
    if text.to_lowercase().contains("studio") {
        Some(0.0)
    } else {
        first_number(text)
    }
}

/// Parses "$1,850" or a range like "$1,500 – $2,100" into its lower bound
fn parse_price(text: &str) -> (Option<i64>, bool) {
    let amounts: Vec<f64> = text
        .split(['–', '-'])
        .filter_map(first_number)
        .collect();

    let price = amounts.first().map(|value| *value as i64);
    (price, amounts.len() > 1)
}
