//! Property-level extraction for detail pages

use crate::extract::{clean_text, first_attr, first_text, select_all, ExtractError};
use crate::storage::PropertyRecord;
use scraper::Html;
use std::collections::BTreeSet;

const PROPERTY_NAME: &str = "h1.propertyName";

const STREET_ADDRESS: &[&str] = &[
    ".propertyAddressContainer .delivery-address span",
    ".propertyAddressContainer .delivery-address",
];

const STATE_ZIP_PARTS: &str = ".propertyAddressContainer .stateZipContainer span";

const ADDRESS_BLOCK: &[&str] = &[".propertyAddressContainer", ".propertyAddress"];

const NEIGHBORHOOD: &[&str] = &[
    ".propertyAddressContainer a.neighborhood",
    ".neighborhoodAddress a",
];

/// Amenity labels and pet-policy headings
const AMENITY_LABELS: &str =
    "#amenitiesSection li, .amenitiesSection li, li.specInfo, .combinedAmenitiesList li, .petPolicyDetails";

/// Property amenities the downstream feature set keys on
///
/// The declaration order is the fixed column order of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Amenity {
    FitnessCenter,
    AirConditioning,
    InUnitWasherDryer,
    LaundryFacilities,
    Roof,
    Concierge,
    Pool,
    Elevator,
    Garage,
    Dishwasher,
    PetsAllowed,
}

impl Amenity {
    pub const ALL: [Amenity; 11] = [
        Self::FitnessCenter,
        Self::AirConditioning,
        Self::InUnitWasherDryer,
        Self::LaundryFacilities,
        Self::Roof,
        Self::Concierge,
        Self::Pool,
        Self::Elevator,
        Self::Garage,
        Self::Dishwasher,
        Self::PetsAllowed,
    ];

    /// Column name in the `properties` table
    pub fn column(&self) -> &'static str {
        match self {
            Self::FitnessCenter => "fitness_center",
            Self::AirConditioning => "air_conditioning",
            Self::InUnitWasherDryer => "in_unit_washer_dryer",
            Self::LaundryFacilities => "laundry_facilities",
            Self::Roof => "roof",
            Self::Concierge => "concierge",
            Self::Pool => "pool",
            Self::Elevator => "elevator",
            Self::Garage => "garage",
            Self::Dishwasher => "dishwasher",
            Self::PetsAllowed => "pets_allowed",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::FitnessCenter => &["fitness center", "gym"],
            Self::AirConditioning => &["air conditioning"],
            Self::InUnitWasherDryer => &["washer/dryer", "in unit washer"],
            Self::LaundryFacilities => &["laundry facilities"],
            Self::Roof => &["rooftop", "roof deck", "roof terrace"],
            Self::Concierge => &["concierge"],
            Self::Pool => &["pool"],
            Self::Elevator => &["elevator"],
            Self::Garage => &["garage"],
            Self::Dishwasher => &["dishwasher"],
            Self::PetsAllowed => &["pets allowed", "dogs allowed", "cats allowed", "pet friendly"],
        }
    }

    /// Returns true if an amenity label on the page names this amenity
    pub fn matches(&self, label: &str) -> bool {
        let label = label.to_lowercase();

        // A hookup is not an in-unit machine
        if *self == Self::InUnitWasherDryer && label.contains("hookup") {
            return false;
        }

        self.keywords().iter().any(|keyword| label.contains(keyword))
    }

    /// Collects every amenity named by any of `labels`
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> BTreeSet<Amenity> {
        let labels: Vec<&str> = labels.into_iter().collect();
        Self::ALL
            .into_iter()
            .filter(|amenity| labels.iter().any(|label| amenity.matches(label)))
            .collect()
    }
}

/// Extracts the property's display name from its heading
pub fn extract_property_name(document: &Html) -> Option<String> {
    first_text(document.root_element(), &[PROPERTY_NAME])
}

/// Builds the property record of a detail page
///
/// # Arguments
///
/// * `document` - The parsed detail page
/// * `property_name` - The name taken from the page heading
/// * `city` - The job's city name
/// * `url` - The detail page URL
/// * `scraped_at` - RFC 3339 timestamp of this scrape
///
/// # Returns
///
/// * `Ok(PropertyRecord)` - The record, keyed by name and zipcode
/// * `Err(ExtractError::MissingZipcode)` - No zipcode anywhere on the page
pub fn extract_property(
    document: &Html,
    property_name: &str,
    city: &str,
    url: &str,
    scraped_at: &str,
) -> Result<PropertyRecord, ExtractError> {
    let root = document.root_element();

    let state_zip: Vec<String> = select_all(root, STATE_ZIP_PARTS)
        .into_iter()
        .map(clean_text)
        .collect();

    let zipcode = state_zip
        .iter()
        .find_map(|part| parse_zipcode(part))
        .or_else(|| first_attr(root, "meta[itemprop='postalCode']", "content"))
        .or_else(|| {
            first_text(root, ADDRESS_BLOCK)
                .and_then(|block| block.split_whitespace().rev().find_map(parse_zipcode))
        })
        .ok_or(ExtractError::MissingZipcode)?;

    let state = state_zip
        .iter()
        .find(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()))
        .cloned()
        .or_else(|| first_attr(root, "meta[itemprop='addressRegion']", "content"));

    let address = first_text(root, STREET_ADDRESS)
        .map(|street| street.trim_end_matches(',').to_string())
        .or_else(|| first_attr(root, "meta[itemprop='streetAddress']", "content"));

    let labels: Vec<String> = select_all(root, AMENITY_LABELS)
        .into_iter()
        .map(clean_text)
        .collect();

    Ok(PropertyRecord {
        property_name: property_name.to_string(),
        zipcode,
        address,
        neighborhood: first_text(root, NEIGHBORHOOD),
        city_name: city.to_string(),
        state,
        latitude: coordinate(document, "place:location:latitude"),
        longitude: coordinate(document, "place:location:longitude"),
        source_url: url.to_string(),
        amenities: Amenity::from_labels(labels.iter().map(String::as_str)),
        scraped_at: scraped_at.to_string(),
    })
}

/// Accepts `12345` and `12345-6789`, returning the five-digit part
fn parse_zipcode(text: &str) -> Option<String> {
    let text = text.trim().trim_end_matches(',');
    let five = text.split('-').next()?;
    if five.len() == 5 && five.chars().all(|c| c.is_ascii_digit()) {
        Some(five.to_string())
    } else {
        None
    }
}

fn coordinate(document: &Html, property: &str) -> Option<f64> {
    first_attr(
        document.root_element(),
        &format!("meta[property='{}']", property),
        "content",
    )
    .and_then(|value| value.parse().ok())
}
