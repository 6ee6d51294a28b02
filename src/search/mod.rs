//! Search-result URL handling
//!
//! This module builds the listing site's search URLs from a city, a price
//! band, and a page number, and parses them back. The site's shape is
//! `{site}/{city-slug}-{state}/{min}-to-{max}/{page}/`.

mod job;

pub use job::CrawlJob;

use url::Url;

/// A `[min, max)` price sub-range used to partition search queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceBand {
    pub min_price: u32,
    pub max_price: u32,
}

impl std::fmt::Display for PriceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.min_price, self.max_price)
    }
}

/// Enumerates the price bands of a `[start, end)` range
///
/// Every band is `step` wide. Band starts never reach `end`, but the last
/// band's upper bound may extend past it.
///
/// # Examples
///
/// ```
/// use rent_trawl::search::{price_bands, PriceBand};
///
/// let bands = price_bands(500, 900, 200);
/// assert_eq!(bands, vec![
///     PriceBand { min_price: 500, max_price: 700 },
///     PriceBand { min_price: 700, max_price: 900 },
/// ]);
/// ```
pub fn price_bands(start: u32, end: u32, step: u32) -> Vec<PriceBand> {
    if step == 0 {
        return Vec::new();
    }

    (start..end)
        .step_by(step as usize)
        .map(|min_price| PriceBand {
            min_price,
            max_price: min_price.saturating_add(step),
        })
        .collect()
}

/// Lower-cases a city name and replaces spaces with hyphens
pub fn city_slug(city: &str) -> String {
    city.trim().to_lowercase().replace(' ', "-")
}

/// Builds the search base path for one city
///
/// The returned string always ends with a slash so page paths can be
/// appended directly.
pub fn city_base_url(site_url: &str, city: &str, state: &str) -> String {
    format!(
        "{}/{}-{}/",
        site_url.trim_end_matches('/'),
        city_slug(city),
        state.trim().to_lowercase()
    )
}

/// Builds the search-results URL for one band and page
///
/// `base` must be a city base path as produced by [`city_base_url`].
pub fn page_url(base: &str, band: PriceBand, page: u32) -> String {
    format!(
        "{}{}-to-{}/{}/",
        base, band.min_price, band.max_price, page
    )
}

/// Recovers `(band, page)` from a search-results URL
///
/// Returns `None` for URLs that do not end in `/{min}-to-{max}/{page}/`.
pub fn parse_page_url(url: &str) -> Option<(PriceBand, u32)> {
    let parsed = Url::parse(url).ok()?;
    let mut segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();

    let page = segments.pop()?.parse::<u32>().ok()?;
    let (min, max) = segments.pop()?.split_once("-to-")?;

    Some((
        PriceBand {
            min_price: min.parse().ok()?,
            max_price: max.parse().ok()?,
        },
        page,
    ))
}
