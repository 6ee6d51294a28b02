//! Listing-card extraction for search-result pages

use crate::extract::select_all;
use scraper::Html;
use url::Url;

/// Listing cards in the results grid
const LISTING_CARD: &str = "li.mortar-wrapper";

/// Link to the listing's detail page inside a card
const PROPERTY_LINK: &str = "a.property-link[href]";

/// Extracts detail-page URLs from a search-results page
///
/// URLs are returned in document order, one per listing card. Relative hrefs
/// are resolved against `page_url`. Cards without a property link are
/// skipped, and a page without listing cards yields an empty list.
///
/// # Example
///
/// ```
/// use rent_trawl::extract::extract_listing_urls;
/// use url::Url;
///
/// let html = r#"<ul><li class="mortar-wrapper">
///     <a class="property-link" href="/the-lofts-chicago-il/abc123/">The Lofts</a>
/// </li></ul>"#;
/// let page = Url::parse("https://www.apartments.com/chicago-il/500-to-700/1/").unwrap();
/// assert_eq!(
///     extract_listing_urls(html, &page),
///     vec!["https://www.apartments.com/the-lofts-chicago-il/abc123/".to_string()]
/// );
/// ```
pub fn extract_listing_urls(html: &str, page_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);

    select_all(document.root_element(), LISTING_CARD)
        .into_iter()
        .filter_map(|card| {
            select_all(card, PROPERTY_LINK)
                .into_iter()
                .find_map(|link| link.value().attr("href"))
                .and_then(|href| resolve_href(href, page_url))
        })
        .collect()
}

/// Resolves a listing href to an absolute http(s) URL
fn resolve_href(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    let absolute = base.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute.to_string()),
        _ => None,
    }
}
