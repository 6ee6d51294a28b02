/// What the discovery loop does after fetching one search-result page
///
/// A band's page loop runs `NEXT_PAGE -> FETCH -> (CONTINUE | END_OF_BAND)`.
/// Only a redirect ends the band early; a failed fetch is treated as an
/// empty page so the next page is still requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStep {
    /// The page was fetched; these listing URLs were found on it
    Listings(Vec<String>),

    /// The fetch failed transiently; no listings, keep paging
    Transient,

    /// The site redirected: the page number exceeds the band's results
    EndOfBand,
}
