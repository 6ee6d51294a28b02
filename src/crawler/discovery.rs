//! Discovery phase: walks the price/page grid and collects listing URLs

use crate::crawler::fetcher::{FetchResult, PageFetcher};
use crate::extract::extract_listing_urls;
use crate::search::CrawlJob;
use crate::state::{DiscoveryReport, PageStep};
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Deduplicated listing URLs of one job and how they were found
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub urls: BTreeSet<String>,
    pub report: DiscoveryReport,
}

/// Decides what a fetched search page means for its band's page loop
pub fn classify_page(result: &FetchResult) -> PageStep {
    match result {
        FetchResult::Success {
            final_url, body, ..
        } => match Url::parse(final_url) {
            Ok(page_url) => PageStep::Listings(extract_listing_urls(body, &page_url)),
            Err(_) => PageStep::Listings(Vec::new()),
        },
        FetchResult::Redirect { .. } => PageStep::EndOfBand,
        FetchResult::HttpError { .. } | FetchResult::NetworkError { .. } => PageStep::Transient,
    }
}

/// Runs the discovery phase for one job
///
/// Bands are visited in order and each band's pages are requested from 1 up
/// to the job's last page. A redirect ends the band; a failed page is
/// treated as empty and the next page is still requested. Cancellation is
/// checked before every page fetch, and a cancelled discovery returns what
/// was found so far.
pub async fn discover<F>(fetcher: &F, job: &CrawlJob, cancel: &CancellationToken) -> Discovery
where
    F: PageFetcher + ?Sized,
{
    let mut discovery = Discovery::default();

    'bands: for &band in job.bands() {
        discovery.report.bands_visited += 1;
        let mut band_urls = 0u64;

        for page in 1..=job.max_page() {
            if cancel.is_cancelled() {
                tracing::info!("Discovery cancelled during band {} page {}", band, page);
                break 'bands;
            }

            let url = job.page_url(band, page);
            let result = fetcher.fetch(&url).await;

            match classify_page(&result) {
                PageStep::Listings(urls) => {
                    discovery.report.pages_fetched += 1;
                    discovery.report.urls_seen += urls.len() as u64;
                    band_urls += urls.len() as u64;
                    discovery.urls.extend(urls);
                }
                PageStep::Transient => {
                    discovery.report.pages_failed += 1;
                    tracing::debug!("No document for {} ({:?}), continuing", url, result.status());
                }
                PageStep::EndOfBand => {
                    discovery.report.bands_ended_by_redirect += 1;
                    tracing::debug!("Band {} ended by redirect at page {}", band, page);
                    break;
                }
            }
        }

        tracing::debug!("Band {} yielded {} listing URLs", band, band_urls);
    }

    discovery.report.unique_urls = discovery.urls.len() as u64;
    tracing::info!(
        "Discovery for {} complete: {} unique URLs ({} seen) from {} pages, {} failed",
        job.city(),
        discovery.report.unique_urls,
        discovery.report.urls_seen,
        discovery.report.pages_fetched,
        discovery.report.pages_failed
    );

    discovery
}
