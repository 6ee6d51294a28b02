use crate::config::{Config, JobConfig};
use crate::search::{city_base_url, city_slug, page_url, price_bands, PriceBand};
use std::path::PathBuf;

/// Crawl parameters for one city, fixed for the duration of a run
#[derive(Debug, Clone)]
pub struct CrawlJob {
    city: String,
    state: String,
    base_url: String,
    bands: Vec<PriceBand>,
    max_page: u32,
    database_path: PathBuf,
}

impl CrawlJob {
    /// Builds a job from a `[[job]]` entry and the shared configuration
    pub fn from_config(job: &JobConfig, config: &Config) -> Self {
        Self {
            city: job.city.trim().to_string(),
            state: job.state.trim().to_uppercase(),
            base_url: city_base_url(&config.fetcher.site_url, &job.city, &job.state),
            bands: price_bands(job.start_price, job.end_price, job.price_step),
            max_page: job.max_page,
            database_path: PathBuf::from(&config.store.database_path),
        }
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bands(&self) -> &[PriceBand] {
        &self.bands
    }

    pub fn max_page(&self) -> u32 {
        self.max_page
    }

    pub fn database_path(&self) -> &std::path::Path {
        &self.database_path
    }

    /// File-name friendly identifier, e.g. `new-york-ny`
    pub fn slug(&self) -> String {
        format!("{}-{}", city_slug(&self.city), self.state.to_lowercase())
    }

    /// Search-results URL for one band and page of this city
    pub fn page_url(&self, band: PriceBand, page: u32) -> String {
        page_url(&self.base_url, band, page)
    }
}
