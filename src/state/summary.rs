use crate::state::{PropertyAction, ScrapeOutcome};
use std::collections::BTreeMap;

/// Counters gathered while walking the price/page grid
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Bands whose page loop was started
    pub bands_visited: u64,

    /// Bands stopped early by a redirect
    pub bands_ended_by_redirect: u64,

    /// Search pages fetched with a usable document
    pub pages_fetched: u64,

    /// Search pages that failed transiently
    pub pages_failed: u64,

    /// Listing URLs seen, repeats included
    pub urls_seen: u64,

    /// Listing URLs left after deduplication
    pub unique_urls: u64,
}

/// Aggregated outcome of one job run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovery: DiscoveryReport,
    pub urls_processed: u64,
    pub properties_inserted: u64,
    pub properties_updated: u64,
    pub units_inserted: u64,
    pub units_discarded: u64,
    pub skipped: u64,
    pub skipped_by_kind: BTreeMap<&'static str, u64>,
    pub cancelled: bool,
}

impl RunSummary {
    /// Folds one URL's outcome into the totals
    pub fn record(&mut self, outcome: &ScrapeOutcome) {
        self.urls_processed += 1;

        match outcome {
            ScrapeOutcome::Persisted {
                property,
                units_inserted,
                units_discarded,
            } => {
                match property {
                    PropertyAction::Inserted => self.properties_inserted += 1,
                    PropertyAction::Updated => self.properties_updated += 1,
                }
                self.units_inserted += units_inserted;
                self.units_discarded += units_discarded;
            }
            ScrapeOutcome::Skipped(reason) => {
                self.skipped += 1;
                *self.skipped_by_kind.entry(reason.kind()).or_insert(0) += 1;
            }
        }
    }

    /// Number of URLs that produced a stored property
    pub fn properties_persisted(&self) -> u64 {
        self.properties_inserted + self.properties_updated
    }
}
