use crate::extract::ExtractError;
use thiserror::Error;

/// Whether a scraped property was new to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyAction {
    Inserted,
    Updated,
}

/// Why a detail-page URL produced no records
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("fetch failed (status {})", display_status(.status))]
    FetchFailed { status: Option<u16> },

    #[error("{0}")]
    Extraction(#[from] ExtractError),

    #[error("extractor panicked: {0}")]
    Panicked(String),
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

impl SkipReason {
    /// Short label used to group skips in the run summary
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FetchFailed { .. } => "fetch_failed",
            Self::Extraction(ExtractError::MissingPropertyName) => "missing_property_name",
            Self::Extraction(ExtractError::MissingZipcode) => "missing_zipcode",
            Self::Panicked(_) => "panicked",
        }
    }
}

/// Result of processing one detail-page URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    /// The property and its available units were written
    Persisted {
        property: PropertyAction,
        units_inserted: u64,
        units_discarded: u64,
    },

    /// Nothing was written for this URL
    Skipped(SkipReason),
}
