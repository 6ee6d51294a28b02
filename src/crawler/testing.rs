//! In-memory fetcher for crawler unit tests

use crate::crawler::fetcher::{FetchResult, PageFetcher};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Serves canned responses and records every requested URL
///
/// Unscripted URLs answer 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: HashMap<String, FetchResult>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchResult::Success {
                final_url: url.to_string(),
                status: 200,
                body: body.to_string(),
            },
        );
        self
    }

    pub fn status(mut self, url: &str, status: u16) -> Self {
        let result = if (300..400).contains(&status) {
            FetchResult::Redirect {
                status,
                location: None,
            }
        } else {
            FetchResult::HttpError { status }
        };
        self.responses.insert(url.to_string(), result);
        self
    }

    /// Answers 301 pointing at `location`
    pub fn redirect(mut self, url: &str, location: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchResult::Redirect {
                status: 301,
                location: Some(location.to_string()),
            },
        );
        self
    }

    pub fn network_error(mut self, url: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchResult::NetworkError {
                error: "Request timeout".to_string(),
            },
        );
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .unwrap_or(FetchResult::HttpError { status: 404 })
    }
}
