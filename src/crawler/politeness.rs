//! Politeness policy for fetches against the listing site
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore
//! - A process-wide count of successful fetches
//! - A randomized pause every `pause-every` successes that gates all workers

use crate::config::PolitenessConfig;
use crate::crawler::fetcher::{FetchResult, PageFetcher};
use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Shared success counter and pause gate
///
/// One instance lives for a whole job, so discovery and detail fetches count
/// toward the same threshold.
#[derive(Debug)]
pub struct Politeness {
    pause_every: u64,
    min_pause: Duration,
    max_pause: Duration,
    successes: AtomicU64,
    paused_until: Mutex<Option<Instant>>,
}

impl Politeness {
    pub fn new(config: &PolitenessConfig) -> Self {
        Self {
            pause_every: config.pause_every.max(1),
            min_pause: Duration::from_secs(config.min_pause_secs),
            max_pause: Duration::from_secs(config.max_pause_secs),
            successes: AtomicU64::new(0),
            paused_until: Mutex::new(None),
        }
    }

    /// Number of successful fetches recorded so far
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::SeqCst)
    }

    /// Waits out the current pause, if any
    pub async fn wait(&self) {
        let until = *self
            .paused_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(until) = until {
            if until > Instant::now() {
                tokio::time::sleep_until(until).await;
            }
        }
    }

    /// Counts one successful fetch
    ///
    /// # Returns
    ///
    /// * `Some(Duration)` - This success crossed the threshold; every worker
    ///   now waits for the returned duration
    /// * `None` - No pause is due
    pub fn record_success(&self) -> Option<Duration> {
        let count = self.successes.fetch_add(1, Ordering::SeqCst) + 1;
        if count % self.pause_every != 0 {
            return None;
        }

        let pause = self.pick_pause();
        let mut paused_until = self
            .paused_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *paused_until = Some(Instant::now() + pause);
        Some(pause)
    }

    fn pick_pause(&self) -> Duration {
        if self.max_pause <= self.min_pause {
            return self.min_pause;
        }
        let millis = rand::thread_rng()
            .gen_range(self.min_pause.as_millis() as u64..=self.max_pause.as_millis() as u64);
        Duration::from_millis(millis)
    }
}

/// Wraps a [`PageFetcher`] with the job's concurrency limit and pause policy
pub struct PoliteFetcher<F> {
    inner: F,
    politeness: Arc<Politeness>,
    permits: Arc<Semaphore>,
}

impl<F: PageFetcher> PoliteFetcher<F> {
    /// # Arguments
    ///
    /// * `inner` - The fetcher doing the actual requests
    /// * `politeness` - Pause policy shared for the job
    /// * `max_in_flight` - Upper bound on concurrent requests
    pub fn new(inner: F, politeness: Arc<Politeness>, max_in_flight: usize) -> Self {
        Self {
            inner,
            politeness,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for PoliteFetcher<F> {
    async fn fetch(&self, url: &str) -> FetchResult {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return FetchResult::NetworkError {
                    error: "fetch pool closed".to_string(),
                }
            }
        };

        self.politeness.wait().await;
        let result = self.inner.fetch(url).await;

        if result.is_success() {
            if let Some(pause) = self.politeness.record_success() {
                tracing::info!(
                    "Pausing all fetches for {:.1}s after {} successful requests",
                    pause.as_secs_f64(),
                    self.politeness.successes()
                );
            }
        }

        result
    }
}
