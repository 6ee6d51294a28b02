//! Crawler coordinator - job orchestration logic
//!
//! This module contains the job loop that coordinates every phase of a
//! city crawl, including:
//! - Opening the store and recording the run
//! - Discovering listing URLs, or resuming from a saved list
//! - Driving the detail phase through the store writer
//! - Handling cancellation and closing the store on every path
//! - Cooling down between consecutive jobs

use crate::config::Config;
use crate::crawler::detail::{scrape_details, DetailSettings};
use crate::crawler::discovery::{discover, Discovery};
use crate::crawler::fetcher::{HttpFetcher, PageFetcher};
use crate::crawler::politeness::{PoliteFetcher, Politeness};
use crate::crawler::writer::{StoreWriter, WriterOutput};
use crate::output::{load_url_list, save_url_list, url_list_path};
use crate::search::CrawlJob;
use crate::state::{DiscoveryReport, RunSummary};
use crate::storage::{open_storage, RunStatus, SqliteStorage, Store};
use crate::{ConfigError, TrawlError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Command-line switches that shape a run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Only run the job for this city
    pub city: Option<String>,

    /// Reuse a saved URL list instead of rediscovering
    pub resume: bool,

    /// Discover and save URL lists without touching the store
    pub dry_run: bool,
}

/// Outcome of one job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub city: String,
    pub state: String,

    /// Row ID in the `runs` table; `None` for dry runs
    pub run_id: Option<i64>,
    pub status: RunStatus,
    pub summary: RunSummary,
}

/// Main crawler coordinator structure
pub struct Coordinator<F> {
    config: Arc<Config>,
    config_hash: String,
    options: RunOptions,
    fetcher: Arc<F>,
    cancel: CancellationToken,
}

impl Coordinator<HttpFetcher> {
    /// Creates a coordinator fetching over HTTP
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `config_hash` - Hash of the config file, recorded with every run
    /// * `options` - Command-line switches
    /// * `cancel` - Fired on Ctrl-C
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(TrawlError)` - The HTTP client could not be built
    pub fn new(
        config: Config,
        config_hash: String,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> Result<Self, TrawlError> {
        let fetcher = HttpFetcher::new(&config.fetcher)?;
        Ok(Self::with_fetcher(config, fetcher, config_hash, options, cancel))
    }
}

impl<F: PageFetcher + 'static> Coordinator<F> {
    pub fn with_fetcher(
        config: Config,
        fetcher: F,
        config_hash: String,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config: Arc::new(config),
            config_hash,
            options,
            fetcher: Arc::new(fetcher),
            cancel,
        }
    }

    /// Jobs selected by `--city`, in config order
    pub fn jobs(&self) -> Result<Vec<CrawlJob>, TrawlError> {
        let jobs: Vec<CrawlJob> = self
            .config
            .jobs
            .iter()
            .filter(|job| match &self.options.city {
                Some(city) => job.city.trim().eq_ignore_ascii_case(city.trim()),
                None => true,
            })
            .map(|job| CrawlJob::from_config(job, &self.config))
            .collect();

        match (&self.options.city, jobs.is_empty()) {
            (Some(city), true) => Err(ConfigError::Validation(format!(
                "no [[job]] entry for city '{}'",
                city
            ))
            .into()),
            _ => Ok(jobs),
        }
    }

    /// Runs every selected job in sequence
    ///
    /// Consecutive jobs are separated by the configured cooldown. Cancellation
    /// interrupts the cooldown and skips the remaining jobs.
    pub async fn run(&self) -> Result<Vec<JobReport>, TrawlError> {
        let jobs = self.jobs()?;
        let cooldown = Duration::from_secs(self.config.politeness.job_cooldown_secs);
        let mut reports = Vec::with_capacity(jobs.len());

        for (index, job) in jobs.iter().enumerate() {
            if index > 0 && !cooldown.is_zero() {
                tracing::info!(
                    "Cooling down for {}s before {}, {}",
                    cooldown.as_secs(),
                    job.city(),
                    job.state()
                );
                tokio::select! {
                    _ = tokio::time::sleep(cooldown) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }

            if self.cancel.is_cancelled() {
                tracing::info!("Cancelled, skipping {} remaining jobs", jobs.len() - index);
                break;
            }

            reports.push(self.run_job(job).await?);
        }

        Ok(reports)
    }

    /// Runs one city: discovery, URL list, detail phase, run bookkeeping
    ///
    /// The store is opened before discovery and closed before returning on
    /// every path. A store error is fatal and recorded as a failed run when
    /// the store still accepts the update.
    pub async fn run_job(&self, job: &CrawlJob) -> Result<JobReport, TrawlError> {
        tracing::info!(
            "Starting job for {}, {}: {} bands, up to {} pages each",
            job.city(),
            job.state(),
            job.bands().len(),
            job.max_page()
        );

        let politeness = Arc::new(Politeness::new(&self.config.politeness));
        let fetcher = Arc::new(PoliteFetcher::new(
            Arc::clone(&self.fetcher),
            politeness,
            self.config.fetcher.fetch_workers as usize,
        ));

        if self.options.dry_run {
            let discovery = self.collect_urls(fetcher.as_ref(), job).await?;
            let mut summary = RunSummary {
                discovery: discovery.report,
                ..RunSummary::default()
            };
            let status = self.final_status(&mut summary);
            return Ok(self.report(job, None, status, summary));
        }

        let mut store = open_storage(job.database_path())?;
        let run_id = match store.create_run(job.city(), job.state(), &self.config_hash) {
            Ok(run_id) => run_id,
            Err(e) => {
                close_quietly(store);
                return Err(e.into());
            }
        };
        tracing::info!("Recording as run {}", run_id);

        let mut summary = RunSummary::default();
        let urls = match self.collect_urls(fetcher.as_ref(), job).await {
            Ok(discovery) => {
                summary.discovery = discovery.report;
                discovery.urls
            }
            Err(e) => {
                if let Err(conclude_err) = conclude(store, run_id, RunStatus::Failed, &summary) {
                    tracing::warn!("Could not record failed run {}: {}", run_id, conclude_err);
                }
                return Err(e);
            }
        };

        if self.cancel.is_cancelled() {
            let status = self.final_status(&mut summary);
            conclude(store, run_id, status, &summary)?;
            return Ok(self.report(job, Some(run_id), status, summary));
        }

        // Fires on Ctrl-C and when the writer hits a store error
        let stop = self.cancel.child_token();
        let writer = StoreWriter::spawn(store, summary, stop.clone());

        let pipeline = scrape_details(
            fetcher,
            urls.into_iter().collect(),
            job.city(),
            DetailSettings {
                fetch_workers: self.config.fetcher.fetch_workers as usize,
                parse_workers: self.config.fetcher.parse_workers as usize,
            },
            writer.handle(),
            stop,
        )
        .await;

        let WriterOutput {
            store,
            mut summary,
            error,
        } = writer.finish().await?;

        let status = if error.is_some() || pipeline.is_err() {
            RunStatus::Failed
        } else {
            self.final_status(&mut summary)
        };
        let concluded = conclude(store, run_id, status, &summary);

        if let Some(e) = error {
            if let Err(conclude_err) = concluded {
                tracing::warn!("Could not record failed run {}: {}", run_id, conclude_err);
            }
            return Err(e.into());
        }
        pipeline?;
        concluded?;

        tracing::info!(
            "Job for {}, {} {}: {} properties stored ({} new), {} units, {} skipped",
            job.city(),
            job.state(),
            status.to_db_string(),
            summary.properties_persisted(),
            summary.properties_inserted,
            summary.units_inserted,
            summary.skipped
        );

        Ok(self.report(job, Some(run_id), status, summary))
    }

    /// Discovers listing URLs, or loads them with `--resume`
    ///
    /// A complete discovery is saved as the job's URL list. A cancelled one
    /// is not, so a later `--resume` never picks up a partial list.
    async fn collect_urls<P>(&self, fetcher: &P, job: &CrawlJob) -> Result<Discovery, TrawlError>
    where
        P: PageFetcher + ?Sized,
    {
        let list_path = url_list_path(Path::new(&self.config.output.urls_dir), job);

        if self.options.resume {
            if let Some(urls) = load_url_list(&list_path)? {
                tracing::info!(
                    "Resuming {} with {} URLs from {}",
                    job.city(),
                    urls.len(),
                    list_path.display()
                );
                let report = DiscoveryReport {
                    unique_urls: urls.len() as u64,
                    ..DiscoveryReport::default()
                };
                return Ok(Discovery { urls, report });
            }
            tracing::info!("No saved URL list at {}, discovering", list_path.display());
        }

        let discovery = discover(fetcher, job, &self.cancel).await;

        if self.cancel.is_cancelled() {
            tracing::info!("Discovery interrupted, URL list not saved");
        } else {
            save_url_list(&list_path, &discovery.urls)?;
            tracing::info!(
                "Saved {} URLs to {}",
                discovery.urls.len(),
                list_path.display()
            );
        }

        Ok(discovery)
    }

    fn final_status(&self, summary: &mut RunSummary) -> RunStatus {
        if self.cancel.is_cancelled() {
            summary.cancelled = true;
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        }
    }

    fn report(
        &self,
        job: &CrawlJob,
        run_id: Option<i64>,
        status: RunStatus,
        summary: RunSummary,
    ) -> JobReport {
        JobReport {
            city: job.city().to_string(),
            state: job.state().to_string(),
            run_id,
            status,
            summary,
        }
    }
}

/// Records the run's final state and closes the store
///
/// The store is closed even when recording fails.
fn conclude(
    mut store: SqliteStorage,
    run_id: i64,
    status: RunStatus,
    summary: &RunSummary,
) -> Result<(), TrawlError> {
    let finished = store.finish_run(run_id, status, summary);
    let closed = store.close();
    finished?;
    closed
}

fn close_quietly(store: SqliteStorage) {
    if let Err(e) = store.close() {
        tracing::warn!("Failed to close store: {}", e);
    }
}

/// Runs every configured job over HTTP
///
/// # Example
///
/// ```no_run
/// use rent_trawl::config::load_config_with_hash;
/// use rent_trawl::crawler::{run_jobs, RunOptions};
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("trawl.toml"))?;
/// run_jobs(config, hash, RunOptions::default(), CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_jobs(
    config: Config,
    config_hash: String,
    options: RunOptions,
    cancel: CancellationToken,
) -> Result<Vec<JobReport>, TrawlError> {
    Coordinator::new(config, config_hash, options, cancel)?
        .run()
        .await
}
