use serde::Deserialize;

/// Main configuration structure for Rent-Trawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    pub store: StoreConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "job")]
    pub jobs: Vec<JobConfig>,
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Root of the listing site, e.g. `https://www.apartments.com`
    #[serde(rename = "site-url", default = "default_site_url")]
    pub site_url: String,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum number of requests in flight against the site
    #[serde(rename = "fetch-workers", default = "default_fetch_workers")]
    pub fetch_workers: u32,

    /// Maximum number of detail pages parsed at once
    #[serde(rename = "parse-workers", default = "default_parse_workers")]
    pub parse_workers: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            site_url: default_site_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            fetch_workers: default_fetch_workers(),
            parse_workers: default_parse_workers(),
        }
    }
}

/// Pause policy applied to the whole job
#[derive(Debug, Clone, Deserialize)]
pub struct PolitenessConfig {
    /// Pause after every N successful fetches
    #[serde(rename = "pause-every", default = "default_pause_every")]
    pub pause_every: u64,

    #[serde(rename = "min-pause-secs", default = "default_min_pause")]
    pub min_pause_secs: u64,

    #[serde(rename = "max-pause-secs", default = "default_max_pause")]
    pub max_pause_secs: u64,

    /// Sleep between consecutive jobs
    #[serde(rename = "job-cooldown-secs", default = "default_job_cooldown")]
    pub job_cooldown_secs: u64,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            pause_every: default_pause_every(),
            min_pause_secs: default_min_pause(),
            max_pause_secs: default_max_pause(),
            job_cooldown_secs: default_job_cooldown(),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the discovered URL list of each job
    #[serde(rename = "urls-dir")]
    pub urls_dir: String,
}

/// One city to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub city: String,

    /// State or region code, e.g. "IL"
    pub state: String,

    #[serde(rename = "start-price", default = "default_start_price")]
    pub start_price: u32,

    /// Exclusive upper bound of the band starts
    #[serde(rename = "end-price", default = "default_end_price")]
    pub end_price: u32,

    #[serde(rename = "price-step", default = "default_price_step")]
    pub price_step: u32,

    /// Last search-result page requested per band
    #[serde(rename = "max-page", default = "default_max_page")]
    pub max_page: u32,
}

fn default_site_url() -> String {
    "https://www.apartments.com".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_fetch_workers() -> u32 {
    1
}

fn default_parse_workers() -> u32 {
    4
}

fn default_pause_every() -> u64 {
    100
}

fn default_min_pause() -> u64 {
    15
}

fn default_max_pause() -> u64 {
    30
}

fn default_job_cooldown() -> u64 {
    500
}

fn default_start_price() -> u32 {
    500
}

fn default_end_price() -> u32 {
    6000
}

fn default_price_step() -> u32 {
    200
}

fn default_max_page() -> u32 {
    28
}
