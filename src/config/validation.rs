use crate::config::types::{Config, FetcherConfig, JobConfig, PolitenessConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetcher_config(&config.fetcher)?;
    validate_politeness_config(&config.politeness)?;

    if config.store.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.output.urls_dir.is_empty() {
        return Err(ConfigError::Validation(
            "urls_dir cannot be empty".to_string(),
        ));
    }

    if config.jobs.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[job]] entry is required".to_string(),
        ));
    }

    for job in &config.jobs {
        validate_job(job)?;
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    let site = Url::parse(&config.site_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid site_url: {}", e)))?;

    if site.scheme() != "http" && site.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "site_url must use http or https, got '{}'",
            config.site_url
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.fetch_workers < 1 || config.fetch_workers > 16 {
        return Err(ConfigError::Validation(format!(
            "fetch_workers must be between 1 and 16, got {}",
            config.fetch_workers
        )));
    }

    if config.parse_workers < 1 {
        return Err(ConfigError::Validation(format!(
            "parse_workers must be >= 1, got {}",
            config.parse_workers
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the pause policy
fn validate_politeness_config(config: &PolitenessConfig) -> Result<(), ConfigError> {
    if config.pause_every < 1 {
        return Err(ConfigError::Validation(
            "pause_every must be >= 1".to_string(),
        ));
    }

    if config.min_pause_secs > config.max_pause_secs {
        return Err(ConfigError::Validation(format!(
            "min_pause_secs ({}) cannot exceed max_pause_secs ({})",
            config.min_pause_secs, config.max_pause_secs
        )));
    }

    Ok(())
}

/// Validates a single job entry
fn validate_job(job: &JobConfig) -> Result<(), ConfigError> {
    if job.city.trim().is_empty() {
        return Err(ConfigError::Validation("job city cannot be empty".to_string()));
    }

    if job.state.is_empty() || !job.state.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConfigError::Validation(format!(
            "job state must be an alphabetic region code, got '{}'",
            job.state
        )));
    }

    if job.price_step == 0 {
        return Err(ConfigError::Validation(format!(
            "price_step for '{}' must be >= 1",
            job.city
        )));
    }

    if job.start_price >= job.end_price {
        return Err(ConfigError::Validation(format!(
            "start_price ({}) must be below end_price ({}) for '{}'",
            job.start_price, job.end_price, job.city
        )));
    }

    if job.max_page == 0 {
        return Err(ConfigError::Validation(format!(
            "max_page for '{}' must be >= 1",
            job.city
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(city: &str, state: &str) -> JobConfig {
        JobConfig {
            city: city.to_string(),
            state: state.to_string(),
            start_price: 500,
            end_price: 6000,
            price_step: 200,
            max_page: 28,
        }
    }

    #[test]
    fn test_validate_job() {
        assert!(validate_job(&job("Chicago", "IL")).is_ok());
        assert!(validate_job(&job("", "IL")).is_err());
        assert!(validate_job(&job("Chicago", "")).is_err());
        assert!(validate_job(&job("Chicago", "I1")).is_err());

        let mut inverted = job("Chicago", "IL");
        inverted.start_price = 6000;
        assert!(validate_job(&inverted).is_err());

        let mut no_pages = job("Chicago", "IL");
        no_pages.max_page = 0;
        assert!(validate_job(&no_pages).is_err());
    }

    #[test]
    fn test_validate_fetcher_config() {
        assert!(validate_fetcher_config(&FetcherConfig::default()).is_ok());

        let mut bad_site = FetcherConfig::default();
        bad_site.site_url = "ftp://example.com".to_string();
        assert!(matches!(
            validate_fetcher_config(&bad_site),
            Err(ConfigError::InvalidUrl(_))
        ));

        let mut too_many = FetcherConfig::default();
        too_many.fetch_workers = 17;
        assert!(validate_fetcher_config(&too_many).is_err());

        let mut no_parsers = FetcherConfig::default();
        no_parsers.parse_workers = 0;
        assert!(validate_fetcher_config(&no_parsers).is_err());
    }

    #[test]
    fn test_validate_politeness_config() {
        assert!(validate_politeness_config(&PolitenessConfig::default()).is_ok());

        let mut inverted = PolitenessConfig::default();
        inverted.min_pause_secs = 40;
        assert!(validate_politeness_config(&inverted).is_err());

        let mut never = PolitenessConfig::default();
        never.pause_every = 0;
        assert!(validate_politeness_config(&never).is_err());
    }
}
