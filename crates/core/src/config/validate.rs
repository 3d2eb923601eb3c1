use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Feed URL and enrichment servlet are http(s) URLs
/// - Request timeout is not 0
/// - Pipeline concurrency is not 0 and the initial status is named
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if !is_http_url(&config.feed.url) {
        return Err(ConfigError::ValidationError(format!(
            "feed.url must be an http(s) URL, got {:?}",
            config.feed.url
        )));
    }

    if config.feed.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "feed.timeout_secs cannot be 0".to_string(),
        ));
    }

    if !is_http_url(&config.enrichment.servlet) {
        return Err(ConfigError::ValidationError(format!(
            "enrichment.servlet must be an http(s) URL, got {:?}",
            config.enrichment.servlet
        )));
    }

    if config.pipeline.max_concurrent_items == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.max_concurrent_items cannot be 0".to_string(),
        ));
    }

    if config.pipeline.initial_status.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "pipeline.initial_status cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn is_http_url(value: &str) -> bool {
    match reqwest::Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DatabaseConfig, EnrichmentConfig, FeedConfig, PipelineConfig, StorageConfig,
    };

    fn valid_config() -> Config {
        Config {
            feed: FeedConfig {
                url: "http://feeds.example.com/radio.xml".to_string(),
                timeout_secs: 30,
            },
            enrichment: EnrichmentConfig {
                servlet: "http://api.example.com".to_string(),
                status_path: "/stream-status".to_string(),
                referer: String::new(),
                adset: String::new(),
            },
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_bad_feed_url_fails() {
        let mut config = valid_config();
        config.feed.url = "not a url".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_non_http_servlet_fails() {
        let mut config = valid_config();
        config.enrichment.servlet = "ftp://api.example.com".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let mut config = valid_config();
        config.feed.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_concurrency_fails() {
        let mut config = valid_config();
        config.pipeline.max_concurrent_items = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_blank_initial_status_fails() {
        let mut config = valid_config();
        config.pipeline.initial_status = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }
}
