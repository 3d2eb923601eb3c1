//! Enrichment request construction.

use reqwest::Url;

use crate::config::EnrichmentConfig;

use super::EnrichmentError;

/// Build the status query for `address` against the configured service.
///
/// The path is `servlet` path + `status_path`; the query carries the subject
/// address plus the fixed parameters, encoded in sorted key order.
pub fn build_request_url(
    config: &EnrichmentConfig,
    address: &str,
) -> Result<String, EnrichmentError> {
    let mut url = Url::parse(&config.servlet).map_err(|e| EnrichmentError::InvalidEndpoint {
        endpoint: config.servlet.clone(),
        reason: e.to_string(),
    })?;

    if !config.status_path.is_empty() {
        let base = url.path().trim_end_matches('/').to_string();
        let sub = config.status_path.trim_start_matches('/');
        url.set_path(&format!("{}/{}", base, sub));
    }

    // Keys in sorted order.
    let params = [
        ("adset", config.adset.as_str()),
        ("email", ""),
        ("href", config.referer.as_str()),
        ("start", "1"),
        ("transcript", "true"),
        ("tx", "1"),
        ("url", address),
    ];

    let query = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    url.set_query(Some(&query));

    Ok(url.to_string())
}
