//! Enrichment submission and response reconciliation.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::EnrichmentConfig;
use crate::ledger::{ItemLedger, UpdateOutcome};
use crate::metrics;
use crate::status::{StatusCatalog, StatusId};
use crate::transport::Transport;

use super::{build_request_url, EnrichmentError};

/// How many payload characters are kept in error messages.
const PAYLOAD_PREVIEW_CHARS: usize = 200;

/// Parsed enrichment response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentResponse {
    /// Response body, stored verbatim on the ledger row.
    pub payload: String,
    /// Top-level `status` field.
    pub status_label: String,
}

/// Outcome of reconciling a response against the catalog and ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub status: StatusId,
    /// False once the item reached a terminal status.
    pub pending: bool,
    pub update: UpdateOutcome,
}

/// Client for the external enrichment service.
pub struct EnrichmentClient {
    transport: Arc<dyn Transport>,
    config: EnrichmentConfig,
    catalog: Arc<StatusCatalog>,
    ledger: Arc<dyn ItemLedger>,
}

impl std::fmt::Debug for EnrichmentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentClient")
            .field("servlet", &self.config.servlet)
            .field("status_path", &self.config.status_path)
            .finish()
    }
}

impl EnrichmentClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: EnrichmentConfig,
        catalog: Arc<StatusCatalog>,
        ledger: Arc<dyn ItemLedger>,
    ) -> Self {
        Self {
            transport,
            config,
            catalog,
            ledger,
        }
    }

    /// Build the request URL for `address`.
    pub fn build_request(&self, address: &str) -> Result<String, EnrichmentError> {
        let url = build_request_url(&self.config, address)?;
        info!(url = %url, "Encoded enrichment URL");
        Ok(url)
    }

    /// Issue the request and extract the top-level `status` label.
    pub async fn submit_and_parse(
        &self,
        request_url: &str,
    ) -> Result<EnrichmentResponse, EnrichmentError> {
        let response = self.transport.get(request_url).await.map_err(|e| {
            metrics::ENRICHMENT_REQUESTS
                .with_label_values(&["request_failed"])
                .inc();
            EnrichmentError::RequestFailed(e.to_string())
        })?;

        info!(
            status = response.status,
            length = ?response.content_length,
            "Enrichment response received"
        );

        let payload = response.text();

        if !response.is_success() {
            metrics::ENRICHMENT_REQUESTS
                .with_label_values(&["request_failed"])
                .inc();
            return Err(EnrichmentError::RequestFailed(format!(
                "HTTP {}: {}",
                response.status,
                preview(&payload)
            )));
        }

        match parse_status(&payload) {
            Ok(status_label) => {
                metrics::ENRICHMENT_REQUESTS.with_label_values(&["ok"]).inc();
                debug!(status = %status_label, "Parsed enrichment status");
                Ok(EnrichmentResponse {
                    payload,
                    status_label,
                })
            }
            Err(reason) => {
                metrics::ENRICHMENT_REQUESTS
                    .with_label_values(&["malformed"])
                    .inc();
                warn!(reason = %reason, payload = %preview(&payload), "Malformed enrichment response");
                Err(EnrichmentError::malformed(reason, payload))
            }
        }
    }

    /// Record the response on the ledger row for `address`.
    ///
    /// Unseen labels are added to the catalog as pending.
    pub fn reconcile(
        &self,
        address: &str,
        response: &EnrichmentResponse,
    ) -> Result<Reconciled, EnrichmentError> {
        let status = self.catalog.ensure(&response.status_label, true)?;
        let update = self
            .ledger
            .update_payload_and_status(address, &response.payload, status)?;
        let pending = self.catalog.is_pending(status)?;

        info!(
            address = %address,
            status = %response.status_label,
            pending = pending,
            "Reconciled enrichment status"
        );

        Ok(Reconciled {
            status,
            pending,
            update,
        })
    }

    /// Build, submit and reconcile in one step.
    pub async fn enrich(&self, address: &str) -> Result<Reconciled, EnrichmentError> {
        let request_url = self.build_request(address)?;
        let response = self.submit_and_parse(&request_url).await?;
        self.reconcile(address, &response)
    }
}

fn parse_status(payload: &str) -> Result<String, String> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| format!("not valid JSON: {}", e))?;

    match value.get("status") {
        Some(Value::String(label)) => Ok(label.clone()),
        Some(other) => Err(format!("\"status\" is not a string: {}", other)),
        None => Err("missing \"status\" field".to_string()),
    }
}

fn preview(payload: &str) -> String {
    payload.chars().take(PAYLOAD_PREVIEW_CHARS).collect()
}
