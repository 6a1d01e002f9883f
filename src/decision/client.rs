//! HTTP client for the external decision endpoint.
//!
//! The endpoint receives the serialized context and answers with whatever it
//! likes: structured JSON, JSON buried in prose, or free text. This client
//! only moves bytes; interpretation belongs to the normalizer.

use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::context::DecisionContext;
use crate::adapters::http::build_client;
use crate::error::{Result, TandemError};

const SOURCE: &str = "decision-endpoint";
const RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct DecisionClient {
    http: Client,
    endpoint: String,
    max_retries: u8,
}

impl DecisionClient {
    pub fn new(endpoint: &str, timeout_secs: u64, max_retries: u8) -> Result<Self> {
        Ok(Self {
            http: build_client("tandem-decision-client/0.1", timeout_secs)?,
            endpoint: endpoint.to_string(),
            max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST the context and return the raw response body.
    pub async fn request(&self, context: &DecisionContext) -> Result<String> {
        let payload = json!({ "context": serde_json::to_string(context)? });

        let attempts = self.max_retries.max(1);
        let mut last_reason = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                sleep(RETRY_DELAY).await;
            }

            match self.http.post(&self.endpoint).json(&payload).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response.text().await.map_err(TandemError::Http)?;
                        debug!(attempt, bytes = body.len(), "decision endpoint answered");
                        return Ok(body);
                    }
                    last_reason = format!("HTTP {}", status);
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) => {
                    last_reason = e.to_string();
                }
            }

            warn!(attempt, reason = %last_reason, "decision endpoint attempt failed");
        }

        Err(TandemError::SourceUnavailable {
            provider: SOURCE.to_string(),
            reason: last_reason,
        })
    }
}
