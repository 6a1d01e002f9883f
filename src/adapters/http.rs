//! Shared retrying HTTP plumbing for the read-only data adapters.
//!
//! Transient transport failures and 5xx answers are retried with exponential
//! backoff; exhausting the attempts maps to `SourceUnavailable` so callers
//! can treat a flaky source and a down source identically.

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Result, TandemError};

const BASE_BACKOFF_MS: u64 = 500;

/// Build an HTTP client with a bounded per-request timeout.
pub(crate) fn build_client(user_agent: &str, timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| TandemError::Internal(format!("failed to build HTTP client: {}", e)))
}

/// GET a JSON document, retrying transient failures.
///
/// `source` labels the upstream in logs and errors; the URL itself is kept
/// out of error text since it may embed credentials.
pub(crate) async fn fetch_json(
    client: &Client,
    source: &str,
    url: &str,
    attempts: u32,
) -> Result<Value> {
    let mut last_reason = String::new();

    for attempt in 0..attempts.max(1) {
        if attempt > 0 {
            let backoff = BASE_BACKOFF_MS * (1u64 << (attempt - 1));
            sleep(Duration::from_millis(backoff)).await;
        }

        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    match response.json::<Value>().await {
                        Ok(value) => {
                            debug!(source, attempt, "fetched payload");
                            return Ok(value);
                        }
                        Err(e) => {
                            last_reason = format!("body was not JSON: {}", e);
                        }
                    }
                } else {
                    last_reason = format!("HTTP {}", status);
                    // 4xx will not get better on retry
                    if status.is_client_error() {
                        break;
                    }
                }
            }
            Err(e) => {
                last_reason = e.to_string();
            }
        }

        warn!(source, attempt, reason = %last_reason, "fetch attempt failed");
    }

    Err(TandemError::SourceUnavailable {
        provider: source.to_string(),
        reason: last_reason,
    })
}

/// Summarize an unexpected payload for error messages without dumping
/// arbitrarily large bodies into logs.
pub(crate) fn payload_summary(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() > 200 {
        let head: String = rendered.chars().take(200).collect();
        format!("{}…", head)
    } else {
        rendered
    }
}
