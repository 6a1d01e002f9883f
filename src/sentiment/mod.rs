//! Best-effort sentiment with persisted fallback.
//!
//! A live provider is optional; its absence or failure degrades to the most
//! recent cached score rather than blocking the pipeline. Readings carry an
//! origin marker so callers can tell a live signal from a stale one.

pub mod store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
pub use store::{SentimentEntry, SentimentStore};

#[cfg(test)]
use mockall::automock;

/// A live sentiment score lookup. `Ok(None)` means the provider answered
/// but had nothing usable for the symbol.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SentimentFeed: Send + Sync {
    fn name(&self) -> &'static str;

    async fn score(&self, symbol: &str) -> Result<Option<f64>>;
}

/// Where a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentOrigin {
    Live,
    Cached,
}

/// A score plus its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReading {
    pub score: f64,
    pub origin: SentimentOrigin,
    pub observed_at: DateTime<Utc>,
}

pub struct SentimentMonitor {
    feed: Option<Arc<dyn SentimentFeed>>,
    store: SentimentStore,
}

impl SentimentMonitor {
    pub fn new(feed: Option<Arc<dyn SentimentFeed>>, store: SentimentStore) -> Self {
        Self { feed, store }
    }

    /// Fetch the current sentiment for a symbol.
    ///
    /// Live fetches write through to the cache before returning. Any live
    /// failure falls back to the cache silently (logged at warn); `None`
    /// only when neither live nor cache has a score.
    pub async fn get(&self, symbol: &str) -> Option<SentimentReading> {
        if let Some(feed) = &self.feed {
            match feed.score(symbol).await {
                Ok(Some(score)) => match self.store.put(symbol, score).await {
                    Ok(entry) => {
                        debug!(symbol, score, provider = feed.name(), "live sentiment");
                        return Some(SentimentReading {
                            score,
                            origin: SentimentOrigin::Live,
                            observed_at: entry.observed_at,
                        });
                    }
                    Err(e) => {
                        // The live score is still good even if persisting it failed.
                        warn!(symbol, error = %e, "failed to persist sentiment score");
                        return Some(SentimentReading {
                            score,
                            origin: SentimentOrigin::Live,
                            observed_at: Utc::now(),
                        });
                    }
                },
                Ok(None) => {
                    debug!(symbol, provider = feed.name(), "provider had no score, trying cache");
                }
                Err(e) => {
                    warn!(symbol, provider = feed.name(), error = %e, "live sentiment failed, trying cache");
                }
            }
        } else {
            debug!(symbol, "no sentiment provider configured, serving cache");
        }

        self.store.get(symbol).await.map(|entry| SentimentReading {
            score: entry.score,
            origin: SentimentOrigin::Cached,
            observed_at: entry.observed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TandemError;
    use std::path::PathBuf;

    fn scratch_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "tandem_monitor_{}_{}.json",
            tag,
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ))
    }

    #[tokio::test]
    async fn live_fetch_writes_through_to_cache() {
        let path = scratch_path("writethrough");
        let mut feed = MockSentimentFeed::new();
        feed.expect_name().return_const("mock");
        feed.expect_score().returning(|_| Ok(Some(71.5)));

        let monitor = SentimentMonitor::new(
            Some(Arc::new(feed)),
            SentimentStore::new(path.clone()),
        );

        let reading = monitor.get("BTC").await.expect("live score");
        assert_eq!(reading.score, 71.5);
        assert_eq!(reading.origin, SentimentOrigin::Live);

        // The score is now in the persisted cache
        let store = SentimentStore::new(path.clone());
        store.load().await.unwrap();
        assert_eq!(store.get("BTC").await.unwrap().score, 71.5);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn live_failure_falls_back_to_cache() {
        let path = scratch_path("fallback");
        let store = SentimentStore::new(path.clone());
        store.put("BTC", 64.0).await.unwrap();

        let mut feed = MockSentimentFeed::new();
        feed.expect_name().return_const("mock");
        feed.expect_score().returning(|_| {
            Err(TandemError::SourceUnavailable {
                provider: "mock".to_string(),
                reason: "HTTP 500".to_string(),
            })
        });

        let monitor = SentimentMonitor::new(Some(Arc::new(feed)), store);
        let reading = monitor.get("BTC").await.expect("cached score");
        assert_eq!(reading.score, 64.0);
        assert_eq!(reading.origin, SentimentOrigin::Cached);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn no_provider_serves_cache_without_error() {
        let path = scratch_path("noprov");
        let store = SentimentStore::new(path.clone());
        store.put("ETH", 50.0).await.unwrap();

        let monitor = SentimentMonitor::new(None, store);
        let reading = monitor.get("eth").await.expect("cached score");
        assert_eq!(reading.origin, SentimentOrigin::Cached);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn absent_everywhere_is_none() {
        let monitor = SentimentMonitor::new(None, SentimentStore::new(scratch_path("absent")));
        assert!(monitor.get("DOGE").await.is_none());
    }

    #[tokio::test]
    async fn provider_none_falls_back_to_cache() {
        let path = scratch_path("provnone");
        let store = SentimentStore::new(path.clone());
        store.put("SOL", 45.0).await.unwrap();

        let mut feed = MockSentimentFeed::new();
        feed.expect_name().return_const("mock");
        feed.expect_score().returning(|_| Ok(None));

        let monitor = SentimentMonitor::new(Some(Arc::new(feed)), store);
        let reading = monitor.get("SOL").await.expect("cached score");
        assert_eq!(reading.score, 45.0);
        assert_eq!(reading.origin, SentimentOrigin::Cached);

        let _ = std::fs::remove_file(path);
    }
}
