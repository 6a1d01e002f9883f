//! LunarCrush social sentiment adapter.
//!
//! The v2 assets payload is not schema-stable across plans and versions, so
//! score extraction tolerates several field spellings and returns `None`
//! instead of failing when the shape is unrecognized.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::http::{build_client, fetch_json};
use crate::error::Result;
use crate::sentiment::SentimentFeed;

const DEFAULT_LUNARCRUSH_API_BASE: &str = "https://api.lunarcrush.com";
const FETCH_ATTEMPTS: u32 = 3;
const SOURCE: &str = "lunarcrush";

/// Field names accepted for the sentiment score, tried in order.
const SCORE_FIELDS: &[&str] = &["galaxy_score", "sentiment_score", "score", "sentiment"];

#[derive(Clone)]
pub struct LunarCrushFeed {
    http: Client,
    base_url: String,
    api_key: String,
}

impl LunarCrushFeed {
    pub fn new(api_key: &str, base_url: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let base_url = base_url
            .unwrap_or(DEFAULT_LUNARCRUSH_API_BASE)
            .trim_end_matches('/')
            .to_string();
        let http = build_client("tandem-sentiment-adapter/0.1", timeout_secs)?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    /// Pull a score out of the assets payload, or `None` when the shape is
    /// unrecognized. Numbers and numeric strings both count.
    fn extract_score(value: &Value) -> Option<f64> {
        let asset = value.get("data")?.as_array()?.first()?.as_object()?;

        for field in SCORE_FIELDS {
            if let Some(raw) = asset.get(*field) {
                if let Some(score) = raw.as_f64() {
                    return Some(score);
                }
                if let Some(score) = raw.as_str().and_then(|s| s.trim().parse::<f64>().ok()) {
                    return Some(score);
                }
            }
        }

        None
    }
}

#[async_trait]
impl SentimentFeed for LunarCrushFeed {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn score(&self, symbol: &str) -> Result<Option<f64>> {
        let url = format!(
            "{}/v2?data=assets&symbol={}&key={}",
            self.base_url,
            symbol.trim().to_uppercase(),
            self.api_key
        );

        let value = fetch_json(&self.http, SOURCE, &url, FETCH_ATTEMPTS).await?;
        let score = Self::extract_score(&value);
        debug!(symbol, ?score, "sentiment fetch");
        Ok(score)
    }
}
