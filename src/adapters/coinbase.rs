//! Coinbase Exchange ticker adapter (source B).

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::http::{build_client, fetch_json, payload_summary};
use crate::domain::PriceVenue;
use crate::error::{Result, TandemError};
use crate::guard::SpotSource;

const DEFAULT_COINBASE_API_BASE: &str = "https://api.exchange.coinbase.com";
const FETCH_ATTEMPTS: u32 = 3;

#[derive(Debug, Deserialize)]
struct TickerResponse {
    price: Decimal,
}

#[derive(Clone)]
pub struct CoinbaseSpot {
    http: Client,
    base_url: String,
}

impl CoinbaseSpot {
    pub fn new(base_url: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let base_url = base_url
            .unwrap_or(DEFAULT_COINBASE_API_BASE)
            .trim_end_matches('/')
            .to_string();
        let http = build_client("tandem-coinbase-adapter/0.1", timeout_secs)?;

        Ok(Self { http, base_url })
    }

    /// Map a bare asset symbol to the Coinbase USD product, e.g. `btc` → `BTC-USD`.
    fn product(symbol: &str) -> String {
        format!("{}-USD", symbol.trim().to_uppercase())
    }

    fn parse_ticker(value: &Value) -> Result<f64> {
        let ticker: TickerResponse =
            serde_json::from_value(value.clone()).map_err(|_| TandemError::SourceUnavailable {
                provider: PriceVenue::Coinbase.as_str().to_string(),
                reason: format!("bad payload: {}", payload_summary(value)),
            })?;

        ticker
            .price
            .to_f64()
            .ok_or_else(|| TandemError::SourceUnavailable {
                provider: PriceVenue::Coinbase.as_str().to_string(),
                reason: format!("price not representable: {}", ticker.price),
            })
    }
}

#[async_trait]
impl SpotSource for CoinbaseSpot {
    fn venue(&self) -> PriceVenue {
        PriceVenue::Coinbase
    }

    async fn spot_price(&self, symbol: &str) -> Result<f64> {
        let url = format!(
            "{}/products/{}/ticker",
            self.base_url,
            Self::product(symbol)
        );

        let value = fetch_json(
            &self.http,
            PriceVenue::Coinbase.as_str(),
            &url,
            FETCH_ATTEMPTS,
        )
        .await?;
        let price = Self::parse_ticker(&value)?;
        debug!(symbol, price, "coinbase spot");
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_mapping_uppercases_and_suffixes() {
        assert_eq!(CoinbaseSpot::product("btc"), "BTC-USD");
        assert_eq!(CoinbaseSpot::product(" sol "), "SOL-USD");
    }

    #[test]
    fn ticker_with_extra_fields_parses() {
        let value = json!({
            "trade_id": 86326522,
            "price": "67000.01",
            "size": "0.00698254",
            "bid": "66999.99",
            "ask": "67000.01",
            "volume": "12345.6"
        });
        let price = CoinbaseSpot::parse_ticker(&value).unwrap();
        assert!((price - 67_000.01).abs() < 1e-9);
    }

    #[test]
    fn error_payload_is_unavailable() {
        let value = json!({"message": "NotFound"});
        let err = CoinbaseSpot::parse_ticker(&value).unwrap_err();
        assert!(matches!(err, TandemError::SourceUnavailable { .. }));
    }
}
