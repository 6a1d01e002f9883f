use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::MatchPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub price_guard: PriceGuardConfig,
    #[serde(default)]
    pub sentiment: SentimentConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub risk: RiskProfile,
    #[serde(default)]
    pub portfolio: PortfolioConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceGuardConfig {
    /// Maximum relative divergence between the two sources (e.g. 0.005 = 0.5%).
    /// Deployment-wide; there is no per-call override.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Override for the Binance REST base URL (tests, mirrors)
    #[serde(default)]
    pub binance_url: Option<String>,
    /// Override for the Coinbase Exchange REST base URL
    #[serde(default)]
    pub coinbase_url: Option<String>,
    /// Per-request timeout for price fetches
    #[serde(default = "default_price_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_tolerance() -> f64 {
    0.005
}

fn default_price_timeout_secs() -> u64 {
    8
}

impl Default for PriceGuardConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            binance_url: None,
            coinbase_url: None,
            timeout_secs: default_price_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentimentConfig {
    /// Provider API key. Absent means "skip live fetches, serve the cache".
    #[serde(default)]
    pub api_key: Option<String>,
    /// Override for the provider base URL
    #[serde(default)]
    pub base_url: Option<String>,
    /// Path of the persisted score cache
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default = "default_sentiment_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("data/sentiment_cache.json")
}

fn default_sentiment_timeout_secs() -> u64 {
    10
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            cache_path: default_cache_path(),
            timeout_secs: default_sentiment_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionConfig {
    /// Decision model endpoint. Absent is not an error: the engine degrades
    /// to a zero-confidence HOLD per symbol.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_decision_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_decision_retries")]
    pub max_retries: u8,
    /// Strict drops model decisions that match no requested symbol;
    /// lenient substitutes the first valid decision.
    #[serde(default)]
    pub match_policy: MatchPolicy,
}

fn default_decision_timeout_secs() -> u64 {
    20
}

fn default_decision_retries() -> u8 {
    2
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            timeout_secs: default_decision_timeout_secs(),
            max_retries: default_decision_retries(),
            match_policy: MatchPolicy::default(),
        }
    }
}

/// Risk parameters for position sizing. Immutable for the lifetime of a
/// sizing run; every fraction lives in (0, 1].
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RiskProfile {
    /// Hard ceiling on a single position as a fraction of the portfolio
    #[serde(default = "default_max_position_fraction")]
    pub max_position_fraction: f64,
    /// Portfolio fraction risked per trade
    #[serde(default = "default_risk_per_trade_fraction")]
    pub risk_per_trade_fraction: f64,
    /// Maximum tolerated drawdown
    #[serde(default = "default_max_drawdown_fraction")]
    pub max_drawdown_fraction: f64,
}

fn default_max_position_fraction() -> f64 {
    0.10
}

fn default_risk_per_trade_fraction() -> f64 {
    0.02
}

fn default_max_drawdown_fraction() -> f64 {
    0.15
}

impl Default for RiskProfile {
    fn default() -> Self {
        Self {
            max_position_fraction: default_max_position_fraction(),
            risk_per_trade_fraction: default_risk_per_trade_fraction(),
            max_drawdown_fraction: default_max_drawdown_fraction(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioConfig {
    /// Quote currency excluded from exposure sums
    #[serde(default = "default_quote_symbol")]
    pub quote_symbol: String,
    /// Assumed pairwise correlation between crypto positions, applied as an
    /// exposure adjustment when set (e.g. 0.7)
    #[serde(default)]
    pub assumed_correlation: Option<f64>,
}

fn default_quote_symbol() -> String {
    "USD".to_string()
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            quote_symbol: default_quote_symbol(),
            assumed_correlation: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g. config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TANDEM_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (TANDEM_DECISION__ENDPOINT_URL, etc.)
            .add_source(
                Environment::with_prefix("TANDEM")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.price_guard.tolerance <= 0.0 || !self.price_guard.tolerance.is_finite() {
            errors.push("price_guard.tolerance must be a positive finite number".to_string());
        }
        if self.price_guard.tolerance >= 0.5 {
            errors.push(format!(
                "price_guard.tolerance {} is implausibly wide; expected on the order of 0.005",
                self.price_guard.tolerance
            ));
        }

        for (name, value) in [
            (
                "risk.max_position_fraction",
                self.risk.max_position_fraction,
            ),
            (
                "risk.risk_per_trade_fraction",
                self.risk.risk_per_trade_fraction,
            ),
            (
                "risk.max_drawdown_fraction",
                self.risk.max_drawdown_fraction,
            ),
        ] {
            if value <= 0.0 || value > 1.0 || !value.is_finite() {
                errors.push(format!("{name} must be in (0, 1], got {value}"));
            }
        }

        if let Some(rho) = self.portfolio.assumed_correlation {
            if !(0.0..=1.0).contains(&rho) {
                errors.push(format!(
                    "portfolio.assumed_correlation must be in [0, 1], got {rho}"
                ));
            }
        }

        if self.decision.timeout_secs == 0 {
            errors.push("decision.timeout_secs must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            price_guard: PriceGuardConfig::default(),
            sentiment: SentimentConfig::default(),
            decision: DecisionConfig::default(),
            risk: RiskProfile::default(),
            portfolio: PortfolioConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.price_guard.tolerance, 0.005);
        assert_eq!(cfg.risk.max_position_fraction, 0.10);
        assert_eq!(cfg.risk.risk_per_trade_fraction, 0.02);
        assert!(cfg.decision.endpoint_url.is_none());
    }

    #[test]
    fn out_of_range_fractions_are_rejected() {
        let mut cfg = AppConfig::default();
        cfg.risk.max_position_fraction = 1.5;
        cfg.risk.risk_per_trade_fraction = 0.0;
        let errors = cfg.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn implausible_tolerance_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.price_guard.tolerance = 0.9;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_correlation_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.portfolio.assumed_correlation = Some(1.3);
        assert!(cfg.validate().is_err());
    }
}
