use thiserror::Error;

/// Main error type for the verification and decision engine
#[derive(Error, Debug)]
pub enum TandemError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Price verification errors
    #[error("Source unavailable: {provider} - {reason}")]
    SourceUnavailable { provider: String, reason: String },

    #[error(
        "Price mismatch for {symbol}: {price_a} vs {price_b} \
         (divergence {divergence:.4} > tolerance {tolerance:.4})"
    )]
    PriceMismatch {
        symbol: String,
        price_a: f64,
        price_b: f64,
        divergence: f64,
        tolerance: f64,
    },

    #[error("Invalid average price for {symbol}: {average}")]
    InvalidAverage { symbol: String, average: f64 },

    // Risk sizing errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Decision normalization errors
    #[error("Decision parse failure: {0}")]
    DecisionParse(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for TandemError
pub type Result<T> = std::result::Result<T, TandemError>;

impl TandemError {
    /// Errors that mean a price cannot be trusted and the symbol must be
    /// skipped, as opposed to plumbing failures worth surfacing to the
    /// operator directly.
    pub fn is_price_rejection(&self) -> bool {
        matches!(
            self,
            TandemError::PriceMismatch { .. }
                | TandemError::InvalidAverage { .. }
                | TandemError::SourceUnavailable { .. }
        )
    }
}
