use clap::{Parser, Subcommand};
use tandem::cli;
use tandem::config::AppConfig;
use tandem::error::Result;
use tandem::risk::{Side, SizingMethod};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tandem",
    about = "Dual-source verified market data with LLM decision normalization"
)]
struct Cli {
    /// Configuration directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify consensus prices for symbols
    Verify {
        /// Symbols to verify, e.g. BTC,ETH
        #[arg(value_delimiter = ',', required = true)]
        symbols: Vec<String>,
    },
    /// Show sentiment for a symbol (live when configured, cached otherwise)
    Sentiment { symbol: String },
    /// Size a position against the configured risk profile
    Size {
        #[arg(long)]
        portfolio_value: f64,
        #[arg(long)]
        entry: f64,
        #[arg(long)]
        stop: f64,
        #[arg(long, default_value_t = 1.0)]
        confidence: f64,
        #[arg(long, default_value = "fixed_risk")]
        method: String,
        #[arg(long)]
        take_profit: Option<f64>,
    },
    /// Compute stop-loss / take-profit levels
    Levels {
        #[arg(long)]
        entry: f64,
        #[arg(long, default_value = "buy")]
        side: String,
        #[arg(long)]
        atr: Option<f64>,
    },
    /// Assess portfolio risk from SYMBOL=PERCENT pairs
    Assess {
        /// e.g. BTC=30,ETH=25,ADA=10
        positions: String,
    },
    /// Run one full analysis cycle
    Cycle {
        /// Symbols to analyze, e.g. BTC,ETH
        #[arg(value_delimiter = ',', required = true)]
        symbols: Vec<String>,
        #[arg(long)]
        portfolio_value: f64,
        /// Current book as SYMBOL=PERCENT pairs
        #[arg(long)]
        positions: Option<String>,
        #[arg(long, default_value = "fixed_risk")]
        method: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config_dir)?;
    if let Err(problems) = config.validate() {
        for problem in &problems {
            error!("config: {problem}");
        }
        return Err(tandem::error::TandemError::InvalidInput(format!(
            "invalid configuration ({} problems)",
            problems.len()
        )));
    }

    match cli.command {
        Commands::Verify { symbols } => cli::verify_prices(&config, &symbols).await,
        Commands::Sentiment { symbol } => cli::show_sentiment(&config, &symbol).await,
        Commands::Size {
            portfolio_value,
            entry,
            stop,
            confidence,
            method,
            take_profit,
        } => {
            let method: SizingMethod = method.parse()?;
            cli::size_position(
                &config,
                portfolio_value,
                entry,
                stop,
                confidence,
                method,
                take_profit,
            )
        }
        Commands::Levels { entry, side, atr } => {
            let side: Side = side
                .parse()
                .map_err(|e: &str| tandem::error::TandemError::InvalidInput(e.to_string()))?;
            cli::show_levels(&config, entry, side, atr)
        }
        Commands::Assess { positions } => cli::assess_portfolio(&config, &positions),
        Commands::Cycle {
            symbols,
            portfolio_value,
            positions,
            method,
        } => {
            let method: SizingMethod = method.parse()?;
            cli::run_cycle(
                &config,
                &symbols,
                portfolio_value,
                positions.as_deref(),
                method,
            )
            .await
        }
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tandem=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
