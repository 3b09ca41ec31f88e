use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::exchange::{PaperSettings, VenueSettings};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub trader: TraderConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub ladder: LadderConfig,
    /// Simulated venue, used when `trader.exchange` is "paper"
    #[serde(default)]
    pub paper: Option<PaperSettings>,
    /// Venues added to (or replacing) the built-in registry
    #[serde(default)]
    pub venues: Vec<VenueSettings>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraderConfig {
    /// Venue slug in the registry
    pub exchange: String,
    /// Quote currency, e.g. "USD"
    pub currency: String,
    /// Traded asset, e.g. "BTC"
    pub asset: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Wait between submission and the fill check
    #[serde(default = "default_fill_check_delay_secs")]
    pub fill_check_delay_secs: u64,
    /// Wait between cancelling an unfilled order and resubmitting
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Attempts for a fill check or cancel before giving up on the venue
    #[serde(default = "default_adapter_retry_limit")]
    pub adapter_retry_limit: u32,
    #[serde(default = "default_adapter_retry_delay_ms")]
    pub adapter_retry_delay_ms: u64,
    /// Cap on resubmissions per signal; unbounded when unset
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Run sibling tiers' refresh/validate/submit one at a time
    #[serde(default = "default_serialize_attempts")]
    pub serialize_attempts: bool,
}

fn default_fill_check_delay_secs() -> u64 {
    60
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_adapter_retry_limit() -> u32 {
    3
}

fn default_adapter_retry_delay_ms() -> u64 {
    1000
}

fn default_serialize_attempts() -> bool {
    true
}

impl ExecutionConfig {
    pub fn fill_check_delay(&self) -> Duration {
        Duration::from_secs(self.fill_check_delay_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn adapter_retry_delay(&self) -> Duration {
        Duration::from_millis(self.adapter_retry_delay_ms)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            fill_check_delay_secs: default_fill_check_delay_secs(),
            retry_delay_ms: default_retry_delay_ms(),
            adapter_retry_limit: default_adapter_retry_limit(),
            adapter_retry_delay_ms: default_adapter_retry_delay_ms(),
            max_retries: None,
            serialize_attempts: default_serialize_attempts(),
        }
    }
}

/// Order sizing policy
#[derive(Debug, Clone, Deserialize)]
pub struct SizingConfig {
    /// Amount per order on regular venues
    #[serde(default = "default_fixed_amount")]
    pub fixed_amount: Decimal,
    /// Amount per order on infinity-order venues
    #[serde(default = "default_infinity_amount")]
    pub infinity_amount: Decimal,
}

fn default_fixed_amount() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_infinity_amount() -> Decimal {
    Decimal::from(10_000)
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            fixed_amount: default_fixed_amount(),
            infinity_amount: default_infinity_amount(),
        }
    }
}

/// Price ladder offsets
#[derive(Debug, Clone, Deserialize)]
pub struct LadderConfig {
    /// Distance below the ask for tiers 1, 2 and 3
    #[serde(default = "default_tier_offsets")]
    pub tier_offsets: [Decimal; 3],
    /// Sell price markup over the same tier's buy price
    #[serde(default = "default_sell_spread")]
    pub sell_spread: Decimal,
}

fn default_tier_offsets() -> [Decimal; 3] {
    [Decimal::from(4), Decimal::from(8), Decimal::from(12)]
}

fn default_sell_spread() -> Decimal {
    Decimal::from(4)
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            tier_offsets: default_tier_offsets(),
            sell_spread: default_sell_spread(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "tiertrader=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the `config` directory
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    ///
    /// Sources, later ones winning: `default.toml`, `$TIERTRADER_ENV.toml`,
    /// then `TIERTRADER_<SECTION>__<KEY>` environment variables.
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let env_name =
            std::env::var("TIERTRADER_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = Config::builder()
            .set_default("trader.exchange", "paper")?
            .set_default("trader.currency", "USD")?
            .set_default("trader.asset", "BTC")?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env_name))).required(false))
            .add_source(
                Environment::with_prefix("TIERTRADER")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(raw, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
