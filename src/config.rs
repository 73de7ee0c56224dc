use std::fs;
use std::path::Path;
use std::time::Duration;

use log::info;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::exchanges::adapter::ExchangeAdapter;

/// Base coin used when the config does not name one.
pub const DEFAULT_BASE_COIN: &str = "BTC";

/// Exchange used when the config does not name one.
pub const DEFAULT_EXCHANGE: &str = "binance";

/// Seconds between two poll cycles of the same endpoint.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Capacity of the bounded ticker queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// This is the top-level configuration structure loaded from
// `config.json`.
//
// It defines:
// - The portfolio of coins to track
// - The base coin every pair is quoted against
// - Which exchange to poll and how often
//
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Coins to track, with held quantities
    pub portfolio: Vec<Holding>,

    /// Base coin of every pair (defaults to "BTC")
    pub base_coin: Option<String>,

    /// Exchange identifier (defaults to "binance")
    pub exchange: Option<String>,

    /// Seconds between poll cycles (defaults to 2, must be positive)
    pub poll_interval_secs: Option<u64>,

    /// Ticker queue capacity (defaults to 128, must be positive)
    pub queue_capacity: Option<usize>,
}

// ------------------------------------------------------------
// Portfolio entry
// ------------------------------------------------------------
//
// One tracked coin. The quantity is informational: it is printed
// at startup and lets downstream consumers value the position.
//
// IMPORTANT:
// - `coin` is the exchange-agnostic asset name ("ETH", "LTC").
//   Each exchange adapter converts it into that venue's pair
//   symbol format.
// - `quantity` must be a JSON number. A quoted "2.42" is a config
//   error and aborts startup.
//
#[derive(Debug, Deserialize, Clone)]
pub struct Holding {
    /// Asset name, e.g. "ETH"
    pub coin: String,

    /// Held amount of the asset
    pub quantity: f64,
}

/// One endpoint the poll manager should schedule: the pair symbol
/// used for log labels plus the fully built request URL.
#[derive(Debug, Clone)]
pub struct PollTarget {
    pub symbol: String,
    pub url: String,
}

impl Config {
    /// Reads and validates the configuration file.
    ///
    /// Any failure here is fatal: an unreadable file, broken JSON,
    /// or an empty portfolio all abort startup.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        if config.base_coin.is_none() {
            info!("no base_coin in config, defaulting to {DEFAULT_BASE_COIN}");
        }
        if config.exchange.is_none() {
            info!("no exchange in config, defaulting to {DEFAULT_EXCHANGE}");
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.portfolio.is_empty() {
            return Err(ConfigError::EmptyPortfolio);
        }
        if self.poll_interval_secs == Some(0) {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }

    pub fn base_coin(&self) -> &str {
        self.base_coin.as_deref().unwrap_or(DEFAULT_BASE_COIN)
    }

    pub fn exchange(&self) -> &str {
        self.exchange.as_deref().unwrap_or(DEFAULT_EXCHANGE)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS))
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY)
    }

    /// Builds one poll target per portfolio coin, using the adapter
    /// to produce the venue's pair symbol and ticker URL.
    pub fn poll_targets(&self, adapter: &dyn ExchangeAdapter) -> Vec<PollTarget> {
        self.portfolio
            .iter()
            .map(|holding| PollTarget {
                symbol: adapter.pair_symbol(&holding.coin, self.base_coin()),
                url: adapter.ticker_url(&holding.coin, self.base_coin()),
            })
            .collect()
    }
}
