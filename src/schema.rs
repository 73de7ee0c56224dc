use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// Canonical 24h ticker record produced by every exchange adapter.
///
/// This is the single shape handed from the polling side to the
/// consuming side of the program:
/// - Exchange adapters (Binance, Kucoin, ...) normalize into it
/// - The bounded ticker queue carries it across threads
/// - Downstream consumers (display, storage) read it
///
/// DESIGN NOTES:
/// - Numeric fields are `f64`, converted at the adapter boundary.
///   Exchanges that encode numbers as JSON strings ("0.05") are
///   parsed there; a value that does not parse never reaches this
///   struct.
/// - `observed_at` is assigned by the adapter when the record is
///   built, not taken from the exchange payload. Exchange-side
///   timestamps differ in epoch and unit per venue.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    /// Exchange-native pair symbol (e.g. "ETHBTC", "ETH-BTC")
    pub symbol: String,

    /// Highest traded price of the last 24h window
    pub high: f64,

    /// Lowest traded price of the last 24h window
    pub low: f64,

    /// Most recent traded price
    pub close: f64,

    /// Traded volume of the last 24h window, in base units
    pub volume: f64,

    /// Local wall-clock time at which this record was built
    pub observed_at: DateTime<Utc>,
}

impl Ticker {
    /// Builds a record stamped with the current wall-clock time.
    pub fn now(symbol: impl Into<String>, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            symbol: symbol.into(),
            high,
            low,
            close,
            volume,
            observed_at: Utc::now(),
        }
    }
}
