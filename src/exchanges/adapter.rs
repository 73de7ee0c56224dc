use serde_json::Value;

use crate::error::ShapeError;
use crate::schema::Ticker;

/// ExchangeAdapter is the abstraction layer between:
/// - The generic polling runtime
/// - Exchange-specific REST ticker APIs
///
/// Each exchange implementation must:
/// - Build the venue's pair symbol and ticker URL
/// - Convert the venue's JSON document into the canonical Ticker
///
/// DESIGN GOALS:
/// - Zero exchange-specific logic outside adapters
/// - One adapter per exchange
/// - Uniform output format across all exchanges
///
/// THREAD SAFETY:
/// - Must be Send + Sync
/// - Adapter instances are shared across polling tasks
///
pub trait ExchangeAdapter: Send + Sync {
    /// Returns the canonical exchange name.
    ///
    /// CONTRACT:
    /// - Must match the `exchange` field in configuration
    /// - Must be lowercase and stable
    /// - Used for logging and for the exchange tag in shape errors
    ///
    fn name(&self) -> &'static str;

    /// Builds the venue's pair symbol for a coin quoted in
    /// `base_coin`.
    ///
    /// EXAMPLES:
    /// - binance: ("ETH", "BTC") -> "ETHBTC"
    /// - kucoin:  ("ETH", "BTC") -> "ETH-BTC"
    ///
    fn pair_symbol(&self, coin: &str, base_coin: &str) -> String;

    /// Builds the full HTTPS URL of the venue's 24h ticker endpoint
    /// for one pair.
    ///
    /// MUST NOT:
    /// - Perform network I/O
    /// - Depend on runtime state
    ///
    fn ticker_url(&self, coin: &str, base_coin: &str) -> String;

    /// Converts one parsed JSON document into the canonical Ticker.
    ///
    /// OUTPUT:
    /// - Ok(Ticker) when every required field is present and well
    ///   typed
    /// - Err(ShapeError) naming the exchange and offending field
    ///   otherwise
    ///
    /// IMPORTANT:
    /// - This function must NEVER panic; exchange payloads are
    ///   untrusted input
    /// - The numeric encoding (string vs number) is fixed per
    ///   exchange and part of each adapter's contract
    /// - `observed_at` is stamped here with the local clock
    ///
    fn parse_ticker(&self, document: &Value) -> Result<Ticker, ShapeError>;
}
