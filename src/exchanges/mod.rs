//! Exchange adapter registry and factory
//!
//! This module provides:
//! - Central registration of all supported exchanges
//! - A factory function to resolve adapters by name
//!
//! All exchange-specific logic must live in dedicated adapter modules.
//! The rest of the application must interact exclusively through
//! the `ExchangeAdapter` trait.

pub mod adapter;
pub mod binance;
pub mod kucoin;

use std::sync::Arc;

use adapter::ExchangeAdapter;

/// Returns an exchange adapter instance by name.
///
/// This function acts as the central factory / registry for all
/// supported exchanges.
///
/// DESIGN:
/// - Keeps adapter creation in one place
/// - Avoids string-based logic scattered across the codebase
/// - Enables compile-time visibility of supported exchanges
///
/// RETURNS:
/// - `Some(Arc<dyn ExchangeAdapter>)` if the exchange is supported
/// - `None` if the exchange is unknown
///
/// CONTRACT:
/// - `name` MUST match the `exchange` field in config.json
/// - Adapter names must be lowercase and stable
///
/// THREADING:
/// - Adapters are wrapped in `Arc`
/// - The same adapter instance is shared by every polling task
///
pub fn get_adapter(name: &str) -> Option<Arc<dyn ExchangeAdapter>> {
    match name {
        "binance" => Some(Arc::new(binance::BinanceAdapter)),
        "kucoin" => Some(Arc::new(kucoin::KucoinAdapter)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_exchanges() {
        assert_eq!(get_adapter("binance").unwrap().name(), "binance");
        assert_eq!(get_adapter("kucoin").unwrap().name(), "kucoin");
    }

    #[test]
    fn unknown_exchange_resolves_to_none() {
        assert!(get_adapter("mtgox").is_none());
        assert!(get_adapter("BINANCE").is_none());
    }
}
