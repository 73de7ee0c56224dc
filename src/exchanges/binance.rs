use serde_json::Value;

use crate::error::ShapeError;
use crate::schema::Ticker;

use super::adapter::ExchangeAdapter;

const EXCHANGE: &str = "binance";

/// Fields that must exist before any value is read. `closeTime` is
/// required but never copied into the record.
const REQUIRED_FIELDS: [&str; 6] = [
    "lastPrice",
    "symbol",
    "highPrice",
    "lowPrice",
    "volume",
    "closeTime",
];

/// Binance (Global) REST adapter
///
/// 24hr ticker endpoint:
/// https://developers.binance.com/docs/binance-spot-api-docs/rest-api
///
/// Response shape, reduced to the fields used here:
/// {
///   "symbol": "ETHBTC",
///   "highPrice": "0.05",
///   "lowPrice": "0.04",
///   "lastPrice": "0.045",
///   "volume": "100.0",
///   "closeTime": 1499869899040
/// }
///
/// Every numeric field arrives as a JSON string.
pub struct BinanceAdapter;

impl ExchangeAdapter for BinanceAdapter {
    fn name(&self) -> &'static str {
        EXCHANGE
    }

    fn pair_symbol(&self, coin: &str, base_coin: &str) -> String {
        format!("{}{}", coin.to_uppercase(), base_coin.to_uppercase())
    }

    fn ticker_url(&self, coin: &str, base_coin: &str) -> String {
        format!(
            "https://api.binance.com/api/v1/ticker/24hr?symbol={}",
            self.pair_symbol(coin, base_coin)
        )
    }

    fn parse_ticker(&self, document: &Value) -> Result<Ticker, ShapeError> {
        // --------------------------------------------------
        // Presence gate: reject before reading any value
        // --------------------------------------------------
        for field in REQUIRED_FIELDS {
            if document.get(field).is_none() {
                return Err(ShapeError::MissingField { exchange: EXCHANGE, field });
            }
        }

        let symbol = string_field(document, "symbol")?;

        Ok(Ticker::now(
            symbol,
            string_number(document, "highPrice")?,
            string_number(document, "lowPrice")?,
            string_number(document, "lastPrice")?,
            string_number(document, "volume")?,
        ))
    }
}

fn string_field<'a>(document: &'a Value, field: &'static str) -> Result<&'a str, ShapeError> {
    document
        .get(field)
        .and_then(Value::as_str)
        .ok_or(ShapeError::WrongType {
            exchange: EXCHANGE,
            field,
            expected: "string",
        })
}

fn string_number(document: &Value, field: &'static str) -> Result<f64, ShapeError> {
    let raw = string_field(document, field)?;
    raw.parse::<f64>().map_err(|_| ShapeError::BadNumber {
        exchange: EXCHANGE,
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_a_complete_24h_document() {
        let document = json!({
            "symbol": "ETHBTC",
            "highPrice": "0.05",
            "lowPrice": "0.04",
            "lastPrice": "0.045",
            "volume": "100.0",
            "closeTime": 1499869899040i64
        });
        let ticker = BinanceAdapter.parse_ticker(&document).unwrap();
        assert_eq!(ticker.symbol, "ETHBTC");
        assert_eq!(ticker.high, 0.05);
        assert_eq!(ticker.low, 0.04);
        assert_eq!(ticker.close, 0.045);
        assert_eq!(ticker.volume, 100.0);
    }

    #[test]
    fn conversion_is_deterministic() {
        let document = json!({
            "symbol": "ETHBTC",
            "highPrice": "0.05",
            "lowPrice": "0.04",
            "lastPrice": "0.045",
            "volume": "100.0",
            "closeTime": 1
        });
        let first = BinanceAdapter.parse_ticker(&document).unwrap();
        let second = BinanceAdapter.parse_ticker(&document).unwrap();
        assert_eq!(first.symbol, second.symbol);
        assert_eq!(first.high.to_bits(), second.high.to_bits());
        assert_eq!(first.low.to_bits(), second.low.to_bits());
        assert_eq!(first.close.to_bits(), second.close.to_bits());
        assert_eq!(first.volume.to_bits(), second.volume.to_bits());
    }

    #[test]
    fn unknown_extra_fields_are_ignored() {
        let document = json!({
            "symbol": "ETHBTC",
            "highPrice": "0.05",
            "lowPrice": "0.04",
            "lastPrice": "0.045",
            "volume": "100.0",
            "closeTime": 1,
            "priceChange": "-0.001",
            "count": 12345
        });
        assert!(BinanceAdapter.parse_ticker(&document).is_ok());
    }

    #[test]
    fn missing_field_names_the_field() {
        let document = json!({
            "symbol": "ETHBTC",
            "highPrice": "0.05",
            "lowPrice": "0.04",
            "lastPrice": "0.045",
            "closeTime": 1
        });
        assert_eq!(
            BinanceAdapter.parse_ticker(&document).unwrap_err(),
            ShapeError::MissingField { exchange: "binance", field: "volume" }
        );
    }

    #[test]
    fn native_number_where_string_expected_is_a_type_error() {
        let document = json!({
            "symbol": "ETHBTC",
            "highPrice": 0.05,
            "lowPrice": "0.04",
            "lastPrice": "0.045",
            "volume": "100.0",
            "closeTime": 1
        });
        assert_eq!(
            BinanceAdapter.parse_ticker(&document).unwrap_err(),
            ShapeError::WrongType { exchange: "binance", field: "highPrice", expected: "string" }
        );
    }

    #[test]
    fn unparsable_price_string_is_a_number_error() {
        let document = json!({
            "symbol": "ETHBTC",
            "highPrice": "n/a",
            "lowPrice": "0.04",
            "lastPrice": "0.045",
            "volume": "100.0",
            "closeTime": 1
        });
        assert_eq!(
            BinanceAdapter.parse_ticker(&document).unwrap_err(),
            ShapeError::BadNumber {
                exchange: "binance",
                field: "highPrice",
                value: "n/a".to_string()
            }
        );
    }

    #[test]
    fn builds_concatenated_pair_symbol_and_url() {
        assert_eq!(BinanceAdapter.pair_symbol("eth", "btc"), "ETHBTC");
        assert_eq!(
            BinanceAdapter.ticker_url("ETH", "BTC"),
            "https://api.binance.com/api/v1/ticker/24hr?symbol=ETHBTC"
        );
    }
}
