use serde_json::Value;

use crate::error::ShapeError;
use crate::schema::Ticker;

use super::adapter::ExchangeAdapter;

const EXCHANGE: &str = "kucoin";

const REQUIRED_FIELDS: [&str; 6] = ["lastDealPrice", "symbol", "high", "low", "vol", "datetime"];

/// Kucoin REST adapter
///
/// Open ticker endpoint, one pair per request:
/// GET /v1/open/tick?symbol=ETH-BTC
///
/// The payload sits under a "data" wrapper and encodes prices as
/// native JSON numbers, not strings:
/// { "data": { "symbol": "ETH-BTC", "lastDealPrice": 0.045,
///             "high": 0.05, "low": 0.04, "vol": 100.0,
///             "datetime": 1509948000000 } }
pub struct KucoinAdapter;

impl ExchangeAdapter for KucoinAdapter {
    fn name(&self) -> &'static str {
        EXCHANGE
    }

    fn pair_symbol(&self, coin: &str, base_coin: &str) -> String {
        format!("{}-{}", coin.to_uppercase(), base_coin.to_uppercase())
    }

    fn ticker_url(&self, coin: &str, base_coin: &str) -> String {
        format!(
            "https://api.kucoin.com/v1/open/tick?symbol={}",
            self.pair_symbol(coin, base_coin)
        )
    }

    fn parse_ticker(&self, document: &Value) -> Result<Ticker, ShapeError> {
        let data = document.get("data").ok_or(ShapeError::MissingField {
            exchange: EXCHANGE,
            field: "data",
        })?;
        if !data.is_object() {
            return Err(ShapeError::WrongType {
                exchange: EXCHANGE,
                field: "data",
                expected: "object",
            });
        }

        for field in REQUIRED_FIELDS {
            if data.get(field).is_none() {
                return Err(ShapeError::MissingField { exchange: EXCHANGE, field });
            }
        }

        let symbol = data
            .get("symbol")
            .and_then(Value::as_str)
            .ok_or(ShapeError::WrongType {
                exchange: EXCHANGE,
                field: "symbol",
                expected: "string",
            })?;

        Ok(Ticker::now(
            symbol,
            number_field(data, "high")?,
            number_field(data, "low")?,
            number_field(data, "lastDealPrice")?,
            number_field(data, "vol")?,
        ))
    }
}

fn number_field(data: &Value, field: &'static str) -> Result<f64, ShapeError> {
    data.get(field)
        .and_then(Value::as_f64)
        .ok_or(ShapeError::WrongType {
            exchange: EXCHANGE,
            field,
            expected: "number",
        })
}
