/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Mid prices for every listed asset, keyed by coin symbol.
pub type AllMids = HashMap<String, Decimal>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub universe: Vec<AssetMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMeta {
    pub name: String,
    #[serde(rename = "szDecimals")]
    pub sz_decimals: u32,
}

/// One price level of the order book: price, size, order count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    #[serde(with = "rust_decimal::serde::str")]
    pub px: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub sz: Decimal,
    pub n: u32,
}

/// Level-2 order book snapshot; `levels[0]` are bids, `levels[1]` asks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct L2Book {
    pub coin: String,
    pub levels: Vec<Vec<BookLevel>>,
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(rename = "t")]
    pub open_time: u64,
    #[serde(rename = "T")]
    pub close_time: u64,
    #[serde(rename = "s")]
    pub coin: String,
    #[serde(rename = "i")]
    pub interval: String,
    #[serde(rename = "o", with = "rust_decimal::serde::str")]
    pub open: Decimal,
    #[serde(rename = "c", with = "rust_decimal::serde::str")]
    pub close: Decimal,
    #[serde(rename = "h", with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(rename = "l", with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(rename = "v", with = "rust_decimal::serde::str")]
    pub volume: Decimal,
    #[serde(rename = "n")]
    pub trades: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub coin: String,
    #[serde(rename = "limitPx", with = "rust_decimal::serde::str")]
    pub limit_px: Decimal,
    pub oid: u64,
    pub side: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub sz: Decimal,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFill {
    pub coin: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub px: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub sz: Decimal,
    pub side: String,
    pub time: u64,
    pub oid: u64,
    #[serde(rename = "closedPnl", with = "rust_decimal::serde::str")]
    pub closed_pnl: Decimal,
    pub hash: String,
}

/// Trade tick as broadcast on the `trades` streaming channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsTrade {
    pub coin: String,
    pub side: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub px: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub sz: Decimal,
    pub time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginSummary {
    #[serde(rename = "accountValue", with = "rust_decimal::serde::str")]
    pub account_value: Decimal,
    #[serde(rename = "totalNtlPos", with = "rust_decimal::serde::str")]
    pub total_ntl_pos: Decimal,
    #[serde(rename = "totalRawUsd", with = "rust_decimal::serde::str")]
    pub total_raw_usd: Decimal,
    #[serde(rename = "totalMarginUsed", with = "rust_decimal::serde::str")]
    pub total_margin_used: Decimal,
}

/// Account balances and positions; position payloads stay untyped because the
/// dashboard renders them verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearinghouseState {
    #[serde(rename = "marginSummary")]
    pub margin_summary: MarginSummary,
    #[serde(with = "rust_decimal::serde::str")]
    pub withdrawable: Decimal,
    #[serde(rename = "assetPositions", default)]
    pub asset_positions: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_book_decodes_string_decimals() {
        let json = r#"{
            "coin": "BTC",
            "levels": [
                [{"px": "64000.5", "sz": "1.25", "n": 3}],
                [{"px": "64001.0", "sz": "0.75", "n": 1}]
            ],
            "time": 1700000000000
        }"#;

        let book: L2Book = serde_json::from_str(json).unwrap();
        assert_eq!(book.coin, "BTC");
        assert_eq!(book.levels[0][0].px, "64000.5".parse().unwrap());
        assert_eq!(book.levels[1][0].sz, "0.75".parse().unwrap());
        assert_eq!(book.time, 1_700_000_000_000);
    }

    #[test]
    fn candle_decodes_short_field_names() {
        let json = r#"{
            "t": 1700000000000, "T": 1700003600000, "s": "ETH", "i": "1h",
            "o": "3000.0", "c": "3050.5", "h": "3060.0", "l": "2990.0",
            "v": "1234.5", "n": 42
        }"#;

        let candle: Candle = serde_json::from_str(json).unwrap();
        assert_eq!(candle.coin, "ETH");
        assert_eq!(candle.interval, "1h");
        assert_eq!(candle.close, "3050.5".parse().unwrap());
        assert_eq!(candle.trades, 42);
    }

    #[test]
    fn all_mids_decodes_price_map() {
        let json = r#"{"BTC": "64000.5", "ETH": "3000.25"}"#;
        let mids: AllMids = serde_json::from_str(json).unwrap();
        assert_eq!(mids["BTC"], "64000.5".parse().unwrap());
        assert_eq!(mids.len(), 2);
    }
}
