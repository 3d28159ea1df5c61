/*
[INPUT]:  Raw WebSocket frame text
[OUTPUT]: Parsed control/data frames and outbound control messages
[POS]:    WebSocket layer - message parsing and demultiplexing
[UPDATE]: When adding new frame forms or changing wire format
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::error::{HyperliquidError, Result};
use crate::types::Topic;

/// Subscription identity on the wire: a topic plus optional filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionParams {
    #[serde(rename = "type")]
    pub topic: Topic,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

impl SubscriptionParams {
    /// Mid prices for every asset; no filter.
    pub fn all_mids() -> Self {
        Self::bare(Topic::AllMids)
    }

    /// Order book updates for one coin.
    pub fn l2_book(coin: impl Into<String>) -> Self {
        Self {
            coin: Some(coin.into()),
            ..Self::bare(Topic::L2Book)
        }
    }

    /// Trade ticks for one coin.
    pub fn trades(coin: impl Into<String>) -> Self {
        Self {
            coin: Some(coin.into()),
            ..Self::bare(Topic::Trades)
        }
    }

    /// Account events for one user address.
    pub fn user_events(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            ..Self::bare(Topic::UserEvents)
        }
    }

    /// Candles for one coin at one interval.
    pub fn candle(coin: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            coin: Some(coin.into()),
            interval: Some(interval.into()),
            ..Self::bare(Topic::Candle)
        }
    }

    fn bare(topic: Topic) -> Self {
        Self {
            topic,
            coin: None,
            user: None,
            interval: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMethod {
    Subscribe,
    Unsubscribe,
}

/// Outbound subscribe/unsubscribe control frame:
/// `{"method": ..., "subscription": {"type": ..., "coin"?, "user"?, "interval"?}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFrame {
    pub method: ControlMethod,
    pub subscription: SubscriptionParams,
}

impl ControlFrame {
    pub fn subscribe(subscription: SubscriptionParams) -> Self {
        Self {
            method: ControlMethod::Subscribe,
            subscription,
        }
    }

    pub fn unsubscribe(subscription: SubscriptionParams) -> Self {
        Self {
            method: ControlMethod::Unsubscribe,
            subscription,
        }
    }
}

/// Heartbeat frame sent on the fixed ping interval.
pub const PING_FRAME: &str = r#"{"method":"ping"}"#;

/// A demultiplexed inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Subscription acknowledgement; logged and discarded.
    Ack(Value),
    /// Heartbeat response; discarded.
    Pong,
    /// Payload frame to route through the subscription registry.
    Data(DataFrame),
    /// Recognized JSON that maps to no known channel.
    Unknown(Value),
}

/// Normalized data frame: topic plus the filter fields used for matching.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    pub topic: Topic,
    pub coin: Option<String>,
    pub user: Option<String>,
    pub interval: Option<String>,
    pub data: Value,
}

/// Parse one inbound frame. Both wire forms are supported: the
/// `{channel, data}` envelope and flat `{type: ..., ...}` messages.
pub fn parse_inbound(text: &str) -> Result<InboundFrame> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| HyperliquidError::Protocol(format!("invalid frame json: {err}")))?;
    Ok(classify(value))
}

fn classify(value: Value) -> InboundFrame {
    if str_field(&value, "method").as_deref() == Some("subscription")
        || str_field(&value, "channel").as_deref() == Some("subscriptionResponse")
    {
        return InboundFrame::Ack(value);
    }

    if str_field(&value, "channel").as_deref() == Some("pong") {
        return InboundFrame::Pong;
    }

    if let Some(channel) = str_field(&value, "channel") {
        if value.get("data").is_some() {
            return match Topic::from_channel(&channel) {
                Some(topic) => envelope_frame(topic, value),
                None => InboundFrame::Unknown(value),
            };
        }
    }

    if let Some(kind) = str_field(&value, "type") {
        if let Some(topic) = Topic::from_channel(&kind) {
            return flat_frame(topic, value);
        }
    }

    InboundFrame::Unknown(value)
}

/// `{channel, data}` form. Filter fields may sit on the envelope, inside the
/// data object (candles use the short `s`/`i` names), or on the first element
/// when the payload is a batch.
fn envelope_frame(topic: Topic, mut value: Value) -> InboundFrame {
    let data = value
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null);

    let coin = str_field(&value, "coin")
        .or_else(|| str_field(&data, "coin"))
        .or_else(|| str_field(&data, "s"))
        .or_else(|| first_element_field(&data, "coin"));
    let user = str_field(&value, "user").or_else(|| str_field(&data, "user"));
    let interval = str_field(&value, "interval").or_else(|| str_field(&data, "i"));

    InboundFrame::Data(DataFrame {
        topic,
        coin,
        user,
        interval,
        data,
    })
}

/// Flat `{type: ..., ...}` form. `allMids` nests its payload under `data`;
/// `l2Book` is the payload itself.
fn flat_frame(topic: Topic, mut value: Value) -> InboundFrame {
    let coin = str_field(&value, "coin");
    let user = str_field(&value, "user");
    let interval = str_field(&value, "interval");

    let data = match value.get_mut("data") {
        Some(data) => data.take(),
        None => value,
    };

    InboundFrame::Data(DataFrame {
        topic,
        coin,
        user,
        interval,
        data,
    })
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn first_element_field(value: &Value, key: &str) -> Option<String> {
    value
        .as_array()
        .and_then(|items| items.first())
        .and_then(|item| item.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn control_frame_wire_format() {
        let frame = ControlFrame::subscribe(SubscriptionParams::l2_book("BTC"));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            json!({"method": "subscribe", "subscription": {"type": "l2Book", "coin": "BTC"}})
        );

        let frame = ControlFrame::unsubscribe(SubscriptionParams::all_mids());
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            json!({"method": "unsubscribe", "subscription": {"type": "allMids"}})
        );
    }

    #[test]
    fn subscription_ack_is_discarded_form() {
        let frame = parse_inbound(r#"{"method":"subscription","subscription":{"type":"allMids"}}"#)
            .unwrap();
        assert!(matches!(frame, InboundFrame::Ack(_)));

        let frame =
            parse_inbound(r#"{"channel":"subscriptionResponse","data":{"method":"subscribe"}}"#)
                .unwrap();
        assert!(matches!(frame, InboundFrame::Ack(_)));
    }

    #[test]
    fn pong_frame_is_recognized() {
        let frame = parse_inbound(r#"{"channel":"pong"}"#).unwrap();
        assert_eq!(frame, InboundFrame::Pong);
    }

    #[test]
    fn envelope_frame_extracts_topic_and_coin() {
        let frame = parse_inbound(
            r#"{"channel":"l2Book","data":{"coin":"BTC","levels":[[],[]],"time":1}}"#,
        )
        .unwrap();
        let InboundFrame::Data(frame) = frame else {
            panic!("expected data frame");
        };
        assert_eq!(frame.topic, Topic::L2Book);
        assert_eq!(frame.coin.as_deref(), Some("BTC"));
        assert_eq!(frame.data["time"], json!(1));
    }

    #[test]
    fn trades_batch_takes_coin_from_first_element() {
        let frame = parse_inbound(
            r#"{"channel":"trades","data":[{"coin":"ETH","side":"B","px":"3000","sz":"1","time":1}]}"#,
        )
        .unwrap();
        let InboundFrame::Data(frame) = frame else {
            panic!("expected data frame");
        };
        assert_eq!(frame.topic, Topic::Trades);
        assert_eq!(frame.coin.as_deref(), Some("ETH"));
    }

    #[test]
    fn candle_envelope_uses_short_field_names() {
        let frame = parse_inbound(
            r#"{"channel":"candle","data":{"s":"BTC","i":"1m","o":"1","c":"2","h":"2","l":"1","v":"10","n":3,"t":1,"T":2}}"#,
        )
        .unwrap();
        let InboundFrame::Data(frame) = frame else {
            panic!("expected data frame");
        };
        assert_eq!(frame.topic, Topic::Candle);
        assert_eq!(frame.coin.as_deref(), Some("BTC"));
        assert_eq!(frame.interval.as_deref(), Some("1m"));
    }

    #[test]
    fn flat_all_mids_unwraps_data() {
        let frame = parse_inbound(r#"{"type":"allMids","data":{"mids":{"BTC":"64000"}}}"#).unwrap();
        let InboundFrame::Data(frame) = frame else {
            panic!("expected data frame");
        };
        assert_eq!(frame.topic, Topic::AllMids);
        assert_eq!(frame.data["mids"]["BTC"], json!("64000"));
    }

    #[test]
    fn flat_l2_book_keeps_whole_message() {
        let frame =
            parse_inbound(r#"{"type":"l2Book","coin":"BTC","levels":[[],[]],"time":5}"#).unwrap();
        let InboundFrame::Data(frame) = frame else {
            panic!("expected data frame");
        };
        assert_eq!(frame.topic, Topic::L2Book);
        assert_eq!(frame.coin.as_deref(), Some("BTC"));
        assert_eq!(frame.data["time"], json!(5));
    }

    #[test]
    fn malformed_json_is_protocol_error() {
        let err = parse_inbound("{not json").unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn unknown_channel_is_preserved() {
        let frame = parse_inbound(r#"{"channel":"orderUpdates","data":{}}"#).unwrap();
        assert!(matches!(frame, InboundFrame::Unknown(_)));
    }
}
