/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Streaming topic. Variant names map one-to-one onto the wire channel names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "allMids")]
    AllMids,
    #[serde(rename = "l2Book")]
    L2Book,
    #[serde(rename = "trades")]
    Trades,
    #[serde(rename = "userEvents")]
    UserEvents,
    #[serde(rename = "candle")]
    Candle,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::AllMids => "allMids",
            Topic::L2Book => "l2Book",
            Topic::Trades => "trades",
            Topic::UserEvents => "userEvents",
            Topic::Candle => "candle",
        }
    }

    /// Resolve an inbound channel or type tag to a topic.
    pub fn from_channel(channel: &str) -> Option<Topic> {
        match channel {
            "allMids" => Some(Topic::AllMids),
            "l2Book" => Some(Topic::L2Book),
            "trades" => Some(Topic::Trades),
            "userEvents" => Some(Topic::UserEvents),
            "candle" => Some(Topic::Candle),
            _ => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_wire_names_round_trip() {
        for topic in [
            Topic::AllMids,
            Topic::L2Book,
            Topic::Trades,
            Topic::UserEvents,
            Topic::Candle,
        ] {
            assert_eq!(Topic::from_channel(topic.as_str()), Some(topic));
            let json = serde_json::to_string(&topic).unwrap();
            assert_eq!(json, format!("\"{}\"", topic.as_str()));
        }
    }

    #[test]
    fn topic_unknown_channel_is_none() {
        assert_eq!(Topic::from_channel("orderUpdates"), None);
    }
}
