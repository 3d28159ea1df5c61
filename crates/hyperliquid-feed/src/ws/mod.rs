/*
[INPUT]:  WebSocket configuration and topic subscriptions
[OUTPUT]: Live data stream with demux, routing, and reconnection
[POS]:    WebSocket layer - module wiring
[UPDATE]: When adding new stream features
*/

pub mod client;
pub mod message;
pub mod registry;

pub use client::{ConnectionState, HyperliquidWebSocket, WsConfig};
pub use message::{ControlFrame, ControlMethod, DataFrame, InboundFrame, SubscriptionParams};
pub use registry::{CallbackError, DataCallback, SubscriptionId, SubscriptionRegistry};
