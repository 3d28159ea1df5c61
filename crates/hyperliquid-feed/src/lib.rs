/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Hyperliquid feed crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod http;
pub mod poller;
pub mod types;
pub mod ws;

// Re-export commonly used types from http
pub use http::{
    ClientConfig,
    HyperliquidClient,
    HyperliquidError,
    RateLimiter,
    Result,
};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    ConnectionState,
    DataCallback,
    HyperliquidWebSocket,
    SubscriptionId,
    SubscriptionParams,
    WsConfig,
};

pub use poller::FallbackPoller;
