/*
[INPUT]:  HTTP configuration (base URL, timeouts, rate limit)
[OUTPUT]: Rate-limited dispatcher for the POST /info API
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing dispatch behavior
*/

use std::time::{Duration, Instant};

use reqwest::{Client, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::http::error::{HyperliquidError, Result};
use crate::http::limiter::RateLimiter;
use crate::types::InfoRequest;

/// Base URL for the Hyperliquid API
const API_BASE_URL: &str = "https://api.hyperliquid.xyz";
const INFO_PATH: &str = "/info";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub rate_limit_capacity: u32,
    pub rate_limit_window: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            rate_limit_capacity: 1200,
            rate_limit_window: Duration::from_secs(1),
        }
    }
}

/// Request dispatcher for the Hyperliquid info API. One logical call at a
/// time passes through the rate limiter; retry policy belongs to the caller.
#[derive(Debug)]
pub struct HyperliquidClient {
    http_client: Client,
    base_url: Url,
    limiter: RateLimiter,
}

impl HyperliquidClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_config_and_base_url(config, API_BASE_URL)
    }

    /// Create a client against a custom base URL (tests, alternate gateways)
    pub fn with_config_and_base_url(config: ClientConfig, base_url: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: Url::parse(base_url)?,
            limiter: RateLimiter::new(config.rate_limit_capacity, config.rate_limit_window),
        })
    }

    /// One-shot info call returning the raw JSON result.
    pub async fn call(&self, request: &InfoRequest) -> Result<serde_json::Value> {
        self.send_info(request).await
    }

    pub fn rate_limit_capacity(&self) -> u32 {
        self.limiter.capacity()
    }

    /// Dispatch one info request: await admission, POST, decode. The
    /// admission slot is spent even when the call fails.
    pub(crate) async fn send_info<T: DeserializeOwned>(&self, body: &impl Serialize) -> Result<T> {
        self.limiter.admit().await;

        let url = self.base_url.join(INFO_PATH)?;
        let started = Instant::now();

        let response = match self.http_client.post(url).json(body).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    endpoint = INFO_PATH,
                    latency_ms = started.elapsed().as_millis() as u64,
                    error = %err,
                    "info request transport failure"
                );
                return Err(err.into());
            }
        };

        let status = response.status();
        let latency_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!(
                endpoint = INFO_PATH,
                status = status.as_u16(),
                latency_ms,
                "info request rejected"
            );
            return Err(HyperliquidError::Remote {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let text = response.text().await.map_err(HyperliquidError::from)?;
        let decoded = serde_json::from_str(&text)?;
        info!(
            endpoint = INFO_PATH,
            status = status.as_u16(),
            latency_ms,
            "info request ok"
        );
        Ok(decoded)
    }
}
