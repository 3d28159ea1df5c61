/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for hyperliquid-feed tests

use hyperliquid_feed::{ClientConfig, HyperliquidClient};
use wiremock::MockServer;

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Client pointed at the mock server
pub fn feed_client(server: &MockServer) -> HyperliquidClient {
    HyperliquidClient::with_config_and_base_url(ClientConfig::default(), &server.uri())
        .expect("client init")
}

/// Test user address fixture
#[allow(dead_code)]
pub fn test_user() -> &'static str {
    "0x1234567890abcdef1234567890abcdef12345678"
}
