/*
[INPUT]:  Coin symbols, user addresses, and candle parameters
[OUTPUT]: Typed market and account data from POST /info
[POS]:    HTTP layer - typed info endpoint wrappers
[UPDATE]: When adding new info operations or changing response format
*/

use crate::http::client::HyperliquidClient;
use crate::http::error::Result;
use crate::types::{
    AllMids, Candle, CandleSnapshotRequest, ClearinghouseState, InfoRequest, L2Book, Meta,
    OpenOrder, UserFill,
};

impl HyperliquidClient {
    /// Market metadata including all listed assets
    ///
    /// POST /info `{"type": "meta"}`
    pub async fn meta(&self) -> Result<Meta> {
        self.send_info(&InfoRequest::Meta).await
    }

    /// Mid prices for all assets
    ///
    /// POST /info `{"type": "allMids"}`
    pub async fn all_mids(&self) -> Result<AllMids> {
        self.send_info(&InfoRequest::AllMids).await
    }

    /// Level-2 order book for one asset
    ///
    /// POST /info `{"type": "l2Book", "coin": ...}`
    pub async fn l2_book(&self, coin: &str) -> Result<L2Book> {
        self.send_info(&InfoRequest::L2Book {
            coin: coin.to_string(),
        })
        .await
    }

    /// Candle history for one asset over a time range
    ///
    /// POST /info `{"type": "candleSnapshot", "req": {...}}`
    pub async fn candle_snapshot(
        &self,
        coin: &str,
        interval: &str,
        start_time: u64,
        end_time: u64,
    ) -> Result<Vec<Candle>> {
        self.send_info(&InfoRequest::CandleSnapshot {
            req: CandleSnapshotRequest {
                coin: coin.to_string(),
                interval: interval.to_string(),
                start_time,
                end_time,
            },
        })
        .await
    }

    /// Account balances and positions for a user
    ///
    /// POST /info `{"type": "clearinghouseState", "user": ...}`
    pub async fn clearinghouse_state(&self, user: &str) -> Result<ClearinghouseState> {
        self.send_info(&InfoRequest::ClearinghouseState {
            user: user.to_string(),
        })
        .await
    }

    /// Open orders for a user
    ///
    /// POST /info `{"type": "openOrders", "user": ...}`
    pub async fn open_orders(&self, user: &str) -> Result<Vec<OpenOrder>> {
        self.send_info(&InfoRequest::OpenOrders {
            user: user.to_string(),
        })
        .await
    }

    /// Fill history for a user, optionally bounded below by `start_time`
    ///
    /// POST /info `{"type": "userFills", "user": ..., "startTime"?: ...}`
    pub async fn user_fills(&self, user: &str, start_time: Option<u64>) -> Result<Vec<UserFill>> {
        self.send_info(&InfoRequest::UserFills {
            user: user.to_string(),
            start_time,
        })
        .await
    }
}
