/*
[INPUT]:  Info endpoint operation names and parameters
[OUTPUT]: Serializable POST /info request bodies
[POS]:    Data layer - request body definitions
[UPDATE]: When adding new info operations or changing body format
*/

use serde::Serialize;

/// Body for a POST /info call: `{"type": <operation>, ...params}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InfoRequest {
    Meta,
    AllMids,
    L2Book {
        coin: String,
    },
    ClearinghouseState {
        user: String,
    },
    OpenOrders {
        user: String,
    },
    UserFills {
        user: String,
        #[serde(rename = "startTime", skip_serializing_if = "Option::is_none")]
        start_time: Option<u64>,
    },
    CandleSnapshot {
        req: CandleSnapshotRequest,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleSnapshotRequest {
    pub coin: String,
    pub interval: String,
    pub start_time: u64,
    pub end_time: u64,
}
