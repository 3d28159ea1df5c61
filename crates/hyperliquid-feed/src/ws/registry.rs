/*
[INPUT]:  Subscription requests and demultiplexed data frames
[OUTPUT]: Stored topic subscriptions and fan-out delivery to callbacks
[POS]:    WebSocket layer - subscription bookkeeping and routing
[UPDATE]: When changing matching rules or callback semantics
*/

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::http::error::HyperliquidError;
use crate::ws::message::{DataFrame, SubscriptionParams};

pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Subscriber callback, invoked once per matching data frame.
pub type DataCallback = Arc<dyn Fn(Value) -> std::result::Result<(), CallbackError> + Send + Sync>;

/// Opaque subscription identifier. Identity of a subscription is its
/// topic+params; the id additionally embeds the creation time so that
/// re-subscribing to the same topic yields a distinct handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    fn generate(params: &SubscriptionParams) -> Self {
        let mut parts = vec![params.topic.as_str().to_string()];
        if let Some(coin) = &params.coin {
            parts.push(coin.clone());
        }
        if let Some(user) = &params.user {
            parts.push(user.clone());
        }
        if let Some(interval) = &params.interval {
            parts.push(interval.clone());
        }
        parts.push(chrono::Utc::now().timestamp_millis().to_string());
        parts.push(Uuid::new_v4().simple().to_string()[..8].to_string());
        SubscriptionId(parts.join("_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct Subscription {
    pub id: SubscriptionId,
    pub params: SubscriptionParams,
    pub callback: DataCallback,
}

/// Active topic subscriptions. Exclusively owns its entries; the connection
/// manager only reads params to build control frames.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Vec<Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a subscription and hand back its fresh id. Never fails.
    pub fn insert(&mut self, params: SubscriptionParams, callback: DataCallback) -> SubscriptionId {
        let id = SubscriptionId::generate(&params);
        debug!(id = %id, topic = %params.topic, "subscription stored");
        self.entries.push(Subscription {
            id: id.clone(),
            params,
            callback,
        });
        id
    }

    /// Remove a subscription. An unknown id is a warning, not a failure.
    pub fn remove(&mut self, id: &SubscriptionId) -> Option<Subscription> {
        match self.entries.iter().position(|entry| &entry.id == id) {
            Some(index) => {
                let entry = self.entries.remove(index);
                debug!(id = %id, topic = %entry.params.topic, "subscription removed");
                Some(entry)
            }
            None => {
                warn!(id = %id, "unsubscribe for unknown subscription id");
                None
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Params of every stored entry, for replay after a (re)connect.
    pub fn params(&self) -> Vec<SubscriptionParams> {
        self.entries
            .iter()
            .map(|entry| entry.params.clone())
            .collect()
    }

    /// Deliver a data frame to every matching subscriber. Targets are
    /// snapshotted first so callbacks cannot mutate the set mid-iteration.
    pub fn route(&self, frame: &DataFrame) {
        let targets: Vec<(SubscriptionId, DataCallback)> = self
            .entries
            .iter()
            .filter(|entry| matches(&entry.params, frame))
            .map(|entry| (entry.id.clone(), Arc::clone(&entry.callback)))
            .collect();

        if targets.is_empty() {
            debug!(topic = %frame.topic, "data frame with no matching subscribers");
            return;
        }

        for (id, callback) in targets {
            invoke(&id, &callback, frame.data.clone());
        }
    }
}

/// Topic must match exactly; each populated filter must equal the frame's
/// corresponding field. No wildcards.
fn matches(params: &SubscriptionParams, frame: &DataFrame) -> bool {
    params.topic == frame.topic
        && filter_matches(&params.coin, &frame.coin)
        && filter_matches(&params.user, &frame.user)
        && filter_matches(&params.interval, &frame.interval)
}

fn filter_matches(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => actual.as_deref() == Some(wanted.as_str()),
    }
}

/// A failing or panicking callback is logged and isolated; it must never
/// prevent delivery to other entries.
fn invoke(id: &SubscriptionId, callback: &DataCallback, payload: Value) {
    match catch_unwind(AssertUnwindSafe(|| callback(payload))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            let err = HyperliquidError::Callback(err.to_string());
            warn!(id = %id, error = %err, "subscriber callback failed");
        }
        Err(_) => {
            let err = HyperliquidError::Callback("callback panicked".to_string());
            warn!(id = %id, error = %err, "subscriber callback panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Topic;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback(counter: Arc<AtomicUsize>) -> DataCallback {
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn frame(topic: Topic, coin: Option<&str>) -> DataFrame {
        DataFrame {
            topic,
            coin: coin.map(str::to_string),
            user: None,
            interval: None,
            data: json!({"payload": true}),
        }
    }

    #[test]
    fn ids_are_unique_per_insert() {
        let mut registry = SubscriptionRegistry::new();
        let noop: DataCallback = Arc::new(|_| Ok(()));
        let a = registry.insert(SubscriptionParams::all_mids(), Arc::clone(&noop));
        let b = registry.insert(SubscriptionParams::all_mids(), noop);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let mut registry = SubscriptionRegistry::new();
        let noop: DataCallback = Arc::new(|_| Ok(()));
        let id = registry.insert(SubscriptionParams::all_mids(), noop);
        registry.remove(&id);
        assert!(registry.remove(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn replay_params_track_subscribe_unsubscribe_sequence() {
        let mut registry = SubscriptionRegistry::new();
        let noop: DataCallback = Arc::new(|_| Ok(()));
        let mids = registry.insert(SubscriptionParams::all_mids(), Arc::clone(&noop));
        let _book = registry.insert(SubscriptionParams::l2_book("BTC"), Arc::clone(&noop));
        let trades = registry.insert(SubscriptionParams::trades("ETH"), noop);
        registry.remove(&mids);
        registry.remove(&trades);

        assert_eq!(registry.params(), vec![SubscriptionParams::l2_book("BTC")]);
    }

    #[test]
    fn route_fans_out_to_every_matching_subscriber() {
        let mut registry = SubscriptionRegistry::new();
        let hits_a = Arc::new(AtomicUsize::new(0));
        let hits_b = Arc::new(AtomicUsize::new(0));
        let hits_other = Arc::new(AtomicUsize::new(0));

        registry.insert(
            SubscriptionParams::all_mids(),
            counting_callback(Arc::clone(&hits_a)),
        );
        registry.insert(
            SubscriptionParams::all_mids(),
            counting_callback(Arc::clone(&hits_b)),
        );
        registry.insert(
            SubscriptionParams::l2_book("BTC"),
            counting_callback(Arc::clone(&hits_other)),
        );

        registry.route(&frame(Topic::AllMids, None));

        assert_eq!(hits_a.load(Ordering::SeqCst), 1);
        assert_eq!(hits_b.load(Ordering::SeqCst), 1);
        assert_eq!(hits_other.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn coin_filter_requires_exact_match() {
        let mut registry = SubscriptionRegistry::new();
        let btc_hits = Arc::new(AtomicUsize::new(0));
        let eth_hits = Arc::new(AtomicUsize::new(0));

        registry.insert(
            SubscriptionParams::l2_book("BTC"),
            counting_callback(Arc::clone(&btc_hits)),
        );
        registry.insert(
            SubscriptionParams::l2_book("ETH"),
            counting_callback(Arc::clone(&eth_hits)),
        );

        registry.route(&frame(Topic::L2Book, Some("BTC")));

        assert_eq!(btc_hits.load(Ordering::SeqCst), 1);
        assert_eq!(eth_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn filtered_subscription_ignores_frame_without_field() {
        let mut registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        registry.insert(
            SubscriptionParams::l2_book("BTC"),
            counting_callback(Arc::clone(&hits)),
        );

        registry.route(&frame(Topic::L2Book, None));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_callback_does_not_block_other_subscribers() {
        let mut registry = SubscriptionRegistry::new();
        let survivor_hits = Arc::new(AtomicUsize::new(0));

        registry.insert(
            SubscriptionParams::all_mids(),
            Arc::new(|_| panic!("subscriber blew up")),
        );
        registry.insert(
            SubscriptionParams::all_mids(),
            counting_callback(Arc::clone(&survivor_hits)),
        );

        registry.route(&frame(Topic::AllMids, None));
        assert_eq!(survivor_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn erroring_callback_is_isolated() {
        let mut registry = SubscriptionRegistry::new();
        let survivor_hits = Arc::new(AtomicUsize::new(0));

        registry.insert(
            SubscriptionParams::all_mids(),
            Arc::new(|_| Err("decode failure".into())),
        );
        registry.insert(
            SubscriptionParams::all_mids(),
            counting_callback(Arc::clone(&survivor_hits)),
        );

        registry.route(&frame(Topic::AllMids, None));
        assert_eq!(survivor_hits.load(Ordering::SeqCst), 1);
    }
}
