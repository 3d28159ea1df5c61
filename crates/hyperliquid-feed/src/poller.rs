/*
[INPUT]:  An info request, a poll interval, and a data callback
[OUTPUT]: Periodic REST snapshots delivered through the callback
[POS]:    Fallback layer - REST polling when the stream is unavailable
[UPDATE]: When changing poll cadence or failure handling
*/

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::http::HyperliquidClient;
use crate::types::InfoRequest;
use crate::ws::DataCallback;

/// Polls one info request on a fixed interval as a stand-in for a WebSocket
/// topic. Poll failures are logged and the next tick proceeds; stopping (or
/// dropping) the poller cancels the task.
pub struct FallbackPoller {
    client: Arc<HyperliquidClient>,
    request: InfoRequest,
    handle: StdMutex<Option<JoinHandle<()>>>,
}

impl FallbackPoller {
    pub fn new(client: Arc<HyperliquidClient>, request: InfoRequest) -> Self {
        Self {
            client,
            request,
            handle: StdMutex::new(None),
        }
    }

    /// Begin polling. The first poll fires immediately, then every
    /// `interval`. A no-op when already running.
    pub fn start(&self, interval: Duration, on_data: DataCallback) {
        let mut handle = lock_handle(&self.handle);
        if handle.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("poller already running");
            return;
        }

        info!(interval_ms = interval.as_millis() as u64, "fallback poller started");
        let client = Arc::clone(&self.client);
        let request = self.request.clone();
        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match client.call(&request).await {
                    Ok(value) => deliver(&on_data, value),
                    Err(err) => {
                        warn!(error = %err, "poll failed; will retry on next tick");
                    }
                }
            }
        }));
    }

    /// Cancel the poll task. A no-op when not running.
    pub fn stop(&self) {
        if let Some(task) = lock_handle(&self.handle).take() {
            task.abort();
            info!("fallback poller stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock_handle(&self.handle)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for FallbackPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock_handle(
    handle: &StdMutex<Option<JoinHandle<()>>>,
) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
    handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Callback failures must not end the poll loop.
fn deliver(on_data: &DataCallback, value: serde_json::Value) {
    match catch_unwind(AssertUnwindSafe(|| on_data(value))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "poll callback failed"),
        Err(_) => warn!("poll callback panicked"),
    }
}
