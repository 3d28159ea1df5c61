/*
[INPUT]:  Admission requests from the dispatcher
[OUTPUT]: Token-bucket gated permission to issue a request
[POS]:    HTTP layer - outbound request volume control
[UPDATE]: When changing window semantics or admission policy
*/

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tracing::debug;

/// Extra sleep past the window boundary so a reset is observed on wake-up.
const WINDOW_SAFETY_MARGIN: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct RateWindow {
    used: u32,
    window_start: Instant,
}

/// Token bucket refilled to `capacity` every `window`. Admission counts
/// request volume: a granted slot is consumed whether or not the call that
/// follows it succeeds.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    window: Duration,
    state: Mutex<RateWindow>,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            window,
            state: Mutex::new(RateWindow {
                used: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// Suspends until a slot is available. Waiters are not queue-capped;
    /// worst case is an unbounded wait under sustained overload.
    pub async fn admit(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                if now.duration_since(state.window_start) >= self.window {
                    state.window_start = now;
                    state.used = 0;
                }
                if state.used < self.capacity {
                    state.used += 1;
                    return;
                }
                state.window_start + self.window + WINDOW_SAFETY_MARGIN - now
            };
            debug!(
                wait_ms = wait.as_millis() as u64,
                "rate limit window exhausted, waiting"
            );
            time::sleep(wait).await;
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[cfg(test)]
    async fn used(&self) -> u32 {
        self.state.lock().await.used
    }
}
