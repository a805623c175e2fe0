use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Serializes push dispatches and spaces their start times.
///
/// At most one permit is outstanding at a time, and a new permit is not
/// granted until `min_interval` has passed since the previous one was. The
/// throttle is process-wide, so the webhook and the scheduled job share it.
#[derive(Debug)]
pub struct DispatchThrottle {
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

/// Held for the duration of one dispatch.
#[derive(Debug)]
pub struct ThrottlePermit<'a> {
    _guard: MutexGuard<'a, Option<Instant>>,
}

impl DispatchThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: Mutex::new(None),
        }
    }

    pub async fn acquire(&self) -> ThrottlePermit<'_> {
        let mut guard = self.last_start.lock().await;

        if let Some(last) = *guard {
            let ready_at = last + self.min_interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *guard = Some(Instant::now());
        ThrottlePermit { _guard: guard }
    }
}
