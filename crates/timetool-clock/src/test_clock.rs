//! A scripted [`Clock`] for tests that need to observe waits without taking them.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::clock::Clock;

/// Records every requested wait and advances a virtual `now` by it.
///
/// `after` yields once to the scheduler and then completes, so a pending
/// cancellation is still observed by a racing `select!`.
#[derive(Debug)]
pub struct ManualClock {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    now: DateTime<Utc>,
    waits: Vec<Duration>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                now: start,
                waits: Vec::new(),
            }),
        }
    }

    /// Every duration passed to [`Clock::after`], in order.
    pub fn waits(&self) -> Vec<Duration> {
        self.lock().waits.clone()
    }

    /// Sum of all recorded waits.
    pub fn elapsed(&self) -> Duration {
        self.lock().waits.iter().sum()
    }

    pub fn advance(&self, by: Duration) {
        let mut inner = self.lock();
        inner.now = shift(inner.now, by);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }
}

fn shift(now: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(by)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.lock().now
    }

    async fn after(&self, duration: Duration) {
        {
            let mut inner = self.lock();
            inner.waits.push(duration);
            inner.now = shift(inner.now, duration);
        }
        tokio::task::yield_now().await;
    }
}
