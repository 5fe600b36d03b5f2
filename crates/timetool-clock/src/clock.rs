use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of wall-clock time and timed waits.
///
/// Everything in this crate that reads the time or waits for a duration goes
/// through a `Clock`, so tests can substitute [`ManualClock`](crate::test_clock::ManualClock)
/// instead of touching real time.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Resolve once `duration` has elapsed.
    async fn after(&self, duration: Duration);
}

/// The real clock: `chrono::Utc` for reads and the tokio timer for waits.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn after(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
