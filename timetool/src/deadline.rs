//! Retries spread over whatever time remains before a context's deadline.
//!
//! This is the toolkit's older retry scheme and predates [`Backoff`](crate::Backoff):
//! instead of a configured coefficient, attempt `i` of `n` is scheduled at
//! `start + timeout * i³ / n³`, so attempts bunch up early and thin out as
//! the deadline approaches.

use std::time::Duration;

use timetool_clock::{Context, sleep};
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::error::BackoffError;

const BACKOFF_POWER: i32 = 3;

/// Call `attempt` up to `iterations` times until it returns true, pacing the
/// attempts against the deadline carried by `ctx`.
///
/// `ctx` must have a deadline. As with [`Backoff::retry`](crate::Backoff::retry),
/// the context is checked once more after a success.
#[instrument(skip_all, fields(iterations = iterations))]
pub async fn retry_until_deadline<F>(
    ctx: &Context,
    iterations: u32,
    mut attempt: F,
) -> Result<(), BackoffError>
where
    F: FnMut(u32) -> bool,
{
    if iterations < 2 {
        return Err(BackoffError::TooFewIterations);
    }

    let session = Session::new(ctx, iterations)?;

    for index in 0..iterations {
        session.wait(ctx, index).await?;

        if attempt(index) {
            return Ok(ctx.done_or(())?);
        }
        debug!(attempt = index, "attempt failed");
    }

    match ctx.err() {
        Some(reason) => Err(reason.into()),
        None => Err(BackoffError::RetriesExhausted),
    }
}

/// [`retry_until_deadline`] with a fresh context that expires after `within`.
pub async fn retry_within<F>(within: Duration, iterations: u32, attempt: F) -> Result<(), BackoffError>
where
    F: FnMut(u32) -> bool,
{
    let ctx = Context::background().with_timeout(within);
    retry_until_deadline(&ctx, iterations, attempt).await
}

struct Session {
    start: Instant,
    timeout: Duration,
    denominator: f64,
}

impl Session {
    fn new(ctx: &Context, iterations: u32) -> Result<Self, BackoffError> {
        let start = Instant::now();
        let deadline = ctx.deadline().ok_or(BackoffError::MissingDeadline)?;

        let timeout = deadline.saturating_duration_since(start);
        if timeout.is_zero() {
            return Err(ctx.err().map_or(BackoffError::TimeWarp, BackoffError::from));
        }

        Ok(Self {
            start,
            timeout,
            denominator: f64::from(iterations).powi(BACKOFF_POWER),
        })
    }

    async fn wait(&self, ctx: &Context, index: u32) -> Result<(), BackoffError> {
        if index == 0 {
            return Ok(ctx.done_or(())?);
        }

        let fraction = f64::from(index).powi(BACKOFF_POWER) / self.denominator;
        let target = self.start + self.timeout.mul_f64(fraction);
        let remaining = target.saturating_duration_since(Instant::now());

        Ok(sleep(ctx, remaining).await?)
    }
}
