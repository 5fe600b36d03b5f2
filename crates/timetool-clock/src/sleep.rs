use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::{Clock, SystemClock};
use crate::context::Context;
use crate::error::CancelReason;

/// Wait for `duration` or until `ctx` is done, whichever comes first.
///
/// Cancellation is polled ahead of the timer, so a context that is already
/// done wins even against a zero-length wait.
pub async fn sleep(ctx: &Context, duration: Duration) -> Result<(), CancelReason> {
    sleep_with(&SystemClock, ctx, duration).await
}

/// Wait until the wall-clock time `at`. A time in the past is a zero-length wait.
pub async fn sleep_until(ctx: &Context, at: DateTime<Utc>) -> Result<(), CancelReason> {
    sleep_until_with(&SystemClock, ctx, at).await
}

pub async fn sleep_with<C>(clock: &C, ctx: &Context, duration: Duration) -> Result<(), CancelReason>
where
    C: Clock + ?Sized,
{
    tokio::select! {
        biased;
        reason = ctx.done() => Err(reason),
        () = clock.after(duration) => Ok(()),
    }
}

pub async fn sleep_until_with<C>(
    clock: &C,
    ctx: &Context,
    at: DateTime<Utc>,
) -> Result<(), CancelReason>
where
    C: Clock + ?Sized,
{
    let remaining = (at - clock.now()).to_std().unwrap_or(Duration::ZERO);
    sleep_with(clock, ctx, remaining).await
}
