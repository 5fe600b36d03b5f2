use std::time::Duration;

use chrono::TimeDelta;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use timetool_clock::{Clock, Context, SystemClock, sleep_with};
use tracing::{debug, instrument};

use crate::error::BackoffError;

/// Parameters for a set of retries with exponential backoff.
///
/// A `Backoff` is a plain value: the `with_*` refinements consume a copy and
/// return a new policy, so one base policy can be shared by any number of
/// concurrent retries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Backoff {
    /// Maximum number of attempts, including the first.
    pub iterations: u32,
    /// Base unit of the exponential delay.
    pub coefficient: TimeDelta,
    /// Random modifier, as a percentage in `[0, 100)`, applied to each delay.
    pub jitter: f64,
    /// Wait before the very first attempt.
    pub start_wait: TimeDelta,
    /// Static wait before the second attempt.
    pub init_wait: TimeDelta,
}

impl Backoff {
    pub fn new(iterations: u32, coefficient: TimeDelta, jitter: f64) -> Self {
        Self {
            iterations,
            coefficient,
            jitter,
            start_wait: TimeDelta::zero(),
            init_wait: TimeDelta::zero(),
        }
    }

    /// Five attempts, one second coefficient, 0.1% jitter.
    pub fn standard() -> Self {
        Self::new(5, TimeDelta::seconds(1), 0.1)
    }

    /// Build a policy whose delays between attempts add up to `total`.
    pub fn calculate(iterations: u32, total: TimeDelta, jitter: f64) -> Result<Self, BackoffError> {
        if iterations < 3 {
            return Err(BackoffError::TooFewIterations);
        }
        if total < TimeDelta::zero() {
            return Err(BackoffError::NegativeDelay);
        }
        if !(0.0..100.0).contains(&jitter) {
            return Err(BackoffError::BadJitter);
        }

        Ok(Self::new(iterations, ladder_step(total, iterations), jitter))
    }

    pub fn with_start_wait(self, wait: TimeDelta) -> Self {
        Self {
            start_wait: wait,
            ..self
        }
    }

    pub fn with_initial_wait(self, wait: TimeDelta) -> Self {
        Self {
            init_wait: wait,
            ..self
        }
    }

    /// Derive a policy whose `start_wait`, `init_wait` and delays between
    /// attempts add up to `total`, jitter aside.
    ///
    /// Two-attempt policies never reach the exponential ladder, so all of
    /// `total` becomes the initial wait and `start_wait` is left as it was.
    /// Otherwise a budget smaller than the waits, or one whose remainder is
    /// not representable, is [`BackoffError::NegativeDelay`].
    pub fn with_total_delay(self, total: TimeDelta) -> Result<Self, BackoffError> {
        if self.iterations < 2 {
            return Err(BackoffError::TooFewIterations);
        }

        let derived = if self.iterations == 2 {
            Self {
                coefficient: TimeDelta::nanoseconds(1),
                init_wait: total,
                ..self
            }
        } else {
            let remainder = total
                .checked_sub(&self.start_wait)
                .and_then(|rest| rest.checked_sub(&self.init_wait))
                .filter(|rest| *rest >= TimeDelta::zero())
                .ok_or(BackoffError::NegativeDelay)?;
            Self {
                coefficient: ladder_step(remainder, self.iterations),
                ..self
            }
        };

        derived.validate()?;
        Ok(derived)
    }

    pub fn validate(&self) -> Result<(), BackoffError> {
        if self.iterations < 2 {
            return Err(BackoffError::TooFewIterations);
        }

        if self.uses_coefficient() {
            if self.coefficient == TimeDelta::zero() {
                return Err(BackoffError::ZeroCoefficient);
            }
            if self.coefficient < TimeDelta::zero() {
                return Err(BackoffError::NegativeDelay);
            }
        }

        if self.jitter != 0.0 && !(0.0..100.0).contains(&self.jitter) {
            return Err(BackoffError::BadJitter);
        }

        Ok(())
    }

    /// Delay following a failed `attempt` (one-based for the ladder) given a
    /// uniform draw `random` in `[0, 1)`. `random` is ignored without jitter.
    ///
    /// ```text
    /// multiple  =  2^(attempt - 1)
    /// multiple +=  multiple * ((jitter * random) - (jitter / 2)) / 100
    /// delay     =  coefficient * multiple
    /// ```
    pub fn delay_for(&self, attempt: u32, random: f64) -> TimeDelta {
        let exponent = attempt.saturating_sub(1).min(1_023) as i32;
        let mut multiple = 2f64.powi(exponent);

        if self.jitter != 0.0 {
            let j = ((self.jitter * random) - (self.jitter / 2.0)) / 100.0;
            multiple += multiple * j;
        }

        TimeDelta::nanoseconds((nanos(self.coefficient) * multiple) as i64)
    }

    /// Call `attempt` until it returns true, at most `iterations` times, using
    /// the system clock and a freshly seeded random source.
    ///
    /// `attempt` receives the zero-based attempt number. The first retry
    /// follows the first failure after `init_wait` only; every later failure
    /// is followed by [`Backoff::delay_for`]. Even after `attempt` reports
    /// success the context is checked once more and, if it is done, its
    /// reason is returned instead.
    pub async fn retry<F>(&self, ctx: &Context, attempt: F) -> Result<(), BackoffError>
    where
        F: FnMut(u32) -> bool,
    {
        let mut rng = StdRng::from_rng(&mut rand::rng());
        self.retry_with(ctx, &SystemClock, &mut rng, attempt).await
    }

    /// [`Backoff::retry`] with an explicit clock and random source.
    #[instrument(skip_all, fields(iterations = self.iterations))]
    pub async fn retry_with<C, R, F>(
        &self,
        ctx: &Context,
        clock: &C,
        rng: &mut R,
        mut attempt: F,
    ) -> Result<(), BackoffError>
    where
        C: Clock + ?Sized,
        R: Rng,
        F: FnMut(u32) -> bool,
    {
        self.validate()?;

        wait(clock, ctx, self.start_wait).await?;

        if attempt(0) {
            return Ok(ctx.done_or(())?);
        }
        debug!(attempt = 0, "attempt failed, retrying");

        for index in 1..self.iterations {
            if index == 1 {
                wait(clock, ctx, self.init_wait).await?;
            }

            if attempt(index) {
                return Ok(ctx.done_or(())?);
            }

            if !self.uses_coefficient() {
                debug!(attempt = index, "attempt failed");
                continue;
            }

            let random = if self.jitter != 0.0 {
                rng.random::<f64>()
            } else {
                0.0
            };
            let delay = self.delay_for(index, random);
            debug!(attempt = index, ?delay, "attempt failed, backing off");
            wait(clock, ctx, delay).await?;
        }

        match ctx.err() {
            Some(reason) => Err(reason.into()),
            None => Err(BackoffError::RetriesExhausted),
        }
    }

    /// Two-attempt policies are governed by their waits alone.
    fn uses_coefficient(&self) -> bool {
        self.iterations > 2
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::standard()
    }
}

/// [`Backoff::retry`] for an optional policy; `None` is [`BackoffError::NilPolicy`].
pub async fn retry<F>(
    policy: Option<&Backoff>,
    ctx: &Context,
    attempt: F,
) -> Result<(), BackoffError>
where
    F: FnMut(u32) -> bool,
{
    policy
        .ok_or(BackoffError::NilPolicy)?
        .retry(ctx, attempt)
        .await
}

/// Cancellable wait; non-positive delays only check the context.
async fn wait<C>(clock: &C, ctx: &Context, delay: TimeDelta) -> Result<(), BackoffError>
where
    C: Clock + ?Sized,
{
    if delay <= TimeDelta::zero() {
        return Ok(ctx.done_or(())?);
    }
    let delay = delay.to_std().unwrap_or(Duration::MAX);
    Ok(sleep_with(clock, ctx, delay).await?)
}

/// Coefficient for which `2^0 + 2^1 + ... + 2^(iterations-3)` steps span `span`.
fn ladder_step(span: TimeDelta, iterations: u32) -> TimeDelta {
    let exponent = iterations.saturating_sub(2).min(1_023) as i32;
    let steps = 2f64.powi(exponent) - 1.0;
    TimeDelta::nanoseconds((nanos(span) / steps) as i64)
}

fn nanos(delta: TimeDelta) -> f64 {
    match delta.num_nanoseconds() {
        Some(nanos) => nanos as f64,
        None => delta.num_milliseconds() as f64 * 1e6,
    }
}
