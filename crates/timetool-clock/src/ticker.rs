use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand_distr::Normal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::context::Context;
use crate::error::{CancelReason, TickerError};

/// A ticker whose periods are drawn from a normal distribution.
///
/// Each tick delivers the clock's time at the moment its period ran out. The
/// next period only starts once the previous tick has been received, so a
/// slow receiver delays later ticks instead of collecting stale ones. Ticking
/// continues until [`NormalTicker::stop`] is called or the constructor's
/// context is done.
#[derive(Debug)]
pub struct NormalTicker {
    ticks: mpsc::Receiver<DateTime<Utc>>,
    stop: CancellationToken,
    state: Arc<Mutex<State>>,
    task: JoinHandle<()>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum State {
    Active,
    Stopped,
    Expired(CancelReason),
}

impl NormalTicker {
    /// Start a ticker on the system clock. Must be called from within a tokio runtime.
    pub fn new(ctx: &Context, mean: Duration, stddev: Duration) -> Result<Self, TickerError> {
        let rng = StdRng::from_rng(&mut rand::rng());
        Self::with_clock(ctx, mean, stddev, Arc::new(SystemClock), rng)
    }

    pub fn with_clock<C, R>(
        ctx: &Context,
        mean: Duration,
        stddev: Duration,
        clock: Arc<C>,
        rng: R,
    ) -> Result<Self, TickerError>
    where
        C: Clock + 'static,
        R: rand::Rng + Send + 'static,
    {
        let periods = Periods::new(mean, stddev, rng)?;
        let (tx, ticks) = mpsc::channel(1);
        let stop = CancellationToken::new();
        let state = Arc::new(Mutex::new(State::Active));

        let task = tokio::spawn(run(
            ctx.clone(),
            stop.clone(),
            Arc::clone(&state),
            clock,
            periods,
            tx,
        ));

        Ok(Self {
            ticks,
            stop,
            state,
            task,
        })
    }

    /// Receive the next tick, or `None` once the ticker has stopped.
    pub async fn tick(&mut self) -> Option<DateTime<Utc>> {
        self.ticks.recv().await
    }

    /// Turn the ticker off. The producer exits without sending another tick;
    /// a tick that already fired may still be received.
    pub fn stop(&self) {
        settle(&self.state, State::Stopped);
        self.stop.cancel();
        tracing::trace!("normal ticker stop requested");
    }

    /// How the ticker ended: `Ok` after [`NormalTicker::stop`], the context's
    /// reason once it is done, or [`TickerError::Active`] while still running.
    pub fn err(&self) -> Result<(), TickerError> {
        match *lock(&self.state) {
            State::Active => Err(TickerError::Active),
            State::Stopped => Ok(()),
            State::Expired(reason) => Err(TickerError::Cancelled(reason)),
        }
    }

    /// Whether the producing task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for NormalTicker {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

struct Periods<R> {
    normal: Normal<f64>,
    rng: R,
}

impl<R: rand::Rng> Periods<R> {
    fn new(mean: Duration, stddev: Duration, rng: R) -> Result<Self, TickerError> {
        let normal = Normal::new(mean.as_nanos() as f64, stddev.as_nanos() as f64)
            .map_err(|err| TickerError::Distribution(err.to_string()))?;
        Ok(Self { normal, rng })
    }

    /// Next period; draws below zero fire immediately.
    fn next(&mut self) -> Duration {
        let nanos = self.normal.sample(&mut self.rng);
        if nanos.is_finite() && nanos > 0.0 {
            Duration::from_nanos(nanos as u64)
        } else {
            Duration::ZERO
        }
    }
}

async fn run<C, R>(
    ctx: Context,
    stop: CancellationToken,
    state: Arc<Mutex<State>>,
    clock: Arc<C>,
    mut periods: Periods<R>,
    tx: mpsc::Sender<DateTime<Utc>>,
) where
    C: Clock + 'static,
    R: rand::Rng + Send + 'static,
{
    let outcome = loop {
        // The single slot frees up once the previous tick was taken.
        let permit = tokio::select! {
            biased;
            reason = ctx.done() => break State::Expired(reason),
            () = stop.cancelled() => break State::Stopped,
            permit = tx.reserve() => match permit {
                Ok(permit) => permit,
                Err(_) => break State::Stopped,
            },
        };

        let period = periods.next();
        tokio::select! {
            biased;
            reason = ctx.done() => break State::Expired(reason),
            () = stop.cancelled() => break State::Stopped,
            () = clock.after(period) => permit.send(clock.now()),
        }
    };

    tracing::trace!(?outcome, "normal ticker exiting");
    settle(&state, outcome);
}

/// Record the final state unless one has already been recorded.
fn settle(state: &Mutex<State>, outcome: State) {
    let mut current = lock(state);
    if *current == State::Active {
        *current = outcome;
    }
}

fn lock(state: &Mutex<State>) -> std::sync::MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
