use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CancelReason;

/// Stand-in deadline for timeouts past the end of the tokio clock, the same
/// horizon tokio uses for an unbounded sleep.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Cancellation signal observed by every wait in this workspace.
///
/// A `Context` is a [`CancellationToken`] plus an optional deadline measured on
/// the tokio timer. Clones share the same token; [`Context::child`] and the
/// `with_*` constructors derive a context that is cancelled along with its
/// parent but can also be cancelled on its own.
#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never done unless [`Context::cancel`] is called.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a child that is also done at `deadline`. A parent deadline that
    /// is earlier still applies.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derive a child that is done once `timeout` has elapsed. Timeouts that
    /// overflow the clock are clamped to about thirty years.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        self.with_deadline(deadline)
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Reason the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve when the context is done.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                () = self.token.cancelled() => CancelReason::Canceled,
                () = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Canceled
            }
        }
    }

    /// `Err` with the context's reason if it is done, otherwise `Ok(value)`.
    pub fn done_or<T>(&self, value: T) -> Result<T, CancelReason> {
        match self.err() {
            Some(reason) => Err(reason),
            None => Ok(value),
        }
    }
}

impl From<CancellationToken> for Context {
    fn from(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_live_until_cancelled() {
        let ctx = Context::background();
        assert_eq!(ctx.err(), None);
        assert_eq!(ctx.done_or(7), Ok(7));

        ctx.cancel();
        assert_eq!(ctx.err(), Some(CancelReason::Canceled));
        assert_eq!(ctx.done_or(7), Err(CancelReason::Canceled));
    }

    #[test]
    fn parent_cancellation_reaches_children() {
        let parent = Context::background();
        let child = parent.child();
        let sibling = parent.child();

        child.cancel();
        assert_eq!(parent.err(), None);
        assert_eq!(sibling.err(), None);

        parent.cancel();
        assert_eq!(sibling.err(), Some(CancelReason::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_expires_on_the_tokio_timer() {
        let ctx = Context::background().with_timeout(Duration::from_secs(5));
        assert_eq!(ctx.err(), None);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(ctx.err(), Some(CancelReason::DeadlineExceeded));
        assert_eq!(ctx.done().await, CancelReason::DeadlineExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_parent_deadline_wins() {
        let parent = Context::background().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_timeout_is_clamped() {
        let start = Instant::now();
        let ctx = Context::background().with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline(), Some(start + FAR_FUTURE));
        assert_eq!(ctx.err(), None);

        let parent = Context::background().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::MAX);
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test]
    async fn done_reports_cancellation_over_an_elapsed_deadline() {
        let ctx = Context::background().with_timeout(Duration::ZERO);
        ctx.cancel();
        assert_eq!(ctx.done().await, CancelReason::Canceled);
    }
}
