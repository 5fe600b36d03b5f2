use thiserror::Error;

/// Why a [`Context`](crate::Context) is done.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum CancelReason {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum TickerError {
    #[error("ticker is active")]
    Active,
    #[error(transparent)]
    Cancelled(#[from] CancelReason),
    #[error("invalid tick distribution: {0}")]
    Distribution(String),
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum MillisError {
    #[error("{0} milliseconds since the epoch is out of range")]
    OutOfRange(i64),
}
