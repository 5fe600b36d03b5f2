use thiserror::Error;
use timetool_clock::CancelReason;

/// Errors surfaced by [`Backoff`](crate::Backoff) validation and retries.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum BackoffError {
    #[error("nil backoff policy")]
    NilPolicy,
    #[error("number of iterations must be at least 2")]
    TooFewIterations,
    #[error("coefficient cannot be zero")]
    ZeroCoefficient,
    #[error("negative delay value; time travel not yet supported")]
    NegativeDelay,
    #[error("invalid jitter value; must be [0.0, 100.0)")]
    BadJitter,
    #[error("all retries exhausted")]
    RetriesExhausted,
    #[error(transparent)]
    Cancelled(#[from] CancelReason),
    #[error("context must have a deadline")]
    MissingDeadline,
    #[error("valid context has deadline in the past")]
    TimeWarp,
}

impl BackoffError {
    /// True for the errors a policy's own validation produces.
    pub fn is_invalid_policy(&self) -> bool {
        matches!(
            self,
            Self::NilPolicy
                | Self::TooFewIterations
                | Self::ZeroCoefficient
                | Self::NegativeDelay
                | Self::BadJitter
        )
    }
}

/// Errors surfaced while loading named policies.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("policy `{0}` not found")]
    PolicyNotFound(String),
    #[error("duplicate policy name `{0}`")]
    DuplicatePolicy(String),
    #[error("invalid policy `{name}`: {source}")]
    InvalidPolicy {
        name: String,
        #[source]
        source: BackoffError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml_bw::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn policy_not_found(name: impl Into<String>) -> Self {
        ConfigError::PolicyNotFound(name.into())
    }

    pub fn invalid_policy(name: impl Into<String>, source: BackoffError) -> Self {
        ConfigError::InvalidPolicy {
            name: name.into(),
            source,
        }
    }
}
