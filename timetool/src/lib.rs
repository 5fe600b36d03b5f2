//! Jittered exponential backoff retries driven by a cancellable [`Context`].
//!
//! ```no_run
//! use chrono::TimeDelta;
//! use timetool::{Backoff, Context};
//!
//! # async fn run() -> Result<(), timetool::BackoffError> {
//! let policy = Backoff::new(5, TimeDelta::seconds(1), 10.0)
//!     .with_initial_wait(TimeDelta::milliseconds(250));
//! let ctx = Context::background();
//! policy.retry(&ctx, |attempt| attempt >= 2).await
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod deadline;
pub mod error;
pub mod policy_map;

pub use backoff::{Backoff, retry};
pub use config::{PolicyMapConfig, PolicySpec, load_policy_map_config};
pub use deadline::{retry_until_deadline, retry_within};
pub use error::{BackoffError, ConfigError};
pub use policy_map::PolicyMap;

pub use timetool_clock::{
    CancelReason, Clock, Context, MillisError, NormalTicker, SystemClock, TickerError,
    from_millis, sleep, sleep_until, to_millis,
};

/// Convenience helper for loading a policy file and building a [`PolicyMap`].
pub fn load_policy_map(path: &std::path::Path) -> Result<PolicyMap, ConfigError> {
    let config = load_policy_map_config(path)?;
    PolicyMap::from_config(&config)
}
