//! Time primitives shared by the timetool crates: an injectable [`Clock`], a
//! cancellable [`Context`], cancellable sleeps, a normally distributed ticker
//! and millisecond conversions.

mod clock;
mod context;
mod error;
mod millis;
mod sleep;
mod ticker;

pub mod test_clock;

pub use clock::{Clock, SystemClock};
pub use context::Context;
pub use error::{CancelReason, MillisError, TickerError};
pub use millis::{from_millis, to_millis};
pub use sleep::{sleep, sleep_until, sleep_until_with, sleep_with};
pub use ticker::NormalTicker;
