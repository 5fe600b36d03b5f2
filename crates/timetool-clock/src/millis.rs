use chrono::{DateTime, Utc};

use crate::error::MillisError;

const NANOS_PER_MILLI: i64 = 1_000_000;

/// Milliseconds since the Unix epoch, rounded to the nearest millisecond
/// (halfway values round up).
pub fn to_millis(t: DateTime<Utc>) -> i64 {
    let sub_nanos = i64::from(t.timestamp_subsec_nanos());
    t.timestamp() * 1_000 + (sub_nanos + NANOS_PER_MILLI / 2) / NANOS_PER_MILLI
}

/// Interpret `millis` as milliseconds since the Unix epoch.
pub fn from_millis(millis: i64) -> Result<DateTime<Utc>, MillisError> {
    DateTime::from_timestamp_millis(millis).ok_or(MillisError::OutOfRange(millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    const MILLIS: i64 = 1_279_156_356_512;

    fn reference_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2010, 7, 15, 1, 12, 36)
            .single()
            .expect("valid date")
            + TimeDelta::milliseconds(512)
    }

    #[test]
    fn converts_time_to_millis() {
        assert_eq!(to_millis(reference_time()), MILLIS);
    }

    #[test]
    fn converts_millis_to_time() {
        assert_eq!(from_millis(MILLIS), Ok(reference_time()));
    }

    #[test]
    fn rounds_sub_millisecond_remainders() {
        let t = reference_time();
        assert_eq!(to_millis(t + TimeDelta::microseconds(499)), MILLIS);
        assert_eq!(to_millis(t + TimeDelta::microseconds(500)), MILLIS + 1);
        assert_eq!(to_millis(t - TimeDelta::microseconds(400)), MILLIS);
    }

    #[test]
    fn handles_times_before_the_epoch() {
        let t = from_millis(-1_500).expect("in range");
        assert_eq!(t.timestamp(), -2);
        assert_eq!(to_millis(t), -1_500);
    }

    #[test]
    fn rejects_out_of_range_millis() {
        assert_eq!(from_millis(i64::MAX), Err(MillisError::OutOfRange(i64::MAX)));
    }
}
