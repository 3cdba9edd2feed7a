//! Time values as stored in preferences
//!
//! Times are persisted as a JSON string holding the signed number of
//! microseconds since the Unix epoch. Strings keep full `i64` precision,
//! which JSON numbers read by other tools may not.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// The "unset" time. Used as the open lower bound of deletion ranges.
pub fn null_time() -> DateTime<Utc> {
    DateTime::<Utc>::MIN_UTC
}

/// The open upper bound of deletion ranges.
pub fn max_time() -> DateTime<Utc> {
    DateTime::<Utc>::MAX_UTC
}

pub fn time_to_value(time: DateTime<Utc>) -> Value {
    Value::String(time.timestamp_micros().to_string())
}

/// Decode a stored time. Accepts the string form and, for hand-edited
/// stores, a bare integer.
pub fn value_to_time(value: &Value) -> Option<DateTime<Utc>> {
    let micros = match value {
        Value::String(raw) => raw.parse::<i64>().ok()?,
        Value::Number(number) => number.as_i64()?,
        _ => return None,
    };
    DateTime::<Utc>::from_timestamp_micros(micros)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_encodes_as_microsecond_string() {
        let time = Utc.timestamp_opt(100, 0).unwrap();
        assert_eq!(time_to_value(time), Value::String("100000000".into()));
        assert_eq!(value_to_time(&time_to_value(time)), Some(time));
    }

    #[test]
    fn test_bounds_survive_encoding() {
        assert_eq!(value_to_time(&time_to_value(null_time())), Some(null_time()));

        // Sub-microsecond precision is dropped.
        let decoded_max = value_to_time(&time_to_value(max_time())).unwrap();
        assert!(max_time() - decoded_max < chrono::Duration::microseconds(1));
    }

    #[test]
    fn test_rejects_malformed_values() {
        assert_eq!(value_to_time(&Value::String("soon".into())), None);
        assert_eq!(value_to_time(&Value::Bool(true)), None);
        assert_eq!(value_to_time(&Value::Null), None);
    }
}
