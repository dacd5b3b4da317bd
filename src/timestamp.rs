use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Absolute point in time as exchanged with the API.
///
/// The wire format is inconsistent: rate headers carry Unix epoch seconds
/// while some payloads use RFC3339 strings. `Timestamp` decodes both and
/// always encodes back to epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Timestamp for the given epoch seconds; `None` if out of range.
    pub fn from_unix(secs: i64) -> Option<Timestamp> {
        DateTime::<Utc>::from_timestamp(secs, 0).map(Timestamp)
    }

    /// Seconds since the Unix epoch.
    pub fn unix(&self) -> i64 {
        self.0.timestamp()
    }

    pub fn now() -> Timestamp {
        Timestamp(Utc::now())
    }
}

// The zero value is the epoch itself, which the rate logic relies on:
// an unobserved reset time is always in the past.
impl Default for Timestamp {
    fn default() -> Self {
        Timestamp(DateTime::UNIX_EPOCH)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.unix())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimestampVisitor;

        impl de::Visitor<'_> for TimestampVisitor {
            type Value = Timestamp;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a Unix epoch integer or an RFC3339 string")
            }

            fn visit_i64<E: de::Error>(self, secs: i64) -> Result<Timestamp, E> {
                Timestamp::from_unix(secs)
                    .ok_or_else(|| E::custom(format!("epoch seconds out of range: {}", secs)))
            }

            fn visit_u64<E: de::Error>(self, secs: u64) -> Result<Timestamp, E> {
                let secs = i64::try_from(secs)
                    .map_err(|_| E::custom(format!("epoch seconds out of range: {}", secs)))?;
                self.visit_i64(secs)
            }

            fn visit_f64<E: de::Error>(self, secs: f64) -> Result<Timestamp, E> {
                self.visit_i64(secs as i64)
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<Timestamp, E> {
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| Timestamp(dt.with_timezone(&Utc)))
                    .map_err(|e| E::custom(format!("invalid RFC3339 timestamp: {}", e)))
            }
        }

        deserializer.deserialize_any(TimestampVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_roundtrip() {
        let ts = Timestamp::from_unix(1_700_000_000).unwrap();
        assert_eq!(ts.unix(), 1_700_000_000);
    }

    #[test]
    fn decodes_integer_and_rfc3339() {
        let from_int: Timestamp = serde_json::from_str("1700000000").unwrap();
        let from_str: Timestamp = serde_json::from_str("\"2023-11-14T22:13:20Z\"").unwrap();
        assert_eq!(from_int, from_str);
    }

    #[test]
    fn encodes_as_epoch_integer() {
        let ts = Timestamp::from_unix(42).unwrap();
        assert_eq!(serde_json::to_string(&ts).unwrap(), "42");
    }

    #[test]
    fn zero_value_is_epoch() {
        assert_eq!(Timestamp::default().unix(), 0);
        assert!(Timestamp::default() < Timestamp::now());
    }

    #[test]
    fn rejects_garbage_strings() {
        assert!(serde_json::from_str::<Timestamp>("\"next tuesday\"").is_err());
    }
}
