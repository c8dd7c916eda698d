use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};

/// Point in time attached to chat messages.
///
/// Serializes as an RFC 3339 string, which is what the chat backend expects in
/// `conversation_history`. Deserializes from either an RFC 3339 string or a
/// UNIX timestamp in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Timestamp(DateTime<Utc>);

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TimestampVisitor;

        impl de::Visitor<'_> for TimestampVisitor {
            type Value = Timestamp;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a UNIX timestamp (int) or RFC 3339 string")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Timestamp::from_unix_timestamp(value)
                    .ok_or_else(|| E::custom("timestamp out of range"))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                i64::try_from(value)
                    .ok()
                    .and_then(Timestamp::from_unix_timestamp)
                    .ok_or_else(|| E::custom("timestamp out of range"))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Timestamp::from_iso_string(value)
                    .map_err(|err| E::custom(format!("invalid RFC 3339 timestamp: {err}")))
            }
        }

        deserializer.deserialize_any(TimestampVisitor)
    }
}

impl Timestamp {
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Seconds since the UNIX epoch. `None` when out of chrono's range.
    #[must_use]
    pub fn from_unix_timestamp(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self)
    }

    pub fn from_iso_string(s: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s).map(|dt| Self(dt.with_timezone(&Utc)))
    }

    #[must_use]
    pub fn to_unix_timestamp(&self) -> i64 {
        self.0.timestamp()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}
