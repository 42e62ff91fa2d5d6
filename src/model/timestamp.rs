use chrono::{Duration, SecondsFormat, TimeZone, Utc};
use derive_new::new;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

pub fn now() -> Timestamp {
    Utc::now().into()
}

/// A UTC instant. Serialized as an RFC 3339 string, stored as a SurrealDB `datetime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, new)]
pub struct Timestamp(chrono::DateTime<Utc>);

impl Timestamp {
    /// Milliseconds since the unix epoch. Out-of-range values saturate at the epoch.
    pub fn from_millis(millis: i64) -> Self {
        Self(Utc.timestamp_millis_opt(millis).single().unwrap_or_default())
    }

    pub fn millis(self) -> i64 {
        self.0.timestamp_millis()
    }

    pub fn inner(self) -> chrono::DateTime<Utc> {
        self.0
    }

    pub fn to_datetime(self) -> surrealdb::sql::Datetime {
        self.0.into()
    }
}

impl From<chrono::DateTime<Utc>> for Timestamp {
    fn from(value: chrono::DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl AsRef<chrono::DateTime<Utc>> for Timestamp {
    fn as_ref(&self) -> &chrono::DateTime<Utc> {
        &self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0
            .to_rfc3339_opts(SecondsFormat::AutoSi, true)
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| Self(dt.into()))
            .map_err(serde::de::Error::custom)
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs)
    }
}
