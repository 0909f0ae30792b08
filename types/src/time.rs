//! Wall-clock timestamps carried in envelopes.
//!
//! Serialized as RFC 3339 strings with sub-second precision so chat history
//! received from different peers can be ordered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A UTC wall-clock instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Current system time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Build from Unix milliseconds; out-of-range values clamp to the epoch.
    pub fn from_unix_millis(millis: i64) -> Self {
        Self(DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH))
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// `HH:MM:SS`, the format used when rendering chat lines.
    pub fn clock(&self) -> String {
        self.0.format("%H:%M:%S").to_string()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self(DateTime::UNIX_EPOCH)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_format() {
        let ts = Timestamp::from_unix_millis(3_723_000);
        assert_eq!(ts.clock(), "01:02:03");
    }

    #[test]
    fn serializes_as_rfc3339_string() {
        let ts = Timestamp::from_unix_millis(1_700_000_000_123);
        let json = serde_json::to_string(&ts).unwrap();
        assert!(json.starts_with("\"2023-11-14T22:13:20.123"));
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn ordering_follows_time() {
        assert!(Timestamp::from_unix_millis(1) < Timestamp::from_unix_millis(2));
    }
}
