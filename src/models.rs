//! Data models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::errors::SailtrackError;

/// Maritime Mobile Service Identity (MMSI)
///
/// A unique nine-digit number for identifying vessels in AIS messages.
/// Zero is not a valid MMSI here: reports whose vessel cannot be identified
/// carry no MMSI at all rather than a zero placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "u32")]
pub struct Mmsi(u32);

impl TryFrom<u32> for Mmsi {
    type Error = SailtrackError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 || value > 999_999_999 {
            return Err(SailtrackError::InvalidMmsi(value.to_string()));
        }
        Ok(Self(value))
    }
}

impl TryFrom<i64> for Mmsi {
    type Error = SailtrackError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        let value =
            u32::try_from(value).map_err(|_| SailtrackError::InvalidMmsi(value.to_string()))?;
        Self::try_from(value)
    }
}

impl TryFrom<&str> for Mmsi {
    type Error = SailtrackError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let parsed = value
            .trim()
            .parse::<u32>()
            .map_err(|_| SailtrackError::InvalidMmsi(value.to_string()))?;
        Self::try_from(parsed)
    }
}

impl From<Mmsi> for u32 {
    fn from(mmsi: Mmsi) -> Self {
        mmsi.0
    }
}

impl std::fmt::Display for Mmsi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Mmsi {
    /// Get the raw MMSI value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Best-effort vessel identifier lookup in a decoded stream message.
    ///
    /// Candidate locations are tried in order: top-level `MMSI`, top-level
    /// `mmsi`, `MetaData.MMSI`, and `Message.PositionReport.UserID`. The
    /// first one holding a valid MMSI (integer, integral float or numeric
    /// string) wins.
    pub fn from_message(message: &Value) -> Option<Self> {
        const PATHS: [&[&str]; 4] = [
            &["MMSI"],
            &["mmsi"],
            &["MetaData", "MMSI"],
            &["Message", "PositionReport", "UserID"],
        ];

        PATHS
            .iter()
            .filter_map(|path| lookup(message, path))
            .find_map(Self::from_json)
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(v) => Self::try_from(v).ok(),
                // Integral floats such as 111222333.0
                None => n
                    .as_f64()
                    .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= f64::from(u32::MAX))
                    .and_then(|v| Self::try_from(v as u32).ok()),
            },
            Value::String(s) => Self::try_from(s.as_str()).ok(),
            _ => None,
        }
    }
}

/// Follow a path of object keys into a JSON value.
pub(crate) fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

/// Geographic position in WGS84 decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

/// A stored AIS stream message
///
/// `raw_payload` is the canonical record; `mmsi` is a projection taken at
/// ingestion time and is `None` when the message could not be attributed
/// to a vessel.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    /// Store-assigned, strictly increasing with insertion order
    pub sequence_id: i64,
    /// Time of receipt by the stream subscriber
    pub received_at: DateTime<Utc>,
    pub mmsi: Option<Mmsi>,
    pub raw_payload: Vec<u8>,
}

impl PositionReport {
    /// Decode the raw payload as JSON, if it is JSON
    pub fn message(&self) -> Option<Value> {
        serde_json::from_slice(&self.raw_payload).ok()
    }
}
