//! Passage decoding
//!
//! A passage is one vehicle crossing: a license plate plus the raw track
//! samples recorded by the intersection camera. Samples arrive unordered.

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};

/// Single timestamped position sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Unix seconds
    pub t: i64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    #[serde(rename = "licenseNum")]
    pub license_num: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub track: Vec<TrackPoint>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<TrackPoint>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<TrackPoint>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug)]
pub enum DecodeError {
    Json(serde_json::Error),
    /// Timestamp chrono cannot place on the calendar
    TimestampOutOfRange(i64),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err)
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Json(e) => write!(f, "Malformed passage: {}", e),
            DecodeError::TimestampOutOfRange(t) => {
                write!(f, "Malformed passage: timestamp out of range: {}", t)
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Json(e) => Some(e),
            DecodeError::TimestampOutOfRange(_) => None,
        }
    }
}

/// Parse a raw message payload into a passage
///
/// Missing `licenseNum`, or a track point without `t`, is rejected, as is a
/// `t` outside the calendar range. A missing or `null` track is empty;
/// missing coordinates are zero.
pub fn decode(raw: &[u8]) -> Result<Passage, DecodeError> {
    let passage: Passage = serde_json::from_slice(raw)?;

    if let Some(point) = passage
        .track
        .iter()
        .find(|p| DateTime::from_timestamp(p.t, 0).is_none())
    {
        return Err(DecodeError::TimestampOutOfRange(point.t));
    }

    Ok(passage)
}
