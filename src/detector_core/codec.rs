//! Storage key/value codec for detected violations
//!
//! Keys are `<license>_<YYYY-MM-DD_HH:MM:SS>` in UTC, so reprocessing the
//! same passage overwrites the same record. Values are JSON with a fixed
//! field order: `license`, `time`, `x`, `y`.

use super::classifier::Violation;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

pub const KEY_TIME_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRecord {
    pub key: String,
    pub value: Vec<u8>,
}

/// Persisted violation payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationValue {
    pub license: String,
    pub time: i64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug)]
pub enum CodecError {
    TimestampOutOfRange(i64),
    Serialization(serde_json::Error),
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Serialization(err)
    }
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::TimestampOutOfRange(t) => write!(f, "Timestamp out of range: {}", t),
            CodecError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for CodecError {}

pub fn format_key(license: &str, t: i64) -> Result<String, CodecError> {
    let time = DateTime::from_timestamp(t, 0).ok_or(CodecError::TimestampOutOfRange(t))?;
    Ok(format!("{}_{}", license, time.format(KEY_TIME_FORMAT)))
}

pub fn encode(violation: &Violation) -> Result<StorageRecord, CodecError> {
    let key = format_key(&violation.license, violation.point.t)?;
    let value = serde_json::to_vec(&ViolationValue {
        license: violation.license.clone(),
        time: violation.point.t,
        x: violation.point.x,
        y: violation.point.y,
    })?;

    Ok(StorageRecord { key, value })
}
