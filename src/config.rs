//! Detector configuration from environment variables

use std::env;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendType {
    Sqlite,
    Memory,
}

/// Configuration for the detector runtime
///
/// Loaded from environment variables (and `.env` via dotenv in the binary).
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Stop after this many processed messages; `None` runs until the source closes
    ///
    /// `MAX_MESSAGES=0` maps to `None` (no cap). A literal `processed >= 0`
    /// check would instead stop after the first message.
    pub max_messages: Option<u64>,

    /// Store write attempts per violation (0 still makes one attempt)
    pub max_retries: u32,

    pub backend: BackendType,

    /// SQLite database file
    pub store_path: String,

    /// JSONL input; stdin when unset
    pub input_path: Option<String>,

    pub tally_interval: Duration,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(format!("{} must be a number, got '{}'", name, raw))),
        Err(_) => Ok(default),
    }
}

impl DetectorConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `MAX_MESSAGES` (default: 200, 0 = unbounded)
    /// - `MAX_RETRIES` (default: 3)
    /// - `STORE_BACKEND` (default: sqlite; sqlite | memory)
    /// - `STORE_PATH` (default: data/violations.db)
    /// - `INPUT_PATH` (default: stdin)
    /// - `TALLY_INTERVAL_SECS` (default: 10)
    ///
    /// `RUST_LOG` is read by env_logger directly.
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_messages = match parse_var::<u64>("MAX_MESSAGES", 200)? {
            0 => None,
            n => Some(n),
        };

        let max_retries = parse_var::<u32>("MAX_RETRIES", 3)?;

        let backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "sqlite" => BackendType::Sqlite,
            "memory" => BackendType::Memory,
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "STORE_BACKEND must be 'sqlite' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let store_path = env::var("STORE_PATH").unwrap_or_else(|_| "data/violations.db".to_string());

        let input_path = env::var("INPUT_PATH").ok().filter(|p| !p.trim().is_empty());

        let tally_secs = parse_var::<u64>("TALLY_INTERVAL_SECS", 10)?;
        if tally_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "TALLY_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            max_messages,
            max_retries,
            backend,
            store_path,
            input_path,
            tally_interval: Duration::from_secs(tally_secs),
        })
    }
}
