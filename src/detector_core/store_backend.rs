use async_trait::async_trait;

#[derive(Debug)]
pub enum StoreError {
    /// Store-side failure expected to clear on retry
    Internal(String),
    /// Store temporarily unreachable
    Unavailable(String),
    /// Store refused the write; retrying will not help
    Rejected(String),
    NotConnected,
}

impl StoreError {
    /// Whether the retrying writer should try again
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Internal(_) | StoreError::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                StoreError::Internal(err.to_string())
            }
            Some(rusqlite::ErrorCode::CannotOpen) => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Rejected(err.to_string()),
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Internal(e) => write!(f, "Internal store error: {}", e),
            StoreError::Unavailable(e) => write!(f, "Store unavailable: {}", e),
            StoreError::Rejected(e) => write!(f, "Store rejected write: {}", e),
            StoreError::NotConnected => write!(f, "Store not connected"),
        }
    }
}

impl std::error::Error for StoreError {}

#[async_trait]
pub trait KvStore: Send {
    /// Open the underlying connection
    async fn connect(&mut self, conn: &str) -> Result<(), StoreError>;

    /// Insert or overwrite `key`; returns rows affected
    async fn insert(&mut self, key: &str, value: &[u8]) -> Result<u64, StoreError>;

    /// Release the connection
    async fn close(&mut self) -> Result<(), StoreError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
