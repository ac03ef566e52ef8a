/// The main error type for ledger, order and payload operations.
///
/// Quota exhaustion is never an error: it is reported through
/// [`QuotaDecision`](crate::billing::QuotaDecision) instead.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Input was rejected before any mutation happened.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested transition conflicts with the current stored state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The backing store could not be reached or rejected the statement.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable identifier of the error kind, for structured logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationFailed(_) => "validation_failed",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            LedgerError::ValidationFailed(format!("JSON error: {}", err))
        } else {
            LedgerError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

#[cfg(feature = "database")]
impl From<sea_orm::DbErr> for LedgerError {
    fn from(err: sea_orm::DbErr) -> Self {
        if let Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return LedgerError::ValidationFailed(format!("Duplicate key: {}", detail));
        }

        match &err {
            sea_orm::DbErr::RecordNotFound(msg) => LedgerError::NotFound(if msg.is_empty() {
                "Record not found".to_string()
            } else {
                msg.clone()
            }),
            sea_orm::DbErr::Conn(inner) => {
                LedgerError::StorageUnavailable(format!("Connection error: {}", inner))
            }
            sea_orm::DbErr::ConnectionAcquire(inner) => {
                LedgerError::StorageUnavailable(format!("Connection pool error: {}", inner))
            }
            sea_orm::DbErr::Query(inner) => {
                LedgerError::StorageUnavailable(format!("Query error: {}", inner))
            }
            sea_orm::DbErr::Exec(inner) => {
                LedgerError::StorageUnavailable(format!("Execution error: {}", inner))
            }
            sea_orm::DbErr::Type(inner) => LedgerError::Internal(format!("Type error: {}", inner)),
            sea_orm::DbErr::Migration(inner) => {
                LedgerError::StorageUnavailable(format!("Migration error: {}", inner))
            }
            _ => LedgerError::StorageUnavailable(format!("Database error: {}", err)),
        }
    }
}
