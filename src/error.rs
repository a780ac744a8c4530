//! Unified error types for the settlement core.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("sub-competition {0} is already settled")]
    AlreadySettled(i64),

    #[error("entry {entry_id} is not registered for sub-competition {sub_competition_id}")]
    InvalidEntry {
        sub_competition_id: i64,
        entry_id: i64,
    },

    #[error("a result already exists for sub-competition {0}")]
    DuplicateResult(i64),

    #[error("amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("wallet {wallet_id} holds {balance}, cannot debit {requested}")]
    InsufficientFunds {
        wallet_id: i64,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("house cut fraction must be in [0, 1), got {0}")]
    InvalidHouseCut(Decimal),

    #[error("store conflict: {0}")]
    StoreConflict(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("store error: {0}")]
    Store(String),
}

impl SettlementError {
    /// Whether the whole operation can be retried from scratch. The atomic
    /// unit of work guarantees no partial effect survives a failed attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SettlementError::StoreConflict(_) | SettlementError::StoreUnavailable(_)
        )
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // serialization_failure / deadlock_detected
                Some("40001") | Some("40P01") => SettlementError::StoreConflict(db.to_string()),
                _ => SettlementError::Store(err.to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                SettlementError::StoreUnavailable(err.to_string())
            }
            _ => SettlementError::Store(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SettlementError>;
