// Error taxonomy for the favorites core
//
// Store failures are split into "busy" (another writer holds the lock) and
// everything else, so callers can tell a lost race from a broken store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FavoritesError {
    /// Malformed desired-state payload (missing category or id)
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown user or catalog entity
    #[error("{0} not found")]
    NotFound(String),

    /// Read or write failure against persisted state
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A concurrent reconciliation holds the writer lock
    #[error("concurrent reconciliation in progress: {0}")]
    ConflictRace(String),
}

impl FavoritesError {
    pub fn validation(message: impl Into<String>) -> Self {
        FavoritesError::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        FavoritesError::NotFound(what.into())
    }

    /// Short machine-readable code, used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            FavoritesError::Validation(_) => "validation_error",
            FavoritesError::NotFound(_) => "not_found",
            FavoritesError::StoreUnavailable(_) => "store_unavailable",
            FavoritesError::ConflictRace(_) => "conflict",
        }
    }
}

impl From<rusqlite::Error> for FavoritesError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                FavoritesError::ConflictRace(err.to_string())
            }
            _ => FavoritesError::StoreUnavailable(err.to_string()),
        }
    }
}

pub type FavoritesResult<T> = Result<T, FavoritesError>;
