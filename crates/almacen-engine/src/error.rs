//! # Engine Error Types
//!
//! The error surface callers of the engine see. Business errors from
//! almacen-core pass through unchanged; database errors are either lifted
//! into their business meaning (not found, conflict) or reported as
//! internal failures.

use thiserror::Error;

use almacen_core::CoreError;
use almacen_db::DbError;

/// Errors surfaced by engine services.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule violation (insufficient stock, not found, conflict,
    /// payment failures, validation).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Unexpected database failure with no business meaning.
    #[error("Database error: {0}")]
    Database(DbError),
}

impl EngineError {
    /// HTTP-style status classification.
    ///
    /// Business errors classify themselves; database failures are 500.
    pub fn http_status(&self) -> u16 {
        match self {
            EngineError::Core(err) => err.http_status(),
            EngineError::Database(_) => 500,
        }
    }
}

/// Lifts database errors into business errors where they carry one.
///
/// ## Mapping
/// ```text
/// DbError::NotFound         → CoreError::NotFound
/// DbError::UniqueViolation  → CoreError::Conflict
/// everything else           → EngineError::Database
/// ```
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => {
                EngineError::Core(CoreError::NotFound { entity, id })
            }
            DbError::UniqueViolation { field, value } => EngineError::Core(CoreError::Conflict(
                format!("duplicate {field}: '{value}' already exists"),
            )),
            other => EngineError::Database(other),
        }
    }
}

impl From<almacen_core::ValidationError> for EngineError {
    fn from(err: almacen_core::ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

/// Convenience type alias for Results with EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_not_found_becomes_business_not_found() {
        let err: EngineError = DbError::not_found("Product", "p-1").into();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::NotFound { .. })
        ));
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn test_unique_violation_becomes_conflict() {
        let err: EngineError = DbError::UniqueViolation {
            field: "products.barcode".to_string(),
            value: "777".to_string(),
        }
        .into();
        assert_eq!(err.http_status(), 409);
    }

    #[test]
    fn test_internal_db_error_is_500() {
        let err: EngineError = DbError::Internal("disk on fire".to_string()).into();
        assert_eq!(err.http_status(), 500);
    }
}
