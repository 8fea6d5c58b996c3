//! # Error Types
//!
//! Domain-specific error types for almacen-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  almacen-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                        │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  almacen-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  almacen-engine errors (separate crate)                                 │
//! │  └── EngineError      - What API surfaces see (with HTTP status)        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → caller               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (barcode, quantities, branch)
//! 3. Errors are enum variants, never bare strings
//! 4. Every business error maps to an HTTP-style status class

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Requested quantity exceeds available stock.
    ///
    /// ## When This Occurs
    /// - Selling more than the branch has on hand
    /// - Transferring more than the source branch holds
    /// - Any adjustment that would drive `quantity` below zero
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Entity lookup failed (product, branch, inventory record, shift).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// State conflict: shift already open, duplicate unique key.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The card terminal processed the transaction and declined it.
    #[error("Card payment declined (response code {response_code})")]
    PaymentFailed { response_code: i64 },

    /// The card terminal could not be reached, or timed out.
    #[error("Payment terminal unavailable: {0}")]
    PaymentGatewayUnavailable(String),

    /// Import source was structurally unreadable.
    #[error("Invalid import file: {0}")]
    InvalidFileFormat(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Convenience constructor for lookup failures.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// HTTP-style status classification for this error.
    ///
    /// 400 validation / insufficient stock, 404 not found, 409 conflict,
    /// 402-family gateway failures mapped to 502/504.
    pub fn http_status(&self) -> u16 {
        match self {
            CoreError::Validation(_) | CoreError::InvalidFileFormat(_) => 400,
            CoreError::InsufficientStock { .. } => 400,
            CoreError::NotFound { .. } => 404,
            CoreError::Conflict(_) => 409,
            CoreError::PaymentFailed { .. } => 502,
            CoreError::PaymentGatewayUnavailable(_) => 504,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when caller input doesn't meet requirements; used for early
/// validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be a positive integer.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., malformed barcode).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product: "Coca-Cola 350ml".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Coca-Cola 350ml: available 3, requested 5"
        );
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(
            CoreError::not_found("Product", "p-1").http_status(),
            404
        );
        assert_eq!(CoreError::Conflict("open shift".into()).http_status(), 409);
        assert_eq!(
            CoreError::PaymentFailed { response_code: 5 }.http_status(),
            502
        );
        assert_eq!(
            CoreError::PaymentGatewayUnavailable("timeout".into()).http_status(),
            504
        );
        assert_eq!(
            CoreError::InsufficientStock {
                product: "x".into(),
                available: 0,
                requested: 1
            }
            .http_status(),
            400
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "barcode".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.http_status(), 400);
    }
}
