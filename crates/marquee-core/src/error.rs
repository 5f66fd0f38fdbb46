//! # Error Types
//!
//! Domain-specific error types for marquee-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  marquee-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  marquee-db errors (separate crate)                                    │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── ServiceError     - Core ∪ Db for composite operations             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → HTTP caller        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, statuses, amounts)
//! 3. Errors are enum variants, never String
//! 4. Errors propagate unmodified; no silent recovery (the one exception,
//!    checkout's idempotent already-exists path, is documented at its site)

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations. They are user-correctable and
/// should be surfaced to the caller as client errors, not crashes.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An order status change outside the lifecycle allow-list.
    ///
    /// ## When This Occurs
    /// - Jumping steps (pending_reservation → returned)
    /// - Moving out of a terminal status (returned, cancelled)
    /// - Re-entering the current status
    #[error("cannot transition order from {from:?} to {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Reservation could not fully cover an order line.
    ///
    /// ## When This Occurs
    /// - No inventory rows exist for the product
    /// - The summed `available` across all warehouses is short
    ///
    /// ## User Workflow
    /// ```text
    /// confirm reservation (need: 5)
    ///      │
    ///      ▼
    /// warehouses hold 3 across all rows
    ///      │
    ///      ▼
    /// InsufficientStock { product_id, requested: 5, available: 3 }
    ///      │
    ///      ▼
    /// operator restocks or splits the order
    /// ```
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    /// Product referenced by a cart operation does not exist.
    #[error("product not found: {0}")]
    ProductNotFound(String),

    /// Variant referenced by a cart operation does not exist.
    #[error("product variant not found: {0}")]
    VariantNotFound(String),

    /// Validation error (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when caller input doesn't meet requirements. Used for early
/// validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date window).
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
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "prod-42".to_string(),
            requested: 5,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock for product prod-42: requested 5, available 3"
        );

        let err = CoreError::InvalidTransition {
            from: OrderStatus::PendingReservation,
            to: OrderStatus::Returned,
        };
        assert_eq!(
            err.to_string(),
            "cannot transition order from PendingReservation to Returned"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "session_token".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
