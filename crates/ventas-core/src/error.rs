//! # Error Types
//!
//! Validation error types for ventas-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  ventas-core errors (this file)                                        │
//! │  └── ValidationError  - Malformed entity or predicate arguments        │
//! │                                                                         │
//! │  ventas-db errors (separate crate)                                     │
//! │  ├── StoreError       - What the persistence context reports          │
//! │  └── RepoError        - What repository callers see                   │
//! │                                                                         │
//! │  Flow: ValidationError ──────────────► RepoError::InvalidArgument      │
//! │        sqlx::Error → StoreError ─────► RepoError::{Constraint..}       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (field, entity, etc.)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Argument validation errors.
///
/// Raised before anything reaches the store, both for entity values
/// (create/update/delete) and for predicate trees (lookup/query).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} cannot be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The entity has never been persisted, so there is no row to touch.
    ///
    /// ## When This Occurs
    /// - `update` or `delete` called with an entity whose key is unassigned
    #[error("{entity} has no key; load it from the store before modifying it")]
    MissingKey { entity: String },

    /// A predicate or ordering names a column the entity does not declare.
    #[error("{entity} has no field named '{field}'")]
    UnknownField { entity: String, field: String },

    /// A predicate node carries an empty field name.
    #[error("predicate field name cannot be empty")]
    EmptyField,

    /// `IN` with nothing to match against.
    #[error("IN list for '{field}' cannot be empty")]
    EmptyInList { field: String },

    /// `LIKE` with an empty pattern.
    #[error("LIKE pattern for '{field}' cannot be empty")]
    EmptyPattern { field: String },

    /// Ordering comparison against NULL is never true in SQL.
    #[error("'{field}' cannot be compared with null using {op}")]
    NullComparison { field: String, op: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for validation results.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "sku".to_string(),
        };
        assert_eq!(err.to_string(), "sku is required");

        let err = ValidationError::UnknownField {
            entity: "Product".to_string(),
            field: "colour".to_string(),
        };
        assert_eq!(err.to_string(), "Product has no field named 'colour'");
    }

    #[test]
    fn test_missing_key_message() {
        let err = ValidationError::MissingKey {
            entity: "Category".to_string(),
        };
        assert!(err.to_string().starts_with("Category has no key"));
    }
}
