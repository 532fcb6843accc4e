//! # ventas-core: Pure Types for the Ventas Data Layer
//!
//! This crate holds everything the generic repository works with that
//! does not need a database: entity metadata, predicate trees, column
//! values, query specifications and validation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Ventas Data Layer                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                Business services (outside)                      │   │
//! │  │      hold a Repository<T>, build predicates, handle errors      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ ventas-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  entity   │  │ predicate │  │   query   │  │ validation│  │   │
//! │  │   │  Entity   │  │ Predicate │  │ QuerySpec │  │   rules   │  │   │
//! │  │   │  types    │  │   Field   │  │  OrderBy  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ventas-db (persistence context)                   │   │
//! │  │        DbContext, Query<T>, GenericRepository<T>, SQLite        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`entity`] - The `Entity` trait (table, key, columns, token)
//! - [`predicate`] - Composable filters and the `Field` builder
//! - [`query`] - Filter + ordering + paging specification
//! - [`value`] - Column values bound as SQL parameters
//! - [`types`] - Sample entities (`Category`, `Product`)
//! - [`error`] - Validation error types
//! - [`validation`] - Field validators
//!
//! ## Example Usage
//!
//! ```rust
//! use ventas_core::{Entity, Field, Product};
//!
//! let in_stock = Field::new("stock").gt(0) & Field::new("is_active").eq(true);
//! assert!(in_stock.validate(Product::NAME, &Product::fields()).is_ok());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod entity;
pub mod error;
pub mod predicate;
pub mod query;
pub mod types;
pub mod validation;
pub mod value;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use entity::Entity;
pub use error::{ValidationError, ValidationResult};
pub use predicate::{CompareOp, Field, Predicate};
pub use query::{Direction, OrderBy, QuerySpec};
pub use types::*;
pub use value::Value;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum SKU length.
pub const MAX_SKU_LENGTH: usize = 50;

/// Maximum length for display names.
pub const MAX_NAME_LENGTH: usize = 200;
