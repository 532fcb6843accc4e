//! # Entity Metadata
//!
//! The [`Entity`] trait is everything the generic repository needs to
//! know about a persisted record type: where it lives, which columns it
//! writes, how it is keyed, and whether it carries a concurrency token.
//!
//! ## Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Entity → Table Mapping                              │
//! │                                                                         │
//! │  struct Product            table "products"                            │
//! │  ├── id ──────────────────► KEY (store-assigned, 0 = not persisted)    │
//! │  ├── category_id ─────────┐                                            │
//! │  ├── sku                  │                                            │
//! │  ├── name                 ├► COLUMNS (written on insert/update,       │
//! │  ├── price_cents          │            values() in the same order)     │
//! │  ├── stock                │                                            │
//! │  ├── ...                 ─┘                                            │
//! │  └── row_version ─────────► CONCURRENCY_TOKEN (checked + bumped)       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationResult;
use crate::value::Value;

/// A record type the persistence context knows how to store.
///
/// Row decoding is left to the store layer (`sqlx::FromRow` in ventas-db),
/// so this trait stays free of any database dependency.
pub trait Entity: Send + Sync + Unpin + 'static {
    /// Human-readable name used in errors and logs.
    const NAME: &'static str;

    /// Backing table.
    const TABLE: &'static str;

    /// Primary key column (integer, assigned by the store).
    const KEY: &'static str = "id";

    /// Writable columns, excluding the key and the concurrency token.
    const COLUMNS: &'static [&'static str];

    /// Optimistic concurrency column, if the entity has one.
    const CONCURRENCY_TOKEN: Option<&'static str> = None;

    /// The store-assigned key, or `None` if never persisted.
    fn key(&self) -> Option<i64>;

    fn set_key(&mut self, key: i64);

    /// Column values in [`Entity::COLUMNS`] order.
    fn values(&self) -> Vec<Value>;

    /// Current concurrency token value.
    fn concurrency_token(&self) -> Option<i64> {
        None
    }

    fn set_concurrency_token(&mut self, _token: i64) {}

    /// Entity-level argument checks, run before anything is staged.
    fn validate(&self) -> ValidationResult<()> {
        Ok(())
    }

    /// Every column a predicate or ordering may reference.
    fn fields() -> Vec<&'static str> {
        let mut fields = Vec::with_capacity(Self::COLUMNS.len() + 2);
        fields.push(Self::KEY);
        fields.extend_from_slice(Self::COLUMNS);
        if let Some(token) = Self::CONCURRENCY_TOKEN {
            fields.push(token);
        }
        fields
    }
}
