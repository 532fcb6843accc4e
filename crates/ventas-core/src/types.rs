//! # Domain Types
//!
//! Sample entities of the sales database, used by the seed binary and the
//! repository tests.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐           ┌─────────────────────┐                 │
//! │  │    Category     │ 1       * │      Product        │                 │
//! │  │  ─────────────  │◄──────────│  ─────────────────  │                 │
//! │  │  id (store)     │           │  id (store)         │                 │
//! │  │  name (unique)  │           │  category_id (FK)   │                 │
//! │  │  description    │           │  sku (unique)       │                 │
//! │  │  is_active      │           │  price_cents        │                 │
//! │  └─────────────────┘           │  row_version (token)│                 │
//! │                                └─────────────────────┘                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Keys are INTEGER primary keys assigned by the store on insert. A key of
//! `0` means "not persisted yet".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::ValidationResult;
use crate::validation::{validate_name, validate_price_cents, validate_reference, validate_sku};
use crate::value::Value;

#[inline]
fn stored_key(id: i64) -> Option<i64> {
    (id > 0).then_some(id)
}

// =============================================================================
// Category
// =============================================================================

/// A product category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    /// Store-assigned identifier (0 until created).
    pub id: i64,

    /// Display name. Unique across categories.
    pub name: String,

    pub description: Option<String>,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

impl Category {
    /// Creates an unsaved, active category.
    pub fn new(name: impl Into<String>) -> Self {
        Category {
            id: 0,
            name: name.into(),
            description: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Entity for Category {
    const NAME: &'static str = "Category";
    const TABLE: &'static str = "categories";
    const COLUMNS: &'static [&'static str] = &["name", "description", "is_active", "created_at"];

    fn key(&self) -> Option<i64> {
        stored_key(self.id)
    }

    fn set_key(&mut self, key: i64) {
        self.id = key;
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::from(&self.name),
            Value::from(self.description.clone()),
            Value::from(self.is_active),
            Value::from(self.created_at),
        ]
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// `row_version` is the optimistic concurrency token: every successful
/// update bumps it, and an update carrying a stale value is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,

    /// Owning category (foreign key).
    pub category_id: i64,

    /// Stock Keeping Unit - business identifier, unique.
    pub sku: String,

    pub name: String,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    pub stock: i64,

    pub is_active: bool,

    pub row_version: i64,

    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Creates an unsaved product in the given category.
    pub fn new(
        category_id: i64,
        sku: impl Into<String>,
        name: impl Into<String>,
        price_cents: i64,
    ) -> Self {
        Product {
            id: 0,
            category_id,
            sku: sku.into(),
            name: name.into(),
            price_cents,
            stock: 0,
            is_active: true,
            row_version: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = stock;
        self
    }
}

impl Entity for Product {
    const NAME: &'static str = "Product";
    const TABLE: &'static str = "products";
    const COLUMNS: &'static [&'static str] = &[
        "category_id",
        "sku",
        "name",
        "price_cents",
        "stock",
        "is_active",
        "created_at",
    ];
    const CONCURRENCY_TOKEN: Option<&'static str> = Some("row_version");

    fn key(&self) -> Option<i64> {
        stored_key(self.id)
    }

    fn set_key(&mut self, key: i64) {
        self.id = key;
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.category_id),
            Value::from(&self.sku),
            Value::from(&self.name),
            Value::from(self.price_cents),
            Value::from(self.stock),
            Value::from(self.is_active),
            Value::from(self.created_at),
        ]
    }

    fn concurrency_token(&self) -> Option<i64> {
        Some(self.row_version)
    }

    fn set_concurrency_token(&mut self, token: i64) {
        self.row_version = token;
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_reference("category_id", self.category_id)?;
        validate_sku(&self.sku)?;
        validate_name("name", &self.name)?;
        validate_price_cents(self.price_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_values_follow_column_order() {
        let category = Category::new("Beverages");
        assert_eq!(category.values().len(), Category::COLUMNS.len());

        let product = Product::new(1, "COKE-330", "Coca-Cola 330ml", 150);
        let values = product.values();
        assert_eq!(values.len(), Product::COLUMNS.len());
        assert_eq!(values[1], Value::Text("COKE-330".to_string()));
    }

    #[test]
    fn test_unsaved_entities_have_no_key() {
        let mut category = Category::new("Snacks");
        assert_eq!(category.key(), None);

        category.set_key(4);
        assert_eq!(category.key(), Some(4));
    }

    #[test]
    fn test_fields_include_key_and_token() {
        let fields = Product::fields();
        assert_eq!(fields.first(), Some(&"id"));
        assert_eq!(fields.last(), Some(&"row_version"));
        assert!(fields.contains(&"sku"));

        assert!(!Category::fields().contains(&"row_version"));
    }

    #[test]
    fn test_product_validation() {
        assert!(Product::new(1, "COKE-330", "Coke", 150).validate().is_ok());

        let err = Product::new(0, "COKE-330", "Coke", 150).validate().unwrap_err();
        assert!(matches!(err, ValidationError::MustBePositive { .. }));

        assert!(Product::new(1, "bad sku", "Coke", 150).validate().is_err());
        assert!(Product::new(1, "COKE-330", "Coke", -1).validate().is_err());
    }
}
