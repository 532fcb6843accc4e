//! # Repository Module
//!
//! The repository contract and its generic implementation.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Generic Repository                                   │
//! │                                                                         │
//! │  Business service                                                      │
//! │       │                                                                 │
//! │       │  repo.get(&Field::new("sku").eq("COKE-330")).await             │
//! │       ▼                                                                 │
//! │  Repository<T>  (trait, object safe)                                   │
//! │  ├── get(&self, predicate)      → Option<T>                            │
//! │  ├── create(&self, entity)      → T with store key                     │
//! │  ├── update(&self, &mut entity) → bool                                 │
//! │  ├── delete(&self, &entity)     → bool                                 │
//! │  └── query(&self, predicate?)   → Query<T> (deferred)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  GenericRepository<T>                                                  │
//! │       │   validate → stage on DbContext → save → translate errors     │
//! │       ▼                                                                 │
//! │  DbContext  ──►  SQLite (one transaction per save)                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every failure comes back as a [`RepoError`](crate::error::RepoError)
//! whose [`kind()`](crate::error::RepoError::kind) is one of the five
//! [`ErrorKind`](crate::error::ErrorKind)s.

mod generic;

pub use generic::GenericRepository;

use async_trait::async_trait;
use ventas_core::{Entity, Predicate};

use crate::error::RepoResult;
use crate::query::Query;

/// Uniform data access over one entity type.
///
/// Object safe, so callers can hold a `Box<dyn Repository<Product>>` and
/// swap the backend without touching call sites.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// First entity matching `predicate`, or `None`.
    async fn get(&self, predicate: &Predicate) -> RepoResult<Option<T>>;

    /// Persists a new entity and returns it with its store-assigned key.
    async fn create(&self, entity: T) -> RepoResult<T>;

    /// Persists changes to a loaded entity.
    ///
    /// On success the entity's concurrency token is refreshed, so it can be
    /// updated again without reloading.
    async fn update(&self, entity: &mut T) -> RepoResult<bool>;

    /// Removes a loaded entity.
    async fn delete(&self, entity: &T) -> RepoResult<bool>;

    /// A deferred query; `None` matches every entity.
    ///
    /// Not `async`: nothing is sent until one of the [`Query`] executors
    /// is awaited.
    fn query(&self, predicate: Option<Predicate>) -> RepoResult<Query<T>>;
}
