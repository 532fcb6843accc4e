//! # ventas-db: Persistence Layer for the Ventas Data Layer
//!
//! This crate puts the generic repository on top of SQLite, using sqlx for
//! async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Ventas Data Flow                                 │
//! │                                                                         │
//! │  Business service  (repo.get / create / update / delete / query)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     ventas-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌───────────────┐   ┌────────────────┐  │   │
//! │  │   │  repository   │   │   context     │   │      sql       │  │   │
//! │  │   │               │   │               │   │                │  │   │
//! │  │   │ Repository<T> │──►│ DbContext     │──►│ predicate →    │  │   │
//! │  │   │ Generic...<T> │   │ EntitySet<T>  │   │ QueryBuilder   │  │   │
//! │  │   │ Query<T>      │   │ save_changes  │   │                │  │   │
//! │  │   └───────────────┘   └───────────────┘   └────────────────┘  │   │
//! │  │          │                                                      │   │
//! │  │          ▼                                                      │   │
//! │  │   StoreError ──► RepoError (5 stable kinds)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            SQLite (WAL, foreign keys on, migrations embedded)   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `DbConfig` builder and environment loading
//! - [`pool`] - `Database` handle: pool, contexts, repositories
//! - [`migrations`] - Embedded database migrations
//! - [`context`] - Unit of work (`DbContext`, `EntitySet`, `SaveReport`)
//! - [`query`] - Deferred, composable `Query<T>`
//! - [`repository`] - `Repository<T>` contract and `GenericRepository<T>`
//! - [`error`] - `StoreError` and the repository error taxonomy
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ventas_core::{Category, Field};
//! use ventas_db::{Database, DbConfig, Repository};
//!
//! let db = Database::new(DbConfig::new("./ventas.db")).await?;
//! let categories = db.repository::<Category>();
//!
//! let snacks = categories.create(Category::new("Snacks")).await?;
//! let found = categories.get(&Field::new("id").eq(snacks.id)).await?;
//!
//! let active = categories
//!     .query(Some(Field::new("is_active").eq(true)))?
//!     .order_by("name")
//!     .to_vec()
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod context;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod query;
pub mod repository;

mod sql;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, DbConfig};
pub use context::{ChangeOutcome, ChangeTicket, DbContext, EntitySet, SaveReport, SqlEntity};
pub use error::{ErrorKind, Operation, RepoError, RepoResult, StoreError, StoreResult};
pub use migrations::MigrationStatus;
pub use pool::Database;
pub use query::Query;
pub use repository::{GenericRepository, Repository};
