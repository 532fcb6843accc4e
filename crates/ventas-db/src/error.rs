//! # Database Error Types
//!
//! Two layers of errors live here.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError ← What the persistence context reports (categorized)       │
//! │       │                                                                 │
//! │       ▼  RepoError::from_store(operation, entity, err)                 │
//! │  RepoError  ← Stable kind + message, StoreError kept as source()       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Business layer decides what the user sees                             │
//! │                                                                         │
//! │  ValidationError ──────────► RepoError::InvalidArgument                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Kind Selection
//! ```text
//! Operation      StoreError                           → ErrorKind
//! ─────────────  ───────────────────────────────────    ───────────────────
//! get / query    query / lowering / connection / pool → ExecutionFailure
//! create         constraint / database rejection      → ConstraintViolation
//! update/delete  concurrency conflict                 → ConcurrencyConflict
//! update/delete  constraint / database rejection      → ConstraintViolation
//! any            anything else                        → UnknownFailure
//! ```

use std::fmt;

use sqlx::error::ErrorKind as SqlxErrorKind;
use thiserror::Error;
use tracing::debug;
use ventas_core::ValidationError;

// =============================================================================
// Store Errors
// =============================================================================

/// Failures reported by the persistence context.
///
/// These wrap sqlx errors and sort them into categories the repository
/// can translate without looking at driver types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU
    /// - Renaming a category to an existing name
    #[error("Duplicate value for {field}: {message}")]
    UniqueViolation { field: String, message: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Referencing a non-existent category_id
    /// - Deleting a category that still has products
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// NOT NULL constraint violation.
    #[error("Not null violation: {message}")]
    NotNullViolation { message: String },

    /// CHECK constraint violation.
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    /// No row matched the key (and concurrency token) of an update or delete.
    ///
    /// ## When This Occurs
    /// - Another writer bumped the row's concurrency token
    /// - Another writer deleted the row
    #[error("{entity} {key} was modified or deleted since it was loaded")]
    ConcurrencyConflict { entity: String, key: i64 },

    /// An update or delete was staged for an entity that has no key.
    #[error("{entity} has no key")]
    MissingKey { entity: String },

    /// A predicate or ordering could not be lowered to SQL.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Runtime SQL error reported by the database.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A row could not be decoded into the entity type.
    #[error("Failed to decode row: {0}")]
    Decode(String),

    /// Database connection failed or was lost.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Schema constraint rejections (unique, foreign key, not null, check).
    pub fn is_constraint(&self) -> bool {
        matches!(
            self,
            StoreError::UniqueViolation { .. }
                | StoreError::ForeignKeyViolation { .. }
                | StoreError::NotNullViolation { .. }
                | StoreError::CheckViolation { .. }
        )
    }

    /// Anything the database itself refused while applying a write.
    pub fn is_write_rejection(&self) -> bool {
        self.is_constraint() || matches!(self, StoreError::QueryFailed(_))
    }

    /// Failures building or running a read.
    pub fn is_execution(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidQuery(_)
                | StoreError::QueryFailed(_)
                | StoreError::ConnectionFailed(_)
                | StoreError::PoolExhausted
        )
    }
}

/// Convert sqlx errors to StoreError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → constraint kind, else QueryFailed
/// sqlx::Error::PoolTimedOut   → StoreError::PoolExhausted
/// sqlx::Error::PoolClosed/Io  → StoreError::ConnectionFailed
/// decode errors               → StoreError::Decode
/// Other                       → StoreError::Internal
/// ```
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();

                // SQLite reports e.g. "UNIQUE constraint failed: products.sku";
                // fall back to the message when the extended code is missing.
                match db_err.kind() {
                    SqlxErrorKind::UniqueViolation => unique_violation(msg),
                    SqlxErrorKind::ForeignKeyViolation => {
                        StoreError::ForeignKeyViolation { message: msg }
                    }
                    SqlxErrorKind::NotNullViolation => StoreError::NotNullViolation { message: msg },
                    SqlxErrorKind::CheckViolation => StoreError::CheckViolation { message: msg },
                    _ if msg.contains("UNIQUE constraint failed") => unique_violation(msg),
                    _ if msg.contains("FOREIGN KEY constraint failed") => {
                        StoreError::ForeignKeyViolation { message: msg }
                    }
                    _ => StoreError::QueryFailed(msg),
                }
            }

            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,

            sqlx::Error::PoolClosed => StoreError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(e) => StoreError::ConnectionFailed(e.to_string()),

            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_) => StoreError::Decode(err.to_string()),

            _ => StoreError::Internal(err.to_string()),
        }
    }
}

fn unique_violation(msg: String) -> StoreError {
    let field = msg
        .split("UNIQUE constraint failed: ")
        .nth(1)
        .unwrap_or("unknown")
        .to_string();
    StoreError::UniqueViolation {
        field,
        message: msg,
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

/// Result type for persistence context operations.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Repository Errors
// =============================================================================

/// The five repository operations, used to pick kinds and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    Create,
    Update,
    Delete,
    Query,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Query => "query",
        };
        f.write_str(name)
    }
}

/// Stable, documented failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Predicate or entity argument is malformed.
    InvalidArgument,
    /// The store rejected an insert/update/delete.
    ConstraintViolation,
    /// Optimistic concurrency token mismatch, or the row vanished.
    ConcurrencyConflict,
    /// The store could not build or execute a query.
    ExecutionFailure,
    /// Anything else.
    UnknownFailure,
}

/// Errors returned by [`Repository`](crate::repository::Repository)
/// operations.
///
/// Every variant keeps the original failure reachable through
/// [`std::error::Error::source`].
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{message}")]
    InvalidArgument {
        message: String,
        #[source]
        source: ValidationError,
    },

    #[error("{message}")]
    ConstraintViolation {
        message: String,
        #[source]
        source: StoreError,
    },

    #[error("{message}")]
    ConcurrencyConflict {
        message: String,
        #[source]
        source: StoreError,
    },

    #[error("{message}")]
    ExecutionFailure {
        message: String,
        #[source]
        source: StoreError,
    },

    #[error("{message}")]
    UnknownFailure {
        message: String,
        #[source]
        source: StoreError,
    },
}

impl RepoError {
    /// Wraps a rejected argument.
    pub fn invalid_argument(op: Operation, entity: &str, source: ValidationError) -> Self {
        RepoError::InvalidArgument {
            message: describe(op, ErrorKind::InvalidArgument, entity),
            source,
        }
    }

    /// Translates a store failure for the given operation.
    pub fn from_store(op: Operation, entity: &str, source: StoreError) -> Self {
        let kind = classify(op, &source);
        let message = describe(op, kind, entity);

        debug!(
            operation = %op,
            entity = %entity,
            kind = ?kind,
            cause = %source,
            "Translated store failure"
        );

        match kind {
            ErrorKind::ConstraintViolation => RepoError::ConstraintViolation { message, source },
            ErrorKind::ConcurrencyConflict => RepoError::ConcurrencyConflict { message, source },
            ErrorKind::ExecutionFailure => RepoError::ExecutionFailure { message, source },
            ErrorKind::InvalidArgument | ErrorKind::UnknownFailure => {
                RepoError::UnknownFailure { message, source }
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RepoError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            RepoError::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            RepoError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            RepoError::ExecutionFailure { .. } => ErrorKind::ExecutionFailure,
            RepoError::UnknownFailure { .. } => ErrorKind::UnknownFailure,
        }
    }

    /// Human-readable message, without the underlying cause.
    pub fn message(&self) -> &str {
        match self {
            RepoError::InvalidArgument { message, .. }
            | RepoError::ConstraintViolation { message, .. }
            | RepoError::ConcurrencyConflict { message, .. }
            | RepoError::ExecutionFailure { message, .. }
            | RepoError::UnknownFailure { message, .. } => message,
        }
    }

    /// The store failure behind this error, if it came from the store.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            RepoError::InvalidArgument { .. } => None,
            RepoError::ConstraintViolation { source, .. }
            | RepoError::ConcurrencyConflict { source, .. }
            | RepoError::ExecutionFailure { source, .. }
            | RepoError::UnknownFailure { source, .. } => Some(source),
        }
    }
}

/// Most specific kind first. Reads never report write kinds and vice versa.
fn classify(op: Operation, err: &StoreError) -> ErrorKind {
    match op {
        Operation::Get | Operation::Query if err.is_execution() => ErrorKind::ExecutionFailure,
        Operation::Update | Operation::Delete
            if matches!(err, StoreError::ConcurrencyConflict { .. }) =>
        {
            ErrorKind::ConcurrencyConflict
        }
        Operation::Create | Operation::Update | Operation::Delete if err.is_write_rejection() => {
            ErrorKind::ConstraintViolation
        }
        _ => ErrorKind::UnknownFailure,
    }
}

fn describe(op: Operation, kind: ErrorKind, entity: &str) -> String {
    match (op, kind) {
        (Operation::Get, ErrorKind::InvalidArgument) => {
            format!("The filter provided for {entity} is not valid")
        }
        (Operation::Get, ErrorKind::ExecutionFailure) => {
            format!("Could not execute the {entity} lookup")
        }
        (Operation::Query, ErrorKind::InvalidArgument) => {
            format!("The query filter provided for {entity} is not valid")
        }
        (Operation::Query, ErrorKind::ExecutionFailure) => {
            format!("Could not execute the {entity} query")
        }
        (Operation::Create, ErrorKind::InvalidArgument)
        | (Operation::Update, ErrorKind::InvalidArgument)
        | (Operation::Delete, ErrorKind::InvalidArgument) => {
            format!("The {entity} passed to {op} is not valid")
        }
        (Operation::Create, ErrorKind::ConstraintViolation) => {
            format!("The database rejected the new {entity}")
        }
        (Operation::Update, ErrorKind::ConstraintViolation) => {
            format!("The database rejected the {entity} update")
        }
        (Operation::Delete, ErrorKind::ConstraintViolation) => {
            format!("{entity} could not be deleted; check dependent records")
        }
        (Operation::Update, ErrorKind::ConcurrencyConflict) => {
            format!("{entity} was changed by another writer since it was loaded")
        }
        (Operation::Delete, ErrorKind::ConcurrencyConflict) => {
            format!("{entity} was already deleted or changed by another writer")
        }
        _ => format!("Unexpected error during {entity} {op}"),
    }
}

/// Result type for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

// =============================================================================
// Unit Tests
// =============================================================================
