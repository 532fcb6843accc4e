//! # Persistence Context
//!
//! A unit-of-work session against the database.
//!
//! ## Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    DbContext Lifecycle                                  │
//! │                                                                         │
//! │  ctx.set::<Product>()            ← per-type collection accessor        │
//! │       │                                                                 │
//! │       ├── add(&p)     ──┐                                              │
//! │       ├── update(&p)  ──┼──► staged changes (in memory, nothing sent)  │
//! │       └── remove(&p)  ──┘                                              │
//! │                                                                         │
//! │  ctx.save_changes().await                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │  INSERT ...  → generated key                                    │   │
//! │  │  UPDATE ... WHERE id = ? AND row_version = ?  → 0 rows? conflict│   │
//! │  │  DELETE ... WHERE id = ?                                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ├── all ok  → COMMIT, SaveReport with per-change outcomes        │
//! │       └── any err → ROLLBACK, staged changes discarded, StoreError     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sharing
//! A context is meant for one logical unit of work at a time. The staged
//! list sits behind a short-lived lock that is never held across an
//! `.await`, but two callers staging into the same context will have their
//! changes committed together by whichever saves first.

use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, PoisonError};

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use ventas_core::{Entity, QuerySpec, Value};

use crate::error::{StoreError, StoreResult};
use crate::sql::{self, EntityMeta, INITIAL_TOKEN};

// =============================================================================
// Entity Bound
// =============================================================================

/// An [`Entity`] that can also be decoded from a SQLite row.
pub trait SqlEntity: Entity + for<'r> FromRow<'r, SqliteRow> {}

impl<T> SqlEntity for T where T: Entity + for<'r> FromRow<'r, SqliteRow> {}

// =============================================================================
// Staged Changes
// =============================================================================

/// What a staged change will do to its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntityState {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone)]
struct PendingChange {
    meta: EntityMeta,
    state: EntityState,
    key: Option<i64>,
    values: Vec<Value>,
    token: Option<i64>,
}

/// Handle to a staged change, used to find its outcome in the
/// [`SaveReport`] of the save that commits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeTicket {
    generation: u64,
    index: usize,
}

/// Result of one committed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// Row inserted; `key` is the store-assigned key.
    Added { key: i64, token: Option<i64> },
    /// Row updated; `token` is the new concurrency token when known.
    Modified { token: Option<i64> },
    Deleted,
}

/// Outcomes of a successful [`DbContext::save_changes`], in staging order.
#[derive(Debug, Clone, Default)]
pub struct SaveReport {
    generation: u64,
    outcomes: Vec<ChangeOutcome>,
}

impl SaveReport {
    /// Outcome for a ticket staged before this save, if it belongs to it.
    pub fn outcome(&self, ticket: ChangeTicket) -> Option<&ChangeOutcome> {
        if ticket.generation != self.generation {
            return None;
        }
        self.outcomes.get(ticket.index)
    }

    /// Number of changes committed.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

#[derive(Debug, Default)]
struct ChangeTracker {
    generation: u64,
    changes: Vec<PendingChange>,
}

// =============================================================================
// DbContext
// =============================================================================

/// Unit-of-work session over a SQLite pool.
#[derive(Debug)]
pub struct DbContext {
    pool: SqlitePool,
    tracker: Mutex<ChangeTracker>,
}

impl DbContext {
    /// Creates a context with nothing staged.
    pub fn new(pool: SqlitePool) -> Self {
        DbContext {
            pool,
            tracker: Mutex::new(ChangeTracker::default()),
        }
    }

    /// The collection accessor for entity type `T`.
    pub fn set<T: Entity>(&self) -> EntitySet<'_, T> {
        EntitySet {
            context: self,
            _marker: PhantomData,
        }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of staged, unsaved changes.
    pub fn pending_changes(&self) -> usize {
        self.tracker().changes.len()
    }

    /// Drops every staged change without touching the store.
    pub fn discard_changes(&self) {
        let mut tracker = self.tracker();
        if !tracker.changes.is_empty() {
            debug!(count = tracker.changes.len(), "Discarding staged changes");
        }
        tracker.changes.clear();
        tracker.generation += 1;
    }

    // Lock poisoning only means another thread panicked mid-push; the
    // Vec itself is still consistent.
    fn tracker(&self) -> MutexGuard<'_, ChangeTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stage(&self, change: PendingChange) -> ChangeTicket {
        let mut tracker = self.tracker();
        debug!(
            entity = change.meta.name,
            state = ?change.state,
            key = ?change.key,
            "Staging change"
        );
        tracker.changes.push(change);
        ChangeTicket {
            generation: tracker.generation,
            index: tracker.changes.len() - 1,
        }
    }

    /// Commits every staged change in one transaction.
    ///
    /// ## What This Does
    /// 1. Takes the staged list (new stagings go to the next save)
    /// 2. Runs each change in staging order inside one transaction
    /// 3. Commits, or rolls back on the first failure
    ///
    /// ## Returns
    /// * `Ok(SaveReport)` - Per-change outcomes (generated keys, tokens)
    /// * `Err(StoreError)` - Nothing was applied; staged changes are gone
    pub async fn save_changes(&self) -> StoreResult<SaveReport> {
        let (generation, changes) = {
            let mut tracker = self.tracker();
            let generation = tracker.generation;
            tracker.generation += 1;
            (generation, std::mem::take(&mut tracker.changes))
        };

        if changes.is_empty() {
            return Ok(SaveReport {
                generation,
                outcomes: Vec::new(),
            });
        }

        debug!(count = changes.len(), "Saving changes");

        let mut tx = self.pool.begin().await?;
        let mut outcomes = Vec::with_capacity(changes.len());

        for change in &changes {
            match apply(&mut tx, change).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    warn!(
                        entity = change.meta.name,
                        state = ?change.state,
                        key = ?change.key,
                        error = %err,
                        "Save failed, rolling back"
                    );
                    if let Err(rollback_err) = tx.rollback().await {
                        warn!(error = %rollback_err, "Rollback failed");
                    }
                    return Err(err);
                }
            }
        }

        tx.commit().await?;

        info!(count = outcomes.len(), "Changes saved");
        Ok(SaveReport {
            generation,
            outcomes,
        })
    }
}

/// Runs one staged change on the transaction's connection.
async fn apply(conn: &mut SqliteConnection, change: &PendingChange) -> StoreResult<ChangeOutcome> {
    let meta = &change.meta;

    match change.state {
        EntityState::Added => {
            let mut qb = sql::insert(meta, change.key, &change.values)?;
            let result = qb.build().execute(&mut *conn).await?;
            let key = change.key.unwrap_or_else(|| result.last_insert_rowid());
            Ok(ChangeOutcome::Added {
                key,
                token: meta.token.map(|_| INITIAL_TOKEN),
            })
        }

        EntityState::Modified => {
            let key = require_key(change)?;
            let mut qb = sql::update(meta, key, &change.values, change.token)?;
            let result = qb.build().execute(&mut *conn).await?;
            if result.rows_affected() == 0 {
                return Err(conflict(meta, key));
            }
            Ok(ChangeOutcome::Modified {
                token: meta.token.and(change.token).map(|t| t + 1),
            })
        }

        EntityState::Deleted => {
            let key = require_key(change)?;
            let mut qb = sql::delete(meta, key, change.token);
            let result = qb.build().execute(&mut *conn).await?;
            if result.rows_affected() == 0 {
                return Err(conflict(meta, key));
            }
            Ok(ChangeOutcome::Deleted)
        }
    }
}

fn require_key(change: &PendingChange) -> StoreResult<i64> {
    change.key.ok_or_else(|| StoreError::MissingKey {
        entity: change.meta.name.to_string(),
    })
}

fn conflict(meta: &EntityMeta, key: i64) -> StoreError {
    StoreError::ConcurrencyConflict {
        entity: meta.name.to_string(),
        key,
    }
}

// =============================================================================
// EntitySet
// =============================================================================

/// Per-type view of a [`DbContext`]: stages mutations and runs reads.
pub struct EntitySet<'ctx, T> {
    context: &'ctx DbContext,
    _marker: PhantomData<fn() -> T>,
}

impl<'ctx, T: Entity> EntitySet<'ctx, T> {
    /// Stages `entity` for insertion.
    pub fn add(&self, entity: &T) -> ChangeTicket {
        self.context.stage(PendingChange {
            meta: EntityMeta::of::<T>(),
            state: EntityState::Added,
            key: entity.key(),
            values: entity.values(),
            token: None,
        })
    }

    /// Stages `entity` as modified. The entity must carry a key.
    pub fn update(&self, entity: &T) -> StoreResult<ChangeTicket> {
        let key = self.key_of(entity)?;
        Ok(self.context.stage(PendingChange {
            meta: EntityMeta::of::<T>(),
            state: EntityState::Modified,
            key: Some(key),
            values: entity.values(),
            token: entity.concurrency_token(),
        }))
    }

    /// Stages `entity` for removal. The entity must carry a key.
    pub fn remove(&self, entity: &T) -> StoreResult<ChangeTicket> {
        let key = self.key_of(entity)?;
        Ok(self.context.stage(PendingChange {
            meta: EntityMeta::of::<T>(),
            state: EntityState::Deleted,
            key: Some(key),
            values: Vec::new(),
            token: entity.concurrency_token(),
        }))
    }

    fn key_of(&self, entity: &T) -> StoreResult<i64> {
        entity.key().ok_or_else(|| StoreError::MissingKey {
            entity: T::NAME.to_string(),
        })
    }
}

impl<'ctx, T: SqlEntity> EntitySet<'ctx, T> {
    /// Runs `spec` and returns every matching row.
    pub async fn fetch_all(&self, spec: &QuerySpec) -> StoreResult<Vec<T>> {
        let mut qb = sql::select(&EntityMeta::of::<T>(), spec)?;
        let rows = qb
            .build_query_as::<T>()
            .fetch_all(&self.context.pool)
            .await?;

        debug!(entity = T::NAME, count = rows.len(), "Fetched rows");
        Ok(rows)
    }

    /// Runs `spec` and returns the first matching row, if any.
    pub async fn fetch_optional(&self, spec: &QuerySpec) -> StoreResult<Option<T>> {
        let limit = spec.limit.map_or(1, |n| n.min(1));
        let spec = spec.clone().take(limit);
        let mut qb = sql::select(&EntityMeta::of::<T>(), &spec)?;
        let row = qb
            .build_query_as::<T>()
            .fetch_optional(&self.context.pool)
            .await?;

        Ok(row)
    }

    /// Counts the rows `spec` would return.
    pub async fn count(&self, spec: &QuerySpec) -> StoreResult<u64> {
        let mut qb = sql::count(&EntityMeta::of::<T>(), spec)?;
        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.context.pool)
            .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
