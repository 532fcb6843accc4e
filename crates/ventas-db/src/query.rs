//! # Deferred Queries
//!
//! [`Query<T>`] is what `Repository::query` hands back: a description of a
//! result set that can still be narrowed, ordered and paged. Nothing touches
//! the store until one of the executors runs.
//!
//! ```text
//! repo.query(Some(active))?          ← predicate checked here
//!     .filter(Field::new("stock").gt(0))
//!     .order_by_desc("price_cents")
//!     .skip(20).take(10)
//!     .to_vec().await?               ← SELECT runs here
//! ```
//!
//! Every executor first re-checks the composed filter, so a bad
//! `filter(...)` is an `InvalidArgument`. Failures building or running the
//! statement (an unknown ordering column, a lost connection) come back as
//! `ExecutionFailure`.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;
use ventas_core::{Predicate, QuerySpec};

use crate::context::{DbContext, SqlEntity};
use crate::error::{Operation, RepoError, RepoResult, StoreResult};

/// A lazily evaluated, composable query over entity type `T`.
pub struct Query<T> {
    context: Arc<DbContext>,
    spec: QuerySpec,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Query {
            context: Arc::clone(&self.context),
            spec: self.spec.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query").field("spec", &self.spec).finish()
    }
}

impl<T> Query<T> {
    pub(crate) fn new(context: Arc<DbContext>, spec: QuerySpec) -> Self {
        Query {
            context,
            spec,
            _marker: PhantomData,
        }
    }

    /// Narrows the result set (AND with what is already there).
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.spec = self.spec.filter(predicate);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.spec = self.spec.order_by(field);
        self
    }

    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.spec = self.spec.order_by_desc(field);
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.spec = self.spec.skip(n);
        self
    }

    pub fn take(mut self, n: u64) -> Self {
        self.spec = self.spec.take(n);
        self
    }

    /// The `QuerySpec` this query will run.
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }
}

impl<T: SqlEntity> Query<T> {
    /// Runs the query and collects every row.
    pub async fn to_vec(&self) -> RepoResult<Vec<T>> {
        self.check()?;
        debug!(entity = T::NAME, spec = ?self.spec, "Executing query");
        let result = self.context.set::<T>().fetch_all(&self.spec).await;
        translate::<T, _>(result)
    }

    /// Runs the query and returns the first row, if any.
    pub async fn first(&self) -> RepoResult<Option<T>> {
        self.check()?;
        let result = self.context.set::<T>().fetch_optional(&self.spec).await;
        translate::<T, _>(result)
    }

    /// Counts the rows the query would return, honoring skip/take.
    pub async fn count(&self) -> RepoResult<u64> {
        self.check()?;
        let result = self.context.set::<T>().count(&self.spec).await;
        translate::<T, _>(result)
    }

    /// Whether the query matches at least one row.
    pub async fn exists(&self) -> RepoResult<bool> {
        let limit = self.spec.limit.map_or(1, |n| n.min(1));
        Ok(self.clone().take(limit).count().await? > 0)
    }

    // Filters composed after `Repository::query` are checked here, before
    // anything is sent.
    fn check(&self) -> RepoResult<()> {
        self.spec
            .validate(T::NAME, &T::fields())
            .map_err(|e| RepoError::invalid_argument(Operation::Query, T::NAME, e))
    }
}

fn translate<T: SqlEntity, V>(result: StoreResult<V>) -> RepoResult<V> {
    result.map_err(|e| RepoError::from_store(Operation::Query, T::NAME, e))
}
