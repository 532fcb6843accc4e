//! # Generic Repository
//!
//! The one [`Repository`] implementation, for any [`SqlEntity`].
//!
//! Each mutating call stages exactly one change on the shared
//! [`DbContext`] and saves immediately, so every call is its own
//! transaction. Repositories built on the same context share its staged
//! list; see [`DbContext`] for what that implies.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use ventas_core::{Entity, Predicate, QuerySpec, ValidationError};

use crate::context::{ChangeOutcome, ChangeTicket, DbContext, SaveReport, SqlEntity};
use crate::error::{Operation, RepoError, RepoResult, StoreError};
use crate::query::Query;
use crate::repository::Repository;

/// Repository over entity type `T`, bound to one persistence context for
/// its whole lifetime.
///
/// ## Usage
/// ```rust,ignore
/// let repo = GenericRepository::<Product>::new(db.context());
///
/// let coke = repo.create(Product::new(1, "COKE-330", "Coke", 150)).await?;
/// let found = repo.get(&Field::new("sku").eq("COKE-330")).await?;
/// ```
pub struct GenericRepository<T> {
    context: Arc<DbContext>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for GenericRepository<T> {
    fn clone(&self) -> Self {
        GenericRepository {
            context: Arc::clone(&self.context),
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> fmt::Debug for GenericRepository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericRepository")
            .field("entity", &T::NAME)
            .finish()
    }
}

impl<T: Entity> GenericRepository<T> {
    pub fn new(context: Arc<DbContext>) -> Self {
        GenericRepository {
            context,
            _marker: PhantomData,
        }
    }

    /// The persistence context this repository was built with.
    pub fn context(&self) -> &Arc<DbContext> {
        &self.context
    }

    fn require_key(&self, op: Operation, entity: &T) -> RepoResult<i64> {
        entity.key().ok_or_else(|| {
            RepoError::invalid_argument(
                op,
                T::NAME,
                ValidationError::MissingKey {
                    entity: T::NAME.to_string(),
                },
            )
        })
    }

    fn check_predicate(&self, op: Operation, predicate: &Predicate) -> RepoResult<()> {
        predicate
            .validate(T::NAME, &T::fields())
            .map_err(|e| RepoError::invalid_argument(op, T::NAME, e))
    }
}

#[async_trait]
impl<T: SqlEntity> Repository<T> for GenericRepository<T> {
    async fn get(&self, predicate: &Predicate) -> RepoResult<Option<T>> {
        self.check_predicate(Operation::Get, predicate)?;

        let spec = QuerySpec::with_predicate(Some(predicate.clone()));
        let found = self
            .context
            .set::<T>()
            .fetch_optional(&spec)
            .await
            .map_err(|e| RepoError::from_store(Operation::Get, T::NAME, e))?;

        debug!(entity = T::NAME, found = found.is_some(), "Lookup complete");
        Ok(found)
    }

    async fn create(&self, mut entity: T) -> RepoResult<T> {
        entity
            .validate()
            .map_err(|e| RepoError::invalid_argument(Operation::Create, T::NAME, e))?;

        let ticket = self.context.set::<T>().add(&entity);
        let report = self
            .context
            .save_changes()
            .await
            .map_err(|e| RepoError::from_store(Operation::Create, T::NAME, e))?;

        if let ChangeOutcome::Added { key, token } =
            committed::<T>(Operation::Create, &report, ticket)?
        {
            entity.set_key(key);
            if let Some(token) = token {
                entity.set_concurrency_token(token);
            }
        }

        info!(entity = T::NAME, key = ?entity.key(), "Entity created");
        Ok(entity)
    }

    async fn update(&self, entity: &mut T) -> RepoResult<bool> {
        let key = self.require_key(Operation::Update, entity)?;
        entity
            .validate()
            .map_err(|e| RepoError::invalid_argument(Operation::Update, T::NAME, e))?;

        let ticket = self
            .context
            .set::<T>()
            .update(entity)
            .map_err(|e| RepoError::from_store(Operation::Update, T::NAME, e))?;
        let report = self
            .context
            .save_changes()
            .await
            .map_err(|e| RepoError::from_store(Operation::Update, T::NAME, e))?;

        if let ChangeOutcome::Modified { token: Some(token) } =
            committed::<T>(Operation::Update, &report, ticket)?
        {
            entity.set_concurrency_token(token);
        }

        debug!(entity = T::NAME, key, "Entity updated");
        Ok(true)
    }

    async fn delete(&self, entity: &T) -> RepoResult<bool> {
        let key = self.require_key(Operation::Delete, entity)?;

        let ticket = self
            .context
            .set::<T>()
            .remove(entity)
            .map_err(|e| RepoError::from_store(Operation::Delete, T::NAME, e))?;
        let report = self
            .context
            .save_changes()
            .await
            .map_err(|e| RepoError::from_store(Operation::Delete, T::NAME, e))?;
        committed::<T>(Operation::Delete, &report, ticket)?;

        info!(entity = T::NAME, key, "Entity deleted");
        Ok(true)
    }

    fn query(&self, predicate: Option<Predicate>) -> RepoResult<Query<T>> {
        if let Some(predicate) = &predicate {
            self.check_predicate(Operation::Query, predicate)?;
        }

        Ok(Query::new(
            Arc::clone(&self.context),
            QuerySpec::with_predicate(predicate),
        ))
    }
}

/// The outcome of this call's own change.
///
/// Missing when another holder of the shared context saved the change
/// first; the row was written but this call cannot tell the caller its key
/// or token.
fn committed<T: Entity>(
    op: Operation,
    report: &SaveReport,
    ticket: ChangeTicket,
) -> RepoResult<ChangeOutcome> {
    report.outcome(ticket).copied().ok_or_else(|| {
        RepoError::from_store(
            op,
            T::NAME,
            StoreError::Internal(format!(
                "{} change was saved by another holder of the context",
                T::NAME
            )),
        )
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;
    use crate::error::ErrorKind;
    use crate::pool::Database;
    use ventas_core::{Category, Field, Product};

    async fn setup() -> (Database, GenericRepository<Category>, GenericRepository<Product>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let context = db.context();
        let categories = GenericRepository::new(Arc::clone(&context));
        let products = GenericRepository::new(context);
        (db, categories, products)
    }

    async fn seed_products(
        categories: &GenericRepository<Category>,
        products: &GenericRepository<Product>,
    ) -> Category {
        let beverages = categories.create(Category::new("Beverages")).await.unwrap();
        for (sku, name, price, stock) in [
            ("COKE-330", "Coke 330ml", 150, 24),
            ("PEPSI-330", "Pepsi 330ml", 140, 0),
            ("WATER-500", "Water 500ml", 90, 48),
            ("JUICE-1L", "Orange Juice 1L", 320, 6),
        ] {
            products
                .create(Product::new(beverages.id, sku, name, price).with_stock(stock))
                .await
                .unwrap();
        }
        beverages
    }

    // -------------------------------------------------------------------------
    // get / create
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_created_widget_gets_first_key() {
        let (_db, categories, _) = setup().await;

        let widget = categories.create(Category::new("Widget")).await.unwrap();
        assert_eq!(widget.id, 1);

        let found = categories.get(&Field::new("id").eq(1)).await.unwrap();
        assert_eq!(found.map(|c| c.name), Some("Widget".to_string()));
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips() {
        let (_db, categories, products) = setup().await;
        let beverages = categories.create(Category::new("Beverages")).await.unwrap();

        let coke = products
            .create(Product::new(beverages.id, "COKE-330", "Coke 330ml", 150).with_stock(12))
            .await
            .unwrap();
        assert_eq!(coke.row_version, 1);

        let found = products
            .get(&Field::new("sku").eq("COKE-330"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, coke.id);
        assert_eq!(found.stock, 12);
        assert_eq!(found.row_version, 1);
    }

    #[tokio::test]
    async fn test_get_without_match_is_none() {
        let (_db, categories, _) = setup().await;

        let found = categories.get(&Field::new("name").eq("Nothing")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_get_with_unknown_field_is_invalid_argument() {
        let (_db, categories, _) = setup().await;

        let err = categories
            .get(&Field::new("colour").eq("red"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_invalid_entity_leaves_store_unchanged() {
        let (_db, categories, products) = setup().await;
        let beverages = categories.create(Category::new("Beverages")).await.unwrap();

        let err = products
            .create(Product::new(beverages.id, "bad sku", "Broken", 100))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.store_error().is_none());

        let count = products.query(None).unwrap().count().await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_duplicate_sku_is_constraint_violation() {
        let (_db, categories, products) = setup().await;
        let beverages = categories.create(Category::new("Beverages")).await.unwrap();

        products
            .create(Product::new(beverages.id, "COKE-330", "Coke", 150))
            .await
            .unwrap();
        let err = products
            .create(Product::new(beverages.id, "COKE-330", "Coke again", 150))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert!(matches!(
            err.store_error(),
            Some(StoreError::UniqueViolation { .. })
        ));
        assert_eq!(products.context().pending_changes(), 0);
    }

    #[tokio::test]
    async fn test_missing_parent_is_constraint_violation() {
        let (_db, _, products) = setup().await;

        let err = products
            .create(Product::new(999, "GHOST-1", "Ghost", 100))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    }

    // -------------------------------------------------------------------------
    // update
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_update_is_visible_to_get() {
        let (_db, categories, products) = setup().await;
        seed_products(&categories, &products).await;

        let by_sku = Field::new("sku").eq("COKE-330");
        let mut coke = products.get(&by_sku).await.unwrap().unwrap();
        coke.price_cents = 175;
        assert!(products.update(&mut coke).await.unwrap());
        assert_eq!(coke.row_version, 2);

        let reloaded = products.get(&by_sku).await.unwrap().unwrap();
        assert_eq!(reloaded.price_cents, 175);
        assert_eq!(reloaded.row_version, 2);

        // refreshed token allows a second update without reloading
        coke.stock = 0;
        assert!(products.update(&mut coke).await.unwrap());
        assert_eq!(coke.row_version, 3);
    }

    #[tokio::test]
    async fn test_stale_copy_update_is_concurrency_conflict() {
        let (_db, categories, products) = setup().await;
        seed_products(&categories, &products).await;

        let by_sku = Field::new("sku").eq("WATER-500");
        let mut first = products.get(&by_sku).await.unwrap().unwrap();
        let mut second = products.get(&by_sku).await.unwrap().unwrap();

        first.name = "Spring Water 500ml".to_string();
        products.update(&mut first).await.unwrap();

        second.name = "Mineral Water 500ml".to_string();
        let err = products.update(&mut second).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConcurrencyConflict);

        let stored = products.get(&by_sku).await.unwrap().unwrap();
        assert_eq!(stored.name, "Spring Water 500ml");
    }

    #[tokio::test]
    async fn test_update_without_key_is_invalid_argument() {
        let (_db, categories, _) = setup().await;

        let mut unsaved = Category::new("Snacks");
        let err = categories.update(&mut unsaved).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(matches!(
            std::error::Error::source(&err)
                .and_then(|s| s.downcast_ref::<ValidationError>()),
            Some(ValidationError::MissingKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_into_duplicate_is_constraint_violation() {
        let (_db, categories, _) = setup().await;
        categories.create(Category::new("Beverages")).await.unwrap();
        let mut snacks = categories.create(Category::new("Snacks")).await.unwrap();

        snacks.name = "Beverages".to_string();
        let err = categories.update(&mut snacks).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    }

    // -------------------------------------------------------------------------
    // delete
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_delete_then_get_is_none() {
        let (_db, categories, _) = setup().await;
        let snacks = categories.create(Category::new("Snacks")).await.unwrap();

        assert!(categories.delete(&snacks).await.unwrap());

        let found = categories.get(&Field::new("id").eq(snacks.id)).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_delete_referenced_parent_is_constraint_violation() {
        let (_db, categories, products) = setup().await;
        let beverages = seed_products(&categories, &products).await;

        let err = categories.delete(&beverages).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert!(matches!(
            err.store_error(),
            Some(StoreError::ForeignKeyViolation { .. })
        ));

        let still_there = categories
            .get(&Field::new("id").eq(beverages.id))
            .await
            .unwrap();
        assert!(still_there.is_some());
    }

    #[tokio::test]
    async fn test_delete_twice_is_concurrency_conflict() {
        let (_db, categories, _) = setup().await;
        let snacks = categories.create(Category::new("Snacks")).await.unwrap();

        categories.delete(&snacks).await.unwrap();
        let err = categories.delete(&snacks).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConcurrencyConflict);
    }

    #[tokio::test]
    async fn test_delete_with_stale_token_is_concurrency_conflict() {
        let (_db, categories, products) = setup().await;
        seed_products(&categories, &products).await;

        let by_sku = Field::new("sku").eq("JUICE-1L");
        let stale = products.get(&by_sku).await.unwrap().unwrap();
        let mut fresh = stale.clone();
        fresh.stock = 5;
        products.update(&mut fresh).await.unwrap();

        let err = products.delete(&stale).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConcurrencyConflict);
        assert!(products.get(&by_sku).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_without_key_is_invalid_argument() {
        let (_db, categories, _) = setup().await;
        categories.create(Category::new("Beverages")).await.unwrap();

        let err = categories
            .delete(&Category::new("Beverages"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(categories.query(None).unwrap().count().await.unwrap(), 1);
    }

    // -------------------------------------------------------------------------
    // query
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_query_without_predicate_returns_everything() {
        let (_db, categories, products) = setup().await;
        seed_products(&categories, &products).await;

        let all = products.query(None).unwrap().to_vec().await.unwrap();
        assert_eq!(all.len(), 4);
        // default order is by key
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn test_query_with_predicate_returns_subset() {
        let (_db, categories, products) = setup().await;
        seed_products(&categories, &products).await;

        let in_stock = products
            .query(Some(Field::new("stock").gt(0)))
            .unwrap()
            .to_vec()
            .await
            .unwrap();

        let skus: Vec<_> = in_stock.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["COKE-330", "WATER-500", "JUICE-1L"]);
    }

    #[tokio::test]
    async fn test_query_composition_and_paging() {
        let (_db, categories, products) = setup().await;
        seed_products(&categories, &products).await;

        let query = products
            .query(Some(Field::new("is_active").eq(true)))
            .unwrap()
            .filter(Field::new("stock").gt(0))
            .order_by_desc("price_cents");

        let page = query.clone().skip(1).take(1).to_vec().await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].sku, "COKE-330");

        assert_eq!(query.count().await.unwrap(), 3);
        assert_eq!(
            query.first().await.unwrap().map(|p| p.sku),
            Some("JUICE-1L".to_string())
        );
        assert!(query.exists().await.unwrap());
        assert!(!query.clone().skip(10).exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_query_or_and_not() {
        let (_db, categories, products) = setup().await;
        seed_products(&categories, &products).await;

        let cheap_or_empty = Field::new("price_cents").lt(100) | Field::new("stock").eq(0);
        let matched = products
            .query(Some(!cheap_or_empty))
            .unwrap()
            .order_by("sku")
            .to_vec()
            .await
            .unwrap();

        let skus: Vec<_> = matched.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["COKE-330", "JUICE-1L"]);
    }

    #[tokio::test]
    async fn test_query_by_timestamp() {
        let (_db, categories, products) = setup().await;
        seed_products(&categories, &products).await;

        let cutoff = chrono::Utc::now() + chrono::Duration::hours(1);
        let before = products
            .query(Some(Field::new("created_at").lt(cutoff)))
            .unwrap();
        assert_eq!(before.count().await.unwrap(), 4);

        let after = products
            .query(Some(Field::new("created_at").gt(cutoff)))
            .unwrap();
        assert!(!after.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_query_with_invalid_predicate_is_invalid_argument() {
        let (_db, _, products) = setup().await;

        let err = products
            .query(Some(Field::new("sku").is_in(Vec::<String>::new())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_unknown_order_column_fails_at_enumeration() {
        let (_db, _, products) = setup().await;

        let query = products.query(None).unwrap().order_by("popularity");
        let err = query.to_vec().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailure);
    }

    #[tokio::test]
    async fn test_filter_on_unknown_field_is_invalid_argument() {
        let (_db, categories, products) = setup().await;
        seed_products(&categories, &products).await;

        let query = products
            .query(Some(Field::new("stock").gt(0)))
            .unwrap()
            .filter(Field::new("colour").eq("red"));
        assert_eq!(
            query.to_vec().await.unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            query.count().await.unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            query.first().await.unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[tokio::test]
    async fn test_query_sees_rows_created_after_it_was_built() {
        let (_db, categories, _) = setup().await;
        let all = categories.query(None).unwrap().order_by("name");
        assert!(all.to_vec().await.unwrap().is_empty());

        categories.create(Category::new("Dairy")).await.unwrap();

        let names: Vec<_> = all
            .to_vec()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Dairy"]);
    }

    #[tokio::test]
    async fn test_missing_values_match_negations_and_null_lists() {
        let (_db, categories, _) = setup().await;
        categories.create(Category::new("Plain")).await.unwrap();
        categories
            .create(Category::new("Described").with_description("x"))
            .await
            .unwrap();

        let names = |predicate: Predicate| {
            let query = categories.query(Some(predicate)).unwrap().order_by("name");
            async move {
                query
                    .to_vec()
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|c| c.name)
                    .collect::<Vec<_>>()
            }
        };

        assert_eq!(names(Field::new("description").eq(None::<&str>)).await, vec!["Plain"]);
        assert_eq!(names(Field::new("description").ne("x")).await, vec!["Plain"]);
        assert_eq!(names(!Field::new("description").eq("x")).await, vec!["Plain"]);
        assert_eq!(names(!Field::new("description").like("x%")).await, vec!["Plain"]);
        assert_eq!(
            names(Field::new("description").is_in([None::<&str>])).await,
            vec!["Plain"]
        );
        assert_eq!(
            names(Field::new("description").is_in([Some("x"), None])).await,
            vec!["Described", "Plain"]
        );
        assert_eq!(
            names(!Field::new("description").is_in([Some("x")])).await,
            vec!["Plain"]
        );
    }

    // -------------------------------------------------------------------------
    // store unavailable
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_closed_store_failures() {
        let (db, categories, _) = setup().await;
        db.close().await;

        let err = categories
            .get(&Field::new("name").eq("Beverages"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailure);

        let err = categories.create(Category::new("Beverages")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownFailure);
        assert!(matches!(
            err.store_error(),
            Some(StoreError::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_repository_is_object_safe() {
        let (_db, categories, _) = setup().await;
        let repo: Box<dyn Repository<Category>> = Box::new(categories);

        let created = repo.create(Category::new("Frozen")).await.unwrap();
        let found = repo.get(&Field::new("name").eq("Frozen")).await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_change_saved_elsewhere_is_unknown_failure() {
        let (db, _, _) = setup().await;
        let context = db.context();

        let ticket = context.set::<Category>().add(&Category::new("Snacks"));
        context.discard_changes();
        let report = context.save_changes().await.unwrap();

        let err = committed::<Category>(Operation::Create, &report, ticket).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownFailure);
    }
}
