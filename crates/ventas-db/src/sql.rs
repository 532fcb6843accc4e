//! # SQL Lowering
//!
//! Turns entity metadata, predicates and query specs into SQLite
//! statements built with [`sqlx::QueryBuilder`].
//!
//! ## Rules
//! - Values are always bound parameters, never spliced into SQL text
//! - Identifiers are only ever taken from the entity's static column list,
//!   and are double-quoted
//! - Unknown identifiers fail with [`StoreError::InvalidQuery`]
//! - Predicate leaves are two-valued: a NULL column never turns a
//!   condition into NULL, so `NOT` and `<>` see missing values
//!
//! ```text
//! Field::new("name").eq("Widget") & Field::new("stock").is_in([1, 2])
//!
//!   SELECT * FROM "products"
//!   WHERE ("name" IS ?) AND (("stock" IN (?, ?) AND "stock" IS NOT NULL))
//!   ORDER BY "id" ASC
//! ```

use sqlx::{QueryBuilder, Sqlite};
use ventas_core::{CompareOp, Entity, Predicate, QuerySpec, Value};

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Entity Metadata
// =============================================================================

/// Type-erased copy of an [`Entity`]'s static mapping.
///
/// Staged changes outlive the generic call that created them, so the
/// context stores this instead of the type parameter.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntityMeta {
    pub name: &'static str,
    pub table: &'static str,
    pub key: &'static str,
    pub columns: &'static [&'static str],
    pub token: Option<&'static str>,
}

impl EntityMeta {
    pub fn of<T: Entity>() -> Self {
        EntityMeta {
            name: T::NAME,
            table: T::TABLE,
            key: T::KEY,
            columns: T::COLUMNS,
            token: T::CONCURRENCY_TOKEN,
        }
    }

    fn has_field(&self, field: &str) -> bool {
        field == self.key || self.columns.contains(&field) || self.token == Some(field)
    }
}

/// Initial concurrency token written on insert.
pub(crate) const INITIAL_TOKEN: i64 = 1;

// =============================================================================
// Fragments
// =============================================================================

fn push_ident(qb: &mut QueryBuilder<'static, Sqlite>, ident: &str) {
    qb.push("\"");
    qb.push(ident);
    qb.push("\"");
}

fn push_field(
    qb: &mut QueryBuilder<'static, Sqlite>,
    meta: &EntityMeta,
    field: &str,
) -> StoreResult<()> {
    if !meta.has_field(field) {
        return Err(StoreError::InvalidQuery(format!(
            "{} has no column '{}'",
            meta.name, field
        )));
    }
    push_ident(qb, field);
    Ok(())
}

/// Closes a `(expr` opened by the caller with `AND field IS NOT NULL)`,
/// turning a NULL result into 0.
fn push_not_null_guard(qb: &mut QueryBuilder<'static, Sqlite>, field: &str) {
    qb.push(" AND ");
    push_ident(qb, field);
    qb.push(" IS NOT NULL)");
}

/// Binds a single value.
pub(crate) fn push_value(qb: &mut QueryBuilder<'static, Sqlite>, value: &Value) {
    match value {
        Value::Null => qb.push_bind(None::<i64>),
        Value::Integer(v) => qb.push_bind(*v),
        Value::Real(v) => qb.push_bind(*v),
        Value::Text(v) => qb.push_bind(v.clone()),
        Value::Bool(v) => qb.push_bind(*v),
        Value::Timestamp(v) => qb.push_bind(*v),
    };
}

/// Lowers a predicate tree into a boolean SQL expression.
///
/// Every leaf evaluates to 0 or 1, never NULL, so a row with a missing
/// value matches exactly when the predicate holds for it: `ne("x")` and
/// `!eq("x")` match it, `eq("x")` and `lt(..)` do not.
pub(crate) fn push_predicate(
    qb: &mut QueryBuilder<'static, Sqlite>,
    meta: &EntityMeta,
    predicate: &Predicate,
) -> StoreResult<()> {
    match predicate {
        Predicate::All => {
            qb.push("1 = 1");
        }

        Predicate::Compare { field, cmp, value } => match (cmp, value) {
            (CompareOp::Eq, Value::Null) => {
                push_field(qb, meta, field)?;
                qb.push(" IS NULL");
            }
            (CompareOp::Ne, Value::Null) => {
                push_field(qb, meta, field)?;
                qb.push(" IS NOT NULL");
            }
            (_, Value::Null) => {
                return Err(StoreError::InvalidQuery(format!(
                    "cannot compare '{}' with null using {}",
                    field,
                    cmp.as_sql()
                )));
            }
            // IS / IS NOT are = / <> with NULL treated as an ordinary value
            (CompareOp::Eq, _) => {
                push_field(qb, meta, field)?;
                qb.push(" IS ");
                push_value(qb, value);
            }
            (CompareOp::Ne, _) => {
                push_field(qb, meta, field)?;
                qb.push(" IS NOT ");
                push_value(qb, value);
            }
            _ => {
                qb.push("(");
                push_field(qb, meta, field)?;
                qb.push(" ");
                qb.push(cmp.as_sql());
                qb.push(" ");
                push_value(qb, value);
                push_not_null_guard(qb, field);
            }
        },

        Predicate::IsNull { field } => {
            push_field(qb, meta, field)?;
            qb.push(" IS NULL");
        }

        Predicate::IsNotNull { field } => {
            push_field(qb, meta, field)?;
            qb.push(" IS NOT NULL");
        }

        Predicate::In { field, values } => {
            if values.is_empty() {
                return Err(StoreError::InvalidQuery(format!(
                    "IN list for '{}' is empty",
                    field
                )));
            }

            let (nulls, present): (Vec<&Value>, Vec<&Value>) =
                values.iter().partition(|v| v.is_null());

            if present.is_empty() {
                push_field(qb, meta, field)?;
                qb.push(" IS NULL");
                return Ok(());
            }

            qb.push("(");
            push_field(qb, meta, field)?;
            qb.push(" IN (");
            for (i, value) in present.into_iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(qb, value);
            }
            qb.push(")");

            if nulls.is_empty() {
                push_not_null_guard(qb, field);
            } else {
                qb.push(" OR ");
                push_ident(qb, field);
                qb.push(" IS NULL)");
            }
        }

        Predicate::Like { field, pattern } => {
            qb.push("(");
            push_field(qb, meta, field)?;
            qb.push(" LIKE ");
            qb.push_bind(pattern.clone());
            push_not_null_guard(qb, field);
        }

        Predicate::And { predicates } => push_group(qb, meta, predicates, " AND ", "1 = 1")?,

        Predicate::Or { predicates } => push_group(qb, meta, predicates, " OR ", "1 = 0")?,

        Predicate::Not { predicate } => {
            qb.push("NOT (");
            push_predicate(qb, meta, predicate)?;
            qb.push(")");
        }
    }

    Ok(())
}

fn push_group(
    qb: &mut QueryBuilder<'static, Sqlite>,
    meta: &EntityMeta,
    predicates: &[Predicate],
    joiner: &str,
    empty: &str,
) -> StoreResult<()> {
    if predicates.is_empty() {
        qb.push(empty);
        return Ok(());
    }

    for (i, predicate) in predicates.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        qb.push("(");
        push_predicate(qb, meta, predicate)?;
        qb.push(")");
    }
    Ok(())
}

// =============================================================================
// Statements
// =============================================================================

/// `SELECT * FROM table [WHERE ...] ORDER BY ... [LIMIT ? OFFSET ?]`
///
/// Without explicit ordering, rows come back in key order so paging is
/// deterministic.
pub(crate) fn select(meta: &EntityMeta, spec: &QuerySpec) -> StoreResult<QueryBuilder<'static, Sqlite>> {
    let mut qb = QueryBuilder::new("SELECT * FROM ");
    push_select_body(&mut qb, meta, spec)?;
    Ok(qb)
}

/// `SELECT COUNT(*) FROM (<select>)`, so paging is honored.
pub(crate) fn count(meta: &EntityMeta, spec: &QuerySpec) -> StoreResult<QueryBuilder<'static, Sqlite>> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM (SELECT * FROM ");
    push_select_body(&mut qb, meta, spec)?;
    qb.push(")");
    Ok(qb)
}

fn push_select_body(
    qb: &mut QueryBuilder<'static, Sqlite>,
    meta: &EntityMeta,
    spec: &QuerySpec,
) -> StoreResult<()> {
    push_ident(qb, meta.table);

    if let Some(predicate) = &spec.predicate {
        qb.push(" WHERE ");
        push_predicate(qb, meta, predicate)?;
    }

    qb.push(" ORDER BY ");
    if spec.order.is_empty() {
        push_ident(qb, meta.key);
        qb.push(" ASC");
    } else {
        for (i, term) in spec.order.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            push_field(qb, meta, &term.field)?;
            qb.push(" ");
            qb.push(term.direction.as_sql());
        }
    }

    // SQLite only accepts OFFSET after a LIMIT; -1 means "no limit".
    match (spec.limit, spec.offset) {
        (None, None) => {}
        (limit, offset) => {
            qb.push(" LIMIT ");
            qb.push_bind(limit.map_or(-1, to_sql_int));
            if let Some(offset) = offset {
                qb.push(" OFFSET ");
                qb.push_bind(to_sql_int(offset));
            }
        }
    }

    Ok(())
}

/// `INSERT INTO table ([key,] columns... [, token]) VALUES (...)`
pub(crate) fn insert(
    meta: &EntityMeta,
    key: Option<i64>,
    values: &[Value],
) -> StoreResult<QueryBuilder<'static, Sqlite>> {
    check_arity(meta, values)?;

    let mut qb = QueryBuilder::new("INSERT INTO ");
    push_ident(&mut qb, meta.table);
    qb.push(" (");

    let mut names: Vec<&str> = Vec::with_capacity(meta.columns.len() + 2);
    if key.is_some() {
        names.push(meta.key);
    }
    names.extend_from_slice(meta.columns);
    if let Some(token) = meta.token {
        names.push(token);
    }
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_ident(&mut qb, name);
    }

    qb.push(") VALUES (");
    let mut first = true;
    let mut sep = |qb: &mut QueryBuilder<'static, Sqlite>| {
        if !first {
            qb.push(", ");
        }
        first = false;
    };
    if let Some(key) = key {
        sep(&mut qb);
        qb.push_bind(key);
    }
    for value in values {
        sep(&mut qb);
        push_value(&mut qb, value);
    }
    if meta.token.is_some() {
        sep(&mut qb);
        qb.push_bind(INITIAL_TOKEN);
    }
    qb.push(")");

    Ok(qb)
}

/// `UPDATE table SET col = ?, ... [, token = token + 1] WHERE key = ? [AND token = ?]`
pub(crate) fn update(
    meta: &EntityMeta,
    key: i64,
    values: &[Value],
    token: Option<i64>,
) -> StoreResult<QueryBuilder<'static, Sqlite>> {
    check_arity(meta, values)?;

    let mut qb = QueryBuilder::new("UPDATE ");
    push_ident(&mut qb, meta.table);
    qb.push(" SET ");

    for (i, (column, value)) in meta.columns.iter().zip(values).enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_ident(&mut qb, column);
        qb.push(" = ");
        push_value(&mut qb, value);
    }

    if let Some(token_column) = meta.token {
        qb.push(", ");
        push_ident(&mut qb, token_column);
        qb.push(" = ");
        push_ident(&mut qb, token_column);
        qb.push(" + 1");
    }

    push_key_filter(&mut qb, meta, key, token);
    Ok(qb)
}

/// `DELETE FROM table WHERE key = ? [AND token = ?]`
pub(crate) fn delete(meta: &EntityMeta, key: i64, token: Option<i64>) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new("DELETE FROM ");
    push_ident(&mut qb, meta.table);
    push_key_filter(&mut qb, meta, key, token);
    qb
}

fn push_key_filter(
    qb: &mut QueryBuilder<'static, Sqlite>,
    meta: &EntityMeta,
    key: i64,
    token: Option<i64>,
) {
    qb.push(" WHERE ");
    push_ident(qb, meta.key);
    qb.push(" = ");
    qb.push_bind(key);

    if let (Some(token_column), Some(token)) = (meta.token, token) {
        qb.push(" AND ");
        push_ident(qb, token_column);
        qb.push(" = ");
        qb.push_bind(token);
    }
}

fn check_arity(meta: &EntityMeta, values: &[Value]) -> StoreResult<()> {
    if values.len() != meta.columns.len() {
        return Err(StoreError::Internal(format!(
            "{} declares {} columns but supplied {} values",
            meta.name,
            meta.columns.len(),
            values.len()
        )));
    }
    Ok(())
}

fn to_sql_int(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ventas_core::{Category, Field, Product};

    #[test]
    fn test_select_with_predicate() {
        let meta = EntityMeta::of::<Product>();
        let spec = QuerySpec::with_predicate(Some(
            Field::new("name").eq("Widget") & Field::new("stock").is_in([1, 2]),
        ));

        let qb = select(&meta, &spec).unwrap();
        assert_eq!(
            qb.sql(),
            r#"SELECT * FROM "products" WHERE ("name" IS ?) AND (("stock" IN (?, ?) AND "stock" IS NOT NULL)) ORDER BY "id" ASC"#
        );
    }

    #[test]
    fn test_select_null_and_paging() {
        let meta = EntityMeta::of::<Category>();
        let spec = QuerySpec::with_predicate(Some(Field::new("description").eq(None::<String>)))
            .order_by_desc("name")
            .skip(5);

        let qb = select(&meta, &spec).unwrap();
        assert_eq!(
            qb.sql(),
            r#"SELECT * FROM "categories" WHERE "description" IS NULL ORDER BY "name" DESC LIMIT ? OFFSET ?"#
        );
    }

    #[test]
    fn test_not_and_empty_groups() {
        let meta = EntityMeta::of::<Category>();
        let spec = QuerySpec::with_predicate(Some(
            !Field::new("is_active").eq(true) | Predicate::And { predicates: vec![] },
        ));

        let qb = select(&meta, &spec).unwrap();
        assert!(qb
            .sql()
            .contains(r#"WHERE (NOT ("is_active" IS ?)) OR (1 = 1)"#));
    }

    #[test]
    fn test_leaves_never_yield_null() {
        let meta = EntityMeta::of::<Category>();
        let lower = |p: Predicate| {
            let mut qb = QueryBuilder::new("");
            push_predicate(&mut qb, &meta, &p).unwrap();
            qb.sql().to_string()
        };

        assert_eq!(lower(Field::new("description").ne("x")), r#""description" IS NOT ?"#);
        assert_eq!(
            lower(Field::new("name").lt("M")),
            r#"("name" < ? AND "name" IS NOT NULL)"#
        );
        assert_eq!(
            lower(Field::new("description").like("x%")),
            r#"("description" LIKE ? AND "description" IS NOT NULL)"#
        );
    }

    #[test]
    fn test_null_in_list_matches_missing_values() {
        let meta = EntityMeta::of::<Category>();
        let lower = |p: Predicate| {
            let mut qb = QueryBuilder::new("");
            push_predicate(&mut qb, &meta, &p).unwrap();
            qb.sql().to_string()
        };

        assert_eq!(
            lower(Field::new("description").is_in([None::<&str>])),
            r#""description" IS NULL"#
        );
        assert_eq!(
            lower(Field::new("description").is_in([Some("x"), None, Some("y")])),
            r#"("description" IN (?, ?) OR "description" IS NULL)"#
        );
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let meta = EntityMeta::of::<Product>();
        let spec = QuerySpec::new().order_by("price; DROP TABLE products");

        assert!(matches!(
            select(&meta, &spec),
            Err(StoreError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_insert_includes_token() {
        let meta = EntityMeta::of::<Product>();
        let product = Product::new(1, "COKE-330", "Coke", 150);

        let qb = insert(&meta, None, &product.values()).unwrap();
        assert_eq!(
            qb.sql(),
            r#"INSERT INTO "products" ("category_id", "sku", "name", "price_cents", "stock", "is_active", "created_at", "row_version") VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#
        );
    }

    #[test]
    fn test_update_checks_token() {
        let meta = EntityMeta::of::<Product>();
        let product = Product::new(1, "COKE-330", "Coke", 150);

        let qb = update(&meta, 7, &product.values(), Some(3)).unwrap();
        let sql = qb.sql();
        assert!(sql.contains(r#""row_version" = "row_version" + 1"#));
        assert!(sql.ends_with(r#"WHERE "id" = ? AND "row_version" = ?"#));
    }

    #[test]
    fn test_delete_without_token() {
        let meta = EntityMeta::of::<Category>();
        let qb = delete(&meta, 3, None);
        assert_eq!(qb.sql(), r#"DELETE FROM "categories" WHERE "id" = ?"#);
    }

    #[test]
    fn test_count_wraps_select() {
        let meta = EntityMeta::of::<Category>();
        let qb = count(&meta, &QuerySpec::new().take(2)).unwrap();
        assert_eq!(
            qb.sql(),
            r#"SELECT COUNT(*) FROM (SELECT * FROM "categories" ORDER BY "id" ASC LIMIT ?)"#
        );
    }
}
