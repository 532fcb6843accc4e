//! # Query Specification
//!
//! The pure half of a lazy query: filter, ordering and paging, with no
//! connection attached. ventas-db wraps a [`QuerySpec`] together with a
//! persistence context and only runs it when the caller asks for rows.

use serde::{Deserialize, Serialize};

use crate::error::ValidationResult;
use crate::predicate::Predicate;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Filter, ordering and paging for a set of entities.
///
/// ## Example
/// ```rust
/// use ventas_core::predicate::Field;
/// use ventas_core::query::QuerySpec;
///
/// let spec = QuerySpec::new()
///     .filter(Field::new("stock").gt(0))
///     .order_by_desc("price_cents")
///     .skip(20)
///     .take(10);
///
/// assert_eq!(spec.limit, Some(10));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// `None` matches every row.
    pub predicate: Option<Predicate>,
    pub order: Vec<OrderBy>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl QuerySpec {
    pub fn new() -> Self {
        QuerySpec::default()
    }

    /// Starts from an optional predicate (`None` = match all).
    pub fn with_predicate(predicate: Option<Predicate>) -> Self {
        QuerySpec {
            predicate: predicate.filter(|p| !p.is_all()),
            ..QuerySpec::default()
        }
    }

    /// Narrows the result set. Successive filters are AND-ed together.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = match self.predicate.take() {
            Some(existing) => Some(existing.and(predicate)),
            None if predicate.is_all() => None,
            None => Some(predicate),
        };
        self
    }

    pub fn order_by(self, field: impl Into<String>) -> Self {
        self.push_order(field.into(), Direction::Asc)
    }

    pub fn order_by_desc(self, field: impl Into<String>) -> Self {
        self.push_order(field.into(), Direction::Desc)
    }

    fn push_order(mut self, field: String, direction: Direction) -> Self {
        self.order.push(OrderBy { field, direction });
        self
    }

    /// Skips the first `n` rows.
    pub fn skip(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Returns at most `n` rows.
    pub fn take(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Checks the filter against the entity's field list.
    ///
    /// Ordering columns are not checked here; the persistence layer
    /// rejects unknown ones when it builds the statement.
    pub fn validate(&self, entity: &str, allowed: &[&str]) -> ValidationResult<()> {
        match &self.predicate {
            Some(predicate) => predicate.validate(entity, allowed),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::predicate::Field;

    #[test]
    fn test_filters_compose_with_and() {
        let spec = QuerySpec::with_predicate(Some(Field::new("id").gt(1)))
            .filter(Field::new("name").eq("Widget"));

        assert_eq!(
            spec.predicate,
            Some(Field::new("id").gt(1) & Field::new("name").eq("Widget"))
        );
    }

    #[test]
    fn test_match_all_is_normalized_away() {
        assert_eq!(QuerySpec::with_predicate(Some(Predicate::All)).predicate, None);
        assert_eq!(QuerySpec::new().filter(Predicate::All).predicate, None);
    }

    #[test]
    fn test_validate_checks_every_filter() {
        let spec = QuerySpec::with_predicate(Some(Field::new("name").eq("Widget")))
            .filter(Field::new("colour").eq("red"));

        assert!(matches!(
            spec.validate("Product", &["id", "name"]),
            Err(ValidationError::UnknownField { field, .. }) if field == "colour"
        ));
    }

    #[test]
    fn test_validate_leaves_ordering_alone() {
        let spec = QuerySpec::new().order_by("colour");
        assert!(spec.validate("Product", &["id", "name"]).is_ok());
    }
}
