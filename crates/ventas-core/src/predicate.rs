//! # Predicates
//!
//! Caller-supplied boolean conditions over entity fields.
//!
//! ## How Predicates Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Predicate Lifecycle                               │
//! │                                                                         │
//! │  Business code                                                         │
//! │       │  Field::new("name").eq("Widget") & Field::new("stock").gt(0)   │
//! │       ▼                                                                 │
//! │  Predicate tree (this module, pure data)                               │
//! │       │  And { [Compare(name = 'Widget'), Compare(stock > 0)] }        │
//! │       ▼                                                                 │
//! │  validate(entity fields) ← unknown/empty fields rejected here          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ventas-db lowers to SQL with bound parameters                         │
//! │       WHERE (name IS ?) AND ((stock > ? AND stock IS NOT NULL))        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Composition
//! `and`/`or` flatten nested groups of the same kind, so composition is
//! associative: `(a & b) & c` and `a & (b & c)` build the same tree.
//! [`Predicate::All`] is the identity for `and` and absorbs `or`.

use std::ops::{BitAnd, BitOr, Not};

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};
use crate::value::Value;

// =============================================================================
// Comparison Operators
// =============================================================================

/// Binary comparison between a field and a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// SQL spelling of the operator.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Whether the operator orders values (and so cannot take NULL).
    const fn is_ordering(&self) -> bool {
        matches!(
            self,
            CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge
        )
    }
}

// =============================================================================
// Predicate
// =============================================================================

/// A composable boolean expression over an entity's fields.
///
/// Predicates are plain data: they carry no closures and never touch the
/// store, so they can be cloned, logged, and serialized across process
/// boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Matches every row.
    All,

    /// `field <op> value`. Comparing with [`Value::Null`] using `Eq`/`Ne`
    /// is lowered to `IS NULL`/`IS NOT NULL`.
    Compare {
        field: String,
        cmp: CompareOp,
        value: Value,
    },

    IsNull {
        field: String,
    },

    IsNotNull {
        field: String,
    },

    /// `field IN (values...)`.
    In {
        field: String,
        values: Vec<Value>,
    },

    /// `field LIKE pattern` (SQL wildcards `%` and `_`).
    Like {
        field: String,
        pattern: String,
    },

    And {
        predicates: Vec<Predicate>,
    },

    Or {
        predicates: Vec<Predicate>,
    },

    Not {
        predicate: Box<Predicate>,
    },
}

impl Predicate {
    /// The match-everything predicate.
    #[inline]
    pub const fn all() -> Self {
        Predicate::All
    }

    /// Returns true if this predicate trivially matches every row.
    #[inline]
    pub fn is_all(&self) -> bool {
        matches!(self, Predicate::All)
    }

    /// Conjunction. Flattens nested `And` groups; `All` is the identity.
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::All, p) | (p, Predicate::All) => p,
            (Predicate::And { mut predicates }, Predicate::And { predicates: rhs }) => {
                predicates.extend(rhs);
                Predicate::And { predicates }
            }
            (Predicate::And { mut predicates }, p) => {
                predicates.push(p);
                Predicate::And { predicates }
            }
            (p, Predicate::And { predicates: rhs }) => {
                let mut predicates = Vec::with_capacity(rhs.len() + 1);
                predicates.push(p);
                predicates.extend(rhs);
                Predicate::And { predicates }
            }
            (lhs, rhs) => Predicate::And {
                predicates: vec![lhs, rhs],
            },
        }
    }

    /// Disjunction. Flattens nested `Or` groups; `All` absorbs.
    pub fn or(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::All, _) | (_, Predicate::All) => Predicate::All,
            (Predicate::Or { mut predicates }, Predicate::Or { predicates: rhs }) => {
                predicates.extend(rhs);
                Predicate::Or { predicates }
            }
            (Predicate::Or { mut predicates }, p) => {
                predicates.push(p);
                Predicate::Or { predicates }
            }
            (p, Predicate::Or { predicates: rhs }) => {
                let mut predicates = Vec::with_capacity(rhs.len() + 1);
                predicates.push(p);
                predicates.extend(rhs);
                Predicate::Or { predicates }
            }
            (lhs, rhs) => Predicate::Or {
                predicates: vec![lhs, rhs],
            },
        }
    }

    /// Negation. Double negation collapses.
    pub fn negate(self) -> Predicate {
        match self {
            Predicate::Not { predicate } => *predicate,
            p => Predicate::Not {
                predicate: Box::new(p),
            },
        }
    }

    /// Every field name referenced anywhere in the tree.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::All => {}
            Predicate::Compare { field, .. }
            | Predicate::IsNull { field }
            | Predicate::IsNotNull { field }
            | Predicate::In { field, .. }
            | Predicate::Like { field, .. } => out.push(field),
            Predicate::And { predicates } | Predicate::Or { predicates } => {
                for p in predicates {
                    p.collect_fields(out);
                }
            }
            Predicate::Not { predicate } => predicate.collect_fields(out),
        }
    }

    /// Checks the tree is well formed against an entity's field list.
    ///
    /// ## Rules
    /// - Every field name is non-empty and declared by the entity
    /// - `IN` lists are non-empty
    /// - `LIKE` patterns are non-empty
    /// - Ordering comparisons (`<`, `<=`, `>`, `>=`) never take NULL
    ///
    /// Empty `And`/`Or` groups are allowed: they lower to `TRUE`/`FALSE`.
    pub fn validate(&self, entity: &str, allowed: &[&str]) -> ValidationResult<()> {
        match self {
            Predicate::All => Ok(()),
            Predicate::Compare { field, cmp, value } => {
                check_field(entity, field, allowed)?;
                if cmp.is_ordering() && value.is_null() {
                    return Err(ValidationError::NullComparison {
                        field: field.clone(),
                        op: cmp.as_sql().to_string(),
                    });
                }
                Ok(())
            }
            Predicate::IsNull { field } | Predicate::IsNotNull { field } => {
                check_field(entity, field, allowed)
            }
            Predicate::In { field, values } => {
                check_field(entity, field, allowed)?;
                if values.is_empty() {
                    return Err(ValidationError::EmptyInList {
                        field: field.clone(),
                    });
                }
                Ok(())
            }
            Predicate::Like { field, pattern } => {
                check_field(entity, field, allowed)?;
                if pattern.is_empty() {
                    return Err(ValidationError::EmptyPattern {
                        field: field.clone(),
                    });
                }
                Ok(())
            }
            Predicate::And { predicates } | Predicate::Or { predicates } => predicates
                .iter()
                .try_for_each(|p| p.validate(entity, allowed)),
            Predicate::Not { predicate } => predicate.validate(entity, allowed),
        }
    }
}

fn check_field(entity: &str, field: &str, allowed: &[&str]) -> ValidationResult<()> {
    if field.trim().is_empty() {
        return Err(ValidationError::EmptyField);
    }
    if !allowed.contains(&field) {
        return Err(ValidationError::UnknownField {
            entity: entity.to_string(),
            field: field.to_string(),
        });
    }
    Ok(())
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::All
    }
}

impl BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Predicate) -> Predicate {
        self.and(rhs)
    }
}

impl BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Predicate) -> Predicate {
        self.or(rhs)
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        self.negate()
    }
}

// =============================================================================
// Field Builder
// =============================================================================

/// Entry point for building predicates.
///
/// ## Example
/// ```rust
/// use ventas_core::predicate::Field;
///
/// let widgets = Field::new("name").eq("Widget") & Field::new("stock").gt(0);
/// assert_eq!(widgets.fields(), vec!["name", "stock"]);
/// ```
#[derive(Debug, Clone)]
pub struct Field(String);

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Field(name.into())
    }

    /// The field name.
    pub fn name(&self) -> &str {
        &self.0
    }

    fn compare(self, cmp: CompareOp, value: impl Into<Value>) -> Predicate {
        Predicate::Compare {
            field: self.0,
            cmp,
            value: value.into(),
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Ne, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Le, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Ge, value)
    }

    pub fn is_null(self) -> Predicate {
        Predicate::IsNull { field: self.0 }
    }

    pub fn is_not_null(self) -> Predicate {
        Predicate::IsNotNull { field: self.0 }
    }

    pub fn is_in<I, V>(self, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::In {
            field: self.0,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn like(self, pattern: impl Into<String>) -> Predicate {
        Predicate::Like {
            field: self.0,
            pattern: pattern.into(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
