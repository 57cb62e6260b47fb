//! Filter predicates and sort orders.
//!
//! Properties are referenced as `"alias.property"` or, for the query root,
//! as a bare `"property"`. The free functions mirror the usual restriction
//! helpers: `eq("status", "OPEN")`, `and([..])`, `not(..)`.

use compact_str::{CompactString, format_compact};

use hashbrown::HashSet;

use crate::criteria::{ROOT_ALIAS, alias_of};
use crate::value::{Key, Value};

/// Comparison operator of a [`Criterion::Compare`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Compare {
        property: CompactString,
        op: CompareOp,
        value: Value,
    },
    Like {
        property: CompactString,
        pattern: CompactString,
    },
    IsNull(CompactString),
    IsNotNull(CompactString),
    In {
        property: CompactString,
        values: Vec<Value>,
    },
    Between {
        property: CompactString,
        low: Value,
        high: Value,
    },
    /// Identifier equality; `scope` is the alias whose identifier is compared
    /// (`None` means the root).
    IdEq {
        scope: Option<CompactString>,
        key: Key,
    },
    And(Vec<Criterion>),
    Or(Vec<Criterion>),
    Not(Box<Criterion>),
}

impl Criterion {
    /// Prefixes every unqualified property with `alias`.
    ///
    /// Already qualified properties are left alone, as is everything when
    /// `alias` is the root alias.
    pub fn qualify(&self, alias: &str) -> Criterion {
        if alias == ROOT_ALIAS {
            return self.clone();
        }
        let q = |property: &CompactString| qualify_property(property, alias);
        match self {
            Criterion::Compare {
                property,
                op,
                value,
            } => Criterion::Compare {
                property: q(property),
                op: *op,
                value: value.clone(),
            },
            Criterion::Like { property, pattern } => Criterion::Like {
                property: q(property),
                pattern: pattern.clone(),
            },
            Criterion::IsNull(property) => Criterion::IsNull(q(property)),
            Criterion::IsNotNull(property) => Criterion::IsNotNull(q(property)),
            Criterion::In { property, values } => Criterion::In {
                property: q(property),
                values: values.clone(),
            },
            Criterion::Between {
                property,
                low,
                high,
            } => Criterion::Between {
                property: q(property),
                low: low.clone(),
                high: high.clone(),
            },
            Criterion::IdEq { scope, key } => Criterion::IdEq {
                scope: Some(scope.clone().unwrap_or_else(|| CompactString::from(alias))),
                key: key.clone(),
            },
            Criterion::And(items) => Criterion::And(items.iter().map(|c| c.qualify(alias)).collect()),
            Criterion::Or(items) => Criterion::Or(items.iter().map(|c| c.qualify(alias)).collect()),
            Criterion::Not(inner) => Criterion::Not(Box::new(inner.qualify(alias))),
        }
    }
}

impl Criterion {
    /// Adds every alias this predicate reads from to `out`.
    pub(crate) fn collect_aliases<'a>(&'a self, out: &mut HashSet<&'a str>) {
        match self {
            Criterion::Compare { property, .. }
            | Criterion::Like { property, .. }
            | Criterion::IsNull(property)
            | Criterion::IsNotNull(property)
            | Criterion::In { property, .. }
            | Criterion::Between { property, .. } => {
                out.insert(alias_of(property));
            }
            Criterion::IdEq { scope, .. } => {
                out.insert(scope.as_deref().unwrap_or(ROOT_ALIAS));
            }
            Criterion::And(items) | Criterion::Or(items) => {
                for item in items {
                    item.collect_aliases(out);
                }
            }
            Criterion::Not(inner) => inner.collect_aliases(out),
        }
    }
}

fn qualify_property(property: &CompactString, alias: &str) -> CompactString {
    if property.contains('.') {
        property.clone()
    } else {
        format_compact!("{alias}.{property}")
    }
}

fn compare(property: &str, op: CompareOp, value: impl Into<Value>) -> Criterion {
    Criterion::Compare {
        property: CompactString::from(property),
        op,
        value: value.into(),
    }
}

/// `property = value`
pub fn eq(property: &str, value: impl Into<Value>) -> Criterion {
    compare(property, CompareOp::Eq, value)
}

/// `property <> value`
pub fn ne(property: &str, value: impl Into<Value>) -> Criterion {
    compare(property, CompareOp::Ne, value)
}

/// `property < value`
pub fn lt(property: &str, value: impl Into<Value>) -> Criterion {
    compare(property, CompareOp::Lt, value)
}

/// `property <= value`
pub fn le(property: &str, value: impl Into<Value>) -> Criterion {
    compare(property, CompareOp::Le, value)
}

/// `property > value`
pub fn gt(property: &str, value: impl Into<Value>) -> Criterion {
    compare(property, CompareOp::Gt, value)
}

/// `property >= value`
pub fn ge(property: &str, value: impl Into<Value>) -> Criterion {
    compare(property, CompareOp::Ge, value)
}

pub fn like(property: &str, pattern: &str) -> Criterion {
    Criterion::Like {
        property: CompactString::from(property),
        pattern: CompactString::from(pattern),
    }
}

pub fn is_null(property: &str) -> Criterion {
    Criterion::IsNull(CompactString::from(property))
}

pub fn is_not_null(property: &str) -> Criterion {
    Criterion::IsNotNull(CompactString::from(property))
}

pub fn in_list<V: Into<Value>>(property: &str, values: impl IntoIterator<Item = V>) -> Criterion {
    Criterion::In {
        property: CompactString::from(property),
        values: values.into_iter().map(Into::into).collect(),
    }
}

pub fn between(property: &str, low: impl Into<Value>, high: impl Into<Value>) -> Criterion {
    Criterion::Between {
        property: CompactString::from(property),
        low: low.into(),
        high: high.into(),
    }
}

/// Identifier equality on the root entity.
pub fn id_eq(key: impl Into<Key>) -> Criterion {
    Criterion::IdEq {
        scope: None,
        key: key.into(),
    }
}

pub fn and(items: impl IntoIterator<Item = Criterion>) -> Criterion {
    Criterion::And(items.into_iter().collect())
}

pub fn or(items: impl IntoIterator<Item = Criterion>) -> Criterion {
    Criterion::Or(items.into_iter().collect())
}

pub fn not(inner: Criterion) -> Criterion {
    Criterion::Not(Box::new(inner))
}

/// Sort direction for ORDER BY clauses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A sort order on one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub property: CompactString,
    pub direction: SortDirection,
}

impl Order {
    /// Creates an ascending order: "property ASC"
    pub fn asc(property: &str) -> Self {
        Self {
            property: CompactString::from(property),
            direction: SortDirection::Asc,
        }
    }

    /// Creates a descending order: "property DESC"
    pub fn desc(property: &str) -> Self {
        Self {
            property: CompactString::from(property),
            direction: SortDirection::Desc,
        }
    }

    pub fn qualify(&self, alias: &str) -> Order {
        if alias == ROOT_ALIAS {
            return self.clone();
        }
        Order {
            property: qualify_property(&self.property, alias),
            direction: self.direction,
        }
    }
}
