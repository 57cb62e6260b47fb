use compact_str::CompactString;

use crate::criteria::{FetchMode, JoinKind};

/// Semantics of a [`JoinPath`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum JoinType {
    #[default]
    InnerJoin,
    LeftJoin,
    /// Joined, and materialized after the fetch together with its ancestors.
    ForceSelect,
    /// Joined and registered, but left as a deferred reference.
    ForceSelectUninitialized,
    /// Keeps duplicate root rows produced by one-to-many joins.
    NonDistinctRoot,
    /// `alias` names a property to group by; only the count query uses it.
    GroupingField,
}

impl JoinType {
    /// True for the types that add a join to the query.
    pub const fn is_structural(self) -> bool {
        matches!(
            self,
            JoinType::InnerJoin
                | JoinType::LeftJoin
                | JoinType::ForceSelect
                | JoinType::ForceSelectUninitialized
        )
    }

    pub const fn is_force_select(self) -> bool {
        matches!(self, JoinType::ForceSelect)
    }

    /// Both force-select types leave their association to a later select.
    pub const fn fetch_mode(self) -> FetchMode {
        match self {
            JoinType::ForceSelect | JoinType::ForceSelectUninitialized => FetchMode::Select,
            _ => FetchMode::Join,
        }
    }

    /// SQL join semantics; force-select joins use LEFT so rows without the
    /// association survive.
    pub const fn join_kind(self) -> Option<JoinKind> {
        match self {
            JoinType::InnerJoin => Some(JoinKind::Inner),
            JoinType::LeftJoin | JoinType::ForceSelect | JoinType::ForceSelectUninitialized => {
                Some(JoinKind::Left)
            }
            JoinType::NonDistinctRoot | JoinType::GroupingField => None,
        }
    }
}

/// One relation to traverse.
///
/// A multi-level relation is split into one path per hop:
///
/// ```
/// use graphfetch_core::{JoinPath, JoinType};
///
/// let paths = [
///     JoinPath::new("this.orders", "orders", JoinType::LeftJoin),
///     JoinPath::new("orders.items", "items", JoinType::ForceSelect),
///     JoinPath::new("items.product", "product", JoinType::InnerJoin),
/// ];
/// assert!(paths.iter().all(|p| p.join_type.is_structural()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPath {
    /// `"<parentAlias>.<relation>"` or `"<relation>"` of the root.
    pub path: CompactString,
    /// May be blank for paths without entity-path semantics.
    pub alias: CompactString,
    pub join_type: JoinType,
}

impl JoinPath {
    pub fn new(path: &str, alias: &str, join_type: JoinType) -> Self {
        Self {
            path: CompactString::from(path),
            alias: CompactString::from(alias),
            join_type,
        }
    }

    /// An inner join, the default join type.
    pub fn inner(path: &str, alias: &str) -> Self {
        Self::new(path, alias, JoinType::InnerJoin)
    }

    pub fn left(path: &str, alias: &str) -> Self {
        Self::new(path, alias, JoinType::LeftJoin)
    }

    pub fn force_select(path: &str, alias: &str) -> Self {
        Self::new(path, alias, JoinType::ForceSelect)
    }

    pub fn non_distinct_root() -> Self {
        Self::new("", "", JoinType::NonDistinctRoot)
    }

    /// Groups the count query by `property` (`"alias.property"` or a root property).
    pub fn grouping(property: &str) -> Self {
        Self::new("", property, JoinType::GroupingField)
    }

    pub fn has_alias(&self) -> bool {
        !self.alias.trim().is_empty()
    }

    pub fn has_path(&self) -> bool {
        !self.path.trim().is_empty()
    }

    /// Last segment of the path.
    pub fn relation(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}
