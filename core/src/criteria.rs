//! The engine-native query object.
//!
//! A [`Criteria`] is assembled by the join resolver, the criteria-tree
//! builder and the DAO, then handed to a [`Session`](crate::Session) which
//! renders and executes it.

use compact_str::{CompactString, format_compact};
use hashbrown::HashSet;
use smallvec::SmallVec;

use crate::criterion::{Criterion, Order};
use crate::entity::Entity;
use crate::error::{GraphFetchError, Result};

/// Synthetic alias of the query root.
pub const ROOT_ALIAS: &str = "this";

/// SQL join semantics of an alias join.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
}

/// How an association path is fetched after the root query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    Join,
    Select,
}

/// One structural join: `owner.association AS alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasJoin {
    pub owner: CompactString,
    pub association: CompactString,
    pub alias: CompactString,
    pub kind: JoinKind,
}

/// Post-processing applied to the rows of a list query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ResultTransform {
    /// Collapse rows sharing a root identity, first occurrence wins.
    DistinctRoot,
    #[default]
    PassThrough,
}

impl ResultTransform {
    pub fn apply<T: Entity>(self, rows: Vec<T>) -> Vec<T> {
        match self {
            ResultTransform::PassThrough => rows,
            ResultTransform::DistinctRoot => {
                let mut seen = HashSet::with_capacity(rows.len());
                rows.into_iter()
                    .filter(|row| seen.insert(row.identity()))
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionItem {
    RowCount,
    GroupProperty(CompactString),
}

/// Projection of a query: a row count and/or group-by properties.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectionList {
    items: SmallVec<[ProjectionItem; 4]>,
}

impl ProjectionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count() -> Self {
        Self::new().add(ProjectionItem::RowCount)
    }

    pub fn group_by<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        properties
            .into_iter()
            .fold(Self::new(), |list, p| list.add(ProjectionItem::GroupProperty(p.into())))
    }

    pub fn add(mut self, item: ProjectionItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn items(&self) -> &[ProjectionItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_row_count(&self) -> bool {
        self.items.contains(&ProjectionItem::RowCount)
    }

    pub fn group_properties(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match item {
            ProjectionItem::GroupProperty(p) => Some(p.as_str()),
            ProjectionItem::RowCount => None,
        })
    }
}

/// Query against one root entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    entity: CompactString,
    joins: Vec<AliasJoin>,
    fetch_modes: Vec<(CompactString, FetchMode)>,
    restrictions: Vec<Criterion>,
    orders: Vec<Order>,
    projection: Option<ProjectionList>,
    first_result: Option<u32>,
    max_results: Option<u32>,
    transform: ResultTransform,
    sub_counter: u32,
}

impl Criteria {
    pub fn new(entity: &str) -> Self {
        Self {
            entity: CompactString::from(entity),
            joins: Vec::new(),
            fetch_modes: Vec::new(),
            restrictions: Vec::new(),
            orders: Vec::new(),
            projection: None,
            first_result: None,
            max_results: None,
            transform: ResultTransform::PassThrough,
            sub_counter: 0,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Returns true for the root alias and every alias joined so far.
    pub fn has_alias(&self, alias: &str) -> bool {
        alias == ROOT_ALIAS || self.joins.iter().any(|j| j.alias == alias)
    }

    /// Joins `path` under `alias`.
    ///
    /// `path` is `"owner.association"` or a bare `"association"` of the root.
    /// The owner alias is not checked here; an unknown owner surfaces when the
    /// query is rendered.
    pub fn create_alias(&mut self, path: &str, alias: &str, kind: JoinKind) -> Result<&mut Self> {
        let (owner, association) = split_path(path)?;
        self.push_join(owner, association, alias, kind)?;
        Ok(self)
    }

    /// Joins `association` of `owner` under a generated alias and returns it.
    pub fn create_sub_criteria(
        &mut self,
        owner: &str,
        association: &str,
        kind: JoinKind,
    ) -> Result<CompactString> {
        self.sub_counter += 1;
        let alias = format_compact!("sub{}_{}", self.sub_counter, association);
        self.push_join(owner, association, &alias, kind)?;
        Ok(alias)
    }

    fn push_join(
        &mut self,
        owner: &str,
        association: &str,
        alias: &str,
        kind: JoinKind,
    ) -> Result<()> {
        if self.has_alias(alias) {
            return Err(GraphFetchError::DuplicateAlias(CompactString::from(alias)));
        }
        self.joins.push(AliasJoin {
            owner: CompactString::from(owner),
            association: CompactString::from(association),
            alias: CompactString::from(alias),
            kind,
        });
        Ok(())
    }

    pub fn set_fetch_mode(&mut self, path: &str, mode: FetchMode) -> &mut Self {
        match self.fetch_modes.iter_mut().find(|(p, _)| p == path) {
            Some(entry) => entry.1 = mode,
            None => self.fetch_modes.push((CompactString::from(path), mode)),
        }
        self
    }

    pub fn fetch_mode(&self, path: &str) -> FetchMode {
        self.fetch_modes
            .iter()
            .find(|(p, _)| p == path)
            .map_or(FetchMode::Join, |(_, mode)| *mode)
    }

    /// Fetch mode of `join`, whichever form its path was registered in
    /// (`"owner.association"` or a bare root `"association"`).
    pub fn join_fetch_mode(&self, join: &AliasJoin) -> FetchMode {
        self.fetch_modes
            .iter()
            .find(|(p, _)| {
                split_path(p).is_ok_and(|(owner, association)| {
                    owner == join.owner && association == join.association
                })
            })
            .map_or(FetchMode::Join, |(_, mode)| *mode)
    }

    /// Aliases named by restrictions, orders and group-by properties.
    pub fn referenced_aliases(&self) -> HashSet<&str> {
        let mut aliases = HashSet::new();
        for criterion in &self.restrictions {
            criterion.collect_aliases(&mut aliases);
        }
        for order in &self.orders {
            aliases.insert(alias_of(&order.property));
        }
        if let Some(projection) = &self.projection {
            aliases.extend(projection.group_properties().map(alias_of));
        }
        aliases
    }

    pub fn add(&mut self, criterion: Criterion) -> &mut Self {
        self.restrictions.push(criterion);
        self
    }

    /// Adds a restriction whose bare properties belong to `alias`.
    pub fn add_scoped(&mut self, alias: &str, criterion: &Criterion) -> &mut Self {
        self.add(criterion.qualify(alias))
    }

    pub fn add_order(&mut self, order: Order) -> &mut Self {
        self.orders.push(order);
        self
    }

    pub fn add_order_scoped(&mut self, alias: &str, order: &Order) -> &mut Self {
        self.add_order(order.qualify(alias))
    }

    pub fn set_projection(&mut self, projection: ProjectionList) -> &mut Self {
        self.projection = if projection.is_empty() {
            None
        } else {
            Some(projection)
        };
        self
    }

    pub fn set_first_result(&mut self, first: u32) -> &mut Self {
        self.first_result = Some(first);
        self
    }

    pub fn set_max_results(&mut self, max: u32) -> &mut Self {
        self.max_results = Some(max);
        self
    }

    pub fn set_result_transform(&mut self, transform: ResultTransform) -> &mut Self {
        self.transform = transform;
        self
    }

    pub fn joins(&self) -> &[AliasJoin] {
        &self.joins
    }

    pub fn restrictions(&self) -> &[Criterion] {
        &self.restrictions
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn projection(&self) -> Option<&ProjectionList> {
        self.projection.as_ref()
    }

    pub fn first_result(&self) -> Option<u32> {
        self.first_result
    }

    pub fn max_results(&self) -> Option<u32> {
        self.max_results
    }

    pub fn result_transform(&self) -> ResultTransform {
        self.transform
    }
}

/// Alias part of `"alias.property"`; the root alias for a bare property.
pub(crate) fn alias_of(property: &str) -> &str {
    property.split_once('.').map_or(ROOT_ALIAS, |(alias, _)| alias)
}

/// Splits a join path into `(owner alias, association)`.
pub(crate) fn split_path(path: &str) -> Result<(&str, &str)> {
    let invalid = |reason| GraphFetchError::InvalidJoinPath {
        path: CompactString::from(path),
        reason,
    };
    let mut segments = path.split('.');
    let (owner, association) = match (segments.next(), segments.next(), segments.next()) {
        (Some(association), None, _) => (ROOT_ALIAS, association),
        (Some(owner), Some(association), None) => (owner, association),
        _ => return Err(invalid("expected `alias.relation` or `relation`")),
    };
    if owner.trim().is_empty() || association.trim().is_empty() {
        return Err(invalid("empty path segment"));
    }
    Ok((owner, association))
}
