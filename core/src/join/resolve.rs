use compact_str::CompactString;
use hashbrown::HashSet;

use super::graph::{Diagnostic, JoinGraph};
use super::path::{JoinPath, JoinType};
use super::tree::InitTree;
use crate::criteria::{Criteria, FetchMode, ROOT_ALIAS, ResultTransform, split_path};
use crate::error::{GraphFetchError, Result};
use crate::graphfetch_trace_diagnostic;

/// Outcome of resolving a join path list against one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub graph: JoinGraph,
    /// Grouping properties in declaration order.
    pub grouping: Vec<CompactString>,
    /// False when a `NonDistinctRoot` path was present.
    pub distinct_root: bool,
    /// Paths left out of the graph, in declaration order.
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    pub fn has_grouping(&self) -> bool {
        !self.grouping.is_empty()
    }

    /// Pruned tree for the initializer.
    pub fn init_tree(&self) -> InitTree {
        self.graph.to_tree().pruned()
    }
}

/// Applies a join path list to a [`Criteria`] and builds the alias graph.
///
/// The resolver mutates the criteria it was created for and is consumed by
/// [`resolve`](JoinResolver::resolve), so one resolver serves one query.
///
/// ```
/// use graphfetch_core::{Criteria, JoinPath, JoinResolver};
///
/// let mut criteria = Criteria::new("Customer");
/// let resolution = JoinResolver::new(&mut criteria)
///     .resolve(&[
///         JoinPath::left("this.orders", "orders"),
///         JoinPath::force_select("orders.items", "items"),
///     ])
///     .unwrap();
/// assert_eq!(resolution.graph.len(), 3);
/// assert_eq!(criteria.joins().len(), 2);
/// ```
pub struct JoinResolver<'c> {
    criteria: &'c mut Criteria,
}

impl<'c> JoinResolver<'c> {
    pub fn new(criteria: &'c mut Criteria) -> Self {
        Self { criteria }
    }

    /// Fails with [`GraphFetchError::DuplicateAlias`] or
    /// [`GraphFetchError::InvalidJoinPath`] before touching the criteria.
    pub fn resolve(mut self, paths: &[JoinPath]) -> Result<Resolution> {
        validate(paths)?;

        let mut distinct_root = true;
        let mut grouping = Vec::new();
        for path in paths {
            match path.join_type {
                JoinType::NonDistinctRoot => distinct_root = false,
                JoinType::GroupingField => grouping.push(CompactString::from(path.alias.trim())),
                join_type => self.apply_structural(path, join_type)?,
            }
        }
        if distinct_root {
            self.criteria
                .set_result_transform(ResultTransform::DistinctRoot);
        }

        let (graph, diagnostics) = build_graph(paths);
        for diagnostic in &diagnostics {
            graphfetch_trace_diagnostic!(diagnostic);
        }

        Ok(Resolution {
            graph,
            grouping,
            distinct_root,
            diagnostics,
        })
    }

    fn apply_structural(&mut self, path: &JoinPath, join_type: JoinType) -> Result<()> {
        let Some(kind) = join_type.join_kind() else {
            return Ok(());
        };
        if path.has_alias() {
            self.criteria
                .create_alias(&path.path, path.alias.trim(), kind)?;
        }
        if join_type.fetch_mode() == FetchMode::Select {
            self.criteria.set_fetch_mode(&path.path, FetchMode::Select);
        }
        Ok(())
    }
}

fn validate(paths: &[JoinPath]) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(paths.len() + 1);
    seen.insert(ROOT_ALIAS);
    for path in paths.iter().filter(|p| p.has_alias()) {
        let alias = path.alias.trim();
        if !seen.insert(alias) {
            return Err(GraphFetchError::DuplicateAlias(CompactString::from(alias)));
        }
    }

    for path in paths {
        let invalid = |reason| GraphFetchError::InvalidJoinPath {
            path: path.path.clone(),
            reason,
        };
        match path.join_type {
            JoinType::InnerJoin | JoinType::LeftJoin if !path.has_alias() => {
                return Err(invalid("join needs an alias"));
            }
            JoinType::GroupingField if !path.has_alias() => {
                return Err(invalid("grouping field needs a property"));
            }
            join_type if join_type.is_structural() => {
                split_path(&path.path)?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Registers every named alias, then links structural paths under their parent.
fn build_graph(paths: &[JoinPath]) -> (JoinGraph, Vec<Diagnostic>) {
    let mut graph = JoinGraph::new();
    let mut diagnostics = Vec::new();

    for path in paths.iter().filter(|p| p.has_alias()) {
        graph.register(path.alias.trim(), path.join_type);
    }

    for path in paths.iter().filter(|p| p.join_type.is_structural()) {
        // validated already
        let Ok((owner, relation)) = split_path(&path.path) else {
            continue;
        };
        let Some(parent) = graph.find(owner) else {
            diagnostics.push(Diagnostic::UnresolvedParent {
                path: path.path.clone(),
                parent: CompactString::from(owner),
            });
            continue;
        };
        let target = if path.has_alias() {
            path.alias.trim()
        } else {
            relation
        };
        let Some(child) = graph.find(target) else {
            diagnostics.push(Diagnostic::UnresolvedTarget {
                path: path.path.clone(),
                target: CompactString::from(target),
            });
            continue;
        };
        if let Some(diagnostic) = graph.link(&path.path, parent, relation, child) {
            diagnostics.push(diagnostic);
        }
    }

    (graph, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::JoinKind;

    fn resolve(paths: &[JoinPath]) -> (Criteria, Result<Resolution>) {
        let mut criteria = Criteria::new("Customer");
        let resolution = JoinResolver::new(&mut criteria).resolve(paths);
        (criteria, resolution)
    }

    #[test]
    fn node_count_is_named_paths_plus_root() {
        let (criteria, resolution) = resolve(&[
            JoinPath::left("this.orders", "orders"),
            JoinPath::force_select("orders.items", "items"),
            JoinPath::new("items.product", "product", JoinType::ForceSelectUninitialized),
            JoinPath::grouping("orders.status"),
            JoinPath::non_distinct_root(),
        ]);
        let resolution = resolution.unwrap();

        assert_eq!(resolution.graph.len(), 5);
        assert_eq!(criteria.joins().len(), 3);
        assert_eq!(criteria.joins()[1].kind, JoinKind::Left);
        assert_eq!(criteria.fetch_mode("orders.items"), FetchMode::Select);
        assert_eq!(criteria.fetch_mode("items.product"), FetchMode::Select);
        assert_eq!(criteria.fetch_mode("this.orders"), FetchMode::Join);
        assert_eq!(resolution.grouping, vec!["orders.status"]);
        assert!(!resolution.distinct_root);
        assert_eq!(criteria.result_transform(), ResultTransform::PassThrough);
        assert!(resolution.diagnostics.is_empty());
    }

    #[test]
    fn duplicate_alias_fails_before_mutation() {
        let (criteria, resolution) = resolve(&[
            JoinPath::inner("orders", "o"),
            JoinPath::left("o.items", "o"),
        ]);
        assert!(matches!(resolution, Err(GraphFetchError::DuplicateAlias(a)) if a == "o"));
        assert!(criteria.joins().is_empty());
        assert_eq!(criteria.result_transform(), ResultTransform::PassThrough);

        let (_, resolution) = resolve(&[JoinPath::inner("orders", "this")]);
        assert!(matches!(resolution, Err(GraphFetchError::DuplicateAlias(_))));
    }

    #[test]
    fn rejects_unnamed_structural_joins() {
        let (_, resolution) = resolve(&[JoinPath::inner("orders", "  ")]);
        assert!(matches!(
            resolution,
            Err(GraphFetchError::InvalidJoinPath { .. })
        ));
        let (_, resolution) = resolve(&[JoinPath::left("a.b.c", "c")]);
        assert!(matches!(
            resolution,
            Err(GraphFetchError::InvalidJoinPath { .. })
        ));
    }

    #[test]
    fn unknown_parent_is_skipped_with_diagnostic() {
        let (_, resolution) = resolve(&[
            JoinPath::left("this.orders", "orders"),
            JoinPath::force_select("ghost.items", "items"),
        ]);
        let resolution = resolution.unwrap();
        assert_eq!(resolution.graph.len(), 3);
        assert_eq!(
            resolution.diagnostics,
            vec![Diagnostic::UnresolvedParent {
                path: CompactString::from("ghost.items"),
                parent: CompactString::from("ghost"),
            }]
        );
        assert!(resolution.init_tree().is_empty());
    }

    #[test]
    fn distinct_root_by_default() {
        let (criteria, resolution) = resolve(&[JoinPath::left("orders", "orders")]);
        assert!(resolution.unwrap().distinct_root);
        assert_eq!(criteria.result_transform(), ResultTransform::DistinctRoot);
    }

    #[test]
    fn unnamed_force_select_links_by_relation() {
        let (criteria, resolution) = resolve(&[
            JoinPath::force_select("orders", ""),
            JoinPath::force_select("this.customer", ""),
        ]);
        let resolution = resolution.unwrap();
        assert!(criteria.joins().is_empty());
        assert_eq!(criteria.fetch_mode("orders"), FetchMode::Select);
        assert_eq!(resolution.graph.len(), 1);
        assert_eq!(resolution.diagnostics.len(), 2);
        assert!(matches!(
            resolution.diagnostics[0],
            Diagnostic::UnresolvedTarget { .. }
        ));
    }

    #[test]
    fn tree_follows_force_select_branches() {
        let (_, resolution) = resolve(&[
            JoinPath::left("this.orders", "orders"),
            JoinPath::force_select("orders.items", "items"),
            JoinPath::inner("this.region", "region"),
        ]);
        let tree = resolution.unwrap().init_tree();
        let orders = tree.root().child("orders").unwrap();
        assert_eq!(orders.alias, "orders");
        assert!(orders.child("items").is_some());
        assert!(tree.root().child("region").is_none());
        assert_eq!(tree.depth(), 2);
    }
}
