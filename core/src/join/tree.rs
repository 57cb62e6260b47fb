use compact_str::CompactString;

use super::path::JoinType;

/// Owned node of an initialization tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitNode {
    pub alias: CompactString,
    pub join_type: JoinType,
    children: Vec<(CompactString, InitNode)>,
}

impl InitNode {
    pub fn new(alias: impl Into<CompactString>, join_type: JoinType) -> Self {
        Self {
            alias: alias.into(),
            join_type,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, relation: &str, child: InitNode) -> Self {
        self.push_child(CompactString::from(relation), child);
        self
    }

    pub(crate) fn push_child(&mut self, relation: CompactString, child: InitNode) {
        self.children.push((relation, child));
    }

    /// Children keyed by relation name.
    pub fn children(&self) -> &[(CompactString, InitNode)] {
        &self.children
    }

    pub fn child(&self, relation: &str) -> Option<&InitNode> {
        self.children
            .iter()
            .find(|(key, _)| key == relation)
            .map(|(_, node)| node)
    }

    /// Drops every child subtree without a force-select node and reports
    /// whether this node survives.
    fn prune(&mut self) -> bool {
        self.children.retain_mut(|(_, child)| child.prune());
        self.join_type.is_force_select() || !self.children.is_empty()
    }

    fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|(_, child)| 1 + child.depth())
            .max()
            .unwrap_or(0)
    }
}

/// Tree walked by the [`Initializer`](crate::Initializer).
///
/// Owned by a single fetch and dropped when it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitTree {
    root: InitNode,
}

impl InitTree {
    pub fn new(root: InitNode) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &InitNode {
        &self.root
    }

    /// Keeps only branches leading to a force-select node. Idempotent.
    pub fn pruned(mut self) -> Self {
        self.root.children.retain_mut(|(_, child)| child.prune());
        self
    }

    /// True when the root has no children, i.e. nothing to materialize
    /// once pruned.
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Length of the longest relation chain below the root.
    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}
