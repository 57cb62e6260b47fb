use compact_str::CompactString;
use core::fmt;

use super::path::JoinType;
use super::tree::{InitNode, InitTree};
use crate::criteria::ROOT_ALIAS;

/// Handle of a node in a [`JoinGraph`]; the root is always `AliasId(0)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AliasId(pub(crate) u32);

impl AliasId {
    pub const ROOT: AliasId = AliasId(0);

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinNode {
    pub alias: CompactString,
    pub join_type: JoinType,
    parent: Option<AliasId>,
    children: Vec<(CompactString, AliasId)>,
}

impl JoinNode {
    fn new(alias: &str, join_type: JoinType) -> Self {
        Self {
            alias: CompactString::from(alias),
            join_type,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<AliasId> {
        self.parent
    }

    /// Children keyed by relation name, in declaration order.
    pub fn children(&self) -> &[(CompactString, AliasId)] {
        &self.children
    }

    pub fn child(&self, relation: &str) -> Option<AliasId> {
        self.children
            .iter()
            .find(|(key, _)| key == relation)
            .map(|(_, id)| *id)
    }
}

/// A join path that was left out of the graph.
///
/// These never fail resolution; they are reported alongside the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The first segment of the path names no registered alias.
    UnresolvedParent {
        path: CompactString,
        parent: CompactString,
    },
    /// The path has a blank alias and its relation names no registered alias.
    UnresolvedTarget {
        path: CompactString,
        target: CompactString,
    },
    /// Linking would make an alias its own ancestor.
    Cycle {
        path: CompactString,
        alias: CompactString,
    },
    /// The alias already hangs under another parent.
    SecondParent {
        path: CompactString,
        alias: CompactString,
    },
    /// A relation declared again under the same parent; the later declaration wins.
    ShadowedRelation {
        parent: CompactString,
        relation: CompactString,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnresolvedParent { path, parent } => {
                write!(f, "join path `{path}` skipped: unknown parent alias `{parent}`")
            }
            Diagnostic::UnresolvedTarget { path, target } => {
                write!(f, "join path `{path}` skipped: no alias named `{target}`")
            }
            Diagnostic::Cycle { path, alias } => {
                write!(f, "join path `{path}` skipped: `{alias}` would be its own ancestor")
            }
            Diagnostic::SecondParent { path, alias } => {
                write!(f, "join path `{path}` skipped: `{alias}` already has a parent")
            }
            Diagnostic::ShadowedRelation { parent, relation } => {
                write!(f, "relation `{parent}.{relation}` declared twice, later one kept")
            }
        }
    }
}

/// Alias graph of one query, stored as an arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGraph {
    nodes: Vec<JoinNode>,
}

impl Default for JoinGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::len_without_is_empty)]
impl JoinGraph {
    /// A graph holding only the root `this`.
    pub fn new() -> Self {
        Self {
            nodes: vec![JoinNode::new(ROOT_ALIAS, JoinType::LeftJoin)],
        }
    }

    /// Number of nodes, root included; at least 1.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> &JoinNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: AliasId) -> Option<&JoinNode> {
        self.nodes.get(id.index())
    }

    pub fn find(&self, alias: &str) -> Option<AliasId> {
        self.nodes
            .iter()
            .position(|node| node.alias == alias)
            .and_then(|i| u32::try_from(i).ok())
            .map(AliasId)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (AliasId, &JoinNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (AliasId(i as u32), node))
    }

    /// Adds a parentless node. The caller guarantees `alias` is not registered yet.
    pub(crate) fn register(&mut self, alias: &str, join_type: JoinType) -> AliasId {
        let id = AliasId(self.nodes.len() as u32);
        self.nodes.push(JoinNode::new(alias, join_type));
        id
    }

    /// Hangs `child` under `parent` at `relation`.
    ///
    /// Returns the diagnostic explaining a refused or shadowing link; a
    /// shadowing link is still applied.
    pub(crate) fn link(
        &mut self,
        path: &str,
        parent: AliasId,
        relation: &str,
        child: AliasId,
    ) -> Option<Diagnostic> {
        let child_alias = self.nodes[child.index()].alias.clone();
        if self.is_ancestor_or_self(child, parent) {
            return Some(Diagnostic::Cycle {
                path: CompactString::from(path),
                alias: child_alias,
            });
        }
        if self.nodes[child.index()].parent.is_some() {
            return Some(Diagnostic::SecondParent {
                path: CompactString::from(path),
                alias: child_alias,
            });
        }

        self.nodes[child.index()].parent = Some(parent);
        let position = self.nodes[parent.index()]
            .children
            .iter()
            .position(|(key, _)| key == relation);
        match position {
            Some(i) => {
                let shadowed =
                    core::mem::replace(&mut self.nodes[parent.index()].children[i].1, child);
                self.nodes[shadowed.index()].parent = None;
                Some(Diagnostic::ShadowedRelation {
                    parent: self.nodes[parent.index()].alias.clone(),
                    relation: CompactString::from(relation),
                })
            }
            None => {
                self.nodes[parent.index()]
                    .children
                    .push((CompactString::from(relation), child));
                None
            }
        }
    }

    fn is_ancestor_or_self(&self, candidate: AliasId, mut of: AliasId) -> bool {
        loop {
            if candidate == of {
                return true;
            }
            match self.nodes[of.index()].parent {
                Some(parent) => of = parent,
                None => return false,
            }
        }
    }

    /// Owned tree reachable from the root, unpruned.
    pub fn to_tree(&self) -> InitTree {
        InitTree::new(self.subtree(AliasId::ROOT))
    }

    fn subtree(&self, id: AliasId) -> InitNode {
        let node = &self.nodes[id.index()];
        let mut out = InitNode::new(node.alias.clone(), node.join_type);
        for (relation, child) in &node.children {
            out.push_child(relation.clone(), self.subtree(*child));
        }
        out
    }
}
