//! Recursive association initializer.
//!
//! Walks fetched rows along the force-select branches of a pruned
//! [`InitTree`], asking the session to materialize every association it
//! passes. Failures are recorded per branch and never stop the walk.

use compact_str::{CompactString, format_compact};

use crate::entity::{Entity, PropertyError, Targets};
use crate::graphfetch_trace_branch;
use crate::join::{InitNode, InitTree};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    Materialized,
    /// The entity does not expose the relation as an association.
    PropertyMissing(PropertyError),
    /// The session could not load the association.
    MaterializeFailed(String),
}

/// Outcome of one branch on one entity; `path` is dotted from the root,
/// e.g. `orders.items`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchReport {
    pub path: CompactString,
    pub outcome: BranchOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    branches: Vec<BranchReport>,
}

impl InitReport {
    /// Every visited branch, in visiting order.
    pub fn branches(&self) -> &[BranchReport] {
        &self.branches
    }

    pub fn materialized(&self) -> usize {
        self.branches
            .iter()
            .filter(|b| b.outcome == BranchOutcome::Materialized)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BranchReport> {
        self.branches
            .iter()
            .filter(|b| b.outcome != BranchOutcome::Materialized)
    }

    /// True when no branch failed.
    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }

    fn record(&mut self, path: CompactString, outcome: BranchOutcome) {
        graphfetch_trace_branch!(path, outcome);
        self.branches.push(BranchReport { path, outcome });
    }
}

pub struct Initializer<'s, S: Session + ?Sized> {
    session: &'s mut S,
}

impl<'s, S: Session + ?Sized> Initializer<'s, S> {
    pub fn new(session: &'s mut S) -> Self {
        Self { session }
    }

    /// Materializes the force-select branches of `tree` on every row.
    ///
    /// The tree is pruned first; an empty tree makes no session calls.
    pub fn initialize<E: Entity>(&mut self, tree: InitTree, rows: &[E]) -> InitReport {
        let mut report = InitReport::default();
        let tree = tree.pruned();
        if tree.is_empty() {
            return report;
        }
        for row in rows {
            self.walk(tree.root(), row, "", &mut report);
        }
        report
    }

    /// Single-entity form of [`initialize`](Initializer::initialize).
    pub fn initialize_one(&mut self, tree: InitTree, entity: &dyn Entity) -> InitReport {
        let mut report = InitReport::default();
        let tree = tree.pruned();
        if !tree.is_empty() {
            self.walk(tree.root(), entity, "", &mut report);
        }
        report
    }

    fn walk(&mut self, node: &InitNode, entity: &dyn Entity, prefix: &str, report: &mut InitReport) {
        for (relation, child) in node.children() {
            let path = if prefix.is_empty() {
                relation.clone()
            } else {
                format_compact!("{prefix}.{relation}")
            };

            let association = match entity.property(relation) {
                Ok(association) => association,
                Err(err) => {
                    report.record(path, BranchOutcome::PropertyMissing(err));
                    continue;
                }
            };
            if let Err(err) = self.session.materialize(association) {
                report.record(path, BranchOutcome::MaterializeFailed(err.to_string()));
                continue;
            }
            report.record(path.clone(), BranchOutcome::Materialized);

            match association.targets() {
                Targets::One(Some(target)) => self.walk(child, target, &path, report),
                Targets::Many(targets) => {
                    for target in targets {
                        self.walk(child, target, &path, report);
                    }
                }
                Targets::One(None) | Targets::Unavailable => {}
            }
        }
    }
}
