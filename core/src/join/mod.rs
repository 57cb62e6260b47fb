//! Declarative join paths and the alias graph built from them.
//!
//! The pipeline: a flat list of [`JoinPath`]s is validated and applied to a
//! [`Criteria`](crate::Criteria) by [`JoinResolver`], which also folds the
//! paths into a [`JoinGraph`] of alias nodes. The graph is pruned into an
//! [`InitTree`] holding only the branches that lead to a
//! [`JoinType::ForceSelect`] node; that tree drives post-fetch initialization.

mod graph;
mod path;
mod resolve;
mod tree;

pub use graph::{AliasId, Diagnostic, JoinGraph, JoinNode};
pub use path::{JoinPath, JoinType};
pub use resolve::{JoinResolver, Resolution};
pub use tree::{InitNode, InitTree};
