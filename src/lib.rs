//! # graphfetch
//!
//! Declarative join paths, criteria trees and eager association loading over
//! a criteria-query engine.
//!
//! Callers describe what related data they want with [`JoinPath`]s. The
//! resolver turns them into joins on one query and an alias graph; after the
//! fetch, every branch marked `ForceSelect` is materialized so it can be read
//! after the session is gone.
//!
//! ```rust
//! use graphfetch::prelude::*;
//!
//! let paths = [
//!     JoinPath::left("this.orders", "orders"),
//!     JoinPath::force_select("orders.items", "items"),
//! ];
//! let mut criteria = Criteria::new("Customer");
//! let resolution = JoinResolver::new(&mut criteria).resolve(&paths)?;
//!
//! let tree = resolution.init_tree();
//! assert!(tree.root().child("orders").and_then(|o| o.child("items")).is_some());
//! # Ok::<(), graphfetch::error::GraphFetchError>(())
//! ```
//!
//! ## Engines
//!
//! | Engine | Driver   | Feature Flag |
//! |--------|----------|--------------|
//! | SQLite | rusqlite | `rusqlite`   |

mod dao;

#[cfg(feature = "rusqlite")]
pub mod sqlite;

pub use dao::{Fetched, GenericDao};

/// Result type for data-access operations
pub use graphfetch_core::Result;

/// Error types
pub mod error {
    pub use graphfetch_core::error::GraphFetchError;
    pub use graphfetch_core::entity::PropertyError;
}

/// Predicate constructors: `eq`, `like`, `in_list`, `and`, `not`, ...
pub use graphfetch_core::criterion;

/// Core types and traits.
///
/// - **Query**: `Criteria`, `Criterion`, `Order`, `ProjectionList`, `ResultTransform`
/// - **Join paths**: `JoinPath`, `JoinType`, `JoinResolver`, `JoinGraph`, `InitTree`
/// - **Engine boundary**: `Session`, `LoadEntities`, `Entity`, `Association`, `Lazy`
/// - **SQL**: `SQL`, `SQLChunk`, `Token`, `Renderer`
pub mod core {
    pub use graphfetch_core::{
        AliasId, AliasJoin, Association, AssociationKind, AssociationMapping, BranchOutcome,
        BranchReport, Criteria, Criterion, Diagnostic, Entity, EntityMapping, FetchMode,
        InitNode, InitReport, InitTree, Initializer, JoinGraph, JoinKind, JoinNode, JoinPath,
        JoinResolver, JoinType, Key, Lazy, LoadEntities, Metadata, MetadataRegistry, Order,
        Persistent, ProjectionItem, ProjectionList, PropertyCriterion, PropertyOrder, ROOT_ALIAS,
        Related, Renderer, Resolution, ResultTransform, SQL, SQLChunk, SearchCriteria, Session,
        SortDirection, Targets, Token, Value, apply_property_criteria, count_of_subquery,
    };
}

pub mod prelude {
    pub use crate::core::{
        Association, BranchOutcome, Criteria, Criterion, Diagnostic, Entity, EntityMapping,
        InitReport, JoinKind, JoinPath, JoinResolver, JoinType, Key, Lazy, LoadEntities,
        MetadataRegistry, Order, Persistent, PropertyCriterion, PropertyOrder, SearchCriteria,
        Session, Value,
    };
    pub use crate::criterion;
    pub use crate::dao::{Fetched, GenericDao};
    pub use crate::error::{GraphFetchError, PropertyError};
}
