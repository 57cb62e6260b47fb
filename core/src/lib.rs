pub mod criteria;
pub mod criterion;
pub mod entity;
pub mod error;
pub mod initialize;
pub mod join;
pub mod metadata;
pub mod render;
pub mod search;
pub mod session;
pub mod sql;
pub mod trace;
pub mod value;

// Re-export key types and traits
pub use criteria::{
    AliasJoin, Criteria, FetchMode, JoinKind, ProjectionItem, ProjectionList, ROOT_ALIAS,
    ResultTransform,
};
pub use criterion::{Criterion, Order, SortDirection};
pub use entity::{Association, Entity, Lazy, Persistent, PropertyError, Related, Targets};
pub use error::{GraphFetchError, Result};
pub use initialize::{BranchOutcome, BranchReport, InitReport, Initializer};
pub use join::{
    AliasId, Diagnostic, InitNode, InitTree, JoinGraph, JoinNode, JoinPath, JoinResolver,
    JoinType, Resolution,
};
pub use metadata::{AssociationKind, AssociationMapping, EntityMapping, Metadata, MetadataRegistry};
pub use render::{Renderer, count_of_subquery};
pub use search::{PropertyCriterion, PropertyOrder, SearchCriteria, apply_property_criteria};
pub use session::{LoadEntities, Session};
pub use sql::{SQL, SQLChunk, Token};
pub use value::{Key, Value};
