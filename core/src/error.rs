use compact_str::CompactString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphFetchError {
    /// Two join paths registered the same alias
    #[error("Duplicate alias: `{0}` is defined more than once")]
    DuplicateAlias(CompactString),

    /// A join path that cannot be turned into a join
    #[error("Invalid join path `{path}`: {reason}")]
    InvalidJoinPath {
        path: CompactString,
        reason: &'static str,
    },

    /// A property or join referenced an alias the query does not know
    #[error("Unknown alias: `{0}`")]
    UnknownAlias(CompactString),

    /// Entity mapping metadata is missing or inconsistent
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Error executing a query
    #[error("Execution error: {0}")]
    Execution(String),

    /// No entity with the requested identifier
    #[error("{entity} with id {id} not found")]
    NotFound {
        entity: &'static str,
        id: CompactString,
    },

    /// A deferred reference was read before it was loaded
    #[error("Lazy initialization error: {0}")]
    LazyInitialization(String),

    /// The session that handed out a deferred reference is gone
    #[error("Session closed")]
    SessionClosed,

    /// Rusqlite specific errors
    #[cfg(feature = "rusqlite")]
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Result type for data-access operations
pub type Result<T> = std::result::Result<T, GraphFetchError>;
