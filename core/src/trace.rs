//! Tracing utilities for query execution, join-graph diagnostics and
//! association initialization.
//!
//! Enable the `tracing` feature to emit events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]` boilerplate
//! at every call site.

/// Emit a debug-level tracing event with the SQL text and parameter count.
///
/// ```ignore
/// graphfetch_trace_query!(&sql_str, params.len());
/// ```
#[macro_export]
macro_rules! graphfetch_trace_query {
    ($sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql = %$sql, params = $param_count, "graphfetch.query");
    };
}

/// Emit a warn-level tracing event for a join-graph diagnostic.
#[macro_export]
macro_rules! graphfetch_trace_diagnostic {
    ($diagnostic:expr) => {
        #[cfg(feature = "tracing")]
        tracing::warn!(diagnostic = %$diagnostic, "graphfetch.join_graph");
    };
}

/// Emit a debug-level tracing event for one initializer branch.
#[macro_export]
macro_rules! graphfetch_trace_branch {
    ($path:expr, $outcome:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(path = %$path, outcome = ?$outcome, "graphfetch.initialize");
    };
}
