//! The persistence-engine boundary.

use crate::criteria::Criteria;
use crate::entity::{Association, Entity};
use crate::error::Result;
use crate::sql::SQL;
use crate::value::Key;

/// A unit of work against the store.
///
/// Sessions are single-threaded; concurrent callers use separate sessions.
pub trait Session {
    /// Runs `criteria` as a scalar count query. The criteria is expected to
    /// carry a row-count projection.
    fn count(&mut self, criteria: &Criteria) -> Result<u64>;

    /// Renders `criteria` to statement text without running it.
    fn render(&self, criteria: &Criteria) -> Result<SQL>;

    /// Runs an already rendered statement returning a single integer.
    fn count_native(&mut self, sql: &SQL) -> Result<u64>;

    /// Forces a deferred association to load while the session is alive.
    fn materialize(&mut self, association: &dyn Association) -> Result<()> {
        association.initialize()
    }

    /// Evicts whatever the session caches.
    fn clear(&mut self) {}
}

/// A session able to load entities of type `T`.
pub trait LoadEntities<T: Entity>: Session {
    /// Runs `criteria` and applies its result transform.
    fn list(&mut self, criteria: &Criteria) -> Result<Vec<T>>;

    fn get(&mut self, id: &Key) -> Result<Option<T>>;
}
