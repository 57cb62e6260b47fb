//! Synchronous SQLite engine using [`rusqlite`].
//!
//! [`SqliteSession`] owns the connection. Deferred references handed out
//! through [`SqliteContext`] hold it weakly, so reading one that was never
//! loaded fails with [`GraphFetchError::SessionClosed`] once the session is
//! dropped.
//!
//! # Example
//!
//! ```
//! use graphfetch::prelude::*;
//! use graphfetch::sqlite::{FromSqliteRow, SqliteContext, SqliteSession};
//!
//! struct Customer {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Entity for Customer {
//!     fn entity_name(&self) -> &str {
//!         Self::ENTITY_NAME
//!     }
//!     fn identity(&self) -> Key {
//!         Key::Integer(self.id)
//!     }
//!     fn property(&self, name: &str) -> std::result::Result<&dyn Association, PropertyError> {
//!         Err(PropertyError::missing(Self::ENTITY_NAME, name))
//!     }
//! }
//!
//! impl Persistent for Customer {
//!     const ENTITY_NAME: &'static str = "Customer";
//! }
//!
//! impl FromSqliteRow for Customer {
//!     fn from_row(row: &rusqlite::Row<'_>, _: &SqliteContext) -> rusqlite::Result<Self> {
//!         Ok(Self { id: row.get("id")?, name: row.get("name")? })
//!     }
//! }
//!
//! # fn main() -> graphfetch::Result<()> {
//! let conn = rusqlite::Connection::open_in_memory()?;
//! conn.execute_batch(
//!     "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
//!      INSERT INTO customers (id, name) VALUES (1, 'Ada'), (2, 'Brian');",
//! )?;
//! let metadata = MetadataRegistry::builder()
//!     .entity(EntityMapping::new("Customer", "customers"))
//!     .build();
//!
//! let mut session = SqliteSession::new(conn, metadata);
//! let mut dao = GenericDao::<_, Customer>::new(&mut session);
//! let rows = dao.fetch_all(&[], &[criterion::like("name", "A%")], &[])?;
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].name, "Ada");
//! # Ok(())
//! # }
//! ```

use std::cell::Cell;
use std::rc::{Rc, Weak};

use compact_str::CompactString;
use graphfetch_core::{
    Association, Criteria, GraphFetchError, Key, Lazy, LoadEntities, MetadataRegistry, Persistent,
    Renderer, Result, SQL, Session, criterion, graphfetch_trace_query,
};
use rusqlite::{Connection, params_from_iter};

/// Counters kept by a [`SqliteSession`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Statements executed, lazy loads included.
    pub queries: u64,
    pub lazy_loads: u64,
    pub materialize_calls: u64,
}

/// Builds an entity from a row of its table.
///
/// Associations are wired up with the deferred references of `ctx`.
pub trait FromSqliteRow: Persistent {
    fn from_row(row: &rusqlite::Row<'_>, ctx: &SqliteContext) -> rusqlite::Result<Self>;
}

/// Handle given to [`FromSqliteRow`] implementations.
#[derive(Clone)]
pub struct SqliteContext {
    conn: Weak<Connection>,
    metadata: Rc<MetadataRegistry>,
    stats: Rc<Cell<SessionStats>>,
}

impl SqliteContext {
    /// A deferred one-to-many collection of `owner.association`, keyed by
    /// the owner's identifier.
    pub fn lazy_collection<E: FromSqliteRow + 'static>(
        &self,
        owner: &str,
        association: &str,
        owner_key: Key,
    ) -> Lazy<Vec<E>> {
        let ctx = self.clone();
        let owner = CompactString::from(owner);
        let association = CompactString::from(association);
        Lazy::deferred(move || {
            let sql = Renderer::new(ctx.metadata.as_ref()).association_load(
                &owner,
                &association,
                &owner_key,
            )?;
            ctx.load(&sql)
        })
    }

    /// A deferred many-to-one reference of `owner.association`, keyed by the
    /// foreign-key value. A null foreign key is loaded as `None` right away.
    pub fn lazy_reference<E: FromSqliteRow + 'static>(
        &self,
        owner: &str,
        association: &str,
        foreign_key: Option<Key>,
    ) -> Lazy<Option<E>> {
        let Some(key) = foreign_key else {
            return Lazy::loaded(None);
        };
        let ctx = self.clone();
        let owner = CompactString::from(owner);
        let association = CompactString::from(association);
        Lazy::deferred(move || {
            let sql =
                Renderer::new(ctx.metadata.as_ref()).association_load(&owner, &association, &key)?;
            Ok(ctx.load::<E>(&sql)?.into_iter().next())
        })
    }

    fn load<E: FromSqliteRow>(&self, sql: &SQL) -> Result<Vec<E>> {
        let conn = self.conn.upgrade().ok_or(GraphFetchError::SessionClosed)?;
        self.update_stats(|stats| stats.lazy_loads += 1);
        query_rows(&conn, self, sql)
    }

    fn update_stats(&self, f: impl FnOnce(&mut SessionStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

fn query_rows<E: FromSqliteRow>(conn: &Connection, ctx: &SqliteContext, sql: &SQL) -> Result<Vec<E>> {
    let (text, params) = sql.build();
    graphfetch_trace_query!(&text, params.len());
    ctx.update_stats(|stats| stats.queries += 1);

    let mut stmt = conn.prepare_cached(&text)?;
    let rows = stmt.query_map(params_from_iter(params), |row| E::from_row(row, ctx))?;
    let rows = rows.collect::<rusqlite::Result<Vec<E>>>()?;
    Ok(rows)
}

/// A session over one SQLite connection.
pub struct SqliteSession {
    conn: Rc<Connection>,
    ctx: SqliteContext,
}

impl SqliteSession {
    pub fn new(conn: Connection, metadata: impl Into<Rc<MetadataRegistry>>) -> Self {
        let conn = Rc::new(conn);
        let ctx = SqliteContext {
            conn: Rc::downgrade(&conn),
            metadata: metadata.into(),
            stats: Rc::new(Cell::new(SessionStats::default())),
        };
        Self { conn, ctx }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn context(&self) -> &SqliteContext {
        &self.ctx
    }

    pub fn metadata(&self) -> &MetadataRegistry {
        &self.ctx.metadata
    }

    pub fn stats(&self) -> SessionStats {
        self.ctx.stats.get()
    }
}

impl Session for SqliteSession {
    fn count(&mut self, criteria: &Criteria) -> Result<u64> {
        let sql = self.render(criteria)?;
        self.count_native(&sql)
    }

    fn render(&self, criteria: &Criteria) -> Result<SQL> {
        Renderer::new(self.ctx.metadata.as_ref()).render(criteria)
    }

    fn count_native(&mut self, sql: &SQL) -> Result<u64> {
        let (text, params) = sql.build();
        graphfetch_trace_query!(&text, params.len());
        self.ctx.update_stats(|stats| stats.queries += 1);

        let count: i64 = self
            .conn
            .prepare_cached(&text)?
            .query_row(params_from_iter(params), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| GraphFetchError::Execution(format!("count query returned {count}")))
    }

    fn materialize(&mut self, association: &dyn Association) -> Result<()> {
        self.ctx
            .update_stats(|stats| stats.materialize_calls += 1);
        association.initialize()
    }

    /// Drops the prepared statements cached by `list`, `count` and lazy loads.
    fn clear(&mut self) {
        self.conn.flush_prepared_statement_cache();
    }
}

impl<T: FromSqliteRow> LoadEntities<T> for SqliteSession {
    fn list(&mut self, criteria: &Criteria) -> Result<Vec<T>> {
        let sql = self.render(criteria)?;
        let rows = query_rows(&self.conn, &self.ctx, &sql)?;
        Ok(criteria.result_transform().apply(rows))
    }

    fn get(&mut self, id: &Key) -> Result<Option<T>> {
        let mut criteria = Criteria::new(T::ENTITY_NAME);
        criteria.add(criterion::id_eq(id.clone()));
        let rows = <Self as LoadEntities<T>>::list(self, &criteria)?;
        Ok(rows.into_iter().next())
    }
}
