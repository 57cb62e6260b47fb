//! Entities, associations and deferred references.
//!
//! Property access is by name through [`Entity::property`], which lets the
//! initializer follow association paths given as strings without any runtime
//! reflection. Associations are either held eagerly (`Option<E>`, `Vec<E>`)
//! or behind a [`Lazy`] that loads on demand while its session is alive.

use compact_str::CompactString;
use std::cell::OnceCell;
use std::fmt;
use thiserror::Error;

use crate::error::{GraphFetchError, Result};
use crate::value::Key;

/// Failure to evaluate a named property on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("`{entity}` has no property `{property}`")]
    Missing {
        entity: CompactString,
        property: CompactString,
    },

    #[error("property `{property}` of `{entity}` is not an association")]
    NotAnAssociation {
        entity: CompactString,
        property: CompactString,
    },
}

impl PropertyError {
    pub fn missing(entity: &str, property: &str) -> Self {
        Self::Missing {
            entity: CompactString::from(entity),
            property: CompactString::from(property),
        }
    }

    pub fn not_an_association(entity: &str, property: &str) -> Self {
        Self::NotAnAssociation {
            entity: CompactString::from(entity),
            property: CompactString::from(property),
        }
    }
}

/// A persistent object whose associations can be reached by name.
pub trait Entity {
    fn entity_name(&self) -> &str;

    fn identity(&self) -> Key;

    /// Evaluates the association property `name`.
    fn property(&self, name: &str) -> std::result::Result<&dyn Association, PropertyError>;
}

/// An entity type with a mapped root query.
pub trait Persistent: Entity + Sized {
    const ENTITY_NAME: &'static str;
}

/// The entities an association currently points at.
pub enum Targets<'a> {
    One(Option<&'a dyn Entity>),
    Many(Vec<&'a dyn Entity>),
    /// The association has not been loaded.
    Unavailable,
}

impl Targets<'_> {
    pub fn len(&self) -> usize {
        match self {
            Targets::One(target) => usize::from(target.is_some()),
            Targets::Many(targets) => targets.len(),
            Targets::Unavailable => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A value reachable through an association property.
pub trait Related {
    fn targets(&self) -> Targets<'_>;
}

impl<E: Entity> Related for Option<E> {
    fn targets(&self) -> Targets<'_> {
        Targets::One(self.as_ref().map(|e| e as &dyn Entity))
    }
}

impl<E: Entity> Related for Vec<E> {
    fn targets(&self) -> Targets<'_> {
        Targets::Many(self.iter().map(|e| e as &dyn Entity).collect())
    }
}

/// Association property of an entity.
pub trait Association {
    fn is_initialized(&self) -> bool;

    /// Loads the association if it is deferred. Loading an initialized
    /// association is a no-op.
    fn initialize(&self) -> Result<()>;

    fn targets(&self) -> Targets<'_>;
}

impl<E: Entity> Association for Option<E> {
    fn is_initialized(&self) -> bool {
        true
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn targets(&self) -> Targets<'_> {
        Related::targets(self)
    }
}

impl<E: Entity> Association for Vec<E> {
    fn is_initialized(&self) -> bool {
        true
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn targets(&self) -> Targets<'_> {
        Related::targets(self)
    }
}

type Loader<T> = Box<dyn Fn() -> Result<T>>;

/// A deferred value.
///
/// Reading it with [`get`](Lazy::get) fails until it has been loaded, either
/// explicitly via [`load`](Lazy::load) or by a session materializing it.
pub struct Lazy<T> {
    cell: OnceCell<T>,
    loader: Option<Loader<T>>,
}

impl<T> Lazy<T> {
    /// An already loaded value.
    pub fn loaded(value: T) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(value);
        Self { cell, loader: None }
    }

    /// A value produced by `loader` on first load.
    pub fn deferred(loader: impl Fn() -> Result<T> + 'static) -> Self {
        Self {
            cell: OnceCell::new(),
            loader: Some(Box::new(loader)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get(&self) -> Result<&T> {
        self.cell.get().ok_or_else(|| {
            GraphFetchError::LazyInitialization(format!(
                "could not read deferred {}: not loaded",
                std::any::type_name::<T>()
            ))
        })
    }

    pub fn load(&self) -> Result<&T> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let loader = self.loader.as_ref().ok_or_else(|| {
            GraphFetchError::LazyInitialization(String::from("deferred value has no loader"))
        })?;
        let value = loader()?;
        Ok(self.cell.get_or_init(|| value))
    }
}

impl<T: fmt::Debug> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(value) => f.debug_tuple("Lazy").field(value).finish(),
            None => f.write_str("Lazy(<deferred>)"),
        }
    }
}

impl<T: Related> Association for Lazy<T> {
    fn is_initialized(&self) -> bool {
        self.is_loaded()
    }

    fn initialize(&self) -> Result<()> {
        self.load().map(|_| ())
    }

    fn targets(&self) -> Targets<'_> {
        self.cell.get().map_or(Targets::Unavailable, Related::targets)
    }
}
