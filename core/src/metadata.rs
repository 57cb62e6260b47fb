//! Entity mapping metadata.
//!
//! The registry is built once at startup and describes, per entity name, its
//! table, identifier column, scalar columns and associations.
//!
//! ```
//! use graphfetch_core::{EntityMapping, MetadataRegistry};
//!
//! let metadata = MetadataRegistry::builder()
//!     .entity(
//!         EntityMapping::new("Customer", "customers")
//!             .identifier("id")
//!             .one_to_many("orders", "Order", "customer_id"),
//!     )
//!     .entity(
//!         EntityMapping::new("Order", "orders")
//!             .many_to_one("customer", "Customer", "customer_id"),
//!     )
//!     .build();
//! assert!(metadata.get("Order").is_some());
//! ```

use compact_str::CompactString;
use hashbrown::HashMap;

/// Where the foreign key of an association lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationKind {
    /// Foreign key column on the owner's table, pointing at the target identifier.
    ManyToOne { foreign_key: CompactString },
    /// Foreign key column on the target's table, pointing at the owner identifier.
    OneToMany { foreign_key: CompactString },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationMapping {
    pub target: CompactString,
    pub kind: AssociationKind,
}

impl AssociationMapping {
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, AssociationKind::OneToMany { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMapping {
    name: CompactString,
    table: CompactString,
    identifier: CompactString,
    columns: HashMap<CompactString, CompactString>,
    associations: HashMap<CompactString, AssociationMapping>,
}

impl EntityMapping {
    /// Creates a mapping with identifier column `id`.
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: CompactString::from(name),
            table: CompactString::from(table),
            identifier: CompactString::const_new("id"),
            columns: HashMap::new(),
            associations: HashMap::new(),
        }
    }

    pub fn identifier(mut self, column: &str) -> Self {
        self.identifier = CompactString::from(column);
        self
    }

    /// Maps `property` to a column with a different name.
    pub fn column(mut self, property: &str, column: &str) -> Self {
        self.columns
            .insert(CompactString::from(property), CompactString::from(column));
        self
    }

    pub fn many_to_one(mut self, property: &str, target: &str, foreign_key: &str) -> Self {
        self.associations.insert(
            CompactString::from(property),
            AssociationMapping {
                target: CompactString::from(target),
                kind: AssociationKind::ManyToOne {
                    foreign_key: CompactString::from(foreign_key),
                },
            },
        );
        self
    }

    pub fn one_to_many(mut self, property: &str, target: &str, foreign_key: &str) -> Self {
        self.associations.insert(
            CompactString::from(property),
            AssociationMapping {
                target: CompactString::from(target),
                kind: AssociationKind::OneToMany {
                    foreign_key: CompactString::from(foreign_key),
                },
            },
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn identifier_column(&self) -> &str {
        &self.identifier
    }

    /// Column of a scalar property; unmapped properties use their own name.
    pub fn column_of<'a>(&'a self, property: &'a str) -> &'a str {
        self.columns.get(property).map_or(property, |c| c.as_str())
    }

    pub fn association(&self, property: &str) -> Option<&AssociationMapping> {
        self.associations.get(property)
    }
}

/// Source of entity mappings for the renderer.
pub trait Metadata {
    fn entity(&self, name: &str) -> Option<&EntityMapping>;
}

/// Startup-built map of entity name to [`EntityMapping`].
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    entities: HashMap<CompactString, EntityMapping>,
}

impl MetadataRegistry {
    pub fn builder() -> MetadataRegistryBuilder {
        MetadataRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&EntityMapping> {
        self.entities.get(name)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Metadata for MetadataRegistry {
    fn entity(&self, name: &str) -> Option<&EntityMapping> {
        self.get(name)
    }
}

#[derive(Debug, Default)]
pub struct MetadataRegistryBuilder {
    entities: HashMap<CompactString, EntityMapping>,
}

impl MetadataRegistryBuilder {
    /// Registers a mapping; a later mapping for the same name replaces the earlier one.
    pub fn entity(mut self, mapping: EntityMapping) -> Self {
        self.entities.insert(mapping.name.clone(), mapping);
        self
    }

    pub fn build(self) -> MetadataRegistry {
        MetadataRegistry {
            entities: self.entities,
        }
    }
}
