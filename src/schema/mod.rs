//! Mapping schemas
//!
//! A [`Schema`] is the language-neutral description the engine consumes:
//! classified type descriptors and resolved field tables for every record
//! reachable from one root record. Schemas are built once, validated
//! eagerly, and shared behind an `Arc`.

pub mod builders;
pub mod cache;
pub mod classifier;
pub mod types;

pub use builders::{EnumDecl, FieldDecl, RecordDecl, SchemaBuilder};
pub use cache::SchemaCache;
pub use classifier::{TypeClassifier, TypeShape};
pub use types::{
    CollectionFraming, EnumMap, FieldDescriptor, NodeKind, Placement, PolymorphicMapping,
    RecordDescriptor, ScalarType, TemporalType, TypeDescriptor, TypeKind,
};

use crate::error::{Result, SchemaError};
use crate::mapping::ManualMapping;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A validated, immutable mapping schema
pub struct Schema {
    root: Arc<RecordDescriptor>,
    records: IndexMap<String, Arc<RecordDescriptor>>,
    enums: IndexMap<String, Arc<EnumMap>>,
    manual: HashMap<String, Arc<dyn ManualMapping>>,
}

impl Schema {
    /// Start building a schema
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub(crate) fn from_parts(
        root: &str,
        records: IndexMap<String, Arc<RecordDescriptor>>,
        enums: IndexMap<String, Arc<EnumMap>>,
        manual: HashMap<String, Arc<dyn ManualMapping>>,
    ) -> Result<Self> {
        let root = records
            .get(root)
            .cloned()
            .ok_or_else(|| SchemaError::new(format!("Root record '{}' is not declared", root)))?;
        Ok(Self {
            root,
            records,
            enums,
            manual,
        })
    }

    /// The root record
    pub fn root(&self) -> &RecordDescriptor {
        &self.root
    }

    /// A record by declared name
    pub fn record(&self, name: &str) -> Option<&RecordDescriptor> {
        self.records.get(name).map(|r| r.as_ref())
    }

    /// All records in declaration order
    pub fn records(&self) -> impl Iterator<Item = &RecordDescriptor> {
        self.records.values().map(|r| r.as_ref())
    }

    /// An enumeration by declared name
    pub fn enumeration(&self, name: &str) -> Option<&EnumMap> {
        self.enums.get(name).map(|e| e.as_ref())
    }

    /// All enumerations in declaration order
    pub fn enumerations(&self) -> impl Iterator<Item = &EnumMap> {
        self.enums.values().map(|e| e.as_ref())
    }

    /// The manual mapper of a record, if it has one
    pub fn manual_mapper(&self, name: &str) -> Option<&dyn ManualMapping> {
        self.manual.get(name).map(|m| m.as_ref())
    }

    /// Inheritance depth of a record (0 when unknown)
    pub fn depth(&self, name: &str) -> usize {
        self.records.get(name).map_or(0, |r| r.depth)
    }

    /// Whether `name` is `ancestor` or derives from it
    pub fn is_subtype(&self, name: &str, ancestor: &str) -> bool {
        let mut current = Some(name);
        let mut steps = 0;
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.records.len() {
                return false;
            }
            current = self.records.get(n).and_then(|r| r.base.as_deref());
        }
        false
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("root", &self.root.name())
            .field("records", &self.records.keys().collect::<Vec<_>>())
            .field("enums", &self.enums.keys().collect::<Vec<_>>())
            .field("manual", &self.manual.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lookups() {
        let mut builder = Schema::builder();
        builder
            .add_enum(EnumDecl::new("Kind").member("A").member_as("B", "b"))
            .add_record(RecordDecl::new("Base").abstract_record())
            .add_record(
                RecordDecl::new("Item")
                    .extends("Base")
                    .field(FieldDecl::new("Kind", TypeShape::named("Kind"))),
            );
        let schema = builder.build("Item").unwrap();

        assert_eq!(schema.root().name(), "Item");
        assert_eq!(schema.depth("Item"), 1);
        assert!(schema.is_subtype("Item", "Base"));
        assert!(!schema.is_subtype("Base", "Item"));
        assert_eq!(schema.enumeration("Kind").map(|e| e.token_for("B")), Some("b"));
        assert!(schema.manual_mapper("Item").is_none());
        assert_eq!(schema.records().count(), 2);
    }

    #[test]
    fn test_missing_root() {
        let builder = Schema::builder();
        assert!(builder.build("Nothing").is_err());
    }
}
