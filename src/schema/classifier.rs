//! Type classification
//!
//! Turns a declared [`TypeShape`] into a [`TypeDescriptor`]. Results are
//! memoized per shape, so every field of the same type shares one
//! descriptor.

use super::types::{EnumMap, NodeKind, ScalarType, TemporalType, TypeDescriptor, TypeKind};
use crate::error::{Result, SchemaError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Declared shape of a type, before classification
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeShape {
    /// Exact scalar type
    Scalar(ScalarType),
    /// Temporal type
    Temporal(TemporalType),
    /// Optional wrapper
    Optional(Box<TypeShape>),
    /// Ordered sequence with one item type
    Sequence(Box<TypeShape>),
    /// Record or enumeration declared by name
    Named(String),
    /// Raw element node carrier
    Element,
    /// Raw attribute node carrier
    Attribute,
}

impl TypeShape {
    /// Optional wrapper around a shape
    pub fn optional(inner: TypeShape) -> Self {
        TypeShape::Optional(Box::new(inner))
    }

    /// Sequence of a shape
    pub fn sequence(item: TypeShape) -> Self {
        TypeShape::Sequence(Box::new(item))
    }

    /// Named record or enumeration
    pub fn named(name: impl Into<String>) -> Self {
        TypeShape::Named(name.into())
    }

    /// Innermost shape below optional and sequence wrappers
    pub fn leaf(&self) -> &TypeShape {
        match self {
            TypeShape::Optional(inner) | TypeShape::Sequence(inner) => inner.leaf(),
            other => other,
        }
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeShape::Scalar(s) => write!(f, "{}", s.xml_name()),
            TypeShape::Temporal(t) => write!(f, "{}", t.xml_name()),
            TypeShape::Optional(inner) => write!(f, "{}?", inner),
            TypeShape::Sequence(item) => write!(f, "[{}]", item),
            TypeShape::Named(name) => write!(f, "{}", name),
            TypeShape::Element => write!(f, "element"),
            TypeShape::Attribute => write!(f, "attribute"),
        }
    }
}

/// What the classifier knows about a declared record
#[derive(Debug, Clone, Default)]
pub struct RecordInfo {
    /// Explicit root element name
    pub root_xml_name: Option<String>,
    /// Namespace of the record's elements
    pub namespace_uri: Option<String>,
    /// Whether the record has a manual mapper
    pub manual_mapping: bool,
}

/// Memoizing classifier over the declared records and enumerations
#[derive(Debug, Default)]
pub struct TypeClassifier {
    records: HashMap<String, RecordInfo>,
    enums: HashMap<String, Arc<EnumMap>>,
    memo: HashMap<TypeShape, Arc<TypeDescriptor>>,
}

impl TypeClassifier {
    /// Create a classifier with no declared types
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a record name
    pub fn add_record(&mut self, name: impl Into<String>, info: RecordInfo) {
        self.records.insert(name.into(), info);
    }

    /// Declare an enumeration
    pub fn add_enum(&mut self, map: EnumMap) {
        self.enums.insert(map.name.clone(), Arc::new(map));
    }

    /// Check if a name is a declared record
    pub fn is_record(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Number of memoized shapes
    pub fn memoized(&self) -> usize {
        self.memo.len()
    }

    /// Classify a shape
    pub fn classify(&mut self, shape: &TypeShape) -> Result<Arc<TypeDescriptor>> {
        if let Some(descriptor) = self.memo.get(shape) {
            return Ok(descriptor.clone());
        }

        let descriptor = match shape {
            TypeShape::Scalar(s) => Arc::new(TypeDescriptor::new(TypeKind::Scalar(*s), s.xml_name())),
            TypeShape::Temporal(t) => {
                Arc::new(TypeDescriptor::new(TypeKind::Temporal(*t), t.xml_name()))
            }
            TypeShape::Optional(inner) => {
                let inner = self.classify(inner)?;
                let wraps = matches!(
                    inner.kind,
                    TypeKind::Scalar(_) | TypeKind::Temporal(_) | TypeKind::Enum(_)
                );
                if wraps {
                    let name = inner.declared_name.clone();
                    let mut nullable =
                        TypeDescriptor::new(TypeKind::NullableScalar(inner.clone()), name);
                    nullable.namespace_uri = inner.namespace_uri.clone();
                    Arc::new(nullable)
                } else {
                    // records, collections and raw nodes are nullable already
                    inner
                }
            }
            TypeShape::Sequence(item) => {
                let item_descriptor = self.classify(item).map_err(|e| match e {
                    crate::error::Error::Schema(inner) => SchemaError::new(format!(
                        "Collection item type '{}' cannot be classified: {}",
                        item, inner.message
                    ))
                    .into(),
                    other => other,
                })?;
                if matches!(item_descriptor.kind, TypeKind::Collection(_)) {
                    return Err(SchemaError::new(format!(
                        "Nested collections are not supported: '{}'",
                        shape
                    ))
                    .into());
                }
                let name = item_descriptor.declared_name.clone();
                Arc::new(TypeDescriptor::new(TypeKind::Collection(item_descriptor), name))
            }
            TypeShape::Named(name) => self.classify_named(name)?,
            TypeShape::Element => Arc::new(TypeDescriptor::new(
                TypeKind::RawNode(NodeKind::Element),
                "element",
            )),
            TypeShape::Attribute => Arc::new(TypeDescriptor::new(
                TypeKind::RawNode(NodeKind::Attribute),
                "attribute",
            )),
        };

        self.memo.insert(shape.clone(), descriptor.clone());
        Ok(descriptor)
    }

    fn classify_named(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
        if let Some(info) = self.records.get(name) {
            return Ok(Arc::new(TypeDescriptor {
                kind: TypeKind::Record,
                declared_name: name.to_string(),
                manual_mapping: info.manual_mapping,
                root_xml_name: info.root_xml_name.clone(),
                namespace_uri: info.namespace_uri.clone(),
            }));
        }
        if let Some(map) = self.enums.get(name) {
            return Ok(Arc::new(TypeDescriptor::new(TypeKind::Enum(map.clone()), name)));
        }
        Err(SchemaError::new(format!("Unknown type '{}'", name)).into())
    }
}
