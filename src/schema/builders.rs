//! Schema builders
//!
//! Declarations for records, fields and enumerations, and the
//! [`SchemaBuilder`] that validates them into an immutable [`Schema`].
//! Every schema problem is reported here, before any conversion runs.

use super::classifier::{RecordInfo, TypeClassifier, TypeShape};
use super::types::{
    CollectionFraming, EnumMap, FieldDescriptor, NodeKind, Placement, PolymorphicMapping,
    RecordDescriptor, TypeKind,
};
use super::Schema;
use crate::binding::{XmlRecord, XmlValue};
use crate::error::{Error, Result, SchemaError};
use crate::mapping::ManualMapping;
use crate::names::is_valid_ncname;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
enum FramingDecl {
    Wrapped(String),
    Flattened,
    Implicit,
}

/// Declaration of one record field
#[derive(Debug, Clone)]
pub struct FieldDecl {
    name: String,
    shape: TypeShape,
    placement: Placement,
    xml_name: Option<String>,
    attribute_name: Option<String>,
    namespace_uri: Option<String>,
    order: Option<i32>,
    nillable: Option<bool>,
    framing: Option<FramingDecl>,
    item_name: Option<String>,
    mappings: Vec<(String, String)>,
    temporal_formats: Vec<String>,
    ignored: bool,
}

impl FieldDecl {
    /// Declare a field of the given shape, placed as a child element
    pub fn new(name: impl Into<String>, shape: TypeShape) -> Self {
        Self {
            name: name.into(),
            shape,
            placement: Placement::Element,
            xml_name: None,
            attribute_name: None,
            namespace_uri: None,
            order: None,
            nillable: None,
            framing: None,
            item_name: None,
            mappings: Vec::new(),
            temporal_formats: Vec::new(),
            ignored: false,
        }
    }

    /// Declared field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Place the field in an attribute
    pub fn attribute(mut self) -> Self {
        self.placement = Placement::Attribute;
        self
    }

    /// Place the field in an attribute with an explicit name
    pub fn attribute_named(mut self, name: impl Into<String>) -> Self {
        self.placement = Placement::Attribute;
        self.attribute_name = Some(name.into());
        self
    }

    /// Place the field in the owner's text content
    pub fn inner_text(mut self) -> Self {
        self.placement = Placement::InnerText;
        self
    }

    /// Make the field the sink for unclaimed child elements
    pub fn any_elements(mut self) -> Self {
        self.placement = Placement::AnyElementSink;
        self
    }

    /// Make the field the sink for unclaimed attributes
    pub fn any_attributes(mut self) -> Self {
        self.placement = Placement::AnyAttributeSink;
        self
    }

    /// Set an explicit XML name
    pub fn named(mut self, xml_name: impl Into<String>) -> Self {
        self.xml_name = Some(xml_name.into());
        self
    }

    /// Set the namespace
    pub fn namespace(mut self, uri: impl Into<String>) -> Self {
        self.namespace_uri = Some(uri.into());
        self
    }

    /// Set an explicit rank; ranked fields come before unranked ones
    pub fn order(mut self, rank: i32) -> Self {
        self.order = Some(rank);
        self
    }

    /// Choose whether absence is written as a nil-marked element
    pub fn nillable(mut self, nillable: bool) -> Self {
        self.nillable = Some(nillable);
        self
    }

    /// Frame the collection inside a named container
    pub fn wrapped(mut self, container: impl Into<String>) -> Self {
        self.framing = Some(FramingDecl::Wrapped(container.into()));
        self
    }

    /// Write collection items directly under the owner
    pub fn flattened(mut self) -> Self {
        self.framing = Some(FramingDecl::Flattened);
        self
    }

    /// Frame the collection inside a container named after the field
    pub fn implicit(mut self) -> Self {
        self.framing = Some(FramingDecl::Implicit);
        self
    }

    /// Set the item element name of a wrapped or flattened collection
    pub fn item_name(mut self, name: impl Into<String>) -> Self {
        self.item_name = Some(name.into());
        self
    }

    /// Map a concrete record type to an XML tag
    pub fn polymorphic(mut self, xml_tag: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.mappings.push((xml_tag.into(), type_name.into()));
        self
    }

    /// Add a temporal pattern (`chrono` strftime syntax)
    pub fn temporal_format(mut self, pattern: impl Into<String>) -> Self {
        self.temporal_formats.push(pattern.into());
        self
    }

    /// Exclude the field from mapping
    pub fn ignore(mut self) -> Self {
        self.ignored = true;
        self
    }
}

/// Declaration of one record type
#[derive(Clone)]
pub struct RecordDecl {
    name: String,
    root_xml_name: Option<String>,
    namespace_uri: Option<String>,
    base: Option<String>,
    is_abstract: bool,
    fields: Vec<FieldDecl>,
    manual: Option<Arc<dyn ManualMapping>>,
}

impl RecordDecl {
    /// Declare a record
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root_xml_name: None,
            namespace_uri: None,
            base: None,
            is_abstract: false,
            fields: Vec::new(),
            manual: None,
        }
    }

    /// Declared record name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the root element name
    pub fn root_name(mut self, name: impl Into<String>) -> Self {
        self.root_xml_name = Some(name.into());
        self
    }

    /// Set the namespace of the record's element
    pub fn namespace(mut self, uri: impl Into<String>) -> Self {
        self.namespace_uri = Some(uri.into());
        self
    }

    /// Inherit the fields of a base record
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Mark the record abstract
    pub fn abstract_record(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Add a field
    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    /// Map the record by hand
    pub fn manual(mut self, mapper: Arc<dyn ManualMapping>) -> Self {
        self.manual = Some(mapper);
        self
    }
}

impl fmt::Debug for RecordDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordDecl")
            .field("name", &self.name)
            .field("root_xml_name", &self.root_xml_name)
            .field("base", &self.base)
            .field("is_abstract", &self.is_abstract)
            .field("fields", &self.fields)
            .field("manual", &self.manual.is_some())
            .finish()
    }
}

/// Declaration of an enumeration
#[derive(Debug, Clone)]
pub struct EnumDecl {
    name: String,
    members: Vec<(String, Option<String>)>,
}

impl EnumDecl {
    /// Declare an enumeration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Add a member written under its own label
    pub fn member(mut self, label: impl Into<String>) -> Self {
        self.members.push((label.into(), None));
        self
    }

    /// Add a member written under a custom token
    pub fn member_as(mut self, label: impl Into<String>, token: impl Into<String>) -> Self {
        self.members.push((label.into(), Some(token.into())));
        self
    }
}

/// Collects declarations and builds a validated [`Schema`]
#[derive(Default)]
pub struct SchemaBuilder {
    records: IndexMap<String, RecordDecl>,
    enums: IndexMap<String, EnumDecl>,
    pending: HashSet<String>,
    errors: Vec<SchemaError>,
}

impl SchemaBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record declaration
    pub fn add_record(&mut self, decl: RecordDecl) -> &mut Self {
        if self.has_type(&decl.name) {
            self.add_error(SchemaError::new("Type declared twice").with_type(decl.name.clone()));
        } else {
            self.records.insert(decl.name.clone(), decl);
        }
        self
    }

    /// Add an enumeration declaration
    pub fn add_enum(&mut self, decl: EnumDecl) -> &mut Self {
        if self.has_type(&decl.name) {
            self.add_error(SchemaError::new("Type declared twice").with_type(decl.name.clone()));
        } else {
            self.enums.insert(decl.name.clone(), decl);
        }
        self
    }

    /// Check if a record or enumeration with this name is declared
    pub fn has_type(&self, name: &str) -> bool {
        self.records.contains_key(name) || self.enums.contains_key(name)
    }

    /// Declare a typed record and everything it refers to
    pub fn record<T: XmlRecord>(&mut self) -> &mut Self {
        let name = T::TYPE_NAME;
        if self.has_type(name) || self.pending.contains(name) {
            return self;
        }
        self.pending.insert(name.to_string());
        let decl = T::declare(self);
        self.pending.remove(name);
        self.add_record(decl)
    }

    /// Declare a typed field, registering the types it refers to
    pub fn field<T: XmlValue>(&mut self, name: impl Into<String>) -> FieldDecl {
        T::register(self);
        FieldDecl::new(name, T::shape())
    }

    /// Record a problem found while declaring
    pub fn add_error(&mut self, error: SchemaError) {
        self.errors.push(error);
    }

    /// Problems found so far
    pub fn errors(&self) -> &[SchemaError] {
        &self.errors
    }

    /// Validate the declarations and build a schema rooted at `root`
    pub fn build(self, root: &str) -> Result<Schema> {
        if let Some(error) = self.errors.first() {
            return Err(error.clone().into());
        }

        let root_decl = self
            .records
            .get(root)
            .ok_or_else(|| SchemaError::new(format!("Root record '{}' is not declared", root)))?;
        if root_decl.is_abstract {
            return Err(SchemaError::new("Root record cannot be abstract")
                .with_type(root)
                .into());
        }

        let mut depths = HashMap::new();
        for name in self.records.keys() {
            depths.insert(name.clone(), self.depth_of(name)?);
        }

        let mut classifier = TypeClassifier::new();
        for decl in self.records.values() {
            if let Some(ref root_name) = decl.root_xml_name {
                check_name(root_name, &decl.name, None)?;
            }
            classifier.add_record(
                decl.name.clone(),
                RecordInfo {
                    root_xml_name: decl.root_xml_name.clone(),
                    namespace_uri: decl.namespace_uri.clone(),
                    manual_mapping: decl.manual.is_some(),
                },
            );
        }
        for decl in self.enums.values() {
            let mut seen = HashSet::new();
            for (label, _) in &decl.members {
                if !seen.insert(label.as_str()) {
                    return Err(SchemaError::new(format!("Duplicate enumeration member '{}'", label))
                        .with_type(decl.name.clone())
                        .into());
                }
            }
            classifier.add_enum(EnumMap::new(decl.name.clone(), &decl.members));
        }

        let mut records = IndexMap::new();
        let mut manual = HashMap::new();
        for decl in self.records.values() {
            let descriptor = classifier.classify(&TypeShape::named(decl.name.clone()))?;
            let fields = if decl.manual.is_some() {
                Vec::new()
            } else {
                self.build_fields(&mut classifier, decl, &depths)?
            };

            if let Some(ref mapper) = decl.manual {
                manual.insert(decl.name.clone(), mapper.clone());
            }

            records.insert(
                decl.name.clone(),
                Arc::new(RecordDescriptor {
                    descriptor,
                    fields,
                    base: decl.base.clone(),
                    is_abstract: decl.is_abstract,
                    depth: depths.get(&decl.name).copied().unwrap_or(0),
                }),
            );
        }

        let enums = self
            .enums
            .values()
            .map(|decl| {
                (
                    decl.name.clone(),
                    Arc::new(EnumMap::new(decl.name.clone(), &decl.members)),
                )
            })
            .collect();

        debug!(root, records = records.len(), "built schema");
        Schema::from_parts(root, records, enums, manual)
    }

    fn depth_of(&self, name: &str) -> Result<usize> {
        let mut depth = 0;
        let mut current = name;
        while let Some(base) = self.records.get(current).and_then(|d| d.base.as_deref()) {
            if !self.records.contains_key(base) {
                return Err(SchemaError::new(format!("Unknown base record '{}'", base))
                    .with_type(current)
                    .into());
            }
            depth += 1;
            if depth > self.records.len() {
                return Err(SchemaError::new("Inheritance cycle").with_type(name).into());
            }
            current = base;
        }
        Ok(depth)
    }

    /// Base-first chain of declarations ending at `decl`
    fn chain<'a>(&'a self, decl: &'a RecordDecl) -> Vec<&'a RecordDecl> {
        let mut chain = vec![decl];
        let mut current = decl;
        while let Some(base) = current.base.as_deref().and_then(|b| self.records.get(b)) {
            if chain.len() > self.records.len() {
                break;
            }
            chain.push(base);
            current = base;
        }
        chain.reverse();
        chain
    }

    fn build_fields(
        &self,
        classifier: &mut TypeClassifier,
        decl: &RecordDecl,
        depths: &HashMap<String, usize>,
    ) -> Result<Vec<FieldDescriptor>> {
        // inherited fields first; a redeclared field replaces the base one in place
        let mut declared: Vec<(&str, &FieldDecl)> = Vec::new();
        for record in self.chain(decl) {
            for field in &record.fields {
                match declared.iter().position(|(_, f)| f.name == field.name) {
                    Some(pos) => declared[pos] = (record.name.as_str(), field),
                    None => declared.push((record.name.as_str(), field)),
                }
            }
        }

        let mut fields = Vec::with_capacity(declared.len());
        for (declared_in, field) in declared.into_iter().filter(|(_, f)| !f.ignored) {
            fields.push(self.build_field(classifier, &decl.name, declared_in, field, depths)?);
        }

        for placement in [Placement::AnyElementSink, Placement::AnyAttributeSink, Placement::InnerText] {
            let count = fields.iter().filter(|f| f.placement == placement).count();
            if count > 1 {
                return Err(SchemaError::new(format!(
                    "At most one {:?} field may be declared, found {}",
                    placement, count
                ))
                .with_type(decl.name.clone())
                .into());
            }
        }

        if fields.is_empty() && !decl.is_abstract {
            return Err(SchemaError::new("Record has no mappable fields")
                .with_type(decl.name.clone())
                .into());
        }

        fields.sort_by_key(|f| (f.order.is_none(), f.order.unwrap_or(0)));
        Ok(fields)
    }

    fn build_field(
        &self,
        classifier: &mut TypeClassifier,
        record: &str,
        declared_in: &str,
        decl: &FieldDecl,
        depths: &HashMap<String, usize>,
    ) -> Result<FieldDescriptor> {
        let fail = |message: String| -> Error {
            SchemaError::new(message)
                .with_type(record)
                .with_field(decl.name.clone())
                .into()
        };

        for name in [&decl.xml_name, &decl.attribute_name, &decl.item_name]
            .into_iter()
            .flatten()
        {
            check_name(name, record, Some(&decl.name))?;
        }
        if let Some(FramingDecl::Wrapped(ref container)) = decl.framing {
            check_name(container, record, Some(&decl.name))?;
        }

        let value_type = classifier.classify(&decl.shape).map_err(|e| match e {
            Error::Schema(inner) => fail(inner.message),
            other => other,
        })?;
        let item_type = value_type.item().cloned();

        if decl.placement.is_sink() {
            if decl.xml_name.is_some() || decl.attribute_name.is_some() {
                return Err(fail("A catch-all sink cannot carry an explicit name".to_string()));
            }
            let expected = match decl.placement {
                Placement::AnyElementSink => NodeKind::Element,
                _ => NodeKind::Attribute,
            };
            let node_type = item_type.as_deref().unwrap_or(&value_type);
            if node_type.kind != TypeKind::RawNode(expected) {
                return Err(fail(format!(
                    "A {:?} field must hold raw {:?} nodes, found '{}'",
                    decl.placement, expected, value_type
                )));
            }
        } else {
            let node_type = item_type.as_deref().unwrap_or(&value_type);
            if node_type.kind == TypeKind::RawNode(NodeKind::Attribute) {
                return Err(fail(
                    "Raw attribute nodes are only allowed in an any-attribute sink".to_string(),
                ));
            }
        }

        if matches!(decl.placement, Placement::Attribute | Placement::InnerText)
            && !value_type.is_leaf()
        {
            return Err(fail(format!(
                "{:?} placement requires a scalar, temporal or enum type, found '{}'",
                decl.placement, value_type
            )));
        }

        let is_collection = item_type.is_some();
        if !is_collection && (decl.framing.is_some() || decl.item_name.is_some()) {
            return Err(fail("Collection framing declared on a non-collection field".to_string()));
        }

        let mut polymorphic_mappings = Vec::with_capacity(decl.mappings.len());
        if !decl.mappings.is_empty() {
            let target = item_type.as_deref().unwrap_or(&value_type);
            if !target.is_record() {
                return Err(fail(format!(
                    "Polymorphic mappings require a record type, found '{}'",
                    value_type
                )));
            }
            for (tag, type_name) in &decl.mappings {
                check_name(tag, record, Some(&decl.name))?;
                let concrete = self.records.get(type_name).ok_or_else(|| {
                    fail(format!("Polymorphic target '{}' is not a declared record", type_name))
                })?;
                polymorphic_mappings.push(PolymorphicMapping {
                    xml_tag: tag.clone(),
                    concrete_type: type_name.clone(),
                    manual_mapping: concrete.manual.is_some(),
                    depth: depths.get(type_name).copied().unwrap_or(0),
                });
            }
            polymorphic_mappings.sort_by(|a, b| b.depth.cmp(&a.depth));
        }

        if !decl.temporal_formats.is_empty() {
            let leaf = item_type.as_deref().unwrap_or(&value_type).unwrap_nullable();
            if !matches!(leaf.kind, TypeKind::Temporal(_)) {
                return Err(fail(format!(
                    "Temporal formats declared on a non-temporal field of type '{}'",
                    value_type
                )));
            }
        }

        let collection_framing = if is_collection {
            Some(match (&decl.framing, decl.item_name.clone()) {
                (Some(FramingDecl::Wrapped(container)), item) => CollectionFraming::Wrapped {
                    container: container.clone(),
                    item,
                },
                (Some(FramingDecl::Flattened), item) => CollectionFraming::Flattened { item },
                (None, item) if !polymorphic_mappings.is_empty() => {
                    CollectionFraming::Flattened { item }
                }
                (Some(FramingDecl::Implicit), None) | (None, None) => CollectionFraming::Implicit,
                (_, Some(_)) => {
                    return Err(fail(
                        "An item name requires wrapped or flattened framing".to_string(),
                    ))
                }
            })
        } else {
            None
        };

        let default_nillable =
            matches!(decl.shape, TypeShape::Optional(_)) || value_type.is_record();

        Ok(FieldDescriptor {
            name: decl.name.clone(),
            declared_in: declared_in.to_string(),
            value_type,
            placement: decl.placement,
            explicit_xml_name: decl.xml_name.clone(),
            attribute_name: decl.attribute_name.clone(),
            namespace_uri: decl.namespace_uri.clone(),
            order: decl.order,
            is_nillable: decl.nillable.unwrap_or(default_nillable),
            collection_framing,
            polymorphic_mappings,
            temporal_formats: decl.temporal_formats.clone(),
        })
    }
}

fn check_name(name: &str, record: &str, field: Option<&str>) -> Result<()> {
    if is_valid_ncname(name) {
        return Ok(());
    }
    let mut error = SchemaError::new(format!("Invalid XML name '{}'", name)).with_type(record);
    if let Some(field) = field {
        error = error.with_field(field);
    }
    Err(error.into())
}
