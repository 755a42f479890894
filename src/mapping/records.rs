//! Record mapping
//!
//! [`RecordMapper`] converts between [`Record`] values and element trees for
//! one schema and one set of options. Declared fields are processed in
//! mapping order; catch-all sinks are handled last.

use super::catchall::{self, Claims};
use super::collections;
use super::conversion;
use super::naming::{field_qname, resolve_field_name, root_qname};
use super::polymorphic::{effective_mappings, mapping_for_record, mapping_for_tag};
use crate::documents::Element;
use crate::error::{Error, FieldConversionError, Result};
use crate::namespaces::QName;
use crate::options::SerializationOptions;
use crate::schema::{
    FieldDescriptor, NodeKind, Placement, PolymorphicMapping, RecordDescriptor, Schema,
    TypeDescriptor, TypeKind,
};
use crate::values::{Record, Value};
use tracing::warn;

/// Maps records of one schema under one set of options
#[derive(Debug, Clone, Copy)]
pub struct RecordMapper<'a> {
    schema: &'a Schema,
    options: &'a SerializationOptions,
}

impl<'a> RecordMapper<'a> {
    /// Create a mapper
    pub fn new(schema: &'a Schema, options: &'a SerializationOptions) -> Self {
        Self { schema, options }
    }

    /// The schema
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// The options
    pub fn options(&self) -> &'a SerializationOptions {
        self.options
    }

    /// Element name of the root record
    pub fn root_name(&self) -> QName {
        root_qname(&self.schema.root().descriptor, self.options)
    }

    /// Write a root record as an element named after its type
    pub fn write_root(&self, record: &Record) -> Result<Element> {
        self.write_record(record, self.schema.root(), self.root_name())
    }

    /// Read a root record from an element
    pub fn read_root(&self, element: &Element) -> Result<Record> {
        self.read_record(element, self.schema.root())
    }

    /// Write a record as an element with the given name
    ///
    /// A record whose runtime type is a registered subtype of `declared` is
    /// written with the subtype's fields.
    pub fn write_record(&self, record: &Record, declared: &RecordDescriptor, name: QName) -> Result<Element> {
        let descriptor = self.runtime_record(record, declared)?;

        if let Some(mapper) = self.schema.manual_mapper(descriptor.name()) {
            let element = mapper.write(record, self.options)?;
            return Ok(if element.qname != name {
                element.renamed(name)
            } else {
                element
            });
        }

        let owner = descriptor.name();
        let mut element = Element::new(name);
        let mut element_sink = None;
        let mut attribute_sink = None;

        for field in &descriptor.fields {
            let value = record.get_or_null(&field.name);
            match field.placement {
                Placement::Attribute => {
                    if !value.is_null() {
                        let text = self.format_field(owner, field, &field.value_type, value)?;
                        let name = QName::new(
                            field.namespace_uri.clone(),
                            resolve_field_name(owner, field, self.options),
                        );
                        element.set_attribute(name, text);
                    }
                }
                Placement::InnerText => {
                    if !value.is_null() {
                        let text = self.format_field(owner, field, &field.value_type, value)?;
                        element.set_text(text);
                    }
                }
                Placement::Element => self.write_field(owner, field, value, &mut element)?,
                Placement::AnyElementSink => element_sink = Some(value),
                Placement::AnyAttributeSink => attribute_sink = Some(value),
            }
        }

        if let Some(value) = attribute_sink {
            catchall::emit_attributes(value, &mut element)?;
        }
        if let Some(value) = element_sink {
            catchall::emit_elements(value, &mut element)?;
        }

        Ok(element)
    }

    /// Write a record through a polymorphic table
    ///
    /// The first mapping whose concrete type is exactly the record's runtime
    /// type decides the tag; without a match the record is written under
    /// `fallback` with the declared type's mapping.
    pub(crate) fn write_dispatched(
        &self,
        record: &Record,
        declared: &RecordDescriptor,
        mappings: &[PolymorphicMapping],
        fallback: QName,
    ) -> Result<Element> {
        if let Some(mapping) = mapping_for_record(mappings, record) {
            let concrete = self.record_named(&mapping.concrete_type)?;
            let tag = QName::new(fallback.namespace.clone(), mapping.xml_tag.clone());
            return self.write_record(record, concrete, tag);
        }
        self.write_record(record, declared, fallback)
    }

    fn write_field(&self, owner: &str, field: &FieldDescriptor, value: &Value, parent: &mut Element) -> Result<()> {
        if let TypeKind::Collection(_) = field.value_type.kind {
            return match value {
                Value::Null => Ok(()),
                Value::List(items) => collections::write_collection(self, owner, field, items, parent),
                other => Err(self.mismatch(owner, field, other)),
            };
        }

        let name = field_qname(owner, field, self.options);

        if value.is_null() {
            if field.is_nillable && !self.options.ignore_null_values() {
                let mut nil = Element::new(name);
                nil.set_nil();
                parent.add_child(nil);
            }
            return Ok(());
        }

        let child = match &field.value_type.kind {
            TypeKind::Record => {
                let record = value.as_record().ok_or_else(|| self.mismatch(owner, field, value))?;
                let declared = self.record_named(&field.value_type.declared_name)?;
                let mappings = effective_mappings(self.schema, self.options, owner, field)?;
                self.write_dispatched(record, declared, &mappings, name)?
            }
            TypeKind::RawNode(NodeKind::Element) => match value {
                Value::Node(node) => Element::new(name).with_child(node.clone()),
                other => return Err(self.mismatch(owner, field, other)),
            },
            TypeKind::RawNode(NodeKind::Attribute) => return Err(self.mismatch(owner, field, value)),
            _ => {
                let text = self.format_field(owner, field, &field.value_type, value)?;
                Element::new(name).with_text(text)
            }
        };
        parent.add_child(child);
        Ok(())
    }

    /// Read a record of the declared type from an element
    pub fn read_record(&self, element: &Element, declared: &RecordDescriptor) -> Result<Record> {
        if let Some(mapper) = self.schema.manual_mapper(declared.name()) {
            return mapper.read(element, self.options);
        }

        let owner = declared.name();
        let mut record = Record::new(owner);
        let mut claims = Claims::new();

        for field in &declared.fields {
            let value = match field.placement {
                Placement::Attribute => {
                    let name = resolve_field_name(owner, field, self.options);
                    let value = match element.get_attribute(&name) {
                        Some(text) => self
                            .parse_field(owner, field, &field.value_type, text)?
                            .unwrap_or(Value::Null),
                        None => Value::Null,
                    };
                    claims.claim_attribute(name);
                    value
                }
                Placement::InnerText => match element.text.as_deref() {
                    Some(text) => self
                        .parse_field(owner, field, &field.value_type, text)?
                        .unwrap_or(Value::Null),
                    None => Value::Null,
                },
                Placement::Element => self.read_field(owner, field, element, &mut claims)?,
                Placement::AnyElementSink | Placement::AnyAttributeSink => Value::Null,
            };
            record.set(field.name.clone(), value);
        }

        if let Some(sink) = declared.field_with_placement(Placement::AnyElementSink) {
            record.set(sink.name.clone(), catchall::capture_elements(element, &claims, sink));
        }
        if let Some(sink) = declared.field_with_placement(Placement::AnyAttributeSink) {
            record.set(sink.name.clone(), catchall::capture_attributes(element, &claims, sink));
        }

        Ok(record)
    }

    fn read_field(&self, owner: &str, field: &FieldDescriptor, element: &Element, claims: &mut Claims) -> Result<Value> {
        if let TypeKind::Collection(_) = field.value_type.kind {
            return collections::read_collection(self, owner, field, element, claims);
        }

        let name = resolve_field_name(owner, field, self.options);

        let value = match &field.value_type.kind {
            TypeKind::Record => {
                let mappings = effective_mappings(self.schema, self.options, owner, field)?;
                for mapping in mappings.iter() {
                    claims.claim_element(mapping.xml_tag.clone());
                }
                let mapped = element
                    .children
                    .iter()
                    .find_map(|c| mapping_for_tag(&mappings, c.local_name()).map(|m| (c, m)));

                match mapped {
                    Some((child, _)) if child.is_nil() => Value::Null,
                    Some((child, mapping)) => {
                        let concrete = self.record_named(&mapping.concrete_type)?;
                        Value::Record(self.read_record(child, concrete)?)
                    }
                    None => match find_child(element, &name) {
                        None => Value::Null,
                        Some(child) if child.is_nil() => Value::Null,
                        Some(child) => {
                            let declared = self.record_named(&field.value_type.declared_name)?;
                            Value::Record(self.read_record(child, declared)?)
                        }
                    },
                }
            }
            TypeKind::RawNode(NodeKind::Element) => find_child(element, &name)
                .and_then(|wrapper| wrapper.children.first())
                .cloned()
                .map(Value::Node)
                .unwrap_or(Value::Null),
            TypeKind::RawNode(NodeKind::Attribute) => Value::Null,
            _ => match find_child(element, &name) {
                None => Value::Null,
                Some(child) if child.is_nil() => Value::Null,
                Some(child) => self
                    .parse_field(owner, field, &field.value_type, child.text_content())?
                    .unwrap_or(Value::Null),
            },
        };

        claims.claim_element(name);
        Ok(value)
    }

    /// Format a leaf value, attributing failures to the field
    pub(crate) fn format_field(
        &self,
        owner: &str,
        field: &FieldDescriptor,
        descriptor: &TypeDescriptor,
        value: &Value,
    ) -> Result<String> {
        conversion::format_leaf(descriptor, value, &field.temporal_formats)
            .map_err(|e| e.with_field(owner, field.name.clone()).into())
    }

    /// Parse leaf text; `None` when a failure was tolerated
    pub(crate) fn parse_field(
        &self,
        owner: &str,
        field: &FieldDescriptor,
        descriptor: &TypeDescriptor,
        text: &str,
    ) -> Result<Option<Value>> {
        match conversion::parse_leaf(descriptor, text, &field.temporal_formats) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                let e = e.with_field(owner, field.name.clone());
                if self.options.ignore_parsing_errors() {
                    warn!(error = %e, "ignoring field conversion failure");
                    Ok(None)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// A record descriptor by name
    pub(crate) fn record_named(&self, name: &str) -> Result<&'a RecordDescriptor> {
        self.schema
            .record(name)
            .ok_or_else(|| Error::Value(format!("Record type '{}' is not in the schema", name)))
    }

    fn runtime_record<'r>(&self, record: &Record, declared: &'r RecordDescriptor) -> Result<&'r RecordDescriptor>
    where
        'a: 'r,
    {
        if record.type_name() == declared.name() {
            return Ok(declared);
        }
        match self.schema.record(record.type_name()) {
            Some(runtime) if self.schema.is_subtype(runtime.name(), declared.name()) => Ok(runtime),
            _ => Err(FieldConversionError::new(format!(
                "record of type '{}' is neither '{}' nor derived from it",
                record.type_name(),
                declared.name()
            ))
            .with_value(record.type_name())
            .with_target(declared.name())
            .into()),
        }
    }

    fn mismatch(&self, owner: &str, field: &FieldDescriptor, value: &Value) -> Error {
        Error::Value(format!(
            "{}.{} expects {}, found a {} value",
            owner,
            field.name,
            field.value_type,
            value.kind_name()
        ))
    }
}

/// First child with the given local name
pub(crate) fn find_child<'e>(element: &'e Element, local_name: &str) -> Option<&'e Element> {
    element.children.iter().find(|c| c.local_name() == local_name)
}
