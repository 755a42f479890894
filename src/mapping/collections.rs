//! Collection framing
//!
//! Sequences are written and read in one of three framings:
//!
//! - `Wrapped`: a container element holding one element per item
//! - `Flattened`: item elements directly under the owner
//! - `Implicit`: a container named after the field holding the items
//!
//! Polymorphic collections pick each item's tag from the field's mapping
//! table and ignore the configured item name.

use super::catchall::Claims;
use super::naming::{field_qname, resolve_field_name, resolve_root_name};
use super::polymorphic::{effective_mappings, mapping_for_tag};
use super::records::{find_child, RecordMapper};
use crate::documents::Element;
use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::schema::{CollectionFraming, FieldDescriptor, NodeKind, PolymorphicMapping, TypeDescriptor, TypeKind};
use crate::values::Value;
use std::borrow::Cow;
use tracing::debug;

/// Write a collection field's items under `parent`
pub fn write_collection(
    mapper: &RecordMapper<'_>,
    owner: &str,
    field: &FieldDescriptor,
    items: &[Value],
    parent: &mut Element,
) -> Result<()> {
    let item_type = item_type(owner, field)?;
    let framing = framing(field);
    let mappings = item_mappings(mapper, owner, field, item_type)?;

    let item_namespace = field
        .namespace_uri
        .clone()
        .or_else(|| item_type.namespace_uri.clone());
    let item_name = QName::new(item_namespace, item_tag(mapper, &framing, item_type));

    let mut written = Vec::with_capacity(items.len());
    for item in items {
        if let Some(element) = write_item(mapper, owner, field, item_type, &mappings, item, item_name.clone())? {
            written.push(element);
        }
    }

    match framing {
        CollectionFraming::Wrapped { container, .. } => {
            let mut wrapper = Element::new(QName::new(field.namespace_uri.clone(), container));
            wrapper.children = written;
            parent.add_child(wrapper);
        }
        CollectionFraming::Implicit => {
            let mut wrapper = Element::new(field_qname(owner, field, mapper.options()));
            wrapper.children = written;
            parent.add_child(wrapper);
        }
        CollectionFraming::Flattened { .. } => parent.children.extend(written),
    }
    Ok(())
}

fn write_item(
    mapper: &RecordMapper<'_>,
    owner: &str,
    field: &FieldDescriptor,
    item_type: &TypeDescriptor,
    mappings: &[PolymorphicMapping],
    item: &Value,
    name: QName,
) -> Result<Option<Element>> {
    match (&item_type.kind, item) {
        (TypeKind::RawNode(NodeKind::Element), Value::Node(node)) => Ok(Some(node.clone())),
        (_, Value::Null) => {
            let nillable = matches!(item_type.kind, TypeKind::Record | TypeKind::NullableScalar(_));
            if nillable && !mapper.options().ignore_null_values() {
                let mut nil = Element::new(name);
                nil.set_nil();
                Ok(Some(nil))
            } else {
                Ok(None)
            }
        }
        (TypeKind::Record, Value::Record(record)) => {
            let declared = mapper.record_named(&item_type.declared_name)?;
            mapper
                .write_dispatched(record, declared, mappings, name)
                .map(Some)
        }
        (TypeKind::Record, other) | (TypeKind::RawNode(_), other) => Err(Error::Value(format!(
            "{}.{} holds a {} item, expected {}",
            owner,
            field.name,
            other.kind_name(),
            item_type
        ))),
        (_, value) => {
            let text = mapper.format_field(owner, field, item_type, value)?;
            Ok(Some(Element::new(name).with_text(text)))
        }
    }
}

/// Read a collection field from the owner element
///
/// A missing container, or no matching item for a flattened field, reads as
/// `Null`; a present container reads as a (possibly empty) list.
pub fn read_collection(
    mapper: &RecordMapper<'_>,
    owner: &str,
    field: &FieldDescriptor,
    element: &Element,
    claims: &mut Claims,
) -> Result<Value> {
    let item_type = item_type(owner, field)?;
    let framing = framing(field);
    let mappings = item_mappings(mapper, owner, field, item_type)?;

    let default_tag = item_tag(mapper, &framing, item_type);
    let polymorphic = !mappings.is_empty();
    let declared_fallback = match &item_type.kind {
        TypeKind::Record => !mapper.record_named(&item_type.declared_name)?.is_abstract,
        _ => true,
    };

    let (container, filter) = match &framing {
        CollectionFraming::Wrapped { container, item } => {
            claims.claim_element(container.clone());
            match find_child(element, container) {
                Some(c) => (c, item.clone()),
                None => return Ok(Value::Null),
            }
        }
        CollectionFraming::Implicit => {
            let name = resolve_field_name(owner, field, mapper.options());
            let found = find_child(element, &name);
            claims.claim_element(name);
            match found {
                Some(c) => (c, None),
                None => return Ok(Value::Null),
            }
        }
        CollectionFraming::Flattened { .. } => {
            if polymorphic {
                for mapping in mappings.iter() {
                    claims.claim_element(mapping.xml_tag.clone());
                }
            }
            if !polymorphic || declared_fallback {
                claims.claim_element(default_tag.clone());
            }
            (element, Some(default_tag.clone()))
        }
    };

    let mut items = Vec::new();
    for child in &container.children {
        let tag = child.local_name();

        let concrete = if polymorphic {
            match mapping_for_tag(&mappings, tag) {
                Some(mapping) => Some(mapper.record_named(&mapping.concrete_type)?),
                None if declared_fallback && tag == default_tag => None,
                None => {
                    debug!(field = %field.name, tag, "skipping unmapped collection item");
                    continue;
                }
            }
        } else {
            if let Some(expected) = filter.as_deref() {
                if tag != expected {
                    if matches!(framing, CollectionFraming::Wrapped { .. }) {
                        debug!(field = %field.name, tag, "skipping unexpected collection item");
                    }
                    continue;
                }
            }
            None
        };

        if let Some(value) = read_item(mapper, owner, field, item_type, concrete, child)? {
            items.push(value);
        }
    }

    if items.is_empty() && matches!(framing, CollectionFraming::Flattened { .. }) {
        return Ok(Value::Null);
    }
    Ok(Value::List(items))
}

fn read_item(
    mapper: &RecordMapper<'_>,
    owner: &str,
    field: &FieldDescriptor,
    item_type: &TypeDescriptor,
    concrete: Option<&crate::schema::RecordDescriptor>,
    child: &Element,
) -> Result<Option<Value>> {
    match &item_type.kind {
        TypeKind::RawNode(_) => Ok(Some(Value::Node(child.clone()))),
        _ if child.is_nil() => Ok(Some(Value::Null)),
        TypeKind::Record => {
            let descriptor = match concrete {
                Some(d) => d,
                None => mapper.record_named(&item_type.declared_name)?,
            };
            mapper
                .read_record(child, descriptor)
                .map(|r| Some(Value::Record(r)))
        }
        _ => mapper.parse_field(owner, field, item_type, child.text_content()),
    }
}

fn item_type<'f>(owner: &str, field: &'f FieldDescriptor) -> Result<&'f TypeDescriptor> {
    field.value_type.item().map(|t| t.as_ref()).ok_or_else(|| {
        Error::Value(format!("{}.{} is not a collection", owner, field.name))
    })
}

fn framing(field: &FieldDescriptor) -> CollectionFraming {
    field
        .collection_framing
        .clone()
        .unwrap_or(CollectionFraming::Implicit)
}

fn item_mappings<'f>(
    mapper: &RecordMapper<'_>,
    owner: &str,
    field: &'f FieldDescriptor,
    item_type: &TypeDescriptor,
) -> Result<Cow<'f, [PolymorphicMapping]>> {
    if item_type.is_record() {
        effective_mappings(mapper.schema(), mapper.options(), owner, field)
    } else {
        Ok(Cow::Borrowed(&[]))
    }
}

/// Item tag: the configured item name, else the item type's root name
fn item_tag(mapper: &RecordMapper<'_>, framing: &CollectionFraming, item_type: &TypeDescriptor) -> String {
    match framing.item_name() {
        Some(name) => name.to_string(),
        None => resolve_root_name(item_type, mapper.options()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Document;
    use crate::options::SerializationOptions;
    use crate::schema::{FieldDecl, RecordDecl, ScalarType, Schema, TypeShape};
    use crate::values::Record;
    use pretty_assertions::assert_eq;

    fn schema() -> Schema {
        let ints = TypeShape::sequence(TypeShape::Scalar(ScalarType::I32));
        let mut builder = Schema::builder();
        builder.add_record(
            RecordDecl::new("Bag")
                .field(FieldDecl::new("Wrapped", ints.clone()).wrapped("Items").item_name("N"))
                .field(FieldDecl::new("Flat", ints.clone()).flattened().item_name("F"))
                .field(FieldDecl::new("Plain", ints)),
        );
        builder.build("Bag").unwrap()
    }

    fn ints(values: &[i64]) -> Value {
        Value::List(values.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn test_framings_on_write() {
        let schema = schema();
        let options = SerializationOptions::default();
        let mapper = RecordMapper::new(&schema, &options);

        let bag = Record::new("Bag")
            .with("Wrapped", ints(&[1, 2]))
            .with("Flat", ints(&[3]))
            .with("Plain", ints(&[4]));
        let xml = mapper.write_root(&bag).unwrap().to_xml_string(false).unwrap();
        assert_eq!(
            xml,
            "<Bag><Items><N>1</N><N>2</N></Items><F>3</F><Plain><int>4</int></Plain></Bag>"
        );
    }

    #[test]
    fn test_missing_and_empty_containers() {
        let schema = schema();
        let options = SerializationOptions::default();
        let mapper = RecordMapper::new(&schema, &options);

        let doc = Document::from_string("<Bag><Items/></Bag>").unwrap();
        let bag = mapper.read_root(doc.root().unwrap()).unwrap();
        assert_eq!(bag.get("Wrapped"), Some(&Value::List(Vec::new())));
        assert_eq!(bag.get("Flat"), Some(&Value::Null));
        assert_eq!(bag.get("Plain"), Some(&Value::Null));
    }

    #[test]
    fn test_empty_container_forms_are_equivalent() {
        let schema = schema();
        let options = SerializationOptions::default();
        let mapper = RecordMapper::new(&schema, &options);

        let bag = Record::new("Bag").with("Wrapped", ints(&[]));
        let xml = mapper.write_root(&bag).unwrap().to_xml_string(false).unwrap();
        assert_eq!(xml, "<Bag><Items/></Bag>");

        for input in ["<Bag><Items/></Bag>", "<Bag><Items></Items></Bag>"] {
            let doc = Document::from_string(input).unwrap();
            let read = mapper.read_root(doc.root().unwrap()).unwrap();
            assert_eq!(read.get("Wrapped"), Some(&Value::List(Vec::new())), "{}", input);
        }
    }

    #[test]
    fn test_wrapped_item_filter() {
        let schema = schema();
        let options = SerializationOptions::default();
        let mapper = RecordMapper::new(&schema, &options);

        let doc = Document::from_string("<Bag><Items><N>1</N><X>9</X><N>2</N></Items></Bag>").unwrap();
        let bag = mapper.read_root(doc.root().unwrap()).unwrap();
        assert_eq!(bag.get("Wrapped"), Some(&ints(&[1, 2])));
    }

    #[test]
    fn test_bad_item_is_skipped_when_tolerated() {
        let schema = schema();
        let doc = Document::from_string("<Bag><F>1</F><F>x</F><F>3</F></Bag>").unwrap();
        let root = doc.root().unwrap();

        let strict = SerializationOptions::default();
        assert!(RecordMapper::new(&schema, &strict).read_root(root).is_err());

        let lenient = SerializationOptions::new().with_ignore_parsing_errors(true);
        let bag = RecordMapper::new(&schema, &lenient).read_root(root).unwrap();
        assert_eq!(bag.get("Flat"), Some(&ints(&[1, 3])));
    }
}
