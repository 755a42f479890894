//! Polymorphic dispatch
//!
//! Tag ↔ concrete type tables for fields whose declared type is shared by
//! several record types. Tables are ordered most-derived first; writing picks
//! the first exact runtime-type match, reading the first exact tag match.

use crate::error::{Error, Result};
use crate::options::SerializationOptions;
use crate::schema::{FieldDescriptor, PolymorphicMapping, Schema};
use crate::values::Record;
use std::borrow::Cow;

/// Mappings in force for a field
///
/// Mappings from the options replace the schema's when the field declares
/// none, or when overrides are preferred.
pub fn effective_mappings<'a>(
    schema: &Schema,
    options: &SerializationOptions,
    owner: &str,
    field: &'a FieldDescriptor,
) -> Result<Cow<'a, [PolymorphicMapping]>> {
    let configured = options
        .field_settings(owner, &field.name)
        .or_else(|| options.field_settings(&field.declared_in, &field.name))
        .and_then(|s| s.polymorphic_mappings.as_ref());

    let configured = match configured {
        Some(pairs)
            if field.polymorphic_mappings.is_empty() || options.prefer_overrides_over_schema() =>
        {
            pairs
        }
        _ => return Ok(Cow::Borrowed(field.polymorphic_mappings.as_slice())),
    };

    let mut mappings = Vec::with_capacity(configured.len());
    for (tag, type_name) in configured {
        let record = schema.record(type_name).ok_or_else(|| {
            Error::Config(format!(
                "Polymorphic mapping '{}' for {}.{} names unknown record '{}'",
                tag, owner, field.name, type_name
            ))
        })?;
        mappings.push(PolymorphicMapping {
            xml_tag: tag.clone(),
            concrete_type: type_name.clone(),
            manual_mapping: record.descriptor.manual_mapping,
            depth: record.depth,
        });
    }
    mappings.sort_by(|a, b| b.depth.cmp(&a.depth));
    Ok(Cow::Owned(mappings))
}

/// Mapping whose concrete type is exactly the record's runtime type
pub fn mapping_for_record<'m>(
    mappings: &'m [PolymorphicMapping],
    record: &Record,
) -> Option<&'m PolymorphicMapping> {
    mappings
        .iter()
        .find(|m| m.concrete_type == record.type_name())
}

/// Mapping for an element tag (exact, case-sensitive)
pub fn mapping_for_tag<'m>(mappings: &'m [PolymorphicMapping], tag: &str) -> Option<&'m PolymorphicMapping> {
    mappings.iter().find(|m| m.xml_tag == tag)
}
