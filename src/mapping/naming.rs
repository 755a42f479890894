//! Name resolution
//!
//! Effective XML names for fields and types. Precedence, highest first:
//! an option override (consulted only when the schema declares no explicit
//! name, or when overrides are preferred), the explicit schema name, the
//! naming policy applied to the declared name, and the declared name itself.

use crate::namespaces::QName;
use crate::options::SerializationOptions;
use crate::schema::{FieldDescriptor, TypeDescriptor};

/// Effective XML name of a field of record `owner`
pub fn resolve_field_name(owner: &str, field: &FieldDescriptor, options: &SerializationOptions) -> String {
    let explicit = field.explicit_name();

    let override_name = options
        .field_name_override(owner, &field.name)
        .or_else(|| options.field_name_override(&field.declared_in, &field.name));
    if let Some(name) = override_name {
        if explicit.is_none() || options.prefer_overrides_over_schema() {
            return name.to_string();
        }
    }

    if let Some(name) = explicit {
        return name.to_string();
    }

    match options.naming_policy() {
        Some(policy) => policy.convert_name(&field.name),
        None => field.name.clone(),
    }
}

/// Effective root element name of a type
pub fn resolve_root_name(descriptor: &TypeDescriptor, options: &SerializationOptions) -> String {
    let explicit = descriptor.root_xml_name.as_deref();

    if let Some(name) = options.type_name_override(&descriptor.declared_name) {
        if explicit.is_none() || options.prefer_overrides_over_schema() {
            return name.to_string();
        }
    }

    if let Some(name) = explicit {
        return name.to_string();
    }

    match options.naming_policy() {
        Some(policy) => policy.convert_name(&descriptor.declared_name),
        None => descriptor.declared_name.clone(),
    }
}

/// Qualified element name of a field
pub fn field_qname(owner: &str, field: &FieldDescriptor, options: &SerializationOptions) -> QName {
    QName::new(
        field
            .namespace_uri
            .clone()
            .or_else(|| field.value_type.namespace_uri.clone()),
        resolve_field_name(owner, field, options),
    )
}

/// Qualified root element name of a type
pub fn root_qname(descriptor: &TypeDescriptor, options: &SerializationOptions) -> QName {
    QName::new(
        descriptor.namespace_uri.clone(),
        resolve_root_name(descriptor, options),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::NamingPolicy;
    use crate::schema::{FieldDecl, RecordDecl, Schema, ScalarType, TypeShape};

    fn schema() -> Schema {
        let text = TypeShape::Scalar(ScalarType::String);
        let mut builder = Schema::builder();
        builder.add_record(
            RecordDecl::new("OrderLine")
                .root_name("Line")
                .field(FieldDecl::new("ProductCode", text.clone()))
                .field(FieldDecl::new("UnitPrice", text.clone()).named("Price"))
                .field(FieldDecl::new("LineId", text).attribute_named("id")),
        );
        builder.build("OrderLine").unwrap()
    }

    fn name_of(schema: &Schema, field: &str, options: &SerializationOptions) -> String {
        let record = schema.root();
        let field = record.field(field).unwrap();
        resolve_field_name(record.name(), field, options)
    }

    #[test]
    fn test_raw_and_explicit_names() {
        let schema = schema();
        let options = SerializationOptions::default();
        assert_eq!(name_of(&schema, "ProductCode", &options), "ProductCode");
        assert_eq!(name_of(&schema, "UnitPrice", &options), "Price");
        assert_eq!(name_of(&schema, "LineId", &options), "id");
    }

    #[test]
    fn test_policy_applies_without_explicit_name() {
        let schema = schema();
        let options = SerializationOptions::new().with_naming_policy(NamingPolicy::SnakeCase);
        assert_eq!(name_of(&schema, "ProductCode", &options), "product_code");
        assert_eq!(name_of(&schema, "UnitPrice", &options), "Price");
    }

    #[test]
    fn test_override_precedence() {
        let schema = schema();
        let options = SerializationOptions::new()
            .with_field_name("OrderLine", "ProductCode", "Sku")
            .with_field_name("OrderLine", "UnitPrice", "Cost");

        // overrides only win over explicit names when preferred
        assert_eq!(name_of(&schema, "ProductCode", &options), "Sku");
        assert_eq!(name_of(&schema, "UnitPrice", &options), "Price");

        let options = options.with_prefer_overrides_over_schema(true);
        assert_eq!(name_of(&schema, "UnitPrice", &options), "Cost");
    }

    #[test]
    fn test_root_name() {
        let schema = schema();
        let descriptor = &schema.root().descriptor;
        let options = SerializationOptions::new().with_type_name("OrderLine", "Row");
        assert_eq!(resolve_root_name(descriptor, &SerializationOptions::default()), "Line");
        assert_eq!(resolve_root_name(descriptor, &options), "Line");
        assert_eq!(
            resolve_root_name(descriptor, &options.with_prefer_overrides_over_schema(true)),
            "Row"
        );
    }
}
