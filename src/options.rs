//! Serialization options
//!
//! Caller-supplied settings for one conversion call. Options are immutable
//! once handed to a call and can be shared freely between threads.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::names::NamingPolicy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Per-field settings that override what the schema declares
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSettings {
    /// XML name for the field
    pub xml_name: Option<String>,
    /// Polymorphic mappings as `(xml tag, concrete type name)` pairs
    pub polymorphic_mappings: Option<Vec<(String, String)>>,
}

impl FieldSettings {
    /// Create empty settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the XML name
    pub fn with_xml_name(mut self, name: impl Into<String>) -> Self {
        self.xml_name = Some(name.into());
        self
    }

    /// Add a polymorphic mapping
    pub fn with_mapping(mut self, xml_tag: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.polymorphic_mappings
            .get_or_insert_with(Vec::new)
            .push((xml_tag.into(), type_name.into()));
        self
    }
}

/// Options for a conversion call
#[derive(Debug, Clone)]
pub struct SerializationOptions {
    /// Indent written XML
    indent: bool,
    /// Leave fields that fail conversion at their default instead of failing
    ignore_parsing_errors: bool,
    /// Omit absent values instead of writing nil-marked elements
    ignore_null_values: bool,
    /// Naming policy for fields and types without explicit names
    naming_policy: Option<NamingPolicy>,
    /// Per-field settings keyed by (type name, field name)
    field_settings: HashMap<(String, String), FieldSettings>,
    /// Root element renames keyed by type name
    type_name_overrides: HashMap<String, String>,
    /// Let option overrides win over names declared in the schema
    prefer_overrides_over_schema: bool,
    /// Resource limits for reading
    limits: Limits,
}

impl Default for SerializationOptions {
    fn default() -> Self {
        Self {
            indent: false,
            ignore_parsing_errors: false,
            ignore_null_values: false,
            naming_policy: None,
            field_settings: HashMap::new(),
            type_name_overrides: HashMap::new(),
            prefer_overrides_over_schema: false,
            limits: Limits::default(),
        }
    }
}

impl SerializationOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if output is indented
    pub fn indent(&self) -> bool {
        self.indent
    }

    /// Check if field conversion failures are tolerated
    pub fn ignore_parsing_errors(&self) -> bool {
        self.ignore_parsing_errors
    }

    /// Check if absent values are omitted
    pub fn ignore_null_values(&self) -> bool {
        self.ignore_null_values
    }

    /// Get the naming policy
    pub fn naming_policy(&self) -> Option<&NamingPolicy> {
        self.naming_policy.as_ref()
    }

    /// Check if option overrides win over schema names
    pub fn prefer_overrides_over_schema(&self) -> bool {
        self.prefer_overrides_over_schema
    }

    /// Get the limits
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Get the settings for one field
    pub fn field_settings(&self, type_name: &str, field: &str) -> Option<&FieldSettings> {
        self.field_settings
            .get(&(type_name.to_string(), field.to_string()))
    }

    /// Get the name override for one field
    pub fn field_name_override(&self, type_name: &str, field: &str) -> Option<&str> {
        self.field_settings(type_name, field)
            .and_then(|s| s.xml_name.as_deref())
    }

    /// Get the root name override for a type
    pub fn type_name_override(&self, type_name: &str) -> Option<&str> {
        self.type_name_overrides.get(type_name).map(|s| s.as_str())
    }

    /// Set indentation
    pub fn with_indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Set tolerance for field conversion failures
    pub fn with_ignore_parsing_errors(mut self, ignore: bool) -> Self {
        self.ignore_parsing_errors = ignore;
        self
    }

    /// Set omission of absent values
    pub fn with_ignore_null_values(mut self, ignore: bool) -> Self {
        self.ignore_null_values = ignore;
        self
    }

    /// Set the naming policy
    pub fn with_naming_policy(mut self, policy: NamingPolicy) -> Self {
        self.naming_policy = Some(policy);
        self
    }

    /// Override a field's XML name
    pub fn with_field_name(
        mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        xml_name: impl Into<String>,
    ) -> Self {
        self.field_settings
            .entry((type_name.into(), field.into()))
            .or_default()
            .xml_name = Some(xml_name.into());
        self
    }

    /// Replace all settings of one field
    pub fn with_field_settings(
        mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        settings: FieldSettings,
    ) -> Self {
        self.field_settings
            .insert((type_name.into(), field.into()), settings);
        self
    }

    /// Override a type's root element name
    pub fn with_type_name(mut self, type_name: impl Into<String>, xml_name: impl Into<String>) -> Self {
        self.type_name_overrides
            .insert(type_name.into(), xml_name.into());
        self
    }

    /// Let option overrides win over schema names
    pub fn with_prefer_overrides_over_schema(mut self, prefer: bool) -> Self {
        self.prefer_overrides_over_schema = prefer;
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Load options from JSON text
    ///
    /// Field keys are written `Type.Field`. Unknown keys are rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawOptions = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid options: {}", e)))?;
        raw.into_options()
    }

    /// Load options from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawOptions {
    indent: bool,
    ignore_parsing_errors: bool,
    ignore_null_values: bool,
    naming_policy: Option<String>,
    prefer_overrides_over_schema: bool,
    field_names: HashMap<String, String>,
    polymorphic_mappings: HashMap<String, Vec<RawMapping>>,
    type_names: HashMap<String, String>,
    limits: Option<RawLimits>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMapping {
    tag: String,
    #[serde(rename = "type")]
    type_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLimits {
    max_xml_depth: Option<usize>,
    max_xml_size: Option<usize>,
    max_attributes: Option<usize>,
}

impl RawOptions {
    fn into_options(self) -> Result<SerializationOptions> {
        let mut options = SerializationOptions::new()
            .with_indent(self.indent)
            .with_ignore_parsing_errors(self.ignore_parsing_errors)
            .with_ignore_null_values(self.ignore_null_values)
            .with_prefer_overrides_over_schema(self.prefer_overrides_over_schema);

        if let Some(policy) = self.naming_policy {
            options = options.with_naming_policy(NamingPolicy::from_name(&policy)?);
        }

        for (key, name) in self.field_names {
            let (type_name, field) = split_field_key(&key)?;
            options = options.with_field_name(type_name, field, name);
        }

        for (key, mappings) in self.polymorphic_mappings {
            let (type_name, field) = split_field_key(&key)?;
            let entry = options
                .field_settings
                .entry((type_name.to_string(), field.to_string()))
                .or_default();
            entry.polymorphic_mappings = Some(
                mappings
                    .into_iter()
                    .map(|m| (m.tag, m.type_name))
                    .collect(),
            );
        }

        for (type_name, name) in self.type_names {
            options = options.with_type_name(type_name, name);
        }

        if let Some(raw) = self.limits {
            let defaults = Limits::default();
            options = options.with_limits(Limits {
                max_xml_depth: raw.max_xml_depth.unwrap_or(defaults.max_xml_depth),
                max_xml_size: raw.max_xml_size.unwrap_or(defaults.max_xml_size),
                max_attributes: raw.max_attributes.unwrap_or(defaults.max_attributes),
            });
        }

        Ok(options)
    }
}

fn split_field_key(key: &str) -> Result<(&str, &str)> {
    match key.split_once('.') {
        Some((type_name, field)) if !type_name.is_empty() && !field.is_empty() => {
            Ok((type_name, field))
        }
        _ => Err(Error::Config(format!(
            "Invalid field key '{}': expected 'Type.Field'",
            key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = SerializationOptions::default();
        assert!(!options.indent());
        assert!(!options.ignore_parsing_errors());
        assert!(!options.ignore_null_values());
        assert!(options.naming_policy().is_none());
        assert!(!options.prefer_overrides_over_schema());
    }

    #[test]
    fn test_builder() {
        let options = SerializationOptions::new()
            .with_indent(true)
            .with_field_name("Order", "Id", "OrderId")
            .with_type_name("Order", "PurchaseOrder");

        assert!(options.indent());
        assert_eq!(options.field_name_override("Order", "Id"), Some("OrderId"));
        assert_eq!(options.field_name_override("Order", "Other"), None);
        assert_eq!(options.type_name_override("Order"), Some("PurchaseOrder"));

        let options = options.with_field_settings(
            "Order",
            "Lines",
            FieldSettings::new().with_xml_name("Line").with_mapping("gift", "GiftLine"),
        );
        assert_eq!(options.field_name_override("Order", "Lines"), Some("Line"));
        assert_eq!(
            options.field_settings("Order", "Lines").and_then(|s| s.polymorphic_mappings.as_deref()),
            Some(&[("gift".to_string(), "GiftLine".to_string())][..])
        );
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "indent": true,
            "naming_policy": "snake_case",
            "field_names": { "Order.Id": "order-id" },
            "polymorphic_mappings": {
                "Zoo.Animals": [ { "tag": "cat", "type": "Cat" } ]
            },
            "type_names": { "Order": "PurchaseOrder" },
            "limits": { "max_xml_depth": 50 }
        }"#;

        let options = SerializationOptions::from_json(json).unwrap();
        assert!(options.indent());
        assert!(matches!(options.naming_policy(), Some(NamingPolicy::SnakeCase)));
        assert_eq!(options.field_name_override("Order", "Id"), Some("order-id"));
        assert_eq!(
            options
                .field_settings("Zoo", "Animals")
                .and_then(|s| s.polymorphic_mappings.clone()),
            Some(vec![("cat".to_string(), "Cat".to_string())])
        );
        assert_eq!(options.limits().max_xml_depth, 50);
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(matches!(
            SerializationOptions::from_json(r#"{ "naming_policy": "kebab" }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SerializationOptions::from_json(r#"{ "field_names": { "NoDot": "x" } }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SerializationOptions::from_json(r#"{ "colour": true }"#),
            Err(Error::Config(_))
        ));
    }
}
