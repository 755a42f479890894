//! Catch-all capture
//!
//! Content no declared field claims is swept into the record's
//! any-element and any-attribute sinks as raw nodes, in document order.

use crate::documents::{Attribute, Element};
use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::schema::FieldDescriptor;
use crate::values::Value;
use std::collections::HashSet;

/// Local names claimed by declared fields while reading one element
#[derive(Debug, Default)]
pub struct Claims {
    elements: HashSet<String>,
    attributes: HashSet<String>,
}

impl Claims {
    /// Create an empty claim set
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim child elements with this local name
    pub fn claim_element(&mut self, local_name: impl Into<String>) {
        self.elements.insert(local_name.into());
    }

    /// Claim attributes with this local name
    pub fn claim_attribute(&mut self, local_name: impl Into<String>) {
        self.attributes.insert(local_name.into());
    }

    /// Check if child elements with this local name are claimed
    pub fn element_claimed(&self, local_name: &str) -> bool {
        self.elements.contains(local_name)
    }

    /// Check if attributes with this local name are claimed
    pub fn attribute_claimed(&self, local_name: &str) -> bool {
        self.attributes.contains(local_name)
    }
}

/// Unclaimed child elements, as the sink field's value
pub fn capture_elements(element: &Element, claims: &Claims, sink: &FieldDescriptor) -> Value {
    let mut unclaimed = element
        .children
        .iter()
        .filter(|child| !claims.element_claimed(child.local_name()))
        .cloned()
        .map(Value::Node);

    if sink.value_type.item().is_some() {
        Value::List(unclaimed.collect())
    } else {
        unclaimed.next().unwrap_or(Value::Null)
    }
}

/// Unclaimed attributes, as the sink field's value
pub fn capture_attributes(element: &Element, claims: &Claims, sink: &FieldDescriptor) -> Value {
    let nil = QName::xsi_nil();
    let mut unclaimed = element
        .attributes
        .iter()
        .filter(|(name, _)| **name != nil && !claims.attribute_claimed(&name.local_name))
        .map(|(name, value)| Value::Attribute(Attribute::new(name.clone(), value.clone())));

    if sink.value_type.item().is_some() {
        Value::List(unclaimed.collect())
    } else {
        unclaimed.next().unwrap_or(Value::Null)
    }
}

/// Append captured elements to the element being written
pub fn emit_elements(value: &Value, target: &mut Element) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Node(node) => {
            target.add_child(node.clone());
            Ok(())
        }
        Value::List(items) => items.iter().try_for_each(|item| emit_elements(item, target)),
        other => Err(Error::Value(format!(
            "Any-element sink holds a {} value, expected elements",
            other.kind_name()
        ))),
    }
}

/// Add captured attributes to the element being written
pub fn emit_attributes(value: &Value, target: &mut Element) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Attribute(attribute) => {
            target.set_attribute(attribute.name.clone(), attribute.value.clone());
            Ok(())
        }
        Value::List(items) => items.iter().try_for_each(|item| emit_attributes(item, target)),
        other => Err(Error::Value(format!(
            "Any-attribute sink holds a {} value, expected attributes",
            other.kind_name()
        ))),
    }
}
