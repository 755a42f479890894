//! Dynamic values
//!
//! The in-memory side of a conversion. Typed bindings convert to and from
//! [`Value`]; the mapping engine only ever sees these.

use crate::documents::{Attribute, Element};
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;

/// A temporal value
#[derive(Debug, Clone, PartialEq)]
pub enum Temporal {
    /// Date and time with a UTC offset
    DateTime(DateTime<FixedOffset>),
    /// Date and time without offset
    NaiveDateTime(NaiveDateTime),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// Signed elapsed time
    Duration(chrono::Duration),
}

/// A dynamic value flowing through the mapping engine
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating point number
    Float(f64),
    /// Exact decimal
    Decimal(Decimal),
    /// Text
    String(String),
    /// Single character
    Char(char),
    /// Binary data
    Bytes(Vec<u8>),
    /// Date, time or duration
    Temporal(Temporal),
    /// Enumeration member, by declared label
    Enum(String),
    /// Ordered sequence
    List(Vec<Value>),
    /// Structured record
    Record(Record),
    /// Raw element node
    Node(Element),
    /// Raw attribute node
    Attribute(Attribute),
}

impl Value {
    /// Check whether the value is absent
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the value's variant, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Char(_) => "char",
            Value::Bytes(_) => "bytes",
            Value::Temporal(_) => "temporal",
            Value::Enum(_) => "enum",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Node(_) => "element",
            Value::Attribute(_) => "attribute",
        }
    }

    /// Get the record, if this is one
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Get the list items, if this is a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the text, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<Element> for Value {
    fn from(e: Element) -> Self {
        Value::Node(e)
    }
}

/// A structured value: a runtime type name plus named fields
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: String,
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Create an empty record of the given runtime type
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Runtime type name
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Get a field value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get a field value, treating missing fields as null
    pub fn get_or_null(&self, name: &str) -> &Value {
        const NULL: Value = Value::Null;
        self.fields.get(name).unwrap_or(&NULL)
    }

    /// Set a field value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Builder: set a field value
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Remove a field and return its value (null if missing)
    pub fn take(&mut self, name: &str) -> Value {
        self.fields.shift_remove(name).unwrap_or(Value::Null)
    }

    /// Remove a field and convert it to a typed value
    pub fn take_as<T: crate::binding::XmlValue>(&mut self, name: &str) -> Result<T> {
        let type_name = self.type_name.clone();
        T::from_value(self.take(name)).map_err(|e| match e {
            Error::Value(msg) => Error::Value(format!("{}.{}: {}", type_name, name, msg)),
            other => other,
        })
    }

    /// Iterate over fields in insertion order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_fields_keep_order() {
        let record = Record::new("Order")
            .with("Id", Value::Int(7))
            .with("Customer", "ACME")
            .with("Paid", true);

        let names: Vec<_> = record.fields().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["Id", "Customer", "Paid"]);
        assert_eq!(record.type_name(), "Order");
    }

    #[test]
    fn test_record_take() {
        let mut record = Record::new("Order").with("Id", Value::Int(7));
        assert_eq!(record.take("Id"), Value::Int(7));
        assert_eq!(record.take("Id"), Value::Null);
        assert!(record.is_empty());
        assert!(record.get_or_null("Missing").is_null());
    }

    #[test]
    fn test_take_as_reports_field() {
        let mut record = Record::new("Order").with("Id", "seven");
        let err = record.take_as::<i32>("Id").unwrap_err();
        assert!(err.to_string().contains("Order.Id"));
    }
}
