//! Error types for xmlbind
//!
//! This module defines all error types used throughout the library.
//! The three payload structs mirror the failure classes of the mapping engine:
//! schema problems found while building, malformed XML, and per-field
//! conversion failures.

use std::fmt;
use thiserror::Error;

/// Result type alias using xmlbind Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xmlbind operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or ambiguous schema, detected while the schema is built
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Malformed XML input
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A single field's text could not be converted to its target type
    #[error("conversion error: {0}")]
    Conversion(#[from] FieldConversionError),

    /// A dynamic value does not fit the typed binding it is converted into
    #[error("value error: {0}")]
    Value(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Options could not be loaded
    #[error("configuration error: {0}")]
    Config(String),

    /// Streaming writer driven out of order
    #[error("invalid state: {0}")]
    State(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML writing error
    #[error("XML error: {0}")]
    Xml(String),
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(io) => Error::Io(std::io::Error::new(io.kind(), io.to_string())),
            other => Error::Xml(other.to_string()),
        }
    }
}

/// Schema building error with context
#[derive(Debug, Clone)]
pub struct SchemaError {
    /// Error message
    pub message: String,
    /// Declared name of the type being built
    pub type_name: Option<String>,
    /// Field of that type, if the problem is field-local
    pub field: Option<String>,
}

impl SchemaError {
    /// Create a new schema error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            type_name: None,
            field: None,
        }
    }

    /// Set the type name
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Set the field name
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        match (&self.type_name, &self.field) {
            (Some(ty), Some(field)) => write!(f, "\n\nField: {}.{}", ty, field)?,
            (Some(ty), None) => write!(f, "\n\nType: {}", ty)?,
            (None, Some(field)) => write!(f, "\n\nField: {}", field)?,
            (None, None) => {}
        }

        Ok(())
    }
}

impl std::error::Error for SchemaError {}

/// XML parsing error
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Location in the input
    pub location: Option<String>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref loc) = self.location {
            write!(f, "\n\nLocation: {}", loc)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Conversion failure for one field
#[derive(Debug, Clone)]
pub struct FieldConversionError {
    /// Error message
    pub message: String,
    /// Record type that owns the field
    pub type_name: Option<String>,
    /// Field name
    pub field: Option<String>,
    /// Offending text
    pub value: Option<String>,
    /// Name of the target type
    pub target: Option<String>,
}

impl FieldConversionError {
    /// Create a new conversion error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            type_name: None,
            field: None,
            value: None,
            target: None,
        }
    }

    /// Set the owning record type and field
    pub fn with_field(mut self, type_name: impl Into<String>, field: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self.field = Some(field.into());
        self
    }

    /// Set the offending text
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the target type name
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

impl fmt::Display for FieldConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let (Some(ty), Some(field)) = (&self.type_name, &self.field) {
            write!(f, "\n\nField: {}.{}", ty, field)?;
        }

        if let Some(ref target) = self.target {
            write!(f, "\n\nTarget: {}", target)?;
        }

        if let Some(ref value) = self.value {
            write!(f, "\n\nValue: {:?}", value)?;
        }

        Ok(())
    }
}

impl std::error::Error for FieldConversionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::new("Two any-element sinks declared")
            .with_type("Order")
            .with_field("Extra");

        let msg = format!("{}", err);
        assert!(msg.contains("Two any-element sinks declared"));
        assert!(msg.contains("Field: Order.Extra"));
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("Unexpected end of document").with_location("byte 42");

        let msg = format!("{}", err);
        assert!(msg.contains("Unexpected end of document"));
        assert!(msg.contains("Location: byte 42"));
    }

    #[test]
    fn test_conversion_error_display() {
        let err = FieldConversionError::new("invalid digit found in string")
            .with_field("Order", "Quantity")
            .with_value("abc")
            .with_target("int");

        let msg = format!("{}", err);
        assert!(msg.contains("Order.Quantity"));
        assert!(msg.contains("Target: int"));
        assert!(msg.contains("\"abc\""));
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = FieldConversionError::new("test").into();
        assert!(matches!(err, Error::Conversion(_)));

        let err: Error = SchemaError::new("test").into();
        assert!(matches!(err, Error::Schema(_)));
    }
}
