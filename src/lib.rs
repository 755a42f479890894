//! # xmlbind
//!
//! Schema-driven mapping between structured values and XML element trees.
//!
//! A [`Schema`](schema::Schema) describes record types, their fields and
//! how each field is placed in XML. The mapping engine writes and reads
//! dynamic [`Record`](values::Record) values against it; typed Rust values
//! take part through the [`XmlRecord`](binding::XmlRecord) and
//! [`XmlValue`](binding::XmlValue) traits.
//!
//! ## Features
//!
//! - Attribute, element and inner-text placement of fields
//! - Wrapped, flattened and implicit collection framing
//! - Polymorphic fields dispatched by XML tag
//! - Catch-all capture of unmapped elements and attributes
//! - `xsi:nil` handling for absent values
//! - Naming policies and per-call name overrides
//! - Streaming reads and writes with memory bounded by one item
//! - Protection against oversized and deeply nested input
//!
//! ## Example
//!
//! ```rust,ignore
//! use xmlbind::{SerializationOptions, XmlSerializer};
//!
//! let serializer = XmlSerializer::new(schema).with_options(SerializationOptions::default());
//!
//! // Write records into a container, one item at a time
//! serializer.write_many(&records, &mut file, "People", None)?;
//!
//! // Read them back lazily
//! for person in serializer.read_many(reader, None) {
//!     println!("{:?}", person?);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Names and sources
pub mod namespaces;
pub mod names;
pub mod locations;
pub mod loaders;

// Value and document models
pub mod documents;
pub mod values;

// Configuration and schemas
pub mod options;
pub mod schema;

// Mapping engine
pub mod mapping;
pub mod streaming;
pub mod serializer;

// Typed layer
pub mod binding;

// Re-exports for convenience
pub use binding::{
    from_str, read_many, read_many_from, read_nested_many, read_one, read_one_from, schema_for, serializer_for,
    to_string, write_document, write_many, write_one, Binary, ItemStream, XmlRecord, XmlValue,
};
pub use documents::{Attribute, Document, Element};
pub use error::{Error, FieldConversionError, ParseError, Result, SchemaError};
pub use limits::Limits;
pub use locations::Location;
pub use mapping::{ManualMapping, RecordMapper};
pub use names::NamingPolicy;
pub use namespaces::QName;
pub use options::{FieldSettings, SerializationOptions};
pub use schema::{EnumDecl, FieldDecl, RecordDecl, Schema, SchemaBuilder, TypeShape};
pub use serializer::{RecordStream, XmlSerializer};
pub use values::{Record, Temporal, Value};

/// Version of the xmlbind library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XML Schema instance namespace, home of `xsi:nil`
pub const XSI_NAMESPACE: &str = namespaces::XSI_NAMESPACE;
