//! Serializer entry points
//!
//! [`XmlSerializer`] binds one schema to one set of options and exposes the
//! single-record and streaming operations over dynamic [`Record`] values.
//! The typed functions in [`binding`](crate::binding) are thin wrappers
//! around it.

use crate::documents::{Document, Element};
use crate::error::Result;
use crate::loaders::Loader;
use crate::locations::Location;
use crate::mapping::RecordMapper;
use crate::names::validate_ncname;
use crate::namespaces::QName;
use crate::options::SerializationOptions;
use crate::schema::Schema;
use crate::streaming::{StreamReader, StreamWriter};
use crate::values::Record;
use std::borrow::Borrow;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{debug, warn};

/// Reads and writes records of one schema's root type
#[derive(Debug, Clone)]
pub struct XmlSerializer {
    schema: Arc<Schema>,
    options: SerializationOptions,
}

impl XmlSerializer {
    /// Create a serializer with default options
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            options: SerializationOptions::default(),
        }
    }

    /// Builder: replace the options
    pub fn with_options(mut self, options: SerializationOptions) -> Self {
        self.options = options;
        self
    }

    /// The schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The options
    pub fn options(&self) -> &SerializationOptions {
        &self.options
    }

    /// Element name of the root type
    pub fn root_name(&self) -> QName {
        self.mapper().root_name()
    }

    fn mapper(&self) -> RecordMapper<'_> {
        RecordMapper::new(&self.schema, &self.options)
    }

    /// Write one record as an element subtree
    pub fn write_one(&self, record: &Record) -> Result<Element> {
        self.mapper().write_root(record)
    }

    /// Write one record as a complete document
    pub fn write_document<W: Write>(&self, record: &Record, sink: W) -> Result<()> {
        let root = self.write_one(record)?;
        let mut writer = StreamWriter::new(sink, self.options.indent());
        writer.start_document()?;
        writer.write_root(&root)?;
        writer.end_document()
    }

    /// Write one record as a document string
    pub fn to_string(&self, record: &Record) -> Result<String> {
        Document::with_root(self.write_one(record)?).to_string(self.options.indent())
    }

    /// Stream records into a container element, flushing after each item
    ///
    /// Items are named `item_name`, or after the root type when `None`.
    /// Both names must be valid NCNames.
    pub fn write_many<I, W>(&self, records: I, sink: W, container: &str, item_name: Option<&str>) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Borrow<Record>,
        W: Write,
    {
        validate_ncname(container)?;
        if let Some(name) = item_name {
            validate_ncname(name)?;
        }

        let mapper = self.mapper();
        let item = self.item_qname(item_name);
        let container = QName::new(self.schema.root().descriptor.namespace_uri.clone(), container);

        let mut writer = StreamWriter::new(sink, self.options.indent());
        writer.start_document()?;
        writer.start_container(&container)?;
        for record in records {
            let element = mapper.write_record(record.borrow(), self.schema.root(), item.clone())?;
            writer.write_item(&element)?;
        }
        writer.end_container()?;
        writer.end_document()?;
        debug!(items = writer.items_written(), container = %container, "wrote record stream");
        Ok(())
    }

    /// Read a record from a mapped element
    ///
    /// Returns `None` when the element's name does not match the root type,
    /// or when mapping fails and failures are tolerated.
    pub fn read_element(&self, element: &Element) -> Result<Option<Record>> {
        let expected = self.root_name();
        if element.local_name() != expected.local_name {
            debug!(found = element.local_name(), expected = %expected.local_name, "root element does not match");
            return Ok(None);
        }
        match self.mapper().read_root(element) {
            Ok(record) => Ok(Some(record)),
            Err(e) if self.options.ignore_parsing_errors() => {
                warn!(error = %e, "ignoring record that failed to map");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Read one record from a document string
    pub fn from_str(&self, xml: &str) -> Result<Option<Record>> {
        let document = Document::from_string_with_limits(xml, self.options.limits())?;
        match document.root() {
            Some(root) => self.read_element(root),
            None => Ok(None),
        }
    }

    /// Read one record from the root of a streamed document
    pub fn read_one<R: BufRead>(&self, source: R) -> Result<Option<Record>> {
        let mut reader = StreamReader::with_limits(source, self.options.limits().clone());
        match reader.read_root()? {
            Some(root) => self.read_element(&root),
            None => Ok(None),
        }
    }

    /// Read one record from a file, string or byte location
    pub fn read_one_from(&self, location: &Location) -> Result<Option<Record>> {
        let loader = Loader::new().with_limits(self.options.limits().clone());
        self.from_str(&loader.load(location)?)
    }

    /// Lazily read every element named `item_name` (default: the root type's name)
    pub fn read_many<R: BufRead>(&self, source: R, item_name: Option<&str>) -> RecordStream<R> {
        RecordStream::new(self, source, None, item_name)
    }

    /// Like [`read_many`](Self::read_many), inside the container at `path`
    ///
    /// Yields nothing when any path segment is missing.
    pub fn read_nested_many<R: BufRead>(
        &self,
        source: R,
        path: &[String],
        item_name: Option<&str>,
    ) -> RecordStream<R> {
        RecordStream::new(self, source, Some(path.to_vec()), item_name)
    }

    /// Lazily read records from a location
    pub fn read_many_from(
        &self,
        location: &Location,
        item_name: Option<&str>,
    ) -> Result<RecordStream<Box<dyn BufRead>>> {
        let loader = Loader::new().with_limits(self.options.limits().clone());
        let source = loader.open(location)?;
        debug!(location = %location.describe(), "streaming records");
        Ok(self.read_many(source, item_name))
    }

    fn item_qname(&self, item_name: Option<&str>) -> QName {
        let root = self.root_name();
        match item_name {
            Some(name) => QName::new(root.namespace, name),
            None => root,
        }
    }
}

/// Lazy, single-pass sequence of records read from a stream
///
/// Malformed XML yields one `Err` and ends the sequence. An item that fails
/// to map is skipped with a warning when parsing errors are ignored, and
/// otherwise yielded as `Err`, ending the sequence.
pub struct RecordStream<R: BufRead> {
    schema: Arc<Schema>,
    options: SerializationOptions,
    reader: StreamReader<R>,
    path: Option<Vec<String>>,
    item_name: String,
    finished: bool,
}

impl<R: BufRead> RecordStream<R> {
    fn new(serializer: &XmlSerializer, source: R, path: Option<Vec<String>>, item_name: Option<&str>) -> Self {
        let item_name = match item_name {
            Some(name) => name.to_string(),
            None => serializer.root_name().local_name,
        };
        Self {
            schema: Arc::clone(&serializer.schema),
            options: serializer.options.clone(),
            reader: StreamReader::with_limits(source, serializer.options.limits().clone()),
            path,
            item_name,
            finished: false,
        }
    }

    /// Item element name being matched
    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    fn next_element(&mut self) -> Result<Option<Element>> {
        if let Some(path) = self.path.take() {
            if !self.reader.enter_path(&path)? {
                return Ok(None);
            }
        }
        self.reader.next_element(&self.item_name)
    }
}

impl<R: BufRead> Iterator for RecordStream<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let element = match self.next_element() {
                Ok(Some(element)) => element,
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };

            let mapper = RecordMapper::new(&self.schema, &self.options);
            match mapper.read_root(&element) {
                Ok(record) => return Some(Ok(record)),
                Err(e) if self.options.ignore_parsing_errors() => {
                    warn!(error = %e, item = %self.item_name, "skipping item that failed to map");
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

impl<R: BufRead> std::fmt::Debug for RecordStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStream")
            .field("item_name", &self.item_name)
            .field("reader", &self.reader)
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::schema::{FieldDecl, RecordDecl, ScalarType, TypeShape};
    use crate::values::Value;

    fn serializer() -> XmlSerializer {
        let mut builder = Schema::builder();
        builder.add_record(
            RecordDecl::new("Item")
                .field(FieldDecl::new("Id", TypeShape::Scalar(ScalarType::I32)).attribute())
                .field(FieldDecl::new("Name", TypeShape::Scalar(ScalarType::String))),
        );
        XmlSerializer::new(Arc::new(builder.build("Item").unwrap()))
    }

    fn item(id: i64, name: &str) -> Record {
        Record::new("Item").with("Id", Value::Int(id)).with("Name", name)
    }

    #[test]
    fn test_write_many_then_read_many() {
        let s = serializer();
        let items = vec![item(1, "a"), item(2, "b")];
        let mut out = Vec::new();
        s.write_many(&items, &mut out, "Items", None).unwrap();

        let xml = String::from_utf8(out).unwrap();
        assert_eq!(
            xml,
            r#"<?xml version="1.0" encoding="utf-8"?><Items><Item Id="1"><Name>a</Name></Item><Item Id="2"><Name>b</Name></Item></Items>"#
        );

        let back: Vec<_> = s.read_many(xml.as_bytes(), None).collect::<Result<_>>().unwrap();
        assert_eq!(back, items);
    }

    #[test]
    fn test_read_one_requires_matching_root() {
        let s = serializer();
        assert_eq!(
            s.from_str(r#"<Item Id="4"><Name>x</Name></Item>"#).unwrap(),
            Some(item(4, "x"))
        );
        assert_eq!(s.from_str("<Other/>").unwrap(), None);
        assert_eq!(s.read_one("<Other/>".as_bytes()).unwrap(), None);
        assert!(matches!(s.from_str("<Item>"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_read_one_tolerated_failure() {
        let xml = r#"<Item Id="x"/>"#;
        let strict = serializer();
        assert!(matches!(strict.read_one(xml.as_bytes()), Err(Error::Conversion(_))));

        let lenient = serializer().with_options(SerializationOptions::new().with_ignore_parsing_errors(true));
        let record = lenient.read_one(xml.as_bytes()).unwrap().unwrap();
        assert_eq!(record.get("Id"), Some(&Value::Null));
    }

    #[test]
    fn test_read_many_failure_policy() {
        let xml = r#"<Items><Item Id="1"/><Item Id="bad"/><Item Id="3"/></Items>"#;

        let strict = serializer();
        let results: Vec<_> = strict.read_many(xml.as_bytes(), None).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());

        let malformed = "<Items><Item Id=\"1\"/><Item></Items>";
        let results: Vec<_> = strict.read_many(malformed.as_bytes(), None).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[1], Err(Error::Parse(_))));
    }

    #[test]
    fn test_write_many_rejects_bad_names() {
        let s = serializer();
        let mut out = Vec::new();
        assert!(matches!(s.write_many(&[item(1, "a")], &mut out, "My Items", None), Err(Error::Name(_))));
        assert!(matches!(s.write_many(&[item(1, "a")], &mut out, "Items", Some("1st")), Err(Error::Name(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_write_document() {
        let s = serializer();
        let mut out = Vec::new();
        s.write_document(&item(7, "z"), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<?xml version="1.0" encoding="utf-8"?><Item Id="7"><Name>z</Name></Item>"#
        );
    }
}
