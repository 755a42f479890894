//! Streaming XML
//!
//! Forward-only reading and incremental writing of large documents.
//! [`StreamReader`] materializes one item subtree at a time from a
//! `quick-xml` token stream; [`StreamWriter`] flushes after every item, so
//! memory use is bounded by the largest item rather than the item count.

use crate::documents::{
    new_writer, normalize_attribute_value, normalize_line_ends, write_element, Element,
};
use crate::error::{Error, ParseError, Result};
use crate::limits::Limits;
use crate::namespaces::{NamespaceContext, QName};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::{NsReader, Writer};
use std::fmt;
use std::io::{BufRead, Write};
use tracing::{debug, trace};

/// State of a [`StreamReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// Advancing token by token towards the next matching element
    Seeking,
    /// Materializing one element subtree
    InItem,
    /// End of input, or end of the scoped container
    Done,
}

enum Token {
    Start(Element),
    Empty(Element),
    End,
    Text(String),
    Eof,
}

/// Forward-only element cursor over an XML byte stream
pub struct StreamReader<R: BufRead> {
    reader: NsReader<R>,
    state: ReadState,
    depth: usize,
    scope: Option<usize>,
    limits: Limits,
}

impl<R: BufRead> StreamReader<R> {
    /// Create a reader with default limits
    pub fn new(source: R) -> Self {
        Self::with_limits(source, Limits::default())
    }

    /// Create a reader enforcing the given limits
    pub fn with_limits(source: R, limits: Limits) -> Self {
        Self {
            reader: NsReader::from_reader(source),
            state: ReadState::Seeking,
            depth: 0,
            scope: None,
            limits,
        }
    }

    /// Current state
    pub fn state(&self) -> ReadState {
        self.state
    }

    /// Byte offset reached in the input
    pub fn position(&self) -> usize {
        self.reader.buffer_position()
    }

    /// Read the document's root element
    pub fn read_root(&mut self) -> Result<Option<Element>> {
        while self.state != ReadState::Done {
            match self.next_token()? {
                Token::Start(element) => {
                    let root = self.read_subtree(element)?;
                    self.set_state(ReadState::Done);
                    return Ok(Some(root));
                }
                Token::Empty(element) => {
                    self.set_state(ReadState::Done);
                    return Ok(Some(element));
                }
                Token::Eof => self.set_state(ReadState::Done),
                Token::End | Token::Text(_) => {}
            }
        }
        Ok(None)
    }

    /// Walk an ordered path of container names
    ///
    /// Each segment is searched for inside the previous one. Returns `false`
    /// and finishes the reader if a segment is missing; afterwards
    /// [`next_element`](Self::next_element) only yields elements inside the
    /// last container.
    pub fn enter_path(&mut self, path: &[String]) -> Result<bool> {
        for segment in path {
            if !self.seek_container(segment)? {
                debug!(segment = %segment, "container path segment not found");
                self.set_state(ReadState::Done);
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn seek_container(&mut self, name: &str) -> Result<bool> {
        while self.state != ReadState::Done {
            match self.next_token()? {
                Token::Start(element) if element.local_name() == name => {
                    self.scope = Some(self.depth);
                    return Ok(true);
                }
                Token::Empty(element) if element.local_name() == name => {
                    // present but has nothing inside
                    self.set_state(ReadState::Done);
                    return Ok(true);
                }
                Token::End if self.scope_closed() => return Ok(false),
                Token::Eof => return Ok(false),
                _ => {}
            }
        }
        Ok(false)
    }

    /// Next element with the given local name, materialized with its subtree
    ///
    /// Matching elements are found at any depth inside the current scope; a
    /// matched element's descendants are consumed with it.
    pub fn next_element(&mut self, name: &str) -> Result<Option<Element>> {
        while self.state != ReadState::Done {
            match self.next_token()? {
                Token::Start(element) if element.local_name() == name => {
                    let item = self.read_subtree(element)?;
                    self.set_state(ReadState::Seeking);
                    return Ok(Some(item));
                }
                Token::Empty(element) if element.local_name() == name => return Ok(Some(element)),
                Token::End if self.scope_closed() => self.set_state(ReadState::Done),
                Token::Eof => self.set_state(ReadState::Done),
                _ => {}
            }
        }
        Ok(None)
    }

    fn read_subtree(&mut self, root: Element) -> Result<Element> {
        self.set_state(ReadState::InItem);
        let mut stack = vec![root];

        loop {
            match self.next_token()? {
                Token::Start(element) => stack.push(element),
                Token::Empty(element) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.add_child(element);
                    }
                }
                Token::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        match &mut top.text {
                            Some(existing) => existing.push_str(&text),
                            None => top.text = Some(text),
                        }
                    }
                }
                Token::End => {
                    let Some(mut closed) = stack.pop() else {
                        return Err(self.parse_error("unbalanced end tag"));
                    };
                    closed.normalize_text();
                    match stack.last_mut() {
                        Some(parent) => parent.add_child(closed),
                        None => return Ok(closed),
                    }
                }
                Token::Eof => return Err(self.parse_error("unexpected end of document")),
            }
        }
    }

    fn scope_closed(&self) -> bool {
        matches!(self.scope, Some(scope) if self.depth < scope)
    }

    fn set_state(&mut self, state: ReadState) {
        if self.state != state {
            trace!(from = ?self.state, to = ?state, depth = self.depth, "stream reader state");
            self.state = state;
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let event = self
                .reader
                .read_event_into(&mut buf)
                .map_err(|e| self.parse_error(e))?;

            let token = match event {
                Event::Start(e) => {
                    self.depth += 1;
                    self.limits.check_xml_depth(self.depth)?;
                    Token::Start(self.open_element(&e)?)
                }
                Event::Empty(e) => {
                    self.limits.check_xml_depth(self.depth + 1)?;
                    Token::Empty(self.open_element(&e)?)
                }
                Event::End(_) => {
                    self.depth = self.depth.saturating_sub(1);
                    Token::End
                }
                Event::Text(e) => {
                    let raw = self.utf8(&e)?;
                    let text = unescape(&normalize_line_ends(&raw))
                        .map_err(|err| self.parse_error(err))?
                        .into_owned();
                    Token::Text(text)
                }
                Event::CData(e) => {
                    let raw = self.utf8(&e)?;
                    Token::Text(normalize_line_ends(&raw).into_owned())
                }
                Event::Eof => {
                    if self.depth > 0 {
                        return Err(self.parse_error("unexpected end of document"));
                    }
                    Token::Eof
                }
                _ => continue,
            };
            return Ok(token);
        }
    }

    fn open_element(&self, start: &BytesStart<'_>) -> Result<Element> {
        let (resolved, local) = self.reader.resolve_element(start.name());
        let namespace = self.namespace_of(resolved)?;
        let local = self.utf8(local.as_ref())?;
        let mut element = Element::new(QName::new(namespace, local));

        let mut count = 0;
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.parse_error(e))?;
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            count += 1;
            let (resolved, local) = self.reader.resolve_attribute(attr.key);
            let namespace = self.namespace_of(resolved)?;
            let name = QName::new(namespace, self.utf8(local.as_ref())?);
            let raw = self.utf8(&attr.value)?;
            let value = unescape(&normalize_attribute_value(&raw))
                .map_err(|e| self.parse_error(e))?
                .into_owned();
            element.set_attribute(name, value);
        }
        self.limits.check_attributes(count)?;

        Ok(element)
    }

    fn namespace_of(&self, resolved: ResolveResult<'_>) -> Result<Option<String>> {
        match resolved {
            ResolveResult::Bound(ns) => Ok(Some(self.utf8(ns.as_ref())?)),
            ResolveResult::Unbound => Ok(None),
            ResolveResult::Unknown(prefix) => Err(self.parse_error(format!(
                "unknown namespace prefix '{}'",
                String::from_utf8_lossy(&prefix)
            ))),
        }
    }

    fn utf8(&self, bytes: &[u8]) -> Result<String> {
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| self.parse_error(e))
    }

    fn parse_error(&self, message: impl fmt::Display) -> Error {
        Error::Parse(
            ParseError::new(format!("Error parsing XML: {}", message))
                .with_location(format!("byte {}", self.reader.buffer_position())),
        )
    }
}

impl<R: BufRead> fmt::Debug for StreamReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamReader")
            .field("state", &self.state)
            .field("depth", &self.depth)
            .field("scope", &self.scope)
            .finish()
    }
}

/// State of a [`StreamWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    /// Nothing written yet
    Initial,
    /// Declaration written, no root element yet
    InDocument,
    /// Inside the container, accepting items
    InContainer,
    /// Root element closed
    Closed,
    /// Document finished
    Done,
}

/// Incremental document writer
///
/// Calls must follow `start_document`, then either `start_container`,
/// any number of `write_item` and `end_container`, or a single
/// `write_root`, then `end_document`. Anything else is an [`Error::State`].
pub struct StreamWriter<W: Write> {
    writer: Writer<W>,
    state: WriteState,
    scope: NamespaceContext,
    container: Option<QName>,
    items: usize,
}

impl<W: Write> StreamWriter<W> {
    /// Create a writer over a sink
    pub fn new(sink: W, indent: bool) -> Self {
        Self {
            writer: new_writer(sink, indent),
            state: WriteState::Initial,
            scope: NamespaceContext::new(),
            container: None,
            items: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> WriteState {
        self.state
    }

    /// Number of items written into the container
    pub fn items_written(&self) -> usize {
        self.items
    }

    /// Write the XML declaration
    pub fn start_document(&mut self) -> Result<()> {
        self.expect(WriteState::Initial, "start_document")?;
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        self.set_state(WriteState::InDocument);
        Ok(())
    }

    /// Open the container element
    pub fn start_container(&mut self, name: &QName) -> Result<()> {
        self.expect(WriteState::InDocument, "start_container")?;
        let mut start = BytesStart::new(name.local_name.as_str());
        if let Some(ns) = name.namespace() {
            start.push_attribute(("xmlns", ns));
            self.scope.set_default_namespace(Some(ns));
        }
        self.writer.write_event(Event::Start(start))?;
        self.container = Some(name.clone());
        self.set_state(WriteState::InContainer);
        self.flush()
    }

    /// Append one item to the container and flush
    pub fn write_item(&mut self, item: &Element) -> Result<()> {
        self.expect(WriteState::InContainer, "write_item")?;
        write_element(&mut self.writer, item, &self.scope)?;
        self.items += 1;
        self.flush()
    }

    /// Close the container element
    pub fn end_container(&mut self) -> Result<()> {
        self.expect(WriteState::InContainer, "end_container")?;
        if let Some(name) = self.container.take() {
            self.writer
                .write_event(Event::End(BytesEnd::new(name.local_name.as_str())))?;
        }
        self.set_state(WriteState::Closed);
        Ok(())
    }

    /// Write a single element as the document root
    pub fn write_root(&mut self, root: &Element) -> Result<()> {
        self.expect(WriteState::InDocument, "write_root")?;
        write_element(&mut self.writer, root, &NamespaceContext::new())?;
        self.set_state(WriteState::Closed);
        Ok(())
    }

    /// Finish the document and flush the sink
    pub fn end_document(&mut self) -> Result<()> {
        self.expect(WriteState::Closed, "end_document")?;
        self.flush()?;
        self.set_state(WriteState::Done);
        Ok(())
    }

    /// Recover the sink
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.get_mut().flush()?;
        Ok(())
    }

    fn expect(&self, state: WriteState, operation: &str) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(Error::State(format!(
                "{} called in state {:?}, expected {:?}",
                operation, self.state, state
            )))
        }
    }

    fn set_state(&mut self, state: WriteState) {
        trace!(from = ?self.state, to = ?state, "stream writer state");
        self.state = state;
    }
}

impl<W: Write> fmt::Debug for StreamWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamWriter")
            .field("state", &self.state)
            .field("container", &self.container)
            .field("items", &self.items)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Document;

    fn reader(xml: &str) -> StreamReader<&[u8]> {
        StreamReader::new(xml.as_bytes())
    }

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_items_in_document_order() {
        let mut r = reader("<List><Item n=\"1\"/><Other/><Item n=\"2\"><x>y</x></Item><Item n=\"3\"></Item></List>");
        let mut seen = Vec::new();
        while let Some(item) = r.next_element("Item").unwrap() {
            seen.push(item.get_attribute("n").unwrap().to_string());
        }
        assert_eq!(seen, vec!["1", "2", "3"]);
        assert_eq!(r.state(), ReadState::Done);
    }

    #[test]
    fn test_reads_like_the_document_parser() {
        let written = Element::local("E")
            .with_attribute(QName::local("v"), "tab\there\r\n")
            .with_text("a\r\nb");
        let xml = written.to_xml_string(false).unwrap();
        let foreign = "<E v=\"a\tb\r\nc\">x\r\ny\rz</E>";

        for input in [xml.as_str(), foreign] {
            let streamed = reader(input).read_root().unwrap().unwrap();
            let parsed = Document::from_string(input).unwrap().root.unwrap();
            assert_eq!(streamed, parsed, "{}", input);
        }
        assert_eq!(reader(&xml).read_root().unwrap().unwrap(), written);
    }

    #[test]
    fn test_item_subtree_is_materialized() {
        let mut r = reader("<List>\n  <Item>\n    <Name>a &amp; b</Name>\n    <Code><![CDATA[<x>]]></Code>\n  </Item>\n</List>");
        let item = r.next_element("Item").unwrap().unwrap();
        assert!(item.text.is_none());
        assert_eq!(item.children.len(), 2);
        assert_eq!(item.children[0].text_content(), "a & b");
        assert_eq!(item.children[1].text_content(), "<x>");
    }

    #[test]
    fn test_namespaces_are_resolved() {
        let mut r = reader(
            r#"<p:List xmlns:p="urn:p" xmlns="urn:d"><Item xmlns:q="urn:q" q:k="v"/></p:List>"#,
        );
        let item = r.next_element("Item").unwrap().unwrap();
        assert_eq!(item.namespace(), Some("urn:d"));
        assert_eq!(item.attributes.len(), 1);
        assert_eq!(item.get_attribute_qname(&QName::namespaced("urn:q", "k")), Some("v"));
    }

    #[test]
    fn test_nested_path_limits_scope() {
        let xml = "<Root><Item>outside</Item><Data><Objects><Item>1</Item><Item>2</Item></Objects><Item>after</Item></Data></Root>";
        let mut r = reader(xml);
        assert!(r.enter_path(&path(&["Root", "Data", "Objects"])).unwrap());
        let mut seen = Vec::new();
        while let Some(item) = r.next_element("Item").unwrap() {
            seen.push(item.text_content().to_string());
        }
        assert_eq!(seen, vec!["1", "2"]);
    }

    #[test]
    fn test_nested_path_fails_closed() {
        let mut r = reader("<Root><Data><Item>1</Item></Data></Root>");
        assert!(!r.enter_path(&path(&["Root", "Missing"])).unwrap());
        assert!(r.next_element("Item").unwrap().is_none());

        // segment outside the previous container
        let mut r = reader("<Root><A/><B><Item>1</Item></B></Root>");
        assert!(!r.enter_path(&path(&["A", "B"])).unwrap());
        assert!(r.next_element("Item").unwrap().is_none());
    }

    #[test]
    fn test_malformed_input_is_parse_error() {
        let mut r = reader("<List><Item></List>");
        assert!(matches!(r.next_element("Item"), Err(Error::Parse(_))));

        let mut r = reader("<List><Item/>");
        assert!(r.next_element("Item").unwrap().is_some());
        assert!(matches!(r.next_element("Item"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_depth_limit() {
        let limits = Limits {
            max_xml_depth: 2,
            ..Limits::default()
        };
        let mut r = StreamReader::with_limits("<a><b><c/></b></a>".as_bytes(), limits);
        assert!(matches!(r.next_element("c"), Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn test_read_root() {
        let mut r = reader("<?xml version=\"1.0\"?><!-- c --><Root a=\"1\"><b/></Root>");
        let root = r.read_root().unwrap().unwrap();
        assert_eq!(root.local_name(), "Root");
        assert_eq!(root.children.len(), 1);
        assert!(r.read_root().unwrap().is_none());
    }

    #[test]
    fn test_writer_sequence() {
        let mut w = StreamWriter::new(Vec::new(), false);
        w.start_document().unwrap();
        w.start_container(&QName::local("Items")).unwrap();
        w.write_item(&Element::local("Item").with_text("1")).unwrap();
        w.write_item(&Element::local("Item").with_text("2")).unwrap();
        w.end_container().unwrap();
        w.end_document().unwrap();
        assert_eq!(w.items_written(), 2);

        let xml = String::from_utf8(w.into_inner()).unwrap();
        assert_eq!(
            xml,
            r#"<?xml version="1.0" encoding="utf-8"?><Items><Item>1</Item><Item>2</Item></Items>"#
        );
    }

    #[test]
    fn test_empty_container_is_written() {
        let mut w = StreamWriter::new(Vec::new(), false);
        w.start_document().unwrap();
        w.start_container(&QName::local("Items")).unwrap();
        w.end_container().unwrap();
        w.end_document().unwrap();
        let xml = String::from_utf8(w.into_inner()).unwrap();
        assert!(xml.ends_with("<Items></Items>"));
    }

    #[test]
    fn test_writer_rejects_out_of_order_calls() {
        let mut w = StreamWriter::new(Vec::new(), false);
        assert!(matches!(
            w.write_item(&Element::local("Item")),
            Err(Error::State(_))
        ));
        w.start_document().unwrap();
        assert!(matches!(w.end_document(), Err(Error::State(_))));
        w.write_root(&Element::local("Root")).unwrap();
        assert!(matches!(
            w.start_container(&QName::local("Items")),
            Err(Error::State(_))
        ));
        w.end_document().unwrap();
        assert_eq!(w.state(), WriteState::Done);
    }
}
