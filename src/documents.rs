//! XML document model
//!
//! An owned element tree with namespace-qualified names. Whole documents are
//! parsed with `roxmltree`; the streaming reader builds the same [`Element`]
//! type one subtree at a time. Writing goes through `quick-xml`.

use crate::error::{Error, ParseError, Result};
use crate::limits::Limits;
use crate::namespaces::{NamespaceContext, QName};
use indexmap::IndexMap;
use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute as XmlAttribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::borrow::Cow;
use std::io::Write;

/// A single XML attribute, as captured by an any-attribute sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name
    pub name: QName,
    /// Attribute value
    pub value: String,
}

impl Attribute {
    /// Create a new attribute
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// XML Element in the document tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Element qualified name
    pub qname: QName,
    /// Element attributes, in document order
    pub attributes: IndexMap<QName, String>,
    /// Text content (if any)
    pub text: Option<String>,
    /// Child elements
    pub children: Vec<Element>,
}

impl Element {
    /// Create a new element
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            attributes: IndexMap::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Create a new element without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self::new(QName::local(local_name))
    }

    /// Get the local name of the element
    pub fn local_name(&self) -> &str {
        &self.qname.local_name
    }

    /// Get the namespace of the element
    pub fn namespace(&self) -> Option<&str> {
        self.qname.namespace.as_deref()
    }

    /// Get an attribute value by local name, ignoring namespaces
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(qname, _)| qname.local_name == name)
            .map(|(_, value)| value.as_str())
    }

    /// Get an attribute value by qualified name
    pub fn get_attribute_qname(&self, qname: &QName) -> Option<&str> {
        self.attributes.get(qname).map(|s| s.as_str())
    }

    /// Set an attribute, replacing any previous value
    pub fn set_attribute(&mut self, name: QName, value: impl Into<String>) {
        self.attributes.insert(name, value.into());
    }

    /// Add a child element
    pub fn add_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Set text content
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Text content, empty when the element has none
    pub fn text_content(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// First child with exactly this qualified name
    pub fn find_child(&self, qname: &QName) -> Option<&Element> {
        self.children.iter().find(|e| &e.qname == qname)
    }

    /// Find child elements by local name
    pub fn find_children(&self, local_name: &str) -> Vec<&Element> {
        self.children
            .iter()
            .filter(|e| e.local_name() == local_name)
            .collect()
    }

    /// Whether the element carries `xsi:nil="true"`
    pub fn is_nil(&self) -> bool {
        matches!(
            self.get_attribute_qname(&QName::xsi_nil()).map(str::trim),
            Some("true") | Some("1")
        )
    }

    /// Mark the element as nil
    pub fn set_nil(&mut self) {
        self.set_attribute(QName::xsi_nil(), "true");
    }

    /// Builder: add an attribute
    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder: set the text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    /// Builder: add a child
    pub fn with_child(mut self, child: Element) -> Self {
        self.add_child(child);
        self
    }

    /// The same element under another name
    pub fn renamed(mut self, qname: QName) -> Self {
        self.qname = qname;
        self
    }

    /// Serialize this element (without an XML declaration)
    pub fn to_xml_string(&self, indent: bool) -> Result<String> {
        let mut writer = new_writer(Vec::new(), indent);
        write_element(&mut writer, self, &NamespaceContext::new())?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| Error::Xml(format!("Writer produced invalid UTF-8: {}", e)))
    }

    /// Drop whitespace-only text on elements that have child elements
    pub(crate) fn normalize_text(&mut self) {
        if !self.children.is_empty()
            && self.text.as_deref().map_or(false, |t| t.trim().is_empty())
        {
            self.text = None;
        }
    }
}

/// XML Document representation
#[derive(Debug, Default)]
pub struct Document {
    /// Root element of the document
    pub root: Option<Element>,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document around a root element
    pub fn with_root(root: Element) -> Self {
        Self { root: Some(root) }
    }

    /// Parse an XML document from a string
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::from_string_with_limits(xml, &Limits::default())
    }

    /// Parse an XML document from a string, enforcing limits
    pub fn from_string_with_limits(xml: &str, limits: &Limits) -> Result<Self> {
        limits.check_xml_size(xml.len())?;

        let doc = roxmltree::Document::parse(xml).map_err(|e| {
            Error::Parse(ParseError::new(format!("Error parsing XML: {}", e)))
        })?;

        let root = convert_node(doc.root_element(), limits, 1)?;
        Ok(Self { root: Some(root) })
    }

    /// Parse an XML document from bytes
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(xml)
            .map_err(|e| Error::Parse(ParseError::new(format!("Invalid UTF-8: {}", e))))?;
        Self::from_string(text)
    }

    /// Get the root element
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    /// Write the document, with an XML declaration, to a sink
    pub fn write_to<W: Write>(&self, sink: W, indent: bool) -> Result<()> {
        let mut writer = new_writer(sink, indent);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        if let Some(root) = &self.root {
            write_element(&mut writer, root, &NamespaceContext::new())?;
        }
        writer.get_mut().flush()?;
        Ok(())
    }

    /// Serialize the document to a string
    pub fn to_string(&self, indent: bool) -> Result<String> {
        let mut buf = Vec::new();
        self.write_to(&mut buf, indent)?;
        String::from_utf8(buf)
            .map_err(|e| Error::Xml(format!("Writer produced invalid UTF-8: {}", e)))
    }
}

fn convert_node(node: roxmltree::Node<'_, '_>, limits: &Limits, depth: usize) -> Result<Element> {
    limits.check_xml_depth(depth)?;

    let tag = node.tag_name();
    let mut element = Element::new(QName::new(tag.namespace(), tag.name()));

    limits.check_attributes(node.attributes().count())?;
    for attr in node.attributes() {
        element.set_attribute(QName::new(attr.namespace(), attr.name()), attr.value());
    }

    let mut text: Option<String> = None;
    for child in node.children() {
        if child.is_element() {
            element.add_child(convert_node(child, limits, depth + 1)?);
        } else if child.is_text() {
            if let Some(t) = child.text() {
                text.get_or_insert_with(String::new).push_str(t);
            }
        }
    }
    element.text = text;
    element.normalize_text();

    Ok(element)
}

pub(crate) fn new_writer<W: Write>(sink: W, indent: bool) -> Writer<W> {
    if indent {
        Writer::new_with_indent(sink, b' ', 2)
    } else {
        Writer::new(sink)
    }
}

/// Write one element subtree, declaring namespaces relative to `scope`
pub(crate) fn write_element<W: Write>(
    writer: &mut Writer<W>,
    element: &Element,
    scope: &NamespaceContext,
) -> Result<()> {
    let mut scope = scope.clone();
    let mut start = BytesStart::new(element.local_name());

    if element.namespace() != scope.get_default_namespace() {
        start.push_attribute(("xmlns", element.namespace().unwrap_or("")));
        scope.set_default_namespace(element.namespace());
    }

    let mut declarations: Vec<(String, String)> = Vec::new();
    let mut attributes: Vec<(String, &str)> = Vec::with_capacity(element.attributes.len());
    for (name, value) in &element.attributes {
        let key = match name.namespace() {
            None => name.local_name.clone(),
            Some(ns) => {
                let prefix = match scope.prefix_for(ns) {
                    Some(p) => p.to_string(),
                    None => {
                        let p = scope.allocate_prefix(ns);
                        declarations.push((format!("xmlns:{}", p), ns.to_string()));
                        p
                    }
                };
                format!("{}:{}", prefix, name.local_name)
            }
        };
        attributes.push((key, value.as_str()));
    }
    for (key, uri) in &declarations {
        start.push_attribute((key.as_str(), uri.as_str()));
    }
    for (key, value) in &attributes {
        start.push_attribute(XmlAttribute {
            key: quick_xml::name::QName(key.as_bytes()),
            value: Cow::Owned(escape_attribute(value).into_bytes()),
        });
    }

    let text = element.text.as_deref().filter(|t| !t.is_empty());
    if element.children.is_empty() && text.is_none() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if let Some(t) = text {
        writer.write_event(Event::Text(BytesText::from_escaped(escape_text(t))))?;
    }
    for child in &element.children {
        write_element(writer, child, &scope)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.local_name())))?;
    Ok(())
}

/// Escape attribute text so that parsers keep its whitespace verbatim
pub(crate) fn escape_attribute(value: &str) -> String {
    escape(value)
        .replace('\t', "&#9;")
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
}

/// Escape element text; carriage returns would otherwise be folded into line feeds
pub(crate) fn escape_text(text: &str) -> String {
    escape(text).replace('\r', "&#13;")
}

/// Line-end normalization applied to raw text before entity expansion
pub(crate) fn normalize_line_ends(raw: &str) -> Cow<'_, str> {
    if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(raw)
    }
}

/// Attribute-value normalization applied to a raw value before entity expansion
pub(crate) fn normalize_attribute_value(raw: &str) -> Cow<'_, str> {
    if raw.contains(&['\t', '\n', '\r'][..]) {
        Cow::Owned(
            normalize_line_ends(raw)
                .chars()
                .map(|c| if matches!(c, '\t' | '\n') { ' ' } else { c })
                .collect(),
        )
    } else {
        Cow::Borrowed(raw)
    }
}
