//! Descriptor types
//!
//! The immutable result of building a schema: one [`TypeDescriptor`] per
//! classified type, one [`RecordDescriptor`] per record, and one
//! [`FieldDescriptor`] per mapped field.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Scalar leaf types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Text
    String,
    /// Boolean
    Bool,
    /// 8-bit signed integer
    I8,
    /// 16-bit signed integer
    I16,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// 8-bit unsigned integer
    U8,
    /// 16-bit unsigned integer
    U16,
    /// 32-bit unsigned integer
    U32,
    /// 64-bit unsigned integer
    U64,
    /// Single precision float
    F32,
    /// Double precision float
    F64,
    /// Exact decimal
    Decimal,
    /// Single character
    Char,
    /// Binary data, base64 encoded
    Bytes,
}

impl ScalarType {
    /// XML Schema name of the type, used as the default item tag
    pub fn xml_name(&self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Bool => "boolean",
            ScalarType::I8 => "byte",
            ScalarType::I16 => "short",
            ScalarType::I32 => "int",
            ScalarType::I64 => "long",
            ScalarType::U8 => "unsignedByte",
            ScalarType::U16 => "unsignedShort",
            ScalarType::U32 => "unsignedInt",
            ScalarType::U64 => "unsignedLong",
            ScalarType::F32 => "float",
            ScalarType::F64 => "double",
            ScalarType::Decimal => "decimal",
            ScalarType::Char => "char",
            ScalarType::Bytes => "base64Binary",
        }
    }
}

/// Temporal leaf types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalType {
    /// Date and time with offset
    DateTime,
    /// Date and time without offset
    NaiveDateTime,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Elapsed time
    Duration,
}

impl TemporalType {
    /// XML Schema name of the type
    pub fn xml_name(&self) -> &'static str {
        match self {
            TemporalType::DateTime | TemporalType::NaiveDateTime => "dateTime",
            TemporalType::Date => "date",
            TemporalType::Time => "time",
            TemporalType::Duration => "duration",
        }
    }
}

/// Raw node carrier kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A whole element subtree
    Element,
    /// A single attribute
    Attribute,
}

/// Bidirectional label map of an enumeration
///
/// On duplicate XML tokens the reverse map keeps the first-declared member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMap {
    /// Declared name of the enumeration
    pub name: String,
    /// Member labels in declaration order
    pub labels: Vec<String>,
    to_token: HashMap<String, String>,
    from_token: HashMap<String, String>,
}

impl EnumMap {
    /// Build a map from `(label, token)` pairs in declaration order
    pub fn new(name: impl Into<String>, members: &[(String, Option<String>)]) -> Self {
        let mut labels = Vec::with_capacity(members.len());
        let mut to_token = HashMap::new();
        let mut from_token = HashMap::new();
        for (label, token) in members {
            labels.push(label.clone());
            if let Some(token) = token {
                to_token.insert(label.clone(), token.clone());
                from_token
                    .entry(token.clone())
                    .or_insert_with(|| label.clone());
            }
        }
        Self {
            name: name.into(),
            labels,
            to_token,
            from_token,
        }
    }

    /// Check if a label is a declared member
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// XML token for a label: the configured token, else the label itself
    pub fn token_for<'a>(&'a self, label: &'a str) -> &'a str {
        self.to_token.get(label).map(|s| s.as_str()).unwrap_or(label)
    }

    /// Label for an XML token: exact token match, else a literal label
    pub fn label_for(&self, token: &str) -> Option<&str> {
        if let Some(label) = self.from_token.get(token) {
            return Some(label);
        }
        self.labels
            .iter()
            .find(|l| l.as_str() == token)
            .map(|l| l.as_str())
    }
}

/// Classified shape of a type
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// Exact scalar type
    Scalar(ScalarType),
    /// Optional scalar, temporal or enum; carries the inner descriptor
    NullableScalar(Arc<TypeDescriptor>),
    /// Date, time or duration
    Temporal(TemporalType),
    /// Enumeration
    Enum(Arc<EnumMap>),
    /// Ordered sequence of items
    Collection(Arc<TypeDescriptor>),
    /// Structured record; fields live in the schema's record table
    Record,
    /// Raw XML node carrier
    RawNode(NodeKind),
}

/// Mapping shape of one type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    /// Classified kind
    pub kind: TypeKind,
    /// Declared type name
    pub declared_name: String,
    /// Whether the type bypasses generic traversal
    pub manual_mapping: bool,
    /// Explicit root element name
    pub root_xml_name: Option<String>,
    /// Namespace of the type's elements
    pub namespace_uri: Option<String>,
}

impl TypeDescriptor {
    /// Create a descriptor for a kind, named after it
    pub fn new(kind: TypeKind, declared_name: impl Into<String>) -> Self {
        Self {
            kind,
            declared_name: declared_name.into(),
            manual_mapping: false,
            root_xml_name: None,
            namespace_uri: None,
        }
    }

    /// Element name used when nothing overrides it
    pub fn default_xml_name(&self) -> &str {
        self.root_xml_name.as_deref().unwrap_or(&self.declared_name)
    }

    /// Whether values of this kind are written as element or attribute text
    pub fn is_leaf(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Scalar(_)
                | TypeKind::NullableScalar(_)
                | TypeKind::Temporal(_)
                | TypeKind::Enum(_)
        )
    }

    /// Descriptor of a nullable's inner type, or self
    pub fn unwrap_nullable(&self) -> &TypeDescriptor {
        match &self.kind {
            TypeKind::NullableScalar(inner) => inner,
            _ => self,
        }
    }

    /// Item descriptor of a collection
    pub fn item(&self) -> Option<&Arc<TypeDescriptor>> {
        match &self.kind {
            TypeKind::Collection(item) => Some(item),
            _ => None,
        }
    }

    /// Whether the kind is a record
    pub fn is_record(&self) -> bool {
        matches!(self.kind, TypeKind::Record)
    }
}

/// Where a field lives in XML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Attribute of the owning element
    Attribute,
    /// Child element
    #[default]
    Element,
    /// Text content of the owning element
    InnerText,
    /// Receives unclaimed child elements
    AnyElementSink,
    /// Receives unclaimed attributes
    AnyAttributeSink,
}

impl Placement {
    /// Whether the placement is a catch-all sink
    pub fn is_sink(&self) -> bool {
        matches!(self, Placement::AnyElementSink | Placement::AnyAttributeSink)
    }
}

/// How a repeated field is framed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionFraming {
    /// Items inside a dedicated container element
    Wrapped {
        /// Container element name
        container: String,
        /// Item element name
        item: Option<String>,
    },
    /// Items are direct children of the owner
    Flattened {
        /// Item element name
        item: Option<String>,
    },
    /// Container element named after the field
    Implicit,
}

impl CollectionFraming {
    /// Explicitly configured item name
    pub fn item_name(&self) -> Option<&str> {
        match self {
            CollectionFraming::Wrapped { item, .. } | CollectionFraming::Flattened { item } => {
                item.as_deref()
            }
            CollectionFraming::Implicit => None,
        }
    }
}

/// One polymorphic substitution: XML tag ↔ concrete record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolymorphicMapping {
    /// Element tag used for the concrete type
    pub xml_tag: String,
    /// Declared name of the concrete type
    pub concrete_type: String,
    /// Whether the concrete type bypasses generic traversal
    pub manual_mapping: bool,
    /// Inheritance depth of the concrete type
    pub depth: usize,
}

/// One mapped field of a record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Declared field name
    pub name: String,
    /// Record that declared the field
    pub declared_in: String,
    /// Classified value type
    pub value_type: Arc<TypeDescriptor>,
    /// XML placement
    pub placement: Placement,
    /// Explicit element name
    pub explicit_xml_name: Option<String>,
    /// Explicit attribute name
    pub attribute_name: Option<String>,
    /// Namespace of the field's element or attribute
    pub namespace_uri: Option<String>,
    /// Explicit rank
    pub order: Option<i32>,
    /// Whether absence is written as a nil-marked element
    pub is_nillable: bool,
    /// Framing of a collection field
    pub collection_framing: Option<CollectionFraming>,
    /// Polymorphic mappings, most derived first
    pub polymorphic_mappings: Vec<PolymorphicMapping>,
    /// Temporal parse patterns; the first one is used for writing
    pub temporal_formats: Vec<String>,
}

impl FieldDescriptor {
    /// Explicit name declared in the schema for this placement
    pub fn explicit_name(&self) -> Option<&str> {
        match self.placement {
            Placement::Attribute => self
                .attribute_name
                .as_deref()
                .or(self.explicit_xml_name.as_deref()),
            _ => self.explicit_xml_name.as_deref(),
        }
    }
}

/// A record type with its resolved field table
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDescriptor {
    /// Type descriptor of the record
    pub descriptor: Arc<TypeDescriptor>,
    /// Fields in mapping order, inherited fields included
    pub fields: Vec<FieldDescriptor>,
    /// Base record
    pub base: Option<String>,
    /// Whether the record is abstract
    pub is_abstract: bool,
    /// Inheritance depth (0 for records without a base)
    pub depth: usize,
}

impl RecordDescriptor {
    /// Declared record name
    pub fn name(&self) -> &str {
        &self.descriptor.declared_name
    }

    /// Field by declared name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field with the given placement
    pub fn field_with_placement(&self, placement: Placement) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.placement == placement)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::NullableScalar(inner) => write!(f, "{}?", inner),
            TypeKind::Collection(item) => write!(f, "[{}]", item),
            _ => write!(f, "{}", self.declared_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(label: &str, token: Option<&str>) -> (String, Option<String>) {
        (label.to_string(), token.map(str::to_string))
    }

    #[test]
    fn test_enum_map_tokens() {
        let map = EnumMap::new(
            "Status",
            &[member("Active", Some("A")), member("Closed", None)],
        );
        assert_eq!(map.token_for("Active"), "A");
        assert_eq!(map.token_for("Closed"), "Closed");
        assert_eq!(map.label_for("A"), Some("Active"));
        assert_eq!(map.label_for("Active"), Some("Active"));
        assert_eq!(map.label_for("Closed"), Some("Closed"));
        assert_eq!(map.label_for("Z"), None);
    }

    #[test]
    fn test_enum_map_first_declared_token_wins() {
        let map = EnumMap::new(
            "Status",
            &[member("Open", Some("O")), member("Opened", Some("O"))],
        );
        assert_eq!(map.label_for("O"), Some("Open"));
        assert_eq!(map.token_for("Opened"), "O");
    }

    #[test]
    fn test_descriptor_display() {
        let int = Arc::new(TypeDescriptor::new(TypeKind::Scalar(ScalarType::I32), "int"));
        let nullable = Arc::new(TypeDescriptor::new(TypeKind::NullableScalar(int.clone()), "int"));
        let list = TypeDescriptor::new(TypeKind::Collection(nullable), "int");
        assert_eq!(list.to_string(), "[int?]");
        assert!(int.is_leaf());
        assert!(!list.is_leaf());
    }
}
