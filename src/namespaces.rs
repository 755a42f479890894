//! XML namespace handling
//!
//! Qualified names and the namespace scope used when emitting elements.
//! Writing tags namespaces by URI only: elements carry a default-namespace
//! declaration wherever their namespace differs from the inherited one, and
//! namespaced attributes get a generated prefix (`xsi` for the
//! schema-instance namespace, `nsN` otherwise).

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// XML namespace (bound to the `xml` prefix by definition)
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// XML Schema instance namespace, home of the `nil` marker
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }

    /// The `xsi:nil` attribute name
    pub fn xsi_nil() -> Self {
        Self::namespaced(XSI_NAMESPACE, "nil")
    }

    /// Namespace URI, if any
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl fmt::Display for QName {
    /// Clark notation: `{uri}local`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// Namespace scope for resolving prefixes (reading) and allocating them (writing)
#[derive(Debug, Clone, Default)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI
    prefixes: HashMap<Prefix, NamespaceUri>,
    /// Default namespace (no prefix)
    default_namespace: Option<NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace; `None` undeclares it
    pub fn set_default_namespace(&mut self, namespace: Option<&str>) {
        self.default_namespace = namespace.map(str::to_string);
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Find a prefix already bound to `namespace`
    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        if namespace == XML_NAMESPACE {
            return Some("xml");
        }
        self.prefixes
            .iter()
            .filter(|(_, uri)| uri.as_str() == namespace)
            .map(|(prefix, _)| prefix.as_str())
            .min()
    }

    /// Bind a fresh prefix for `namespace` and return it
    pub fn allocate_prefix(&mut self, namespace: &str) -> String {
        let preferred = if namespace == XSI_NAMESPACE { Some("xsi") } else { None };
        if let Some(p) = preferred {
            if !self.prefixes.contains_key(p) {
                self.add_prefix(p, namespace);
                return p.to_string();
            }
        }
        let mut index = self.prefixes.len();
        loop {
            let candidate = format!("ns{}", index);
            if !self.prefixes.contains_key(&candidate) {
                self.add_prefix(candidate.clone(), namespace);
                return candidate;
            }
            index += 1;
        }
    }

    /// Resolve a prefixed name to a QName
    pub fn resolve(&self, prefixed_name: &str) -> Result<QName> {
        if let Some((prefix, local)) = prefixed_name.split_once(':') {
            if prefix == "xml" {
                return Ok(QName::namespaced(XML_NAMESPACE, local));
            }
            let namespace = self
                .get_namespace(prefix)
                .ok_or_else(|| Error::Name(format!("Unknown prefix: {}", prefix)))?;
            Ok(QName::namespaced(namespace, local))
        } else {
            Ok(QName::new(self.default_namespace.clone(), prefixed_name))
        }
    }
}
