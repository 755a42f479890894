//! Source locations
//!
//! Where a document comes from: a file on disk, or text/bytes already in
//! memory.

use std::path::PathBuf;

/// Resource location - a file path or in-memory content
#[derive(Debug, Clone)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// In-memory XML text
    String(String),
    /// In-memory XML bytes
    Bytes(Vec<u8>),
}

impl Location {
    /// Create a location from a string (auto-detect type)
    ///
    /// Markup (anything starting with `<` after leading whitespace) is taken
    /// as content; everything else is a path.
    pub fn from_str(s: &str) -> Self {
        if s.trim_start().starts_with('<') {
            Location::String(s.to_string())
        } else {
            Location::Path(PathBuf::from(s))
        }
    }

    /// Describe the location for diagnostics
    pub fn describe(&self) -> String {
        match self {
            Location::Path(p) => p.to_string_lossy().to_string(),
            Location::String(_) => "<string>".to_string(),
            Location::Bytes(_) => "<bytes>".to_string(),
        }
    }

    /// Check if this is a local file
    pub fn is_file(&self) -> bool {
        matches!(self, Location::Path(_))
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Location::Path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_markup() {
        let loc = Location::from_str("  <Orders/>");
        assert!(matches!(loc, Location::String(_)));
        assert_eq!(loc.describe(), "<string>");
    }

    #[test]
    fn test_location_from_path() {
        let loc = Location::from_str("/tmp/orders.xml");
        assert!(loc.is_file());
        assert_eq!(loc.describe(), "/tmp/orders.xml");
    }
}
