//! Hand-written mappings
//!
//! A record type registered with a [`ManualMapping`] skips generic field
//! traversal entirely; the mapper produces and consumes the element itself.

use crate::documents::Element;
use crate::error::Result;
use crate::options::SerializationOptions;
use crate::values::Record;

/// Custom conversion for one record type
pub trait ManualMapping: Send + Sync {
    /// Produce the element for a record
    ///
    /// The engine renames the element when the record is written under a
    /// different tag (collection items, polymorphic tags).
    fn write(&self, record: &Record, options: &SerializationOptions) -> Result<Element>;

    /// Build a record from its element
    fn read(&self, element: &Element, options: &SerializationOptions) -> Result<Record>;
}
