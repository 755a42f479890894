//! Record ↔ element mapping
//!
//! The mapping engine walks a [`Schema`](crate::schema::Schema) to turn
//! dynamic [`Record`](crate::values::Record) values into element trees and
//! back. Leaf conversion, name resolution, polymorphic dispatch, collection
//! framing and catch-all capture each live in their own module.

pub mod catchall;
pub mod collections;
pub mod conversion;
pub mod manual;
pub mod naming;
pub mod polymorphic;
pub mod records;

pub use catchall::Claims;
pub use manual::ManualMapping;
pub use naming::{resolve_field_name, resolve_root_name};
pub use records::RecordMapper;
