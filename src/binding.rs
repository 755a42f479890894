//! Typed bindings
//!
//! [`XmlValue`] connects a Rust type to the dynamic [`Value`] model and to the
//! [`TypeShape`] the classifier consumes. [`XmlRecord`] types additionally
//! declare their record schema; their schema is built once per type and kept
//! in the process-wide [`SchemaCache`].
//!
//! ```rust,ignore
//! #[derive(Default)]
//! struct Person { id: i32, name: String }
//!
//! impl XmlRecord for Person {
//!     const TYPE_NAME: &'static str = "Person";
//!
//!     fn declare(b: &mut SchemaBuilder) -> RecordDecl {
//!         RecordDecl::new(Self::TYPE_NAME)
//!             .field(b.field::<i32>("Id").attribute())
//!             .field(b.field::<String>("Name"))
//!     }
//!     // to_record / from_record convert field by field
//! }
//!
//! let xml = xmlbind::to_string(&person, &SerializationOptions::default())?;
//! ```

use crate::documents::{Attribute, Element};
use crate::error::{Error, Result};
use crate::locations::Location;
use crate::options::SerializationOptions;
use crate::schema::{RecordDecl, ScalarType, Schema, SchemaBuilder, SchemaCache, TemporalType, TypeShape};
use crate::serializer::{RecordStream, XmlSerializer};
use crate::values::{Record, Temporal, Value};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::any::TypeId;
use std::io::{BufRead, Write};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

/// A Rust type with a place in the value model
pub trait XmlValue: Sized {
    /// Declared shape, as seen by the classifier
    fn shape() -> TypeShape;

    /// Convert to a dynamic value
    fn to_value(&self) -> Value;

    /// Convert from a dynamic value; `Null` gives the type's default where it has one
    fn from_value(value: Value) -> Result<Self>;

    /// Declare the named types this type refers to
    fn register(_builder: &mut SchemaBuilder) {}
}

/// A record type that declares its own schema
pub trait XmlRecord: Default + 'static {
    /// Declared type name, unique within a schema
    const TYPE_NAME: &'static str;

    /// Declare the record's fields, registering referenced types on `builder`
    fn declare(builder: &mut SchemaBuilder) -> RecordDecl;

    /// Convert to a record value
    fn to_record(&self) -> Record;

    /// Build from a record value
    fn from_record(record: Record) -> Result<Self>;
}

impl<T: XmlRecord> XmlValue for T {
    fn shape() -> TypeShape {
        TypeShape::named(T::TYPE_NAME)
    }

    fn to_value(&self) -> Value {
        Value::Record(self.to_record())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(T::default()),
            Value::Record(record) => T::from_record(record),
            other => Err(mismatch(&other, T::TYPE_NAME)),
        }
    }

    fn register(builder: &mut SchemaBuilder) {
        builder.record::<T>();
    }
}

fn mismatch(value: &Value, target: &str) -> Error {
    Error::Value(format!("cannot convert a {} value to {}", value.kind_name(), target))
}

fn out_of_range(n: impl std::fmt::Display, target: &str) -> Error {
    Error::Value(format!("{} is out of range for {}", n, target))
}

impl XmlValue for String {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarType::String)
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s),
            Value::Char(c) => Ok(c.to_string()),
            other => Err(mismatch(&other, "String")),
        }
    }
}

impl XmlValue for bool {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarType::Bool)
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(&other, "bool")),
        }
    }
}

impl XmlValue for char {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarType::Char)
    }

    fn to_value(&self) -> Value {
        Value::Char(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(char::default()),
            Value::Char(c) => Ok(c),
            other => Err(mismatch(&other, "char")),
        }
    }
}

macro_rules! integer_value {
    ($($ty:ty => $scalar:ident, $variant:ident, $wide:ty);* $(;)?) => {
        $(
            impl XmlValue for $ty {
                fn shape() -> TypeShape {
                    TypeShape::Scalar(ScalarType::$scalar)
                }

                fn to_value(&self) -> Value {
                    Value::$variant(*self as $wide)
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Null => Ok(0),
                        Value::Int(i) => <$ty>::try_from(i).map_err(|_| out_of_range(i, stringify!($ty))),
                        Value::UInt(u) => <$ty>::try_from(u).map_err(|_| out_of_range(u, stringify!($ty))),
                        other => Err(mismatch(&other, stringify!($ty))),
                    }
                }
            }
        )*
    };
}

integer_value! {
    i8 => I8, Int, i64;
    i16 => I16, Int, i64;
    i32 => I32, Int, i64;
    i64 => I64, Int, i64;
    u8 => U8, UInt, u64;
    u16 => U16, UInt, u64;
    u32 => U32, UInt, u64;
    u64 => U64, UInt, u64;
}

impl XmlValue for f32 {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarType::F32)
    }

    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }

    fn from_value(value: Value) -> Result<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl XmlValue for f64 {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarType::F64)
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(0.0),
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            Value::UInt(u) => Ok(u as f64),
            other => Err(mismatch(&other, "f64")),
        }
    }
}

impl XmlValue for Decimal {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarType::Decimal)
    }

    fn to_value(&self) -> Value {
        Value::Decimal(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Decimal::ZERO),
            Value::Decimal(d) => Ok(d),
            Value::Int(i) => Ok(Decimal::from(i)),
            Value::UInt(u) => Ok(Decimal::from(u)),
            other => Err(mismatch(&other, "Decimal")),
        }
    }
}

/// Binary data, written as base64
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Binary(pub Vec<u8>);

impl From<Vec<u8>> for Binary {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl XmlValue for Binary {
    fn shape() -> TypeShape {
        TypeShape::Scalar(ScalarType::Bytes)
    }

    fn to_value(&self) -> Value {
        Value::Bytes(self.0.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Binary::default()),
            Value::Bytes(b) => Ok(Binary(b)),
            other => Err(mismatch(&other, "Binary")),
        }
    }
}

macro_rules! temporal_value {
    ($($ty:ty => $kind:ident, $variant:ident, $default:expr);* $(;)?) => {
        $(
            impl XmlValue for $ty {
                fn shape() -> TypeShape {
                    TypeShape::Temporal(TemporalType::$kind)
                }

                fn to_value(&self) -> Value {
                    Value::Temporal(Temporal::$variant(*self))
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Null => Ok($default),
                        Value::Temporal(Temporal::$variant(t)) => Ok(t),
                        other => Err(mismatch(&other, stringify!($ty))),
                    }
                }
            }
        )*
    };
}

temporal_value! {
    DateTime<FixedOffset> => DateTime, DateTime, DateTime::<FixedOffset>::default();
    NaiveDateTime => NaiveDateTime, NaiveDateTime, NaiveDateTime::default();
    NaiveDate => Date, Date, NaiveDate::default();
    NaiveTime => Time, Time, NaiveTime::default();
    chrono::Duration => Duration, Duration, chrono::Duration::zero();
}

impl<T: XmlValue> XmlValue for Option<T> {
    fn shape() -> TypeShape {
        TypeShape::optional(T::shape())
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn register(builder: &mut SchemaBuilder) {
        T::register(builder);
    }
}

impl<T: XmlValue> XmlValue for Vec<T> {
    fn shape() -> TypeShape {
        TypeShape::sequence(T::shape())
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(XmlValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch(&other, "Vec")),
        }
    }

    fn register(builder: &mut SchemaBuilder) {
        T::register(builder);
    }
}

impl XmlValue for Element {
    fn shape() -> TypeShape {
        TypeShape::Element
    }

    fn to_value(&self) -> Value {
        Value::Node(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Node(element) => Ok(element),
            other => Err(mismatch(&other, "Element")),
        }
    }
}

impl XmlValue for Attribute {
    fn shape() -> TypeShape {
        TypeShape::Attribute
    }

    fn to_value(&self) -> Value {
        Value::Attribute(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Attribute(attribute) => Ok(attribute),
            other => Err(mismatch(&other, "Attribute")),
        }
    }
}

/// The cached schema of a record type
pub fn schema_for<T: XmlRecord>() -> Result<Arc<Schema>> {
    SchemaCache::global().get_or_build(TypeId::of::<T>(), || {
        let mut builder = SchemaBuilder::new();
        builder.record::<T>();
        builder.build(T::TYPE_NAME)
    })
}

/// A serializer for a record type
pub fn serializer_for<T: XmlRecord>(options: &SerializationOptions) -> Result<XmlSerializer> {
    Ok(XmlSerializer::new(schema_for::<T>()?).with_options(options.clone()))
}

/// Write a value as a document string
pub fn to_string<T: XmlRecord>(value: &T, options: &SerializationOptions) -> Result<String> {
    serializer_for::<T>(options)?.to_string(&value.to_record())
}

/// Write a value as an element subtree
pub fn write_one<T: XmlRecord>(value: &T, options: &SerializationOptions) -> Result<Element> {
    serializer_for::<T>(options)?.write_one(&value.to_record())
}

/// Write a value as a document to a sink
pub fn write_document<T: XmlRecord, W: Write>(value: &T, sink: W, options: &SerializationOptions) -> Result<()> {
    serializer_for::<T>(options)?.write_document(&value.to_record(), sink)
}

/// Stream values into a container element
pub fn write_many<'a, T, I, W>(
    values: I,
    sink: W,
    container: &str,
    item_name: Option<&str>,
    options: &SerializationOptions,
) -> Result<()>
where
    T: XmlRecord,
    I: IntoIterator<Item = &'a T>,
    W: Write,
{
    let serializer = serializer_for::<T>(options)?;
    let records = values.into_iter().map(XmlRecord::to_record);
    serializer.write_many(records, sink, container, item_name)
}

/// Read a value from a document string
///
/// `None` when the root element does not match the type, or when mapping
/// failed and failures are tolerated.
pub fn from_str<T: XmlRecord>(xml: &str, options: &SerializationOptions) -> Result<Option<T>> {
    let record = serializer_for::<T>(options)?.from_str(xml)?;
    convert_one(record, options)
}

/// Read a value from the root of a streamed document
pub fn read_one<T: XmlRecord, R: BufRead>(source: R, options: &SerializationOptions) -> Result<Option<T>> {
    let record = serializer_for::<T>(options)?.read_one(source)?;
    convert_one(record, options)
}

/// Read a value from a file, string or byte location
pub fn read_one_from<T: XmlRecord>(location: &Location, options: &SerializationOptions) -> Result<Option<T>> {
    let record = serializer_for::<T>(options)?.read_one_from(location)?;
    convert_one(record, options)
}

fn convert_one<T: XmlRecord>(record: Option<Record>, options: &SerializationOptions) -> Result<Option<T>> {
    match record.map(T::from_record) {
        None => Ok(None),
        Some(Ok(value)) => Ok(Some(value)),
        Some(Err(e)) if options.ignore_parsing_errors() => {
            warn!(error = %e, type_name = T::TYPE_NAME, "ignoring value that failed to convert");
            Ok(None)
        }
        Some(Err(e)) => Err(e),
    }
}

/// Lazily read every item element of a stream
pub fn read_many<T: XmlRecord, R: BufRead>(
    source: R,
    item_name: Option<&str>,
    options: &SerializationOptions,
) -> Result<ItemStream<T, R>> {
    let records = serializer_for::<T>(options)?.read_many(source, item_name);
    Ok(ItemStream::new(records, options))
}

/// Lazily read the items inside the container at `path`
pub fn read_nested_many<T: XmlRecord, R: BufRead>(
    source: R,
    path: &[String],
    item_name: Option<&str>,
    options: &SerializationOptions,
) -> Result<ItemStream<T, R>> {
    let records = serializer_for::<T>(options)?.read_nested_many(source, path, item_name);
    Ok(ItemStream::new(records, options))
}

/// Lazily read items from a file, string or byte location
pub fn read_many_from<T: XmlRecord>(
    location: &Location,
    item_name: Option<&str>,
    options: &SerializationOptions,
) -> Result<ItemStream<T, Box<dyn BufRead>>> {
    let records = serializer_for::<T>(options)?.read_many_from(location, item_name)?;
    Ok(ItemStream::new(records, options))
}

/// Typed view over a [`RecordStream`]
pub struct ItemStream<T, R: BufRead> {
    records: RecordStream<R>,
    ignore_errors: bool,
    finished: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: XmlRecord, R: BufRead> ItemStream<T, R> {
    fn new(records: RecordStream<R>, options: &SerializationOptions) -> Self {
        Self {
            records,
            ignore_errors: options.ignore_parsing_errors(),
            finished: false,
            _marker: PhantomData,
        }
    }
}

impl<T: XmlRecord, R: BufRead> Iterator for ItemStream<T, R> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };
            match T::from_record(record) {
                Ok(value) => return Some(Ok(value)),
                Err(e) if self.ignore_errors => {
                    warn!(error = %e, type_name = T::TYPE_NAME, "skipping item that failed to convert");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumDecl, TypeKind};
    use chrono::TimeZone;

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    enum Level {
        #[default]
        Low,
        High,
    }

    impl XmlValue for Level {
        fn shape() -> TypeShape {
            TypeShape::named("Level")
        }

        fn to_value(&self) -> Value {
            Value::Enum(format!("{:?}", self))
        }

        fn from_value(value: Value) -> Result<Self> {
            match value {
                Value::Null => Ok(Level::default()),
                Value::Enum(label) if label == "Low" => Ok(Level::Low),
                Value::Enum(label) if label == "High" => Ok(Level::High),
                other => Err(mismatch(&other, "Level")),
            }
        }

        fn register(builder: &mut SchemaBuilder) {
            if !builder.has_type("Level") {
                builder.add_enum(EnumDecl::new("Level").member("Low").member_as("High", "HI"));
            }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Sensor {
        id: u16,
        level: Level,
        readings: Vec<f64>,
        seen: Option<NaiveDate>,
    }

    impl XmlRecord for Sensor {
        const TYPE_NAME: &'static str = "Sensor";

        fn declare(b: &mut SchemaBuilder) -> RecordDecl {
            RecordDecl::new(Self::TYPE_NAME)
                .field(b.field::<u16>("Id").attribute())
                .field(b.field::<Level>("Level"))
                .field(b.field::<Vec<f64>>("Readings").wrapped("Readings").item_name("R"))
                .field(b.field::<Option<NaiveDate>>("Seen"))
        }

        fn to_record(&self) -> Record {
            Record::new(Self::TYPE_NAME)
                .with("Id", self.id.to_value())
                .with("Level", self.level.to_value())
                .with("Readings", self.readings.to_value())
                .with("Seen", self.seen.to_value())
        }

        fn from_record(mut record: Record) -> Result<Self> {
            Ok(Self {
                id: record.take_as("Id")?,
                level: record.take_as("Level")?,
                readings: record.take_as("Readings")?,
                seen: record.take_as("Seen")?,
            })
        }
    }

    #[test]
    fn test_shapes_classify() {
        let schema = schema_for::<Sensor>().unwrap();
        let root = schema.root();
        assert_eq!(root.name(), "Sensor");
        assert!(matches!(root.field("Level").unwrap().value_type.kind, TypeKind::Enum(_)));
        assert!(matches!(root.field("Seen").unwrap().value_type.kind, TypeKind::NullableScalar(_)));
        // cached per type
        assert!(Arc::ptr_eq(&schema, &schema_for::<Sensor>().unwrap()));
    }

    #[test]
    fn test_typed_round_trip() {
        let sensor = Sensor {
            id: 12,
            level: Level::High,
            readings: vec![1.5, -2.0],
            seen: NaiveDate::from_ymd_opt(2024, 2, 29),
        };
        let options = SerializationOptions::default();
        let xml = to_string(&sensor, &options).unwrap();
        assert!(xml.contains("<Level>HI</Level>"));
        assert!(xml.contains("<Readings><R>1.5</R><R>-2</R></Readings>"));

        let back: Sensor = from_str(&xml, &options).unwrap().unwrap();
        assert_eq!(back, sensor);
    }

    #[test]
    fn test_null_defaults() {
        assert_eq!(String::from_value(Value::Null).unwrap(), "");
        assert_eq!(i32::from_value(Value::Null).unwrap(), 0);
        assert_eq!(Option::<i32>::from_value(Value::Null).unwrap(), None);
        assert!(Vec::<String>::from_value(Value::Null).unwrap().is_empty());
        assert!(Element::from_value(Value::Null).is_err());
    }

    #[test]
    fn test_integer_range_checks() {
        assert_eq!(u8::from_value(Value::Int(255)).unwrap(), 255);
        assert!(u8::from_value(Value::Int(256)).is_err());
        assert!(u32::from_value(Value::Int(-1)).is_err());
        assert_eq!(i64::from_value(Value::UInt(7)).unwrap(), 7);
    }

    #[test]
    fn test_temporal_values() {
        let dt = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 1, 8, 30, 0)
            .unwrap();
        assert_eq!(DateTime::<FixedOffset>::from_value(dt.to_value()).unwrap(), dt);
        assert!(NaiveTime::from_value(Value::Int(1)).is_err());
        assert_eq!(chrono::Duration::from_value(Value::Null).unwrap(), chrono::Duration::zero());
    }

    #[test]
    fn test_binary() {
        let data = Binary(vec![0, 1, 2, 255]);
        assert_eq!(Binary::from_value(data.to_value()).unwrap(), data);
    }
}
