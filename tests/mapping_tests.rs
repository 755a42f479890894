//! Integration tests for record ↔ element mapping
//!
//! Each test builds a small schema with the declarative builder and checks
//! the XML produced or consumed by the serializer.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use xmlbind::schema::{ScalarType, TypeShape};
use xmlbind::{
    Document, Element, Error, FieldDecl, FieldSettings, ManualMapping, NamingPolicy, RecordDecl,
    Record, Result, Schema, SerializationOptions, Value, XmlSerializer,
};

fn text() -> TypeShape {
    TypeShape::Scalar(ScalarType::String)
}

fn int() -> TypeShape {
    TypeShape::Scalar(ScalarType::I32)
}

fn boolean() -> TypeShape {
    TypeShape::Scalar(ScalarType::Bool)
}

fn serializer(builder: xmlbind::SchemaBuilder, root: &str) -> XmlSerializer {
    XmlSerializer::new(Arc::new(builder.build(root).unwrap()))
}

fn write(serializer: &XmlSerializer, record: &Record) -> String {
    serializer.write_one(record).unwrap().to_xml_string(false).unwrap()
}

// Polymorphic dispatch

fn zoo() -> XmlSerializer {
    let mut builder = Schema::builder();
    builder
        .add_record(RecordDecl::new("Animal").abstract_record().field(FieldDecl::new("Name", text())))
        .add_record(RecordDecl::new("Cat").extends("Animal").field(FieldDecl::new("Lives", int())))
        .add_record(RecordDecl::new("Dog").extends("Animal").field(FieldDecl::new("Loud", boolean())))
        .add_record(
            RecordDecl::new("Owner")
                .field(
                    FieldDecl::new("Pet", TypeShape::named("Animal"))
                        .polymorphic("catTag", "Cat")
                        .polymorphic("dogTag", "Dog"),
                )
                .field(
                    FieldDecl::new("Pets", TypeShape::sequence(TypeShape::named("Animal")))
                        .wrapped("Pets")
                        .polymorphic("catTag", "Cat")
                        .polymorphic("dogTag", "Dog"),
                ),
        );
    serializer(builder, "Owner")
}

fn cat(name: &str, lives: i64) -> Value {
    Value::Record(Record::new("Cat").with("Name", name).with("Lives", Value::Int(lives)))
}

fn dog(name: &str, loud: bool) -> Value {
    Value::Record(Record::new("Dog").with("Name", name).with("Loud", loud))
}

#[test]
fn test_polymorphic_values_use_their_tags() {
    let zoo = zoo();
    let owner = Record::new("Owner")
        .with("Pet", dog("Rex", true))
        .with("Pets", Value::List(vec![cat("Tom", 9), dog("Fido", false)]));

    let xml = write(&zoo, &owner);
    assert_eq!(
        xml,
        "<Owner><dogTag><Name>Rex</Name><Loud>true</Loud></dogTag>\
         <Pets><catTag><Name>Tom</Name><Lives>9</Lives></catTag>\
         <dogTag><Name>Fido</Name><Loud>false</Loud></dogTag></Pets></Owner>"
    );

    let back = zoo.from_str(&xml).unwrap().unwrap();
    assert_eq!(back, owner);
}

#[test]
fn test_unmapped_tag_is_skipped() {
    let zoo = zoo();
    let xml = "<Owner><Pets>\
               <catTag><Name>Tom</Name><Lives>9</Lives></catTag>\
               <birdTag><Name>Tweety</Name></birdTag>\
               <dogTag><Name>Fido</Name><Loud>false</Loud></dogTag>\
               </Pets></Owner>";

    let owner = zoo.from_str(xml).unwrap().unwrap();
    assert_eq!(owner.get("Pet"), Some(&Value::Null));
    assert_eq!(
        owner.get("Pets"),
        Some(&Value::List(vec![cat("Tom", 9), dog("Fido", false)]))
    );
}

#[test]
fn test_mappings_from_options() {
    let mut builder = Schema::builder();
    builder
        .add_record(RecordDecl::new("Animal").abstract_record().field(FieldDecl::new("Name", text())))
        .add_record(RecordDecl::new("Dog").extends("Animal").field(FieldDecl::new("Loud", boolean())))
        .add_record(RecordDecl::new("Kennel").field(FieldDecl::new("Resident", TypeShape::named("Animal"))));
    let options = SerializationOptions::new().with_field_settings(
        "Kennel",
        "Resident",
        FieldSettings::new().with_mapping("hound", "Dog"),
    );
    let kennel = serializer(builder, "Kennel").with_options(options);

    let record = Record::new("Kennel").with("Resident", dog("Rex", false));
    let xml = write(&kennel, &record);
    assert_eq!(xml, "<Kennel><hound><Name>Rex</Name><Loud>false</Loud></hound></Kennel>");
    assert_eq!(kennel.from_str(&xml).unwrap(), Some(record));
}

// Catch-all capture

#[test]
fn test_catch_all_keeps_unclaimed_elements() {
    let mut builder = Schema::builder();
    builder.add_record(
        RecordDecl::new("Root")
            .field(FieldDecl::new("id", int()))
            .field(FieldDecl::new("Rest", TypeShape::sequence(TypeShape::Element)).any_elements()),
    );
    let root = serializer(builder, "Root");

    let record = root
        .from_str("<Root><id>1</id><extra>x</extra></Root>")
        .unwrap()
        .unwrap();
    assert_eq!(record.get("id"), Some(&Value::Int(1)));
    assert_eq!(
        record.get("Rest"),
        Some(&Value::List(vec![Value::Node(Element::local("extra").with_text("x"))]))
    );

    assert_eq!(write(&root, &record), "<Root><id>1</id><extra>x</extra></Root>");
}

#[test]
fn test_catch_all_attributes_skip_nil_marker() {
    let mut builder = Schema::builder();
    builder.add_record(
        RecordDecl::new("Tagged")
            .field(FieldDecl::new("Id", int()).attribute())
            .field(FieldDecl::new("Body", text()).inner_text())
            .field(FieldDecl::new("Other", TypeShape::sequence(TypeShape::Attribute)).any_attributes()),
    );
    let tagged = serializer(builder, "Tagged");

    let record = tagged
        .from_str(r#"<Tagged Id="3" lang="en">hello</Tagged>"#)
        .unwrap()
        .unwrap();
    assert_eq!(record.get("Id"), Some(&Value::Int(3)));
    assert_eq!(record.get("Body"), Some(&Value::from("hello")));
    assert_eq!(record.get("Other").and_then(Value::as_list).map(<[Value]>::len), Some(1));
    assert_eq!(write(&tagged, &record), r#"<Tagged Id="3" lang="en">hello</Tagged>"#);
}

// Nil handling

fn counter() -> XmlSerializer {
    let mut builder = Schema::builder();
    builder.add_record(
        RecordDecl::new("Row")
            .field(FieldDecl::new("Id", int()).attribute())
            .field(FieldDecl::new("Count", TypeShape::optional(int()))),
    );
    serializer(builder, "Row")
}

#[test]
fn test_nil_marker_round_trips_to_absent() {
    let row = counter();
    let record = Record::new("Row").with("Id", Value::Int(1)).with("Count", Value::Null);

    let xml = write(&row, &record);
    assert_eq!(
        xml,
        r#"<Row Id="1"><Count xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:nil="true"/></Row>"#
    );
    assert_eq!(row.from_str(&xml).unwrap(), Some(record));
}

#[test]
fn test_ignore_null_values_omits_element() {
    let row = counter().with_options(SerializationOptions::new().with_ignore_null_values(true));
    let record = Record::new("Row").with("Id", Value::Int(1)).with("Count", Value::Null);

    let xml = write(&row, &record);
    assert_eq!(xml, r#"<Row Id="1"/>"#);
    assert_eq!(row.from_str(&xml).unwrap(), Some(record));
}

// Collection framing

#[test]
fn test_empty_wrapped_collection_is_present() {
    let mut builder = Schema::builder();
    builder.add_record(
        RecordDecl::new("Order")
            .field(FieldDecl::new("Number", text()))
            .field(
                FieldDecl::new("Lines", TypeShape::sequence(text()))
                    .wrapped("Items")
                    .item_name("Item"),
            ),
    );
    let order = serializer(builder, "Order");

    let record = Record::new("Order").with("Number", "A-1").with("Lines", Value::List(Vec::new()));
    let xml = order.to_string(&record).unwrap();

    let document = Document::from_string(&xml).unwrap();
    let items = document.root().unwrap().find_children("Items");
    assert_eq!(items.len(), 1);
    assert!(items[0].children.is_empty());

    let back = order.from_str(&xml).unwrap().unwrap();
    assert_eq!(back.get("Lines"), Some(&Value::List(Vec::new())));

    let absent = order.from_str("<Order><Number>A-1</Number></Order>").unwrap().unwrap();
    assert_eq!(absent.get("Lines"), Some(&Value::Null));
}

#[test]
fn test_flattened_collection_of_records() {
    let mut builder = Schema::builder();
    builder
        .add_record(RecordDecl::new("Line").field(FieldDecl::new("Sku", text()).attribute()))
        .add_record(
            RecordDecl::new("Order")
                .field(FieldDecl::new("Lines", TypeShape::sequence(TypeShape::named("Line"))).flattened())
                .field(FieldDecl::new("Note", text())),
        );
    let order = serializer(builder, "Order");

    let line = |sku: &str| Value::Record(Record::new("Line").with("Sku", sku));
    let record = Record::new("Order")
        .with("Lines", Value::List(vec![line("a"), line("b")]))
        .with("Note", "n");

    let xml = write(&order, &record);
    assert_eq!(xml, r#"<Order><Line Sku="a"/><Line Sku="b"/><Note>n</Note></Order>"#);
    assert_eq!(order.from_str(&xml).unwrap(), Some(record));
}

// Naming

#[test]
fn test_naming_policies() {
    let camel = NamingPolicy::CamelCase;
    assert_eq!(camel.convert_name("HTTPServer"), "httpServer");
    assert_eq!(camel.convert_name("XMLParser"), "xmlParser");
    assert_eq!(camel.convert_name("Name"), "name");
    assert_eq!(camel.convert_name(""), "");
    assert_eq!(camel.convert_optional(None), None);

    let snake = NamingPolicy::SnakeCase;
    assert_eq!(snake.convert_name("PascalCase"), "pascal_case");
    assert_eq!(snake.convert_name("HTTPServer"), "h_t_t_p_server");
    assert_eq!(snake.convert_name(""), "");
    assert_eq!(snake.convert_optional(None), None);
}

#[test]
fn test_naming_policy_and_overrides_apply_to_elements() {
    let mut builder = Schema::builder();
    builder.add_record(
        RecordDecl::new("OrderLine")
            .field(FieldDecl::new("ProductCode", text()))
            .field(FieldDecl::new("UnitPrice", int()).named("Price")),
    );
    let options = SerializationOptions::new()
        .with_naming_policy(NamingPolicy::SnakeCase)
        .with_type_name("OrderLine", "line");
    let lines = serializer(builder, "OrderLine").with_options(options);

    let record = Record::new("OrderLine").with("ProductCode", "X1").with("UnitPrice", Value::Int(5));
    let xml = write(&lines, &record);
    assert_eq!(xml, "<line><product_code>X1</product_code><Price>5</Price></line>");
    assert_eq!(lines.from_str(&xml).unwrap(), Some(record));
}

// Manual mapping

struct MoneyMapping;

impl ManualMapping for MoneyMapping {
    fn write(&self, record: &Record, _options: &SerializationOptions) -> Result<Element> {
        let amount = record.get_or_null("Amount").as_str().unwrap_or("0");
        let currency = record.get_or_null("Currency").as_str().unwrap_or("");
        Ok(Element::local("Money").with_text(format!("{} {}", amount, currency)))
    }

    fn read(&self, element: &Element, _options: &SerializationOptions) -> Result<Record> {
        let (amount, currency) = element
            .text_content()
            .split_once(' ')
            .ok_or_else(|| Error::Value("expected '<amount> <currency>'".to_string()))?;
        Ok(Record::new("Money").with("Amount", amount).with("Currency", currency))
    }
}

#[test]
fn test_manual_mapping_is_renamed_under_item_tag() {
    let mut builder = Schema::builder();
    builder
        .add_record(RecordDecl::new("Money").manual(Arc::new(MoneyMapping)))
        .add_record(
            RecordDecl::new("Quote").field(
                FieldDecl::new("Prices", TypeShape::sequence(TypeShape::named("Money")))
                    .wrapped("Prices")
                    .item_name("Price"),
            ),
        );
    let quote = serializer(builder, "Quote");

    let money = |amount: &str| {
        Value::Record(Record::new("Money").with("Amount", amount).with("Currency", "EUR"))
    };
    let record = Record::new("Quote").with("Prices", Value::List(vec![money("12.50"), money("3")]));

    let xml = write(&quote, &record);
    assert_eq!(
        xml,
        "<Quote><Prices><Price>12.50 EUR</Price><Price>3 EUR</Price></Prices></Quote>"
    );
    assert_eq!(quote.from_str(&xml).unwrap(), Some(record));
}

// Namespaces

#[test]
fn test_record_namespace_is_declared_once() {
    let mut builder = Schema::builder();
    builder.add_record(
        RecordDecl::new("Note")
            .namespace("urn:notes")
            .field(FieldDecl::new("Body", text())),
    );
    let notes = serializer(builder, "Note");

    let record = Record::new("Note").with("Body", "hi");
    let xml = write(&notes, &record);
    assert_eq!(xml, r#"<Note xmlns="urn:notes"><Body xmlns="">hi</Body></Note>"#);
    assert_eq!(notes.from_str(&xml).unwrap(), Some(record));
}

// Schema errors

#[test]
fn test_invalid_schemas_are_rejected() {
    let mut builder = Schema::builder();
    builder.add_record(
        RecordDecl::new("Broken")
            .field(FieldDecl::new("A", TypeShape::sequence(TypeShape::Element)).any_elements())
            .field(FieldDecl::new("B", TypeShape::sequence(TypeShape::Element)).any_elements()),
    );
    assert!(matches!(builder.build("Broken"), Err(Error::Schema(_))));

    let mut builder = Schema::builder();
    builder.add_record(
        RecordDecl::new("Nested").field(FieldDecl::new(
            "Grid",
            TypeShape::sequence(TypeShape::sequence(int())),
        )),
    );
    assert!(matches!(builder.build("Nested"), Err(Error::Schema(_))));

    let mut builder = Schema::builder();
    builder.add_record(
        RecordDecl::new("Named").field(FieldDecl::new("Xs", TypeShape::sequence(int())).item_name("X")),
    );
    assert!(matches!(builder.build("Named"), Err(Error::Schema(_))));
}
