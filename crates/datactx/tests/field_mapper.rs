use datactx::mapper::{self, EntityMeta};
use datactx::prelude::*;
use datactx::{ContractInfo, FieldInfo, MappingErrorKind, Row, ValueKind};

static KEYED: ContractInfo = ContractInfo::new(
    "Keyed",
    &[FieldInfo::new("id", ValueKind::Text)
        .alias("Id")
        .primary_key(true)],
    &[],
);

static NAMED: ContractInfo = ContractInfo::new(
    "Named",
    &[FieldInfo::new("name", ValueKind::Text).alias("Name")],
    &[&KEYED],
);

static AUDITED: ContractInfo = ContractInfo::new(
    "Audited",
    &[FieldInfo::new("created_by", ValueKind::Text).alias("CreatedBy")],
    &[&KEYED],
);

/// Reaches `KEYED` through both `NAMED` and `AUDITED`.
#[derive(Debug, Default, Clone, PartialEq, Entity)]
#[entity(table = "products", contracts(NAMED, AUDITED))]
struct Product {
    #[entity(inherit)]
    id: String,
    #[entity(inherit)]
    name: String,
    #[entity(inherit)]
    created_by: String,
    #[entity(alias = "UnitPrice")]
    price: f64,
    discontinued: Option<bool>,
    #[entity(skip)]
    cached_label: String,
}

#[derive(Debug, Default, Entity)]
struct Reading {
    #[entity(key)]
    serial: i64,
    value: f64,
}

#[test]
fn contracts_are_flattened_once() {
    let names = mapper::field_names::<Product>().unwrap();
    assert_eq!(
        names,
        vec!["price", "discontinued", "name", "id", "created_by"]
    );
    assert_eq!(mapper::key_name::<Product>().unwrap(), Some("id"));
    assert_eq!(mapper::key_name::<Reading>().unwrap(), Some("serial"));
}

#[test]
fn metadata_is_cached_per_type() {
    let first = EntityMeta::of::<Product>().unwrap();
    let second = EntityMeta::of::<Product>().unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(first.table_name(), "products");
    assert_eq!(EntityMeta::of::<Reading>().unwrap().table_name(), "reading");
}

#[test]
fn fields_resolve_by_name_or_alias() {
    let mut product = Product::default();
    mapper::set_field("Id", Value::from("P-1"), &mut product).unwrap();
    mapper::set_field("UnitPrice", Value::Double(9.5), &mut product).unwrap();
    mapper::set_field("name", Value::from("Lamp"), &mut product).unwrap();

    assert_eq!(product.id, "P-1");
    assert_eq!(product.price, 9.5);
    assert_eq!(mapper::get_field("Name", &product).unwrap(), Value::from("Lamp"));
    assert_eq!(
        mapper::key_value(&product).unwrap(),
        Some(Value::from("P-1"))
    );
}

#[test]
fn unknown_and_skipped_fields_are_not_found() {
    let mut product = Product::default();
    for name in ["cached_label", "Missing"] {
        let err = mapper::set_field(name, Value::from("x"), &mut product).unwrap_err();
        assert!(matches!(
            err,
            Error::Mapping(ref m) if m.kind == MappingErrorKind::FieldNotFound
        ));
    }
}

#[test]
fn values_must_match_the_declared_kind() {
    let mut reading = Reading::default();
    let err = mapper::set_field("serial", Value::Int(3), &mut reading).unwrap_err();
    assert!(matches!(
        err,
        Error::Mapping(ref m) if matches!(m.kind, MappingErrorKind::TypeMismatch { expected: ValueKind::BigInt, .. })
    ));

    assert!(mapper::set_field("value", Value::Null, &mut reading).is_err());

    let mut product = Product::default();
    mapper::set_field("discontinued", Value::Null, &mut product).unwrap();
    assert_eq!(product.discontinued, None);
    mapper::set_field("discontinued", Value::Bool(true), &mut product).unwrap();
    assert_eq!(product.discontinued, Some(true));
}

#[test]
fn build_from_fields_and_read_back() {
    let product: Product = mapper::build_from_fields([
        ("Id", Value::from("P-2")),
        ("Name", Value::from("Desk")),
        ("CreatedBy", Value::from("ops")),
        ("UnitPrice", Value::Double(120.0)),
    ])
    .unwrap();

    let columns: Vec<(&str, Value)> = mapper::column_values(&product)
        .unwrap()
        .into_iter()
        .map(|cv| (cv.column, cv.value))
        .collect();
    assert_eq!(
        columns,
        vec![
            ("CreatedBy", Value::from("ops")),
            ("discontinued", Value::Null),
            ("Id", Value::from("P-2")),
            ("Name", Value::from("Desk")),
            ("UnitPrice", Value::Double(120.0)),
        ]
    );

    let row = Row::new(
        columns.iter().map(|(c, _)| c.to_string()).collect(),
        columns.iter().map(|(_, v)| v.clone()).collect(),
    );
    assert_eq!(mapper::from_row::<Product>(&row).unwrap(), product);

    let document = mapper::to_document(&product).unwrap();
    assert_eq!(document["Name"], serde_json::json!("Desk"));
    assert_eq!(mapper::from_document::<Product>(&document).unwrap(), product);
}
