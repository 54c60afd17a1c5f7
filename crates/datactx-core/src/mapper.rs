//! The field mapper.
//!
//! Resolves per-type storage metadata and moves values between entities and
//! storage-shaped data (column lists, rows, JSON documents).
//!
//! # Flattening
//!
//! A type's effective field list is computed once, on first use, and cached by
//! `TypeId`:
//!
//! 1. fields declared on the type itself, in declaration order;
//! 2. then, for every listed contract in order, the contract's own fields followed
//!    by the fields of the contracts it extends, depth first.
//!
//! Names already seen are skipped, so the type's own declaration wins over any
//! contract's and a contract reachable along two paths is only walked once.

use std::any::{TypeId, type_name};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::entity::Entity;
use crate::error::{MappingError, MappingErrorKind, Result};
use crate::field::{ContractInfo, FieldInfo};
use crate::row::Row;
use crate::value::Value;

/// Flattened storage metadata for one entity type.
#[derive(Debug)]
pub struct EntityMeta {
    type_name: &'static str,
    table_name: &'static str,
    fields: Vec<&'static FieldInfo>,
    key: Option<usize>,
}

/// One mapped field with its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValue {
    pub field: &'static str,
    pub column: &'static str,
    pub value: Value,
}

/// Build results per type. Invalid types are cached with their error.
type MetaCache = RwLock<HashMap<TypeId, std::result::Result<Arc<EntityMeta>, MappingError>>>;

fn meta_cache() -> &'static MetaCache {
    static CACHE: OnceLock<MetaCache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

impl EntityMeta {
    /// Metadata for `E`, built on first use and cached afterwards.
    ///
    /// A type whose declaration is invalid fails with the same `MappingError`
    /// on every call.
    pub fn of<E: Entity>() -> Result<Arc<EntityMeta>> {
        let id = TypeId::of::<E>();
        {
            let cache = meta_cache().read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = cache.get(&id) {
                return entry.clone().map_err(Into::into);
            }
        }

        let built = Self::build(
            type_name::<E>(),
            E::TABLE_NAME,
            E::declared_fields(),
            E::contracts(),
        )
        .map(Arc::new);
        match &built {
            Ok(meta) => tracing::debug!(
                entity = meta.type_name,
                fields = meta.fields.len(),
                "Registered entity metadata"
            ),
            Err(err) => {
                tracing::warn!(entity = type_name::<E>(), %err, "Invalid entity declaration");
            }
        }

        let mut cache = meta_cache().write().unwrap_or_else(PoisonError::into_inner);
        cache.entry(id).or_insert(built).clone().map_err(Into::into)
    }

    fn build(
        type_name: &'static str,
        table_name: &'static str,
        own: &'static [FieldInfo],
        contracts: &'static [&'static ContractInfo],
    ) -> std::result::Result<Self, MappingError> {
        let mut fields = Vec::new();
        let mut seen = HashSet::new();
        for field in own {
            if seen.insert(field.name) {
                fields.push(field);
            }
        }
        let mut visited = HashSet::new();
        for contract in contracts {
            walk_contract(contract, &mut fields, &mut seen, &mut visited);
        }

        let mut key = None;
        let mut columns = HashSet::new();
        for (idx, field) in fields.iter().enumerate() {
            if field.primary_key {
                if key.is_some() {
                    return Err(
                        MappingError::new(MappingErrorKind::MultipleKeys, type_name)
                            .field(field.name),
                    );
                }
                key = Some(idx);
            }
            if !columns.insert(field.column_name) {
                return Err(
                    MappingError::new(MappingErrorKind::DuplicateColumn, type_name)
                        .field(field.name),
                );
            }
        }

        Ok(Self {
            type_name,
            table_name,
            fields,
            key,
        })
    }

    /// Rust type name of the entity.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Unprefixed table name.
    pub fn table_name(&self) -> &'static str {
        self.table_name
    }

    /// All mapped fields in flattening order.
    pub fn fields(&self) -> &[&'static FieldInfo] {
        &self.fields
    }

    /// Mapped fields ordered by local name, for reproducible command text.
    pub fn sorted_fields(&self) -> Vec<&'static FieldInfo> {
        let mut sorted = self.fields.clone();
        sorted.sort_by_key(|f| f.name);
        sorted
    }

    /// Find a field by local name or storage alias.
    ///
    /// A local-name match is preferred over an alias match.
    pub fn resolve(&self, name: &str) -> Option<&'static FieldInfo> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.fields.iter().find(|f| f.column_name == name))
            .copied()
    }

    /// Like [`resolve`](Self::resolve), failing with `FieldNotFound`.
    pub fn require(&self, name: &str) -> Result<&'static FieldInfo> {
        self.resolve(name)
            .ok_or_else(|| MappingError::field_not_found(self.type_name, name).into())
    }

    /// The primary-key field, if any.
    pub fn key_field(&self) -> Option<&'static FieldInfo> {
        self.key.map(|idx| self.fields[idx])
    }

    /// Reject `value` unless it has exactly the kind `field` declares.
    ///
    /// `Null` passes only for nullable fields.
    pub fn check(&self, field: &FieldInfo, value: &Value) -> Result<()> {
        let accepted = match value.kind() {
            None => field.nullable,
            Some(kind) => kind == field.kind,
        };
        if accepted {
            return Ok(());
        }
        Err(MappingError::new(
            MappingErrorKind::TypeMismatch {
                expected: field.kind,
                found: value.kind_name(),
            },
            self.type_name,
        )
        .field(field.name)
        .into())
    }

    /// The primary-key field, failing with `MissingKey`.
    pub fn require_key(&self) -> Result<&'static FieldInfo> {
        self.key_field().ok_or_else(|| {
            MappingError::new(MappingErrorKind::MissingKey, self.type_name).into()
        })
    }
}

fn walk_contract(
    contract: &'static ContractInfo,
    fields: &mut Vec<&'static FieldInfo>,
    seen: &mut HashSet<&'static str>,
    visited: &mut HashSet<*const ContractInfo>,
) {
    if !visited.insert(std::ptr::from_ref(contract)) {
        return;
    }
    for field in contract.fields {
        if seen.insert(field.name) {
            fields.push(field);
        }
    }
    for parent in contract.extends {
        walk_contract(parent, fields, seen, visited);
    }
}

/// Local name of `E`'s primary-key field.
pub fn key_name<E: Entity>() -> Result<Option<&'static str>> {
    Ok(EntityMeta::of::<E>()?.key_field().map(|f| f.name))
}

/// Current primary-key value of `entity`.
pub fn key_value<E: Entity>(entity: &E) -> Result<Option<Value>> {
    let meta = EntityMeta::of::<E>()?;
    match meta.key_field() {
        Some(field) => read(&meta, field, entity).map(Some),
        None => Ok(None),
    }
}

/// All mapped field names of `E`, own fields first, then contract fields.
pub fn field_names<E: Entity>() -> Result<Vec<&'static str>> {
    Ok(EntityMeta::of::<E>()?.fields().iter().map(|f| f.name).collect())
}

/// Read a field by local name or storage alias.
pub fn get_field<E: Entity>(name: &str, entity: &E) -> Result<Value> {
    let meta = EntityMeta::of::<E>()?;
    let field = meta.require(name)?;
    read(&meta, field, entity)
}

/// Write a field by local name or storage alias.
///
/// The value must have exactly the declared kind; `Null` is only accepted by
/// nullable fields. No numeric widening is attempted.
pub fn set_field<E: Entity>(name: &str, value: Value, entity: &mut E) -> Result<()> {
    let meta = EntityMeta::of::<E>()?;
    let field = meta.require(name)?;
    write(&meta, field, value, entity)
}

/// Build a default `E` and apply every `(name, value)` entry with [`set_field`].
pub fn build_from_fields<E, I, K>(fields: I) -> Result<E>
where
    E: Entity + Default,
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    let meta = EntityMeta::of::<E>()?;
    let mut entity = E::default();
    for (name, value) in fields {
        let field = meta.require(name.as_ref())?;
        write(&meta, field, value, &mut entity)?;
    }
    Ok(entity)
}

/// Every mapped field of `entity` with its value, sorted by local name.
pub fn column_values<E: Entity>(entity: &E) -> Result<Vec<ColumnValue>> {
    let meta = EntityMeta::of::<E>()?;
    meta.sorted_fields()
        .into_iter()
        .map(|field| {
            Ok(ColumnValue {
                field: field.name,
                column: field.column_name,
                value: read(&meta, field, entity)?,
            })
        })
        .collect()
}

/// Reconstruct an entity from a result row keyed by storage names.
///
/// Columns that map to no field are ignored, as with [`from_document`], so a
/// raw query may select more than the entity declares. Mapped columns must
/// carry the declared kind.
pub fn from_row<E: Entity + Default>(row: &Row) -> Result<E> {
    let meta = EntityMeta::of::<E>()?;
    let mut entity = E::default();
    for (column, value) in row.iter() {
        let Some(field) = meta.resolve(column) else {
            continue;
        };
        write(&meta, field, value.clone(), &mut entity)?;
    }
    Ok(entity)
}

/// Serialize an entity into a JSON document keyed by storage names.
pub fn to_document<E: Entity>(entity: &E) -> Result<serde_json::Map<String, serde_json::Value>> {
    Ok(column_values(entity)?
        .into_iter()
        .map(|cv| (cv.column.to_string(), cv.value.to_json()))
        .collect())
}

/// Reconstruct an entity from a JSON document.
///
/// Properties that map to no field (backend bookkeeping such as etags) are
/// ignored; mapped properties must convert to the declared kind.
pub fn from_document<E: Entity + Default>(
    document: &serde_json::Map<String, serde_json::Value>,
) -> Result<E> {
    let meta = EntityMeta::of::<E>()?;
    let mut entity = E::default();
    for (name, json) in document {
        let Some(field) = meta.resolve(name) else {
            continue;
        };
        let value = Value::from_json(json, field.kind).ok_or_else(|| {
            MappingError::new(
                MappingErrorKind::TypeMismatch {
                    expected: field.kind,
                    found: json_kind(json),
                },
                meta.type_name,
            )
            .field(field.name)
        })?;
        write(&meta, field, value, &mut entity)?;
    }
    Ok(entity)
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn read<E: Entity>(meta: &EntityMeta, field: &FieldInfo, entity: &E) -> Result<Value> {
    entity
        .read_field(field.name)
        .ok_or_else(|| MappingError::field_not_found(meta.type_name, field.name).into())
}

fn write<E: Entity>(
    meta: &EntityMeta,
    field: &FieldInfo,
    value: Value,
    entity: &mut E,
) -> Result<()> {
    meta.check(field, &value)?;
    entity.write_field(field.name, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::value::{FromValue, ValueKind};

    static KEYED: ContractInfo = ContractInfo::new(
        "Keyed",
        &[FieldInfo::new("id", ValueKind::Text)
            .alias("Id")
            .primary_key(true)],
        &[],
    );

    static AUDITED: ContractInfo = ContractInfo::new(
        "Audited",
        &[FieldInfo::new("revision", ValueKind::BigInt).alias("Rev")],
        &[&KEYED],
    );

    // Reaches KEYED a second time, through AUDITED.
    static LABELED: ContractInfo = ContractInfo::new(
        "Labeled",
        &[
            FieldInfo::new("label", ValueKind::Text).nullable(true),
            FieldInfo::new("name", ValueKind::Json),
        ],
        &[&AUDITED, &KEYED],
    );

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Gadget {
        id: String,
        name: String,
        revision: i64,
        label: Option<String>,
    }

    impl Entity for Gadget {
        const TABLE_NAME: &'static str = "gadgets";

        fn declared_fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[FieldInfo::new("name", ValueKind::Text).alias("Name")];
            FIELDS
        }

        fn contracts() -> &'static [&'static ContractInfo] {
            static CONTRACTS: &[&ContractInfo] = &[&LABELED];
            CONTRACTS
        }

        fn read_field(&self, name: &str) -> Option<Value> {
            match name {
                "id" => Some(Value::from(self.id.clone())),
                "name" => Some(Value::from(self.name.clone())),
                "revision" => Some(Value::from(self.revision)),
                "label" => Some(Value::from(self.label.clone())),
                _ => None,
            }
        }

        fn write_field(&mut self, name: &str, value: Value) -> Result<()> {
            let mismatch = |v: Value| MappingError::new(
                MappingErrorKind::TypeMismatch {
                    expected: ValueKind::Text,
                    found: v.kind_name(),
                },
                "Gadget",
            );
            match name {
                "id" => self.id = String::from_value(value).map_err(mismatch)?,
                "name" => self.name = String::from_value(value).map_err(mismatch)?,
                "revision" => self.revision = i64::from_value(value).map_err(mismatch)?,
                "label" => self.label = Option::from_value(value).map_err(mismatch)?,
                other => return Err(MappingError::field_not_found("Gadget", other).into()),
            }
            Ok(())
        }
    }

    struct TwoKeys;

    impl Entity for TwoKeys {
        const TABLE_NAME: &'static str = "two_keys";

        fn declared_fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] =
                &[FieldInfo::new("code", ValueKind::Text).primary_key(true)];
            FIELDS
        }

        fn contracts() -> &'static [&'static ContractInfo] {
            static CONTRACTS: &[&ContractInfo] = &[&KEYED];
            CONTRACTS
        }

        fn read_field(&self, _name: &str) -> Option<Value> {
            None
        }

        fn write_field(&mut self, name: &str, _value: Value) -> Result<()> {
            Err(MappingError::field_not_found("TwoKeys", name).into())
        }
    }

    fn gadget() -> Gadget {
        Gadget {
            id: "G1".to_string(),
            name: "sprocket".to_string(),
            revision: 4,
            label: None,
        }
    }

    #[test]
    fn test_flattening_order_and_dedup() {
        let names = field_names::<Gadget>().unwrap();
        assert_eq!(names, vec!["name", "label", "revision", "id"]);
    }

    #[test]
    fn test_own_declaration_wins_over_contract() {
        let meta = EntityMeta::of::<Gadget>().unwrap();
        let name = meta.resolve("name").unwrap();
        assert_eq!(name.kind, ValueKind::Text);
        assert_eq!(name.column_name, "Name");
    }

    #[test]
    fn test_key_found_through_nested_contract() {
        assert_eq!(key_name::<Gadget>().unwrap(), Some("id"));
        assert_eq!(
            key_value(&gadget()).unwrap(),
            Some(Value::Text("G1".to_string()))
        );
    }

    #[test]
    fn test_resolve_by_alias() {
        let g = gadget();
        assert_eq!(get_field("Rev", &g).unwrap(), Value::BigInt(4));
        assert_eq!(get_field("revision", &g).unwrap(), Value::BigInt(4));
    }

    #[test]
    fn test_unknown_field_is_not_found() {
        let mut g = gadget();
        let err = get_field("colour", &g).unwrap_err();
        assert!(matches!(
            err,
            Error::Mapping(MappingError { kind: MappingErrorKind::FieldNotFound, .. })
        ));
        assert!(set_field("colour", Value::from("red"), &mut g).is_err());
    }

    #[test]
    fn test_set_field_rejects_widening() {
        let mut g = gadget();
        let err = set_field("revision", Value::Int(5), &mut g).unwrap_err();
        match err {
            Error::Mapping(MappingError {
                kind: MappingErrorKind::TypeMismatch { expected, found },
                ..
            }) => {
                assert_eq!(expected, ValueKind::BigInt);
                assert_eq!(found, "int");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(g.revision, 4);
    }

    #[test]
    fn test_null_only_for_nullable_fields() {
        let mut g = gadget();
        set_field("label", Value::Null, &mut g).unwrap();
        assert!(set_field("name", Value::Null, &mut g).is_err());
    }

    #[test]
    fn test_column_values_round_trip() {
        let original = Gadget {
            label: Some("blue".to_string()),
            ..gadget()
        };
        let columns = column_values(&original).unwrap();
        let fields: Vec<_> = columns.iter().map(|c| c.field).collect();
        assert_eq!(fields, vec!["id", "label", "name", "revision"]);

        let rebuilt: Gadget =
            build_from_fields(columns.into_iter().map(|c| (c.column, c.value))).unwrap();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_document_round_trip_ignores_unmapped() {
        let original = gadget();
        let mut doc = to_document(&original).unwrap();
        assert_eq!(doc.get("Id"), Some(&serde_json::json!("G1")));
        doc.insert("_etag".to_string(), serde_json::json!("abc"));
        let rebuilt: Gadget = from_document(&doc).unwrap();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_multiple_keys_rejected() {
        let err = EntityMeta::of::<TwoKeys>().unwrap_err();
        assert!(matches!(
            err,
            Error::Mapping(MappingError { kind: MappingErrorKind::MultipleKeys, .. })
        ));
    }

    #[test]
    fn test_invalid_declaration_fails_the_same_way_twice() {
        let first = EntityMeta::of::<TwoKeys>().unwrap_err();
        let second = EntityMeta::of::<TwoKeys>().unwrap_err();
        assert_eq!(first.to_string(), second.to_string());
        assert!(matches!(
            second,
            Error::Mapping(MappingError { kind: MappingErrorKind::MultipleKeys, .. })
        ));
    }

    #[test]
    fn test_local_name_preferred_over_alias() {
        static FIELDS: &[FieldInfo] = &[
            FieldInfo::new("code", ValueKind::Text).alias("label"),
            FieldInfo::new("label", ValueKind::Text).alias("Caption"),
        ];
        let meta = EntityMeta::build("Tag", "tags", FIELDS, &[]).unwrap();
        assert_eq!(meta.resolve("label").unwrap().name, "label");
        assert_eq!(meta.resolve("Caption").unwrap().name, "label");
        assert_eq!(meta.resolve("code").unwrap().name, "code");
        assert!(meta.resolve("Code").is_none());
    }

    #[test]
    fn test_from_row_skips_unmapped_columns() {
        let row = Row::new(
            vec![
                "Id".to_string(),
                "Name".to_string(),
                "Rev".to_string(),
                "row_total".to_string(),
            ],
            vec![
                Value::from("G1"),
                Value::from("sprocket"),
                Value::BigInt(4),
                Value::Int(12),
            ],
        );
        let rebuilt: Gadget = from_row(&row).unwrap();
        assert_eq!(rebuilt, gadget());
    }

    #[test]
    fn test_from_row_rejects_mapped_column_of_wrong_kind() {
        let row = Row::new(vec!["Rev".to_string()], vec![Value::from("four")]);
        let err = from_row::<Gadget>(&row).unwrap_err();
        assert!(matches!(
            err,
            Error::Mapping(MappingError {
                kind: MappingErrorKind::TypeMismatch { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_metadata_is_cached() {
        let a = EntityMeta::of::<Gadget>().unwrap();
        let b = EntityMeta::of::<Gadget>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
