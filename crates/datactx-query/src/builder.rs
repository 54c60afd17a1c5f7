//! Command builders for INSERT, UPDATE, DELETE and SELECT.
//!
//! The free functions emit the SQL shapes shared by every dialect:
//!
//! ```text
//! INSERT INTO t(A,B) VALUES (@P0,@P1)
//! UPDATE t SET B = @P0 WHERE A = @P1
//! DELETE FROM t WHERE A = @P0
//! DELETE FROM t WHERE A IN (@P0,@P1)
//! SELECT A,B FROM t WHERE A = @P0
//! ```
//!
//! Placeholders are numbered from the supplied offset, so a statement built at
//! offset `N` with `k` parameters uses exactly the indices `N..N + k`.

use datactx_core::mapper::{self, ColumnValue, EntityMeta};
use datactx_core::{ContextConfig, Dialect, Entity, Error, ParamSet, Result, Value};

use crate::command::Command;

/// `INSERT INTO <table>(<columns>) VALUES (<placeholders>)`.
pub fn build_insert(
    dialect: Dialect,
    table: &str,
    columns: &[ColumnValue],
    offset: usize,
) -> Result<Command> {
    if columns.is_empty() {
        return Err(Error::malformed(format!(
            "INSERT into {table} has no columns"
        )));
    }

    let mut params = ParamSet::new(dialect);
    let mut names = Vec::with_capacity(columns.len());
    let mut placeholders = Vec::with_capacity(columns.len());
    for (i, cv) in columns.iter().enumerate() {
        names.push(cv.column);
        placeholders.push(params.bind(offset + i, cv.value.clone())?);
    }

    let sql = format!(
        "INSERT INTO {}({}) VALUES ({})",
        table,
        names.join(","),
        placeholders.join(",")
    );
    Ok(Command::new(sql, params))
}

/// `UPDATE <table> SET <col> = <p>, ... WHERE <key> = <p>`.
///
/// `columns` must contain the key column; every other column is assigned.
pub fn build_update(
    dialect: Dialect,
    table: &str,
    columns: &[ColumnValue],
    key_column: &str,
    offset: usize,
) -> Result<Command> {
    let key = columns
        .iter()
        .find(|cv| cv.column == key_column)
        .ok_or_else(|| {
            Error::malformed(format!("UPDATE of {table} lacks key column {key_column}"))
        })?;

    let mut params = ParamSet::new(dialect);
    let mut index = offset;
    let mut assignments = Vec::new();
    for cv in columns.iter().filter(|cv| cv.column != key_column) {
        let placeholder = params.bind(index, cv.value.clone())?;
        assignments.push(format!("{} = {}", cv.column, placeholder));
        index += 1;
    }
    if assignments.is_empty() {
        return Err(Error::malformed(format!(
            "UPDATE of {table} has no columns besides the key"
        )));
    }
    let key_placeholder = params.bind(index, key.value.clone())?;

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        table,
        assignments.join(", "),
        key_column,
        key_placeholder
    );
    Ok(Command::new(sql, params))
}

/// `DELETE FROM <table> WHERE <key> = <p>`.
pub fn build_delete(
    dialect: Dialect,
    table: &str,
    key_column: &str,
    key: Value,
    offset: usize,
) -> Result<Command> {
    let mut params = ParamSet::new(dialect);
    let placeholder = params.bind(offset, key)?;
    let sql = format!("DELETE FROM {table} WHERE {key_column} = {placeholder}");
    Ok(Command::new(sql, params))
}

/// `DELETE FROM <table> WHERE <key> IN (<p>,...)`, one placeholder per key.
pub fn build_delete_many(
    dialect: Dialect,
    table: &str,
    key_column: &str,
    keys: &[Value],
    offset: usize,
) -> Result<Command> {
    if keys.is_empty() {
        return Err(Error::malformed(format!(
            "DELETE from {table} has an empty key list"
        )));
    }

    let mut params = ParamSet::new(dialect);
    let mut placeholders = Vec::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        placeholders.push(params.bind(offset + i, key.clone())?);
    }

    let sql = format!(
        "DELETE FROM {} WHERE {} IN ({})",
        table,
        key_column,
        placeholders.join(",")
    );
    Ok(Command::new(sql, params))
}

/// `SELECT <columns> FROM <table> WHERE <key> = <p>`.
pub fn build_select(
    dialect: Dialect,
    table: &str,
    columns: &[&str],
    key_column: &str,
    key: Value,
) -> Result<Command> {
    let all = build_select_all(dialect, table, columns)?;
    let (select, mut params) = all.into_parts();
    let placeholder = params.bind(0, key)?;
    let sql = format!("{select} WHERE {key_column} = {placeholder}");
    Ok(Command::new(sql, params))
}

/// `SELECT <columns> FROM <table>`.
pub fn build_select_all(dialect: Dialect, table: &str, columns: &[&str]) -> Result<Command> {
    if columns.is_empty() {
        return Err(Error::malformed(format!(
            "SELECT from {table} has no columns"
        )));
    }
    let sql = format!("SELECT {} FROM {}", columns.join(","), table);
    Ok(Command::new(sql, ParamSet::new(dialect)))
}

/// Builds commands for entity types.
///
/// Resolves table names (with the configured prefix), key columns and
/// column values through the field mapper, then delegates to the free
/// builder functions.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    dialect: Dialect,
    table_prefix: String,
}

impl CommandBuilder {
    pub fn new(dialect: Dialect, table_prefix: impl Into<String>) -> Self {
        Self {
            dialect,
            table_prefix: table_prefix.into(),
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.dialect, config.table_prefix.clone())
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Prefixed table name of `E`.
    pub fn table_name<E: Entity>(&self) -> String {
        format!("{}{}", self.table_prefix, E::TABLE_NAME)
    }

    /// INSERT for one entity, columns ordered by local field name.
    pub fn insert<E: Entity>(&self, entity: &E, offset: usize) -> Result<Command> {
        let columns = mapper::column_values(entity)?;
        let command = build_insert(self.dialect, &self.table_name::<E>(), &columns, offset)?;
        tracing::trace!(sql = %command.sql(), "built insert");
        Ok(command)
    }

    /// One batch of single-row INSERTs at consecutive offsets.
    pub fn insert_all<E: Entity>(&self, entities: &[E]) -> Result<Command> {
        if entities.is_empty() {
            return Err(Error::malformed("insert batch contains no entities"));
        }
        let mut offset = 0;
        let mut commands = Vec::with_capacity(entities.len());
        for entity in entities {
            let command = self.insert(entity, offset)?;
            offset += command.params().len();
            commands.push(command);
        }
        Command::batch(commands)
    }

    /// UPDATE of every non-key column, matched by the key.
    pub fn update<E: Entity>(&self, entity: &E, offset: usize) -> Result<Command> {
        let meta = EntityMeta::of::<E>()?;
        let key = meta.require_key()?;
        let columns = mapper::column_values(entity)?;
        let command = build_update(
            self.dialect,
            &self.table_name::<E>(),
            &columns,
            key.column_name,
            offset,
        )?;
        tracing::trace!(sql = %command.sql(), "built update");
        Ok(command)
    }

    /// One batch of UPDATEs at consecutive offsets.
    pub fn update_all<E: Entity>(&self, entities: &[E]) -> Result<Command> {
        if entities.is_empty() {
            return Err(Error::malformed("update batch contains no entities"));
        }
        let mut offset = 0;
        let mut commands = Vec::with_capacity(entities.len());
        for entity in entities {
            let command = self.update(entity, offset)?;
            offset += command.params().len();
            commands.push(command);
        }
        Command::batch(commands)
    }

    /// DELETE of the row whose key equals the entity's key.
    pub fn delete<E: Entity>(&self, entity: &E) -> Result<Command> {
        let meta = EntityMeta::of::<E>()?;
        let key = meta.require_key()?;
        let value = mapper::get_field(key.name, entity)?;
        self.delete_by_key::<E>(value)
    }

    /// DELETE by key value. The value must have the key's declared kind.
    pub fn delete_by_key<E: Entity>(&self, key: Value) -> Result<Command> {
        let meta = EntityMeta::of::<E>()?;
        let field = meta.require_key()?;
        meta.check(field, &key)?;
        let command = build_delete(
            self.dialect,
            &self.table_name::<E>(),
            field.column_name,
            key,
            0,
        )?;
        tracing::trace!(sql = %command.sql(), "built delete");
        Ok(command)
    }

    /// DELETE of every row whose key is in `keys`.
    pub fn delete_all<E: Entity>(&self, keys: &[Value]) -> Result<Command> {
        let meta = EntityMeta::of::<E>()?;
        let field = meta.require_key()?;
        for key in keys {
            meta.check(field, key)?;
        }
        build_delete_many(
            self.dialect,
            &self.table_name::<E>(),
            field.column_name,
            keys,
            0,
        )
    }

    /// SELECT of one row by key, columns ordered by local field name.
    pub fn select<E: Entity>(&self, key: Value) -> Result<Command> {
        let meta = EntityMeta::of::<E>()?;
        let field = meta.require_key()?;
        meta.check(field, &key)?;
        let columns: Vec<&str> = meta.sorted_fields().iter().map(|f| f.column_name).collect();
        build_select(
            self.dialect,
            &self.table_name::<E>(),
            &columns,
            field.column_name,
            key,
        )
    }

    /// SELECT of every row.
    pub fn select_all<E: Entity>(&self) -> Result<Command> {
        let meta = EntityMeta::of::<E>()?;
        let columns: Vec<&str> = meta.sorted_fields().iter().map(|f| f.column_name).collect();
        build_select_all(self.dialect, &self.table_name::<E>(), &columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datactx_core::{MappingErrorKind, ValueKind};
    use datactx_macros::Entity;
    use std::collections::HashSet;

    #[derive(Debug, Default, Entity)]
    #[entity(table = "widgets")]
    struct Widget {
        #[entity(key, alias = "Id")]
        id: String,
        #[entity(alias = "Name")]
        name: String,
    }

    #[derive(Debug, Default, Entity)]
    #[entity(table = "gauges")]
    struct Gauge {
        #[entity(key)]
        serial: i64,
        reading: f64,
        label: Option<String>,
    }

    #[derive(Debug, Default, Entity)]
    struct Note {
        text: String,
    }

    fn widget(id: &str, name: &str) -> Widget {
        Widget {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn app() -> CommandBuilder {
        CommandBuilder::new(Dialect::SqlServer, "app_")
    }

    fn indices(command: &Command) -> Vec<usize> {
        command.params().iter().map(|p| p.index).collect()
    }

    #[test]
    fn test_insert_scenario() {
        let command = app().insert(&widget("A1", "x"), 0).unwrap();
        assert_eq!(
            command.sql(),
            "INSERT INTO app_widgets(Id,Name) VALUES (@P0,@P1)"
        );
        assert_eq!(command.params().get("@P0"), Some(&Value::from("A1")));
        assert_eq!(command.params().get("@P1"), Some(&Value::from("x")));
    }

    #[test]
    fn test_delete_by_key_scenario() {
        let command = app().delete_by_key::<Widget>(Value::from("A1")).unwrap();
        assert_eq!(command.sql(), "DELETE FROM app_widgets WHERE Id = @P0");
        assert_eq!(command.params().len(), 1);
        assert_eq!(command.params().get("@P0"), Some(&Value::from("A1")));
    }

    #[test]
    fn test_delete_by_object_matches_delete_by_key() {
        let by_object = app().delete(&widget("A1", "x")).unwrap();
        let by_key = app().delete_by_key::<Widget>(Value::from("A1")).unwrap();
        assert_eq!(by_object, by_key);
    }

    #[test]
    fn test_insert_placeholders_stay_in_offset_range() {
        let command = app().insert(&widget("A1", "x"), 7).unwrap();
        assert_eq!(indices(&command), vec![7, 8]);
        assert_eq!(
            command.sql(),
            "INSERT INTO app_widgets(Id,Name) VALUES (@P7,@P8)"
        );
    }

    #[test]
    fn test_adjacent_offsets_are_disjoint() {
        let first = app().insert(&widget("A1", "x"), 0).unwrap();
        let second = app()
            .insert(&widget("B2", "y"), first.params().len())
            .unwrap();
        let a: HashSet<_> = first.params().iter().map(|p| p.name.clone()).collect();
        let b: HashSet<_> = second.params().iter().map(|p| p.name.clone()).collect();
        assert!(a.is_disjoint(&b));
    }

    #[test]
    fn test_insert_all_is_one_batch() {
        let batch = app()
            .insert_all(&[widget("A1", "x"), widget("B2", "y")])
            .unwrap();
        assert_eq!(
            batch.sql(),
            "INSERT INTO app_widgets(Id,Name) VALUES (@P0,@P1);\
             INSERT INTO app_widgets(Id,Name) VALUES (@P2,@P3)"
        );
        assert_eq!(indices(&batch), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_large_insert_batch() {
        let rows: Vec<Widget> = (0..8_000)
            .map(|i| widget(&format!("W{i}"), "x"))
            .collect();
        let batch = app().insert_all(&rows).unwrap();
        assert_eq!(batch.params().len(), 16_000);
        assert_eq!(batch.params().get("@P15998"), Some(&Value::from("W7999")));
        assert!(batch.sql().ends_with("VALUES (@P15998,@P15999)"));
    }

    #[test]
    fn test_empty_batches_are_malformed() {
        assert!(matches!(
            app().insert_all::<Widget>(&[]),
            Err(Error::MalformedCommand(_))
        ));
        assert!(matches!(
            app().update_all::<Widget>(&[]),
            Err(Error::MalformedCommand(_))
        ));
        assert!(matches!(
            app().delete_all::<Widget>(&[]),
            Err(Error::MalformedCommand(_))
        ));
    }

    #[test]
    fn test_update_sets_non_key_columns() {
        let builder = CommandBuilder::new(Dialect::Postgres, "");
        let gauge = Gauge {
            serial: 9,
            reading: 1.5,
            label: None,
        };
        let command = builder.update(&gauge, 0).unwrap();
        assert_eq!(
            command.sql(),
            "UPDATE gauges SET label = $1, reading = $2 WHERE serial = $3"
        );
        assert_eq!(command.params().get("$1"), Some(&Value::Null));
        assert_eq!(command.params().get("$3"), Some(&Value::BigInt(9)));
    }

    #[test]
    fn test_delete_all_uses_in_list() {
        let command = CommandBuilder::new(Dialect::Sqlite, "")
            .delete_all::<Gauge>(&[Value::BigInt(1), Value::BigInt(2), Value::BigInt(3)])
            .unwrap();
        assert_eq!(
            command.sql(),
            "DELETE FROM gauges WHERE serial IN (:P0,:P1,:P2)"
        );
    }

    #[test]
    fn test_key_of_wrong_kind_is_rejected() {
        let err = app()
            .delete_by_key::<Gauge>(Value::Int(3))
            .unwrap_err();
        match err {
            Error::Mapping(e) => assert_eq!(
                e.kind,
                MappingErrorKind::TypeMismatch {
                    expected: ValueKind::BigInt,
                    found: "int",
                }
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_entity_without_key() {
        let err = app().delete_by_key::<Note>(Value::from("x")).unwrap_err();
        assert!(matches!(
            err,
            Error::Mapping(ref e) if e.kind == MappingErrorKind::MissingKey
        ));
        assert_eq!(app().table_name::<Note>(), "app_note");
    }

    #[test]
    fn test_select_builders() {
        let one = app().select::<Widget>(Value::from("A1")).unwrap();
        assert_eq!(one.sql(), "SELECT Id,Name FROM app_widgets WHERE Id = @P0");
        let all = app().select_all::<Widget>().unwrap();
        assert_eq!(all.sql(), "SELECT Id,Name FROM app_widgets");
        assert!(all.params().is_empty());
    }
}
