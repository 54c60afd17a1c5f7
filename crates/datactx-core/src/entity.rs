//! The `Entity` trait implemented by persisted domain types.

use crate::error::Result;
use crate::field::{ContractInfo, FieldInfo};
use crate::value::Value;

/// A domain type that can be persisted through a data context.
///
/// Implementations are normally generated by `#[derive(Entity)]`. The trait only
/// exposes raw per-type facts; storage resolution (contract flattening, alias
/// lookup, key discovery) lives in [`crate::mapper`].
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Default, Entity)]
/// #[entity(table = "widgets", contracts(KEYED))]
/// struct Widget {
///     #[entity(inherit)]
///     id: String,
///     #[entity(alias = "Name")]
///     name: String,
/// }
/// ```
pub trait Entity: Send + Sync + 'static {
    /// Table (or collection) name, without any configured prefix.
    const TABLE_NAME: &'static str;

    /// Fields declared directly on the type.
    fn declared_fields() -> &'static [FieldInfo];

    /// Capability contracts the type implements.
    fn contracts() -> &'static [&'static ContractInfo] {
        &[]
    }

    /// Read a field by its local name; `None` if the type has no such field.
    fn read_field(&self, name: &str) -> Option<Value>;

    /// Write a field by its local name, converting strictly.
    fn write_field(&mut self, name: &str, value: Value) -> Result<()>;
}
