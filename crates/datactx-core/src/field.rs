//! Field and capability-contract descriptors.

use crate::value::ValueKind;

/// Metadata about one mapped field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Storage name (column or document property); equals `name` unless aliased
    pub column_name: &'static str,
    /// Declared value kind
    pub kind: ValueKind,
    /// Whether the field accepts NULL
    pub nullable: bool,
    /// Whether this is the primary key
    pub primary_key: bool,
}

impl FieldInfo {
    /// Create a field whose storage name is its local name.
    pub const fn new(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            column_name: name,
            kind,
            nullable: false,
            primary_key: false,
        }
    }

    /// Set the storage alias.
    pub const fn alias(mut self, column_name: &'static str) -> Self {
        self.column_name = column_name;
        self
    }

    /// Set nullable flag.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set primary key flag.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }
}

/// A capability contract: a named set of fields a type exposes, possibly
/// extending other contracts.
///
/// Contracts are declared as statics and listed on an entity with
/// `#[entity(contracts(...))]`:
///
/// ```
/// use datactx_core::{ContractInfo, FieldInfo, ValueKind};
///
/// pub static KEYED: ContractInfo = ContractInfo::new(
///     "Keyed",
///     &[FieldInfo::new("id", ValueKind::Text).alias("Id").primary_key(true)],
///     &[],
/// );
///
/// pub static NAMED: ContractInfo = ContractInfo::new(
///     "Named",
///     &[FieldInfo::new("name", ValueKind::Text).alias("Name")],
///     &[&KEYED],
/// );
///
/// assert_eq!(NAMED.extends[0].name, "Keyed");
/// ```
#[derive(Debug)]
pub struct ContractInfo {
    pub name: &'static str,
    pub fields: &'static [FieldInfo],
    pub extends: &'static [&'static ContractInfo],
}

impl ContractInfo {
    pub const fn new(
        name: &'static str,
        fields: &'static [FieldInfo],
        extends: &'static [&'static ContractInfo],
    ) -> Self {
        Self {
            name,
            fields,
            extends,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_defaults_to_name() {
        let f = FieldInfo::new("name", ValueKind::Text);
        assert_eq!(f.column_name, "name");
        assert!(!f.primary_key);

        let aliased = f.alias("Name");
        assert_eq!(aliased.name, "name");
        assert_eq!(aliased.column_name, "Name");
    }
}
