//! Ordered, named command parameters.

use std::collections::HashMap;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::value::Value;

/// A single bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Positional index the name was derived from.
    pub index: usize,
    /// Placeholder text as it appears in the command, e.g. `@P3`.
    pub name: String,
    pub value: Value,
}

/// The parameters of one command, in placeholder order.
///
/// Names are derived from positional indices, so sets built at disjoint offsets
/// can be concatenated with [`ParamSet::append`] without collisions.
/// Binding, appending and lookup by name cost O(1) per parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSet {
    dialect: Dialect,
    params: Vec<Param>,
    /// Placeholder name to position in `params`.
    positions: HashMap<String, usize>,
    next_index: usize,
}

impl ParamSet {
    /// An empty set for `dialect`.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
            positions: HashMap::new(),
            next_index: 0,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Bind `value` at `index` and return its placeholder.
    ///
    /// Fails with `MalformedCommand` if the index is already bound.
    pub fn bind(&mut self, index: usize, value: Value) -> Result<String> {
        let name = self.dialect.placeholder(index);
        if self.positions.contains_key(&name) {
            return Err(Error::malformed(format!(
                "parameter index {} bound twice",
                index
            )));
        }
        self.insert(Param {
            index,
            name: name.clone(),
            value,
        });
        Ok(name)
    }

    /// Bind `value` at the next free index (one past the highest bound index).
    pub fn push(&mut self, value: Value) -> String {
        let index = self.next_index;
        let name = self.dialect.placeholder(index);
        self.insert(Param {
            index,
            name: name.clone(),
            value,
        });
        name
    }

    fn insert(&mut self, param: Param) {
        self.next_index = self.next_index.max(param.index + 1);
        self.positions.insert(param.name.clone(), self.params.len());
        self.params.push(param);
    }

    /// Concatenate another set, rejecting dialect mismatches and name collisions.
    pub fn append(&mut self, other: ParamSet) -> Result<()> {
        if other.dialect != self.dialect {
            return Err(Error::malformed(format!(
                "cannot merge {} parameters into a {} command",
                other.dialect, self.dialect
            )));
        }
        for param in &other.params {
            if self.positions.contains_key(&param.name) {
                return Err(Error::malformed(format!(
                    "parameter {} appears in more than one statement",
                    param.name
                )));
            }
        }
        self.params.reserve(other.params.len());
        for param in other.params {
            self.insert(param);
        }
        Ok(())
    }

    /// Index one past the highest bound index.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Look up a value by placeholder name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.positions.get(name).map(|&i| &self.params[i].value)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Param> {
        self.params.iter()
    }

    /// Values in placeholder order.
    pub fn values(&self) -> Vec<Value> {
        self.params.iter().map(|p| p.value.clone()).collect()
    }
}

impl<'a> IntoIterator for &'a ParamSet {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_continues_after_highest_index() {
        let mut params = ParamSet::new(Dialect::SqlServer);
        assert_eq!(params.bind(4, Value::Int(1)).unwrap(), "@P4");
        assert_eq!(params.push(Value::Int(2)), "@P5");
        assert_eq!(params.next_index(), 6);
    }

    #[test]
    fn test_bind_twice_is_malformed() {
        let mut params = ParamSet::new(Dialect::Sqlite);
        params.bind(0, Value::Int(1)).unwrap();
        assert!(matches!(
            params.bind(0, Value::Int(2)),
            Err(Error::MalformedCommand(_))
        ));
    }

    #[test]
    fn test_append_detects_collisions() {
        let mut a = ParamSet::new(Dialect::SqlServer);
        a.push(Value::from("x"));
        let mut b = ParamSet::new(Dialect::SqlServer);
        b.push(Value::from("y"));
        assert!(a.clone().append(b).is_err());

        let mut c = ParamSet::new(Dialect::SqlServer);
        c.bind(1, Value::from("y")).unwrap();
        a.append(c).unwrap();
        assert_eq!(a.get("@P1"), Some(&Value::from("y")));
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_append_rejects_dialect_mismatch() {
        let mut a = ParamSet::new(Dialect::SqlServer);
        let b = ParamSet::new(Dialect::Postgres);
        assert!(a.append(b).is_err());
    }

    #[test]
    fn test_large_batch_of_appends_keeps_every_name() {
        let mut batch = ParamSet::new(Dialect::Postgres);
        for row in 0..10_000usize {
            let mut statement = ParamSet::new(Dialect::Postgres);
            statement.bind(row * 2, Value::BigInt(row as i64)).unwrap();
            statement.bind(row * 2 + 1, Value::from("w")).unwrap();
            batch.append(statement).unwrap();
        }
        assert_eq!(batch.len(), 20_000);
        assert_eq!(batch.next_index(), 20_000);
        assert_eq!(batch.get("$19999"), Some(&Value::BigInt(9_999)));
        assert_eq!(batch.get("$20000"), Some(&Value::from("w")));
        assert_eq!(batch.get("$20001"), None);

        let mut dup = ParamSet::new(Dialect::Postgres);
        dup.bind(7, Value::Int(0)).unwrap();
        assert!(batch.append(dup).is_err());
        assert_eq!(batch.len(), 20_000);
    }
}
