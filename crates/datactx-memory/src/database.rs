//! Shared in-memory table storage.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use datactx_core::{Dialect, Error, ParamSet, Row, Value};

use crate::statement::Statement;

/// One stored row, keyed by column name.
pub type StoredRow = BTreeMap<String, Value>;

/// Operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Connect,
    Execute,
    Query,
    Begin,
    Commit,
    Rollback,
    Close,
}

/// A command as received by a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedCommand {
    pub connection: u64,
    pub sql: String,
    pub params: ParamSet,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    tables: HashMap<String, Vec<StoredRow>>,
}

impl Tables {
    /// Apply a mutating statement and return the affected-row count.
    pub(crate) fn apply(&mut self, statement: &Statement) -> u64 {
        match statement {
            Statement::Insert {
                table,
                columns,
                values,
            } => {
                let row = columns.iter().cloned().zip(values.iter().cloned()).collect();
                self.tables.entry(table.clone()).or_default().push(row);
                1
            }
            Statement::Update {
                table,
                assignments,
                key_column,
                key,
            } => {
                let mut affected = 0;
                if let Some(rows) = self.tables.get_mut(table) {
                    for row in rows.iter_mut().filter(|r| r.get(key_column) == Some(key)) {
                        for (column, value) in assignments {
                            row.insert(column.clone(), value.clone());
                        }
                        affected += 1;
                    }
                }
                affected
            }
            Statement::Delete {
                table,
                key_column,
                keys,
            } => {
                let Some(rows) = self.tables.get_mut(table) else {
                    return 0;
                };
                let before = rows.len();
                rows.retain(|r| !r.get(key_column).is_some_and(|v| keys.contains(v)));
                (before - rows.len()) as u64
            }
            Statement::Select { .. } => 0,
        }
    }

    pub(crate) fn select(&self, statement: &Statement) -> Vec<Row> {
        let Statement::Select {
            table,
            columns,
            filter,
        } = statement
        else {
            return Vec::new();
        };
        let Some(rows) = self.tables.get(table) else {
            return Vec::new();
        };

        rows.iter()
            .filter(|row| match filter {
                Some((column, value)) => row.get(column) == Some(value),
                None => true,
            })
            .map(|row| {
                let values = columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect();
                Row::new(columns.clone(), values)
            })
            .collect()
    }

    fn rows(&self, table: &str) -> Vec<StoredRow> {
        self.tables.get(table).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub(crate) struct State {
    pub(crate) tables: Tables,
    log: Vec<LoggedCommand>,
    faults: HashMap<FaultPoint, usize>,
    open: HashSet<u64>,
    next_connection: u64,
}

impl State {
    /// Consume one pending fault for `point`, if any.
    pub(crate) fn take_fault(&mut self, point: FaultPoint) -> Option<Error> {
        let remaining = self.faults.get_mut(&point)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        tracing::debug!(?point, "Injecting backend fault");
        Some(Error::backend(format!("injected {point:?} fault")))
    }

    pub(crate) fn open_connection(&mut self) -> u64 {
        self.next_connection += 1;
        self.open.insert(self.next_connection);
        self.next_connection
    }

    pub(crate) fn is_open(&self, id: u64) -> bool {
        self.open.contains(&id)
    }

    pub(crate) fn close_connection(&mut self, id: u64) {
        self.open.remove(&id);
    }

    pub(crate) fn record(&mut self, connection: u64, sql: &str, params: &ParamSet) {
        self.log.push(LoggedCommand {
            connection,
            sql: sql.to_string(),
            params: params.clone(),
        });
    }
}

/// An in-process database shared by every connection opened on it.
///
/// Cloning yields another handle to the same storage.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    dialect: Dialect,
    state: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Committed rows of `table`.
    pub fn rows(&self, table: &str) -> Vec<StoredRow> {
        self.lock().tables.rows(table)
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    /// Insert a committed row directly, bypassing any connection.
    pub fn seed<'a>(&self, table: &str, row: impl IntoIterator<Item = (&'a str, Value)>) {
        let row: StoredRow = row.into_iter().map(|(c, v)| (c.to_string(), v)).collect();
        self.lock()
            .tables
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Every command received so far, in arrival order.
    pub fn commands(&self) -> Vec<LoggedCommand> {
        self.lock().log.clone()
    }

    pub fn clear_commands(&self) {
        self.lock().log.clear();
    }

    /// Make the next `count` operations of kind `point` fail with a backend fault.
    pub fn fail_next(&self, point: FaultPoint, count: usize) {
        *self.lock().faults.entry(point).or_insert(0) += count;
    }

    /// Number of connections opened and not yet closed.
    pub fn open_connections(&self) -> usize {
        self.lock().open.len()
    }

    /// Close every open connection from the server side.
    pub fn close_all_connections(&self) {
        self.lock().open.clear();
    }
}
