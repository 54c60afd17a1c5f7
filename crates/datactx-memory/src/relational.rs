//! Relational driver over [`MemoryDatabase`].
//!
//! Outside a transaction statements apply directly to the shared tables.
//! Inside one they apply to a private working copy and are replayed onto the
//! shared tables at commit, so concurrent units only see each other's
//! committed work.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use asupersync::{Cx, Outcome};
use datactx_core::{Connection, Dialect, Driver, Error, ParamSet, Result, Row};

use crate::database::{FaultPoint, MemoryDatabase, Tables};
use crate::statement::{Statement, split_batch};

#[derive(Debug)]
struct Transaction {
    working: Tables,
    replay: Vec<Statement>,
}

/// Opens [`MemoryConnection`]s on one database.
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    database: MemoryDatabase,
}

impl MemoryDriver {
    pub fn new(database: MemoryDatabase) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &MemoryDatabase {
        &self.database
    }
}

impl Driver for MemoryDriver {
    type Conn = MemoryConnection;

    fn dialect(&self) -> Dialect {
        self.database.dialect()
    }

    fn connect(
        &self,
        _cx: &Cx,
        connection_string: &str,
    ) -> impl Future<Output = Outcome<MemoryConnection, Error>> + Send {
        let outcome = {
            let mut state = self.database.lock();
            match state.take_fault(FaultPoint::Connect) {
                Some(e) => Outcome::Err(e),
                None => {
                    let id = state.open_connection();
                    tracing::debug!(
                        connection = id,
                        target = connection_string,
                        "Opened memory connection"
                    );
                    Outcome::Ok(MemoryConnection {
                        id,
                        database: self.database.clone(),
                        transaction: Mutex::new(None),
                    })
                }
            }
        };
        async move { outcome }
    }
}

/// A connection to a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryConnection {
    id: u64,
    database: MemoryDatabase,
    transaction: Mutex<Option<Transaction>>,
}

impl MemoryConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether a transaction is open on this connection.
    pub fn in_transaction(&self) -> bool {
        self.transaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn parse(&self, point: FaultPoint, sql: &str, params: &ParamSet) -> Result<Vec<Statement>> {
        let mut state = self.database.lock();
        if let Some(e) = state.take_fault(point) {
            return Err(e);
        }
        if !state.is_open(self.id) {
            return Err(Error::backend(format!("connection {} is closed", self.id)));
        }
        if params.dialect() != self.database.dialect() {
            return Err(Error::malformed(format!(
                "{} parameters sent to a {} connection",
                params.dialect(),
                self.database.dialect()
            )));
        }
        state.record(self.id, sql, params);
        drop(state);

        let statements = split_batch(sql)
            .map(|s| Statement::parse(s, params))
            .collect::<Result<Vec<_>>>()?;
        if statements.is_empty() {
            return Err(Error::malformed("empty command"));
        }
        Ok(statements)
    }

    fn run_execute(&self, sql: &str, params: &ParamSet) -> Result<u64> {
        let statements = self.parse(FaultPoint::Execute, sql, params)?;
        if statements.iter().any(Statement::is_query) {
            return Err(Error::malformed("SELECT sent to execute; use query"));
        }

        let mut transaction = self
            .transaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let affected: u64 = match transaction.as_mut() {
            Some(tx) => {
                let affected: u64 = statements.iter().map(|s| tx.working.apply(s)).sum();
                tx.replay.extend(statements);
                affected
            }
            None => {
                let mut state = self.database.lock();
                statements.iter().map(|s| state.tables.apply(s)).sum()
            }
        };
        Ok(affected)
    }

    fn run_query(&self, sql: &str, params: &ParamSet) -> Result<Vec<Row>> {
        let statements = self.parse(FaultPoint::Query, sql, params)?;
        let [statement] = statements.as_slice() else {
            return Err(Error::malformed("query must be a single SELECT"));
        };
        if !statement.is_query() {
            return Err(Error::malformed("query must be a single SELECT"));
        }

        let transaction = self
            .transaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let rows = match transaction.as_ref() {
            Some(tx) => tx.working.select(statement),
            None => self.database.lock().tables.select(statement),
        };
        Ok(rows)
    }

    fn check(&self, point: FaultPoint) -> Result<()> {
        let mut state = self.database.lock();
        if let Some(e) = state.take_fault(point) {
            return Err(e);
        }
        if !state.is_open(self.id) {
            return Err(Error::backend(format!("connection {} is closed", self.id)));
        }
        Ok(())
    }

    fn run_begin(&mut self) -> Result<()> {
        self.check(FaultPoint::Begin)?;
        let working = self.database.lock().tables.clone();
        let slot = self
            .transaction
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(Error::backend("transaction already active"));
        }
        *slot = Some(Transaction {
            working,
            replay: Vec::new(),
        });
        Ok(())
    }

    fn run_commit(&mut self) -> Result<()> {
        self.check(FaultPoint::Commit)?;
        let tx = self
            .transaction
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| Error::backend("no active transaction"))?;
        let mut state = self.database.lock();
        for statement in &tx.replay {
            state.tables.apply(statement);
        }
        Ok(())
    }

    fn run_rollback(&mut self) -> Result<()> {
        self.check(FaultPoint::Rollback)?;
        self.transaction
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(|_| ())
            .ok_or_else(|| Error::backend("no active transaction"))
    }

    fn run_close(&mut self) -> Result<()> {
        let mut state = self.database.lock();
        if !state.is_open(self.id) {
            return Ok(());
        }
        if let Some(e) = state.take_fault(FaultPoint::Close) {
            return Err(e);
        }
        state.close_connection(self.id);
        drop(state);
        self.transaction
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        tracing::debug!(connection = self.id, "Closed memory connection");
        Ok(())
    }
}

fn outcome<T>(result: Result<T>) -> Outcome<T, Error> {
    match result {
        Ok(value) => Outcome::Ok(value),
        Err(e) => Outcome::Err(e),
    }
}

impl Connection for MemoryConnection {
    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &ParamSet,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = outcome(self.run_execute(sql, params));
        async move { result }
    }

    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &ParamSet,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = outcome(self.run_query(sql, params));
        async move { result }
    }

    fn begin(&mut self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = outcome(self.run_begin());
        async move { result }
    }

    fn commit(&mut self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = outcome(self.run_commit());
        async move { result }
    }

    fn rollback(&mut self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let result = outcome(self.run_rollback());
        async move { result }
    }

    fn close(&mut self, _cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        let result = self.run_close();
        async move { result }
    }

    fn is_open(&self) -> bool {
        self.database.lock().is_open(self.id)
    }
}
