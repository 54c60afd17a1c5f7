//! Units of work and their registry.
//!
//! A unit of work pairs one open connection with its transaction, if any. In
//! caller-controlled commit mode every operation leaves its unit registered
//! here until the caller commits or rolls back.

use asupersync::{Cx, Outcome};
use datactx_core::{Connection, Error, Result, TransactionState, TransactionStateError};

/// An open connection plus its transaction state.
#[derive(Debug)]
pub struct UnitOfWork<C: Connection> {
    id: u64,
    connection: C,
    state: TransactionState,
}

impl<C: Connection> UnitOfWork<C> {
    /// Wrap a freshly opened connection. No transaction is active yet.
    pub fn new(id: u64, connection: C) -> Self {
        Self {
            id,
            connection,
            state: TransactionState::None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    /// Begin a transaction on the connection.
    pub async fn begin(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.state == TransactionState::Active {
            return Outcome::Err(self.state_error("begin").into());
        }
        match self.connection.begin(cx).await {
            Outcome::Ok(()) => {
                self.state = TransactionState::Active;
                Outcome::Ok(())
            }
            other => other,
        }
    }

    /// Commit the active transaction.
    ///
    /// Fails with `TransactionStateError` unless a transaction is active.
    pub async fn commit(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.state != TransactionState::Active {
            return Outcome::Err(self.state_error("commit").into());
        }
        match self.connection.commit(cx).await {
            Outcome::Ok(()) => {
                self.state = TransactionState::Committed;
                Outcome::Ok(())
            }
            other => other,
        }
    }

    /// Roll back the active transaction.
    ///
    /// Fails with `TransactionStateError` unless a transaction is active.
    pub async fn rollback(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.state != TransactionState::Active {
            return Outcome::Err(self.state_error("roll back").into());
        }
        match self.connection.rollback(cx).await {
            Outcome::Ok(()) => {
                self.state = TransactionState::RolledBack;
                Outcome::Ok(())
            }
            other => other,
        }
    }

    /// Close the connection.
    pub async fn close(&mut self, cx: &Cx) -> Result<()> {
        self.connection.close(cx).await
    }

    fn state_error(&self, attempted: &'static str) -> TransactionStateError {
        TransactionStateError {
            unit: self.id,
            state: self.state,
            attempted,
        }
    }
}

/// How pending units are finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    Commit,
    Rollback,
}

impl Finish {
    fn verb(self) -> &'static str {
        match self {
            Finish::Commit => "commit",
            Finish::Rollback => "rollback",
        }
    }
}

/// Units of work opened since the last commit or rollback.
#[derive(Debug)]
pub struct UnitOfWorkRegistry<C: Connection> {
    units: Vec<UnitOfWork<C>>,
    next_id: u64,
}

impl<C: Connection> Default for UnitOfWorkRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connection> UnitOfWorkRegistry<C> {
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocate the id for a new unit.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Track a unit until the next commit or rollback.
    pub fn register(&mut self, unit: UnitOfWork<C>) {
        tracing::info!(unit = unit.id(), "Registered unit of work");
        self.units.push(unit);
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Ids of the registered units, in registration order.
    pub fn ids(&self) -> Vec<u64> {
        self.units.iter().map(UnitOfWork::id).collect()
    }

    /// Commit or roll back every registered unit, then close its connection.
    ///
    /// Units are visited in registration order. A unit whose connection was
    /// already closed elsewhere is skipped and dropped from the registry. A
    /// unit whose transaction already finished is only closed. On the first
    /// fault, the failing unit and every unit not yet visited stay
    /// registered; units finished before it are gone.
    pub async fn finish_all(&mut self, cx: &Cx, finish: Finish) -> Outcome<usize, Error> {
        let mut pending = std::mem::take(&mut self.units).into_iter();
        let mut finished = 0;

        while let Some(mut unit) = pending.next() {
            if !unit.is_open() {
                tracing::warn!(
                    unit = unit.id(),
                    action = finish.verb(),
                    "Skipping unit of work with a closed connection"
                );
                continue;
            }

            if unit.state() == TransactionState::Active {
                let outcome = match finish {
                    Finish::Commit => unit.commit(cx).await,
                    Finish::Rollback => unit.rollback(cx).await,
                };
                match outcome {
                    Outcome::Ok(()) => {}
                    Outcome::Err(e) => {
                        self.restore(unit, pending);
                        return Outcome::Err(e);
                    }
                    Outcome::Cancelled(r) => {
                        self.restore(unit, pending);
                        return Outcome::Cancelled(r);
                    }
                    Outcome::Panicked(p) => {
                        self.restore(unit, pending);
                        return Outcome::Panicked(p);
                    }
                }
            }

            if let Err(e) = unit.close(cx).await {
                self.restore(unit, pending);
                return Outcome::Err(e);
            }

            tracing::info!(
                unit = unit.id(),
                action = finish.verb(),
                "Finished unit of work"
            );
            finished += 1;
        }

        Outcome::Ok(finished)
    }

    fn restore(&mut self, unit: UnitOfWork<C>, rest: impl Iterator<Item = UnitOfWork<C>>) {
        self.units.push(unit);
        self.units.extend(rest);
    }
}
