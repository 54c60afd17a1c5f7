//! Backend driver contracts.
//!
//! A relational backend supplies two things: a [`Driver`] that opens connections
//! for one [`Dialect`], and the [`Connection`] it opens. Command text is built
//! once, in `datactx-query`, and handed to [`Connection::execute`] /
//! [`Connection::query`] together with a [`ParamSet`] whose names are the
//! placeholders used in the text.

use std::future::Future;

use asupersync::{Cx, Outcome};

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::params::ParamSet;
use crate::row::Row;

/// An open connection to a relational backend.
pub trait Connection: Send + Sync {
    /// Execute a command (possibly a multi-statement batch) and return the
    /// total number of affected rows.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &ParamSet,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Run a query and return all rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &ParamSet,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Begin a transaction on this connection.
    fn begin(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Commit the open transaction.
    fn commit(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Roll back the open transaction.
    fn rollback(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Close the connection. Closing an already closed connection is a no-op.
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Result<()>> + Send;

    /// Whether the connection is still usable.
    fn is_open(&self) -> bool;
}

/// Opens connections for one dialect.
pub trait Driver: Send + Sync {
    type Conn: Connection;

    /// The dialect of every connection this driver opens.
    fn dialect(&self) -> Dialect;

    /// Open a new connection.
    fn connect(
        &self,
        cx: &Cx,
        connection_string: &str,
    ) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send;
}
