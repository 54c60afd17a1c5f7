//! The document backend contract.

use std::fmt;
use std::future::Future;

use asupersync::{Cx, Outcome};
use datactx_core::{Error, Result, Value};
use serde::Serialize;

/// A stored document: storage name to JSON value.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Status codes counted as success.
pub const VALID_OUTCOMES: [u16; 4] = [200, 201, 202, 204];

/// Outcome code reported by a document backend for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BackendStatus(pub u16);

impl BackendStatus {
    pub const OK: BackendStatus = BackendStatus(200);
    pub const CREATED: BackendStatus = BackendStatus(201);
    pub const ACCEPTED: BackendStatus = BackendStatus(202);
    pub const NO_CONTENT: BackendStatus = BackendStatus(204);
    pub const NOT_FOUND: BackendStatus = BackendStatus(404);
    pub const CONFLICT: BackendStatus = BackendStatus(409);
    pub const UNAVAILABLE: BackendStatus = BackendStatus(503);

    pub fn code(self) -> u16 {
        self.0
    }

    /// Whether the code is one of [`VALID_OUTCOMES`].
    pub fn is_valid(self) -> bool {
        VALID_OUTCOMES.contains(&self.0)
    }
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document-oriented backend.
///
/// Expected conditions (missing document, duplicate key) are reported as a
/// status code; `Outcome::Err` is reserved for transport-level faults.
pub trait DocumentStore: Send + Sync {
    /// Create a new document under `key`.
    fn create(
        &self,
        cx: &Cx,
        collection: &str,
        key: &str,
        document: &Document,
    ) -> impl Future<Output = Outcome<BackendStatus, Error>> + Send;

    /// Replace the document stored under `key`.
    fn replace(
        &self,
        cx: &Cx,
        collection: &str,
        key: &str,
        document: &Document,
    ) -> impl Future<Output = Outcome<BackendStatus, Error>> + Send;

    /// Remove the document stored under `key`.
    fn remove(
        &self,
        cx: &Cx,
        collection: &str,
        key: &str,
    ) -> impl Future<Output = Outcome<BackendStatus, Error>> + Send;

    /// Read one document.
    fn read(
        &self,
        cx: &Cx,
        collection: &str,
        key: &str,
    ) -> impl Future<Output = Outcome<(BackendStatus, Option<Document>), Error>> + Send;

    /// Read every document of a collection.
    fn read_all(
        &self,
        cx: &Cx,
        collection: &str,
    ) -> impl Future<Output = Outcome<(BackendStatus, Vec<Document>), Error>> + Send;
}

/// Render a key value as a document id.
///
/// Text and integer keys are supported; anything else is a malformed command.
pub fn document_key(key: &Value) -> Result<String> {
    match key {
        Value::Text(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        Value::BigInt(i) => Ok(i.to_string()),
        other => Err(Error::malformed(format!(
            "{} value cannot be used as a document key",
            other.kind_name()
        ))),
    }
}
