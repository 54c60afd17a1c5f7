//! In-process backends for datactx.
//!
//! `datactx-memory` provides a relational driver and a document store that keep
//! everything in process memory. Both record what they receive and accept
//! injected faults, which makes them the backends of choice for tests.
//!
//! - [`MemoryDatabase`] holds tables shared by every connection opened on it.
//!   [`MemoryDriver`] opens [`MemoryConnection`]s that understand the command
//!   shapes produced by `datactx-query` in all three dialects.
//! - [`MemoryDocumentStore`] implements `DocumentStore` with the usual status
//!   codes (201 created, 409 duplicate, 404 missing).

mod database;
pub mod document;
mod relational;
mod statement;

pub use database::{FaultPoint, LoggedCommand, MemoryDatabase, StoredRow};
pub use document::MemoryDocumentStore;
pub use relational::{MemoryConnection, MemoryDriver};
