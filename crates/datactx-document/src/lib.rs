//! Document-store data context for datactx.
//!
//! A document backend implements [`DocumentStore`]; [`DocumentContext`] maps
//! entities to JSON documents keyed by storage name and implements the
//! uniform `DataContext` contract on top of it.
//!
//! Single-item operations issue one request and derive success from the
//! backend's status code. Batch operations fan out one request per item,
//! wait for all of them, and report only how many succeeded.

pub mod context;
pub mod store;

pub use context::DocumentContext;
pub use store::{BackendStatus, Document, DocumentStore, VALID_OUTCOMES, document_key};
