//! Core types and traits for datactx.
//!
//! `datactx-core` is the **foundation layer** of the workspace. It defines the
//! contracts and data types every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: `Entity` is implemented by domain types (usually via
//!   `#[derive(Entity)]`), `Driver`/`Connection` by relational backends, and
//!   `DataContext` by the relational and document contexts.
//! - **Field mapper**: `mapper` flattens per-type metadata across capability
//!   contracts, caches it by type, and moves values in and out of entities.
//! - **Data model**: `Value`, `ParamSet`, `Row` and `StatusResult` are shared by
//!   command building, drivers and contexts.
//! - **Structured concurrency**: re-exports `Cx` and `Outcome` from asupersync so
//!   every backend operation is cancel-correct.

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod config;
pub mod connection;
pub mod context;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod field;
pub mod mapper;
pub mod params;
pub mod row;
pub mod status;
pub mod value;

pub use config::{
    CommitMode, ContextConfig, DocumentConfig, EnvSettings, SettingsSource,
};
pub use connection::{Connection, Driver};
pub use context::DataContext;
pub use dialect::Dialect;
pub use entity::Entity;
pub use error::{
    BackendFault, Error, MappingError, MappingErrorKind, Result, TransactionState,
    TransactionStateError,
};
pub use field::{ContractInfo, FieldInfo};
pub use mapper::{ColumnValue, EntityMeta};
pub use params::{Param, ParamSet};
pub use row::Row;
pub use status::StatusResult;
pub use value::{FromValue, Value, ValueKind};

/// Unwrap an `Outcome::Ok`, returning any other variant from the enclosing
/// function.
#[macro_export]
macro_rules! try_outcome {
    ($expr:expr) => {
        match $expr {
            $crate::Outcome::Ok(value) => value,
            $crate::Outcome::Err(e) => return $crate::Outcome::Err(e),
            $crate::Outcome::Cancelled(r) => return $crate::Outcome::Cancelled(r),
            $crate::Outcome::Panicked(p) => return $crate::Outcome::Panicked(p),
        }
    };
}

/// Unwrap a `Result`, returning `Outcome::Err` from the enclosing function.
#[macro_export]
macro_rules! try_result {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(e) => return $crate::Outcome::Err(e.into()),
        }
    };
}
