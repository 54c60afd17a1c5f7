//! datactx: one CRUD contract over relational and document backends.
//!
//! Domain types derive [`Entity`] to describe how their fields map to storage
//! columns. The same entity can then be persisted through a
//! [`RelationalContext`] (SQL Server, PostgreSQL or SQLite command text over
//! any [`Driver`]) or a [`DocumentContext`] (one JSON document per entity over
//! any [`DocumentStore`]), both implementing [`DataContext`].
//!
//! # Example
//!
//! ```ignore
//! use datactx::prelude::*;
//!
//! #[derive(Debug, Default, Entity)]
//! #[entity(table = "widgets")]
//! struct Widget {
//!     #[entity(key, alias = "Id")]
//!     id: String,
//!     #[entity(alias = "Name")]
//!     name: String,
//! }
//!
//! let config = ContextConfig::from_settings(&settings)?;
//! let mut ctx = RelationalContext::new(config, driver)?;
//! let status = ctx.insert(&cx, &widget).await?;
//! assert!(status.success());
//! ```

pub use datactx_core::*;
pub use datactx_document::{
    BackendStatus, Document, DocumentContext, DocumentStore, VALID_OUTCOMES, document_key,
};
pub use datactx_macros::Entity;
pub use datactx_query::{Command, CommandBuilder};
pub use datactx_session::{Finish, RelationalContext, UnitOfWork, UnitOfWorkRegistry};

/// Command builders for each statement shape.
pub mod query {
    pub use datactx_query::*;
}

/// In-process backends.
#[cfg(feature = "memory")]
pub mod memory {
    pub use datactx_memory::*;
}

/// Everything needed to declare entities and run operations.
pub mod prelude {
    pub use crate::{
        BackendStatus, CommitMode, ContextConfig, Cx, DataContext, Dialect, DocumentConfig,
        DocumentContext, DocumentStore, Entity, Error, Outcome, ParamSet, RelationalContext,
        Result, StatusResult, Value,
    };
}
