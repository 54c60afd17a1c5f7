//! Units of work and the relational data context for datactx.
//!
//! [`RelationalContext`] implements the uniform `DataContext` contract on top
//! of any relational [`Driver`](datactx_core::Driver).
//!
//! # Commit modes
//!
//! - **Immediate**: every operation opens a connection, runs one command (a
//!   batch counts as one) and closes the connection before returning, even
//!   when the command faulted.
//! - **Caller-controlled**: every operation opens a connection, begins a
//!   transaction and registers the pair as a [`UnitOfWork`]. Nothing is
//!   durable until [`RelationalContext::commit`]; [`RelationalContext::rollback`]
//!   discards the pending work.
//!
//! # Example
//!
//! ```ignore
//! let config = ContextConfig::new(Dialect::SqlServer, conn_str)
//!     .commit_mode(CommitMode::CallerControlled);
//! let mut ctx = RelationalContext::new(config, driver)?;
//!
//! ctx.insert(&cx, &widget).await?;
//! ctx.delete_by_key::<Widget>(&cx, Value::from("A1")).await?;
//! ctx.commit(&cx).await?;
//! ```

pub mod context;
pub mod unit_of_work;

pub use context::RelationalContext;
pub use datactx_core::CommitMode;
pub use unit_of_work::{Finish, UnitOfWork, UnitOfWorkRegistry};
