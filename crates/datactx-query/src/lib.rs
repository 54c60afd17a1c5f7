//! Parameterized command assembly for datactx.
//!
//! `datactx-query` turns mapped entity fields into dialect-specific command text
//! plus a [`ParamSet`](datactx_core::ParamSet) whose names match the
//! placeholders in the text.
//!
//! - [`build_insert`], [`build_update`], [`build_delete`], [`build_delete_many`],
//!   [`build_select`] and [`build_select_all`] are the shared SQL shapes. Only
//!   the placeholder style differs between dialects.
//! - Every builder takes a parameter offset, so commands built at disjoint
//!   offsets can be joined into one batch with [`Command::batch`].
//! - [`CommandBuilder`] applies the table prefix and resolves entity metadata
//!   through the field mapper.

pub mod builder;
pub mod command;

pub use builder::{
    CommandBuilder, build_delete, build_delete_many, build_insert, build_select,
    build_select_all, build_update,
};
pub use command::Command;
