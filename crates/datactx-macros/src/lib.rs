//! Procedural macros for datactx.
//!
//! - `#[derive(Entity)]` - implements `datactx_core::Entity` for a struct with
//!   named fields, emitting static field metadata and strict field accessors.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod entity_derive;

/// Derive the `Entity` trait.
///
/// # Struct attributes
///
/// - `#[entity(table = "name")]`: table/collection name (default: the struct
///   name in snake_case)
/// - `#[entity(contracts(A, B))]`: capability contracts the type implements;
///   each path must name a `static ContractInfo`
///
/// # Field attributes
///
/// - `#[entity(key)]`: the field is the storage key
/// - `#[entity(alias = "Name")]`: storage name differs from the field name
/// - `#[entity(inherit)]`: metadata comes from a contract; the field is still
///   read and written by name
/// - `#[entity(skip)]`: not mapped at all
///
/// # Example
///
/// ```ignore
/// use datactx::prelude::*;
///
/// #[derive(Debug, Default, Entity)]
/// #[entity(table = "widgets")]
/// struct Widget {
///     #[entity(key, alias = "Id")]
///     id: String,
///     #[entity(alias = "Name")]
///     name: String,
///     #[entity(skip)]
///     cached_label: String,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match entity_derive::parse_entity(&input) {
        Ok(def) => entity_derive::generate_entity_impl(&def).into(),
        Err(err) => err.to_compile_error().into(),
    }
}
