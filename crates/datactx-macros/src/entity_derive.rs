//! Implementation of the Entity derive macro.
//!
//! Field metadata is emitted as `static` items so the mapper can hand out
//! `&'static FieldInfo` references without any runtime registration.

use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{Data, DeriveInput, Error, Field, Fields, Ident, Lit, LitStr, Path, Result, Type};

/// Parsed definition of a struct with `#[derive(Entity)]`.
#[derive(Debug)]
pub struct EntityDef {
    /// The struct name.
    pub name: Ident,
    /// Table (or collection) name.
    pub table: String,
    /// Paths of the contract statics.
    pub contracts: Vec<Path>,
    /// Mapped fields, in declaration order.
    pub fields: Vec<EntityFieldDef>,
}

/// A single mapped field.
#[derive(Debug)]
pub struct EntityFieldDef {
    pub name: Ident,
    pub ty: Type,
    pub alias: Option<String>,
    pub key: bool,
    /// Metadata comes from a contract; only accessors are generated.
    pub inherit: bool,
}

/// Parse a `DeriveInput` into an `EntityDef`.
pub fn parse_entity(input: &DeriveInput) -> Result<EntityDef> {
    let name = input.ident.clone();

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Entity cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => parse_entity_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not unions",
            ));
        }
    };

    let mut table = None;
    let mut contracts = Vec::new();

    for attr in &input.attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().is_empty() {
                    return Err(Error::new_spanned(value, "table name cannot be empty"));
                }
                table = Some(value.value());
            } else if path.is_ident("contracts") {
                meta.parse_nested_meta(|inner| {
                    contracts.push(inner.path.clone());
                    Ok(())
                })?;
            } else {
                let attr_name = path.to_token_stream().to_string();
                return Err(Error::new_spanned(
                    path,
                    format!(
                        "unknown entity attribute `{attr_name}`. \
                         Valid struct attributes are: table, contracts"
                    ),
                ));
            }

            Ok(())
        })?;
    }

    let key_count = fields.iter().filter(|f| f.key).count();
    if key_count > 1 {
        return Err(Error::new_spanned(
            input,
            "at most one field may be marked #[entity(key)]",
        ));
    }

    Ok(EntityDef {
        table: table.unwrap_or_else(|| to_snake_case(&name.to_string())),
        name,
        contracts,
        fields,
    })
}

/// Parse all fields from a struct, dropping skipped ones.
fn parse_entity_fields(fields: &Fields) -> Result<Vec<EntityFieldDef>> {
    match fields {
        Fields::Named(named) => {
            let mut parsed = Vec::new();
            for field in &named.named {
                if let Some(def) = parse_entity_field(field)? {
                    parsed.push(def);
                }
            }
            Ok(parsed)
        }
        Fields::Unnamed(_) => Err(Error::new_spanned(
            fields,
            "Entity requires a struct with named fields",
        )),
        Fields::Unit => Ok(Vec::new()),
    }
}

/// Parse a single field; `None` when the field is skipped.
fn parse_entity_field(field: &Field) -> Result<Option<EntityFieldDef>> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

    let mut alias = None;
    let mut key = false;
    let mut inherit = false;
    let mut skip = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("key") {
                key = true;
            } else if path.is_ident("alias") {
                let value: Lit = meta.value()?.parse()?;
                if let Lit::Str(lit_str) = value {
                    if lit_str.value().is_empty() {
                        return Err(Error::new_spanned(lit_str, "alias cannot be empty"));
                    }
                    alias = Some(lit_str.value());
                } else {
                    return Err(Error::new_spanned(
                        value,
                        "expected string literal for alias",
                    ));
                }
            } else if path.is_ident("inherit") {
                inherit = true;
            } else if path.is_ident("skip") {
                skip = true;
            } else {
                let attr_name = path.to_token_stream().to_string();
                return Err(Error::new_spanned(
                    path,
                    format!(
                        "unknown entity attribute `{attr_name}`. \
                         Valid field attributes are: key, alias, inherit, skip"
                    ),
                ));
            }

            Ok(())
        })?;
    }

    if skip {
        return Ok(None);
    }

    if inherit && (key || alias.is_some()) {
        return Err(Error::new_spanned(
            field,
            "an inherited field takes its key and alias from the contract",
        ));
    }

    Ok(Some(EntityFieldDef {
        name,
        ty: field.ty.clone(),
        alias,
        key,
        inherit,
    }))
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Generate the `Entity` trait implementation.
pub fn generate_entity_impl(def: &EntityDef) -> TokenStream {
    let name = &def.name;
    let table = &def.table;

    let field_infos: Vec<TokenStream> = def
        .fields
        .iter()
        .filter(|f| !f.inherit)
        .map(generate_field_info)
        .collect();

    let contracts = &def.contracts;
    let contracts_fn = if contracts.is_empty() {
        TokenStream::new()
    } else {
        quote! {
            fn contracts() -> &'static [&'static ::datactx_core::ContractInfo] {
                static CONTRACTS: &[&::datactx_core::ContractInfo] = &[#(&#contracts),*];
                CONTRACTS
            }
        }
    };

    let read_arms = def.fields.iter().map(|f| {
        let ident = &f.name;
        let local = ident.to_string();
        quote! {
            #local => ::core::option::Option::Some(
                ::datactx_core::Value::from(::core::clone::Clone::clone(&self.#ident)),
            ),
        }
    });

    let write_arms = def.fields.iter().map(|f| {
        let ident = &f.name;
        let ty = &f.ty;
        let local = ident.to_string();
        quote! {
            #local => {
                self.#ident = <#ty as ::datactx_core::FromValue>::from_value(value).map_err(|found| {
                    ::datactx_core::MappingError::new(
                        ::datactx_core::MappingErrorKind::TypeMismatch {
                            expected: <#ty as ::datactx_core::FromValue>::KIND,
                            found: found.kind_name(),
                        },
                        ::core::any::type_name::<Self>(),
                    )
                    .field(#local)
                })?;
                ::core::result::Result::Ok(())
            }
        }
    });

    quote! {
        impl ::datactx_core::Entity for #name {
            const TABLE_NAME: &'static str = #table;

            fn declared_fields() -> &'static [::datactx_core::FieldInfo] {
                static FIELDS: &[::datactx_core::FieldInfo] = &[#(#field_infos),*];
                FIELDS
            }

            #contracts_fn

            fn read_field(&self, name: &str) -> ::core::option::Option<::datactx_core::Value> {
                match name {
                    #(#read_arms)*
                    _ => ::core::option::Option::None,
                }
            }

            fn write_field(
                &mut self,
                name: &str,
                value: ::datactx_core::Value,
            ) -> ::datactx_core::Result<()> {
                match name {
                    #(#write_arms)*
                    _ => ::core::result::Result::Err(
                        ::datactx_core::MappingError::field_not_found(
                            ::core::any::type_name::<Self>(),
                            name,
                        )
                        .into(),
                    ),
                }
            }
        }
    }
}

/// Generate the `FieldInfo` constructor for one declared field.
fn generate_field_info(field: &EntityFieldDef) -> TokenStream {
    let ty = &field.ty;
    let local = field.name.to_string();
    let column = field.alias.clone().unwrap_or_else(|| local.clone());
    let key = field.key;

    quote! {
        ::datactx_core::FieldInfo::new(#local, <#ty as ::datactx_core::FromValue>::KIND)
            .alias(#column)
            .nullable(<#ty as ::datactx_core::FromValue>::NULLABLE)
            .primary_key(#key)
    }
}
