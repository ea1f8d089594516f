//! Derive macros shared by the forum models.
//!
//! `FromPgRow` maps a `tokio_postgres::Row` onto a struct by column name,
//! `GetFieldNames` exposes the column list used to build SELECT statements and
//! `IntoJsonMap` turns a model into a `serde_json::Map` so handlers can add or
//! hide fields before responding.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DataStruct, DeriveInput, Fields, Ident};

/// Columns stored as JSON text (tags and the like) fall back to
/// `serde_json::from_str` when the direct conversion fails. Missing columns
/// keep their `Default` value, so partial selects are allowed.
#[proc_macro_derive(FromPgRow)]
pub fn derive_from_pg_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let struct_name = &input.ident;
    let fields = match named_fields(&input) {
        Ok(f) => f,
        Err(e) => return e.to_compile_error().into(),
    };
    let assigns: Vec<_> = fields
        .into_iter()
        .map(|ident| {
            quote! {
                match row.try_get(stringify!(#ident)) {
                    Ok(v) => x.#ident = v,
                    Err(_) => {
                        if let Ok(s) = row.try_get::<&str, String>(stringify!(#ident)) {
                            if let Ok(t) = serde_json::from_str(s.as_str()) {
                                x.#ident = t;
                            }
                        }
                    }
                }
            }
        })
        .collect();
    let expanded = quote! {
        impl std::convert::From<tokio_postgres::Row> for #struct_name {
            fn from(row: tokio_postgres::Row) -> Self {
                let mut x = Self::default();
                #(#assigns;)*
                x
            }
        }
    };
    expanded.into()
}

#[proc_macro_derive(IntoJsonMap)]
pub fn derive_to_json_map(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let struct_name = &input.ident;
    let fields = match named_fields(&input) {
        Ok(f) => f,
        Err(e) => return e.to_compile_error().into(),
    };
    let inserts: Vec<_> = fields
        .into_iter()
        .map(|x| {
            quote! {
                mp.insert(stringify!(#x).to_string(), serde_json::json!(self.#x));
            }
        })
        .collect();
    let expanded = quote! {
        impl std::convert::From<#struct_name> for serde_json::Map<String, serde_json::Value> {
            fn from(this: #struct_name) -> Self {
                this.into_json_map()
            }
        }

        impl #struct_name {
            pub fn into_json_map(self) -> serde_json::Map<String, serde_json::Value> {
                let mut mp = serde_json::Map::new();
                #(#inserts)*
                mp
            }
        }
    };
    expanded.into()
}

#[proc_macro_derive(GetFieldNames)]
pub fn derive_struct_field_names(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let struct_name = &input.ident;
    let fields = match named_fields(&input) {
        Ok(f) => f,
        Err(e) => return e.to_compile_error().into(),
    };
    let expanded = quote! {
        impl StructFieldNames for #struct_name {
            fn field_names() -> &'static [&'static str] {
                &[#(stringify!(#fields),)*]
            }
        }
    };
    expanded.into()
}

fn named_fields(input: &DeriveInput) -> syn::Result<Vec<&Ident>> {
    match &input.data {
        Data::Struct(DataStruct {
            fields: Fields::Named(named),
            ..
        }) => Ok(named
            .named
            .iter()
            .filter_map(|field| field.ident.as_ref())
            .collect()),
        _ => Err(syn::Error::new_spanned(
            &input.ident,
            "model derives need a struct with named fields",
        )),
    }
}
