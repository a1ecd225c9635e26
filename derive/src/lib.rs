//! Derive macro for [`cfgenv::Record`](https://docs.rs/cfgenv).
//!
//! `#[derive(Record)]` turns a struct with named fields into a descriptor
//! table plus indexed field access, which is everything the cfgenv populator
//! and serializer need to walk it. Field attributes:
//!
//! - `#[env("...")]` attaches the directive string (`name=X,default=Y,...`).
//! - `#[env(flatten)]` inlines a nested record's fields under the current
//!   prefix.
//! - `#[env(skip)]` hides the field from cfgenv entirely.
//!
//! The directive string itself is parsed by cfgenv at load time, so tag errors
//! surface as `cfgenv::Error` values rather than compile errors.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Token, parse_macro_input};

#[proc_macro_derive(Record, attributes(env))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

enum EnvArg {
    Tag(LitStr),
    Skip,
    Flatten,
}

impl Parse for EnvArg {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.peek(LitStr) {
            return Ok(EnvArg::Tag(input.parse()?));
        }
        let ident: Ident = input.parse()?;
        match ident.to_string().as_str() {
            "skip" => Ok(EnvArg::Skip),
            "flatten" => Ok(EnvArg::Flatten),
            other => Err(syn::Error::new(
                ident.span(),
                format!("unknown env attribute `{other}`, expected a tag string, `skip` or `flatten`"),
            )),
        }
    }
}

#[derive(Default)]
struct FieldAttrs {
    tag: Option<LitStr>,
    skip: bool,
    flatten: bool,
}

fn field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("env") {
            continue;
        }
        let args = attr.parse_args_with(Punctuated::<EnvArg, Token![,]>::parse_terminated)?;
        for arg in args {
            match arg {
                EnvArg::Tag(lit) => {
                    if attrs.tag.is_some() {
                        return Err(syn::Error::new(lit.span(), "duplicate env tag string"));
                    }
                    attrs.tag = Some(lit);
                }
                EnvArg::Skip => attrs.skip = true,
                EnvArg::Flatten => attrs.flatten = true,
            }
        }
    }
    if attrs.flatten
        && let Some(tag) = &attrs.tag
    {
        return Err(syn::Error::new(
            tag.span(),
            "flattened fields share the parent prefix and take no tag string",
        ));
    }
    Ok(attrs)
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let fields: Vec<&syn::Field> = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named.named.iter().collect(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Record can only be derived for structs",
            ));
        }
    };

    let mut descriptors = Vec::new();
    let mut refs = Vec::new();
    let mut muts = Vec::new();
    let mut index = 0usize;

    for field in fields {
        let attrs = field_attrs(field)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let raw = ident.to_string();
        let name = raw.strip_prefix("r#").unwrap_or(&raw);
        let tag = match &attrs.tag {
            Some(lit) => quote!(::core::option::Option::Some(#lit)),
            None => quote!(::core::option::Option::None),
        };
        let embedded = attrs.flatten;

        descriptors.push(quote! {
            ::cfgenv::FieldDescriptor::of::<#ty>(#name, #tag, #embedded)
        });
        refs.push(quote! {
            #index => ::core::option::Option::Some(&self.#ident as &dyn ::cfgenv::Field)
        });
        muts.push(quote! {
            #index => ::core::option::Option::Some(&mut self.#ident as &mut dyn ::cfgenv::Field)
        });
        index += 1;
    }

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::cfgenv::Record for #ident #ty_generics #where_clause {
            fn descriptors(&self) -> ::std::vec::Vec<::cfgenv::FieldDescriptor> {
                ::std::vec![#(#descriptors),*]
            }

            fn field(&self, index: usize) -> ::core::option::Option<&dyn ::cfgenv::Field> {
                match index {
                    #(#refs,)*
                    _ => ::core::option::Option::None,
                }
            }

            fn field_mut(
                &mut self,
                index: usize,
            ) -> ::core::option::Option<&mut dyn ::cfgenv::Field> {
                match index {
                    #(#muts,)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl #impl_generics ::cfgenv::Field for #ident #ty_generics #where_clause {
            fn shape() -> ::cfgenv::Shape {
                ::cfgenv::Shape::Record
            }

            fn as_record(&self) -> ::core::option::Option<&dyn ::cfgenv::Record> {
                ::core::option::Option::Some(self)
            }

            fn as_record_mut(&mut self) -> ::core::option::Option<&mut dyn ::cfgenv::Record> {
                ::core::option::Option::Some(self)
            }
        }
    })
}
