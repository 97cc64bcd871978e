//! Derive macros for service-container
//!
//! `#[derive(Component)]` implements `service_container::Component` for a
//! struct, producing a descriptor with a single constructor built from the
//! struct's fields:
//!
//! - `#[inject]` on an `Arc<T>` field makes `T` a constructor parameter. For
//!   `Arc<dyn Trait>` fields the parameter is `dyn Trait` and the container is
//!   expected to hold an `Arc<dyn Trait>` for it.
//! - `#[inject(optional)]` on an `Option<Arc<T>>` field resolves `T` if it is
//!   registered and leaves `None` otherwise. It is not a constructor parameter.
//! - Every other field uses `Default::default()`.
//! - `#[component(auto_start)]` on the struct marks it auto-start; the struct
//!   must implement `AutoStart`.
//!
//! # Example
//!
//! ```rust,ignore
//! use service_container::{AutoStart, Component, Container, Lifestyle, Result};
//! use std::sync::Arc;
//!
//! struct Database;
//!
//! trait Mailer: Send + Sync {}
//!
//! #[derive(Component)]
//! #[component(auto_start)]
//! struct Newsletter {
//!     #[inject]
//!     db: Arc<Database>,
//!     #[inject]
//!     mailer: Arc<dyn Mailer>,
//!     sent: std::sync::atomic::AtomicU64,
//! }
//!
//! impl AutoStart for Newsletter {
//!     fn start(&self) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let container = Container::new();
//! container.register_self("newsletter", Newsletter::descriptor(), Lifestyle::Singleton)?;
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, Type, parse_macro_input};

/// Derive `service_container::Component`.
///
/// See the crate documentation for the supported attributes.
#[proc_macro_derive(Component, attributes(inject, component))]
pub fn derive_component(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_component(&input) {
        Ok(expanded) => expanded.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_component(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let auto_start = find_component_options(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Component can only be derived for structs",
            ));
        }
    };

    let mut parameters = Vec::new();
    let mut field_inits = Vec::new();

    match fields {
        Fields::Named(named) => {
            for field in named.named.iter() {
                let Some(field_name) = field.ident.as_ref() else {
                    continue;
                };
                let init = field_init(&field.ty, &field.attrs, &mut parameters)?;
                field_inits.push(quote! { #field_name: #init });
            }
        }
        Fields::Unit => {}
        Fields::Unnamed(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Component can only be derived for structs with named fields or unit structs",
            ));
        }
    }

    let construct = match fields {
        Fields::Unit => quote! { Self },
        _ => quote! { Self { #(#field_inits),* } },
    };

    let auto_start = auto_start.then(|| quote! { .auto_start() });

    Ok(quote! {
        impl #impl_generics ::service_container::Component for #name #ty_generics #where_clause {
            fn descriptor() -> ::service_container::ComponentDescriptor {
                ::service_container::ComponentDescriptor::builder::<Self>()
                    .constructor(
                        ::std::vec![#(#parameters),*],
                        |__args: &::service_container::Arguments<'_>| {
                            ::std::result::Result::Ok(#construct)
                        },
                    )
                    #auto_start
                    .build()
            }
        }
    })
}

/// Initializer expression for one field; pushes a constructor parameter for
/// required injections.
fn field_init(
    ty: &Type,
    attrs: &[Attribute],
    parameters: &mut Vec<proc_macro2::TokenStream>,
) -> syn::Result<proc_macro2::TokenStream> {
    match find_inject_attr(attrs)? {
        Some(InjectAttr::Required) => {
            let inner = extract_arc_inner_type(ty).ok_or_else(|| {
                syn::Error::new_spanned(ty, "Fields marked with #[inject] must have type Arc<T>")
            })?;
            let index = parameters.len();
            parameters.push(quote! { ::service_container::ServiceType::of::<#inner>() });

            Ok(if is_trait_object(inner) {
                quote! { __args.get_dyn::<#inner>(#index)? }
            } else {
                quote! { __args.get::<#inner>(#index)? }
            })
        }
        Some(InjectAttr::Optional) => {
            let inner = extract_option_arc_inner_type(ty).ok_or_else(|| {
                syn::Error::new_spanned(
                    ty,
                    "Fields marked with #[inject(optional)] must have type Option<Arc<T>>",
                )
            })?;
            let service = quote! { &::service_container::ServiceType::of::<#inner>() };

            Ok(if is_trait_object(inner) {
                quote! { __args.container().get_dyn::<#inner>(#service).ok() }
            } else {
                quote! { __args.container().try_get::<#inner>(#service) }
            })
        }
        None => Ok(quote! { ::std::default::Default::default() }),
    }
}

enum InjectAttr {
    Required,
    Optional,
}

/// Find and parse the #[inject] attribute
fn find_inject_attr(attrs: &[Attribute]) -> syn::Result<Option<InjectAttr>> {
    for attr in attrs {
        if !attr.path().is_ident("inject") {
            continue;
        }
        if attr.meta.require_path_only().is_ok() {
            return Ok(Some(InjectAttr::Required));
        }

        let nested = attr.parse_args::<syn::Ident>()?;
        if nested == "optional" {
            return Ok(Some(InjectAttr::Optional));
        }
        return Err(syn::Error::new_spanned(
            nested,
            "expected #[inject] or #[inject(optional)]",
        ));
    }
    Ok(None)
}

/// Parse `#[component(auto_start)]`; returns whether auto_start was given.
fn find_component_options(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut auto_start = false;
    for attr in attrs {
        if !attr.path().is_ident("component") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("auto_start") {
                auto_start = true;
                Ok(())
            } else {
                Err(meta.error("unsupported component option"))
            }
        })?;
    }
    Ok(auto_start)
}

/// Extract T from Arc<T>
fn extract_arc_inner_type(ty: &Type) -> Option<&Type> {
    single_generic_argument(ty, "Arc")
}

/// Extract T from Option<Arc<T>>
fn extract_option_arc_inner_type(ty: &Type) -> Option<&Type> {
    extract_arc_inner_type(single_generic_argument(ty, "Option")?)
}

fn single_generic_argument<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        syn::GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn is_trait_object(ty: &Type) -> bool {
    match ty {
        Type::TraitObject(_) => true,
        Type::Paren(paren) => is_trait_object(&paren.elem),
        Type::Group(group) => is_trait_object(&group.elem),
        _ => false,
    }
}
