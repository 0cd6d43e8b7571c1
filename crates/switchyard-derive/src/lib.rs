//! Macros for declaring switchyard controllers and path enums.
//!
//! This crate provides the `#[routes]` attribute, which turns an inherent
//! impl block into a `Controller` implementation, and `#[derive(PathEnum)]`
//! for enums bound from path segments.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{
    Data, DeriveInput, Expr, ExprLit, ExprUnary, Fields, FnArg, Ident, ImplItem, ImplItemFn,
    ItemImpl, Lit, LitStr, Pat, Token, Type, UnOp, Visibility, bracketed, parse_macro_input,
};

/// Implements `Controller` for the type of an inherent impl block.
///
/// # Arguments
///
/// - `base = "/path"` - Base path prepended to every declared route
/// - `default` - Build instances with `Default` when the container has none
/// - `context = Type` - Request context type (defaults to `()`)
/// - `output = Type` - Handler result type (defaults to `String`)
///
/// # Method Attributes
///
/// - `#[route("path", methods = ["GET"], middleware = [Type])]` - Declares a
///   route for the method; repeatable. `methods` and `middleware` are
///   optional. Middleware types are resolved through the router container.
///
/// Every method taking `&self` becomes a member. Only `pub` methods are
/// routed. Once any method declares a route (or a base path is given), only
/// declared routes are served; otherwise member names map to sub-paths, with
/// `_` read as `/`.
#[proc_macro_attribute]
pub fn routes(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = RoutesArgs::default();
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("base") {
            args.base = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("default") {
            args.construct_default = true;
        } else if meta.path.is_ident("context") {
            args.context = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("output") {
            args.output = Some(meta.value()?.parse()?);
        } else {
            return Err(meta.error("expected `base`, `default`, `context` or `output`"));
        }
        Ok(())
    });
    parse_macro_input!(attr with parser);
    let item = parse_macro_input!(item as ItemImpl);
    routes_impl(args, item)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derives `PathEnum` and `Param` for a fieldless enum.
///
/// # Backing
///
/// - Variants with `#[path_enum(value = "...")]` are matched by that exact
///   string; either every variant carries a value or none does
/// - Enums with explicit discriminants are matched by integer value
/// - Otherwise variants are matched by name, ignoring ASCII case
#[proc_macro_derive(PathEnum, attributes(path_enum))]
pub fn derive_path_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_path_enum_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

#[derive(Default)]
struct RoutesArgs {
    base: Option<LitStr>,
    construct_default: bool,
    context: Option<Type>,
    output: Option<Type>,
}

struct RouteAttr {
    path: LitStr,
    methods: Vec<LitStr>,
    middleware: Vec<Type>,
}

impl Parse for RouteAttr {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let path: LitStr = input.parse()?;
        let mut methods = Vec::new();
        let mut middleware = Vec::new();
        while !input.is_empty() {
            input.parse::<Token![,]>()?;
            if input.is_empty() {
                break;
            }
            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            let content;
            bracketed!(content in input);
            if key == "methods" {
                methods.extend(Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?);
            } else if key == "middleware" {
                middleware.extend(Punctuated::<Type, Token![,]>::parse_terminated(&content)?);
            } else {
                return Err(syn::Error::new_spanned(
                    key,
                    "expected `methods` or `middleware`",
                ));
            }
        }
        Ok(Self {
            path,
            methods,
            middleware,
        })
    }
}

fn routes_impl(args: RoutesArgs, mut item: ItemImpl) -> syn::Result<TokenStream2> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[routes] must be placed on an inherent impl block",
        ));
    }

    let mut members = Vec::new();
    for impl_item in &mut item.items {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };
        let decls = take_route_attrs(method)?;
        if !has_ref_receiver(method) {
            if let Some(first) = decls.first() {
                return Err(syn::Error::new_spanned(
                    &first.path,
                    "route handlers must take `&self`",
                ));
            }
            continue;
        }
        members.push(member_tokens(method, &decls)?);
    }

    let self_ty = &item.self_ty;
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();
    let context = args
        .context
        .map_or_else(|| quote!(()), |ty| quote!(#ty));
    let output = args
        .output
        .map_or_else(|| quote!(::std::string::String), |ty| quote!(#ty));
    let base = match &args.base {
        Some(base) => quote! { ::std::option::Option::Some(#base) },
        None => quote! { ::std::option::Option::None },
    };
    let construct = if args.construct_default {
        quote! {
            fn construct() -> ::std::option::Option<Self> {
                ::std::option::Option::Some(<Self as ::std::default::Default>::default())
            }
        }
    } else {
        quote! {}
    };

    Ok(quote! {
        #item

        impl #impl_generics ::switchyard::Controller<#context, #output> for #self_ty #where_clause {
            const BASE_PATH: ::std::option::Option<&'static str> = #base;

            fn members() -> ::std::vec::Vec<::switchyard::Member<#context, #output>> {
                ::std::vec![#(#members),*]
            }

            #construct
        }
    })
}

/// Removes the `#[route]` attributes of `method` and parses them.
fn take_route_attrs(method: &mut ImplItemFn) -> syn::Result<Vec<RouteAttr>> {
    let mut decls = Vec::new();
    let mut kept = Vec::with_capacity(method.attrs.len());
    for attr in method.attrs.drain(..) {
        if attr.path().is_ident("route") {
            decls.push(attr.parse_args::<RouteAttr>()?);
        } else {
            kept.push(attr);
        }
    }
    method.attrs = kept;
    Ok(decls)
}

fn has_ref_receiver(method: &ImplItemFn) -> bool {
    matches!(
        method.sig.inputs.first(),
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none()
    )
}

fn member_tokens(method: &ImplItemFn, decls: &[RouteAttr]) -> syn::Result<TokenStream2> {
    let ident = &method.sig.ident;
    let name = ident.to_string();
    let public = matches!(method.vis, Visibility::Public(_));
    let params: Vec<String> = method
        .sig
        .inputs
        .iter()
        .skip(1)
        .enumerate()
        .map(|(i, arg)| match arg {
            FnArg::Typed(typed) => match typed.pat.as_ref() {
                Pat::Ident(pat) => pat.ident.to_string().trim_start_matches('_').to_string(),
                _ => format!("arg{i}"),
            },
            FnArg::Receiver(_) => format!("arg{i}"),
        })
        .collect();

    let routes = decls
        .iter()
        .map(route_tokens)
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(quote! {
        ::switchyard::Member::new(#name, Self::#ident)
            .params(&[#(#params),*])
            .public(#public)
            #(.route(#routes))*
    })
}

fn route_tokens(decl: &RouteAttr) -> syn::Result<TokenStream2> {
    let path = &decl.path;
    let methods = decl
        .methods
        .iter()
        .map(|lit| {
            method_variant(&lit.value())
                .map(|variant| {
                    let variant = Ident::new(variant, lit.span());
                    quote! { ::switchyard::Method::#variant }
                })
                .ok_or_else(|| {
                    syn::Error::new_spanned(lit, format!("unknown HTTP method '{}'", lit.value()))
                })
        })
        .collect::<syn::Result<Vec<_>>>()?;
    let middleware = decl.middleware.iter().map(|ty| {
        quote! { .middleware(::switchyard::MiddlewareRef::of::<#ty>()) }
    });

    Ok(quote! {
        ::switchyard::RouteDecl::new(#path)
            .methods([#(#methods),*])
            #(#middleware)*
    })
}

fn method_variant(name: &str) -> Option<&'static str> {
    Some(match name.to_ascii_uppercase().as_str() {
        "GET" => "Get",
        "POST" => "Post",
        "PUT" => "Put",
        "PATCH" => "Patch",
        "DELETE" => "Delete",
        "HEAD" => "Head",
        "OPTIONS" => "Options",
        "TRACE" => "Trace",
        "CONNECT" => "Connect",
        _ => return None,
    })
}

fn derive_path_enum_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let enum_name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "PathEnum derive does not support generic enums",
        ));
    }
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input,
            "PathEnum derive only supports enums",
        ));
    };

    let mut variants = Vec::new();
    let mut values = Vec::new();
    let mut discriminants = Vec::new();
    let mut next_discriminant = 0_i64;
    let mut any_discriminant = false;
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "PathEnum variants cannot carry fields",
            ));
        }
        let discriminant = match &variant.discriminant {
            Some((_, expr)) => {
                any_discriminant = true;
                int_literal(expr)?
            }
            None => next_discriminant,
        };
        next_discriminant = discriminant.wrapping_add(1);
        discriminants.push(discriminant);
        values.push(path_enum_value(variant)?);
        variants.push(&variant.ident);
    }

    let with_value = values.iter().filter(|v| v.is_some()).count();
    if with_value != 0 && with_value != values.len() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "either every variant has #[path_enum(value = \"...\")] or none does",
        ));
    }

    let (backing, case_values): (TokenStream2, Vec<TokenStream2>) = if with_value != 0 {
        (
            quote!(String),
            values
                .iter()
                .flatten()
                .map(|v| quote! { ::switchyard::CaseValue::Str(#v) })
                .collect(),
        )
    } else if any_discriminant {
        (
            quote!(Int),
            discriminants
                .iter()
                .map(|d| quote! { ::switchyard::CaseValue::Int(#d) })
                .collect(),
        )
    } else {
        (
            quote!(Unit),
            variants
                .iter()
                .map(|_| quote! { ::switchyard::CaseValue::Unit })
                .collect(),
        )
    };

    let name_str = enum_name.to_string();
    let variant_names: Vec<String> = variants.iter().map(ToString::to_string).collect();
    let indices: Vec<usize> = (0..variants.len()).collect();

    Ok(quote! {
        impl ::switchyard::PathEnum for #enum_name {
            const SPEC: ::switchyard::EnumSpec = ::switchyard::EnumSpec {
                name: #name_str,
                backing: ::switchyard::EnumBacking::#backing,
                cases: &[#(::switchyard::EnumCase {
                    name: #variant_names,
                    value: #case_values,
                }),*],
            };

            fn from_case(index: usize) -> ::std::option::Option<Self> {
                match index {
                    #(#indices => ::std::option::Option::Some(Self::#variants),)*
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl<__C> ::switchyard::Param<__C> for #enum_name {
            fn shape() -> ::switchyard::ParamShape {
                ::switchyard::ParamShape::of_enum::<Self>()
            }

            fn extract(arg: ::switchyard::Arg<'_, __C>) -> ::std::option::Option<Self> {
                ::switchyard::extract_enum(arg)
            }
        }
    })
}

fn int_literal(expr: &Expr) -> syn::Result<i64> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Int(int), ..
        }) => int.base10_parse(),
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr,
            ..
        }) => int_literal(expr).map(|v| -v),
        _ => Err(syn::Error::new_spanned(
            expr,
            "PathEnum discriminants must be integer literals",
        )),
    }
}

fn path_enum_value(variant: &syn::Variant) -> syn::Result<Option<LitStr>> {
    let mut value = None;
    for attr in &variant.attrs {
        if attr.path().is_ident("path_enum") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("value") {
                    value = Some(meta.value()?.parse::<LitStr>()?);
                    Ok(())
                } else {
                    Err(meta.error("expected `value`"))
                }
            })?;
        }
    }
    Ok(value)
}
