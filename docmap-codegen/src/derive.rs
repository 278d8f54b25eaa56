//! Implementation of the `#[derive(Document)]` macro.

use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{
    Data, DeriveInput, Expr, ExprLit, ExprUnary, Fields, GenericArgument, Ident, Lit, LitStr,
    PathArguments, Type, UnOp, meta::ParseNestedMeta, parse_quote,
};

/// Container types looked through when resolving the mapped type a member holds.
const WRAPPERS: &[&str] = &["Option", "Vec", "Box", "Arc", "Rc", "VecDeque", "HashSet"];

/// Parse and generate code for the `#[derive(Document)]` macro.
pub fn derive_document_impl(input: &DeriveInput) -> Result<TokenStream, syn::Error> {
    let name = &input.ident;
    let simple_name = name.to_string();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            Fields::Unit => return Ok(generate(input, &parse_struct_attrs(input)?, &[])),
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Document derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Document derive only supports structs",
            ));
        }
    };

    let struct_attrs = parse_struct_attrs(input)?;

    let mut field_infos = Vec::with_capacity(fields.len());
    for field in fields {
        if let Some(info) = parse_field(field)? {
            field_infos.push(info);
        }
    }

    // At most one member may be the id.
    let ids: Vec<_> = field_infos.iter().filter(|f| f.is_id).collect();
    if ids.len() > 1 {
        return Err(syn::Error::new_spanned(
            &ids[1].name,
            format!(
                "{simple_name} declares more than one id: `{}` and `{}`",
                ids[0].name, ids[1].name
            ),
        ));
    }

    Ok(generate(input, &struct_attrs, &field_infos))
}

/// Struct-level attributes.
#[derive(Debug, Default)]
struct StructAttrs {
    collection: Option<String>,
    markers: Vec<String>,
    implements: Vec<String>,
}

fn parse_struct_attrs(input: &DeriveInput) -> Result<StructAttrs, syn::Error> {
    let mut attrs = StructAttrs::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("docmap") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().trim().is_empty() {
                    return Err(meta.error("collection name must not be empty"));
                }
                attrs.collection = Some(value.value());
            } else if meta.path.is_ident("marker") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.markers.push(value.value());
            } else if meta.path.is_ident("implements") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.implements.push(value.value());
            } else {
                return Err(meta.error("unknown docmap struct attribute"));
            }
            Ok(())
        })?;
    }

    Ok(attrs)
}

/// Index options of a field.
#[derive(Debug, Default)]
struct IndexInfo {
    unique: bool,
    name: Option<String>,
}

/// Geospatial index options of a field; unset bounds keep the runtime defaults.
#[derive(Debug, Default)]
struct GeoIndexInfo {
    name: Option<String>,
    min: Option<i32>,
    max: Option<i32>,
    bits: Option<i32>,
}

/// Information about a field.
#[derive(Debug)]
struct FieldInfo {
    name: Ident,
    ty: Type,
    field_name: Option<String>,
    order: Option<i32>,
    is_id: bool,
    is_reference: bool,
    is_embedded: bool,
    is_flatten: bool,
    index: Option<IndexInfo>,
    geo_index: Option<GeoIndexInfo>,
}

/// Parse a field; transient fields yield `None`.
fn parse_field(field: &syn::Field) -> Result<Option<FieldInfo>, syn::Error> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| syn::Error::new_spanned(field, "Fields must be named"))?;

    let mut info = FieldInfo {
        name,
        ty: field.ty.clone(),
        field_name: None,
        order: None,
        is_id: false,
        is_reference: false,
        is_embedded: false,
        is_flatten: false,
        index: None,
        geo_index: None,
    };
    let mut transient = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("docmap") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                info.is_id = true;
            } else if meta.path.is_ident("transient") {
                transient = true;
            } else if meta.path.is_ident("reference") {
                info.is_reference = true;
            } else if meta.path.is_ident("embedded") {
                info.is_embedded = true;
            } else if meta.path.is_ident("flatten") {
                info.is_flatten = true;
            } else if meta.path.is_ident("field") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().is_empty() {
                    return Err(meta.error("field name must not be empty"));
                }
                info.field_name = Some(value.value());
            } else if meta.path.is_ident("order") {
                info.order = Some(parse_i32(&meta)?);
            } else if meta.path.is_ident("unique") {
                info.index.get_or_insert_with(IndexInfo::default).unique = true;
            } else if meta.path.is_ident("indexed") {
                let index = info.index.get_or_insert_with(IndexInfo::default);
                if meta.input.peek(syn::token::Paren) {
                    meta.parse_nested_meta(|inner| {
                        if inner.path.is_ident("name") {
                            let value: LitStr = inner.value()?.parse()?;
                            index.name = Some(value.value());
                        } else if inner.path.is_ident("unique") {
                            index.unique = true;
                        } else {
                            return Err(inner.error("unknown index option"));
                        }
                        Ok(())
                    })?;
                }
            } else if meta.path.is_ident("geo_index") {
                let geo = info.geo_index.get_or_insert_with(GeoIndexInfo::default);
                if meta.input.peek(syn::token::Paren) {
                    meta.parse_nested_meta(|inner| {
                        if inner.path.is_ident("name") {
                            let value: LitStr = inner.value()?.parse()?;
                            geo.name = Some(value.value());
                        } else if inner.path.is_ident("min") {
                            geo.min = Some(parse_i32(&inner)?);
                        } else if inner.path.is_ident("max") {
                            geo.max = Some(parse_i32(&inner)?);
                        } else if inner.path.is_ident("bits") {
                            geo.bits = Some(parse_i32(&inner)?);
                        } else {
                            return Err(inner.error("unknown geo_index option"));
                        }
                        Ok(())
                    })?;
                }
            } else {
                return Err(meta.error("unknown docmap field attribute"));
            }
            Ok(())
        })?;
    }

    if transient {
        if info.is_id {
            return Err(syn::Error::new_spanned(
                &info.name,
                "an id field cannot be transient",
            ));
        }
        return Ok(None);
    }

    Ok(Some(info))
}

/// Parse `= <int>` where the literal may be negated.
fn parse_i32(meta: &ParseNestedMeta) -> Result<i32, syn::Error> {
    let expr: Expr = meta.value()?.parse()?;
    int_literal(&expr)
}

fn int_literal(expr: &Expr) -> Result<i32, syn::Error> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Int(lit), ..
        }) => lit.base10_parse(),
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr: inner,
            ..
        }) => {
            let value: i64 = match inner.as_ref() {
                Expr::Lit(ExprLit {
                    lit: Lit::Int(lit), ..
                }) => lit.base10_parse()?,
                other => return Err(syn::Error::new_spanned(other, "expected an integer literal")),
            };
            i32::try_from(-value)
                .map_err(|_| syn::Error::new_spanned(expr, "integer out of range for i32"))
        }
        Expr::Group(group) => int_literal(&group.expr),
        other => Err(syn::Error::new_spanned(
            other,
            "expected an integer literal",
        )),
    }
}

/// The mapped type a member holds, looking through common containers.
fn held_type(ty: &Type) -> &Type {
    match ty {
        Type::Path(type_path) if type_path.qself.is_none() => {
            let Some(segment) = type_path.path.segments.last() else {
                return ty;
            };
            if !WRAPPERS.iter().any(|w| segment.ident == w) {
                return ty;
            }
            if let PathArguments::AngleBracketed(args) = &segment.arguments {
                for arg in &args.args {
                    if let GenericArgument::Type(inner) = arg {
                        return held_type(inner);
                    }
                }
            }
            ty
        }
        Type::Array(array) => held_type(&array.elem),
        Type::Slice(slice) => held_type(&slice.elem),
        Type::Group(group) => held_type(&group.elem),
        Type::Paren(paren) => held_type(&paren.elem),
        _ => ty,
    }
}

/// Declared type as a compact string, e.g. `Option<Box<Node>>`.
fn type_label(ty: &Type) -> String {
    ty.to_token_stream()
        .to_string()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn generate_field(field: &FieldInfo) -> TokenStream {
    let name = field.name.to_string();
    let type_name = type_label(&field.ty);
    let mut chain = Vec::new();

    if field.is_id {
        chain.push(quote! { .id() });
    }
    if let Some(field_name) = &field.field_name {
        chain.push(quote! { .field_name(#field_name) });
    }
    if let Some(order) = field.order {
        chain.push(quote! { .order(#order) });
    }
    if field.is_reference {
        chain.push(quote! { .reference() });
    }
    if field.is_embedded {
        chain.push(quote! { .embedded() });
    }
    if field.is_flatten {
        chain.push(quote! { .flatten() });
    }
    if let Some(index) = &field.index {
        let unique = index.unique;
        let name = option_str(index.name.as_deref());
        chain.push(quote! {
            .indexed(::docmap::mapping::IndexSpec { unique: #unique, name: #name })
        });
    }
    if let Some(geo) = &field.geo_index {
        let mut members = vec![];
        if let Some(name) = &geo.name {
            members.push(quote! { name: ::core::option::Option::Some(#name) });
        }
        if let Some(min) = geo.min {
            members.push(quote! { min: #min });
        }
        if let Some(max) = geo.max {
            members.push(quote! { max: #max });
        }
        if let Some(bits) = geo.bits {
            members.push(quote! { bits: #bits });
        }
        chain.push(quote! {
            .geo_index(::docmap::mapping::GeoIndexSpec {
                #(#members,)*
                ..::core::default::Default::default()
            })
        });
    }
    if field.is_reference || field.is_embedded || field.is_flatten {
        let held = held_type(&field.ty);
        chain.push(quote! {
            .target(<#held as ::docmap::mapping::MappedType>::descriptor)
        });
    }

    quote! {
        .with_field(::docmap::mapping::FieldDescriptor::new(#name, #type_name) #(#chain)*)
    }
}

fn option_str(value: Option<&str>) -> TokenStream {
    match value {
        Some(v) => quote! { ::core::option::Option::Some(#v) },
        None => quote! { ::core::option::Option::None },
    }
}

fn generate(input: &DeriveInput, attrs: &StructAttrs, fields: &[FieldInfo]) -> TokenStream {
    let name = &input.ident;
    let simple_name = name.to_string();

    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!('static));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let collection = attrs
        .collection
        .as_ref()
        .map(|c| quote! { .with_collection(#c) });
    let markers = attrs.markers.iter().map(|m| quote! { .with_marker(#m) });
    let implements = attrs
        .implements
        .iter()
        .map(|i| quote! { .with_implements(#i) });
    let field_tokens = fields.iter().map(generate_field);

    quote! {
        impl #impl_generics ::docmap::mapping::MappedType for #name #ty_generics #where_clause {
            fn descriptor() -> ::docmap::mapping::TypeDescriptor {
                ::docmap::mapping::TypeDescriptor::of::<Self>(#simple_name)
                    .with_marker(::docmap::mapping::DOCUMENT_MARKER)
                    #collection
                    #(#markers)*
                    #(#implements)*
                    #(#field_tokens)*
            }
        }
    }
}
