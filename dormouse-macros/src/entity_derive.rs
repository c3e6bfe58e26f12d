use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

use crate::crate_path::dormouse_data_path;

/// Which derive is being expanded. Decides the attribute namespace and the
/// marker written into the descriptor.
#[derive(Clone, Copy, PartialEq)]
enum Kind {
    Entity,
    Mapped,
}

impl Kind {
    fn attr(self) -> &'static str {
        match self {
            Kind::Entity => "entity",
            Kind::Mapped => "mapped",
        }
    }

    fn derive(self) -> &'static str {
        match self {
            Kind::Entity => "#[derive(Entity)]",
            Kind::Mapped => "#[derive(Mapped)]",
        }
    }
}

#[derive(Clone, Copy)]
enum MarkerKind {
    Persistable,
    Embeddable,
    MappedBase,
}

struct TypeAttrs {
    table: Option<String>,
    marker: Option<MarkerKind>,
}

/// Parsed information about a single field.
struct FieldInfo {
    ident: syn::Ident,
    ty: syn::Type,
    column: String,
    id: bool,
    /// Identity supplied by the application rather than the database.
    assigned: bool,
    transient: bool,
}

pub fn expand_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match generate(&input, Kind::Entity) {
        Ok(output) => output.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

pub fn expand_mapped(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match generate(&input, Kind::Mapped) {
        Ok(output) => output.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// `UserAccount` -> `user_account`.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn extract_type_attrs(input: &DeriveInput, kind: Kind) -> syn::Result<TypeAttrs> {
    let mut attrs = TypeAttrs {
        table: None,
        marker: None,
    };
    for attr in &input.attrs {
        if !attr.path().is_ident(kind.attr()) {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let lit: syn::LitStr = meta.value()?.parse()?;
                attrs.table = Some(lit.value());
                Ok(())
            } else if kind == Kind::Mapped && meta.path.is_ident("embeddable") {
                attrs.marker = Some(MarkerKind::Embeddable);
                Ok(())
            } else if kind == Kind::Mapped && meta.path.is_ident("base") {
                attrs.marker = Some(MarkerKind::MappedBase);
                Ok(())
            } else if kind == Kind::Mapped {
                Err(meta.error("expected `embeddable`, `base`, or `table` in #[mapped(...)]"))
            } else {
                Err(meta.error("expected `table` in #[entity(...)]"))
            }
        })?;
    }
    if kind == Kind::Entity {
        attrs.marker = Some(MarkerKind::Persistable);
    }
    Ok(attrs)
}

fn extract_field(field: &syn::Field, kind: Kind) -> syn::Result<FieldInfo> {
    let ident = field
        .ident
        .clone()
        .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
    let mut info = FieldInfo {
        column: ident.to_string(),
        ident,
        ty: field.ty.clone(),
        id: false,
        assigned: false,
        transient: false,
    };
    for attr in &field.attrs {
        if !attr.path().is_ident(kind.attr()) {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                let lit: syn::LitStr = meta.value()?.parse()?;
                info.column = lit.value();
                Ok(())
            } else if meta.path.is_ident("transient") {
                info.transient = true;
                Ok(())
            } else if kind == Kind::Entity && meta.path.is_ident("id") {
                info.id = true;
                Ok(())
            } else if kind == Kind::Entity && meta.path.is_ident("assigned") {
                info.id = true;
                info.assigned = true;
                Ok(())
            } else if kind == Kind::Entity {
                Err(meta.error(
                    "expected `id`, `assigned`, `column`, or `transient` in #[entity(...)]",
                ))
            } else {
                Err(meta.error("expected `column` or `transient` in #[mapped(...)]"))
            }
        })?;
    }
    if info.id && info.transient {
        return Err(syn::Error::new_spanned(
            &info.ident,
            "the identity field cannot be transient",
        ));
    }
    Ok(info)
}

fn generate(input: &DeriveInput, kind: Kind) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let krate = dormouse_data_path();

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            format!("{} does not support generic types", kind.derive()),
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    format!("{} only works on structs with named fields", kind.derive()),
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                format!("{} only works on structs", kind.derive()),
            ))
        }
    };

    let type_attrs = extract_type_attrs(input, kind)?;
    let marker = match type_attrs.marker {
        Some(MarkerKind::Persistable) => quote!(#krate::entity::Marker::Persistable),
        Some(MarkerKind::Embeddable) => quote!(#krate::entity::Marker::Embeddable),
        Some(MarkerKind::MappedBase) => quote!(#krate::entity::Marker::MappedBase),
        None => {
            return Err(syn::Error::new_spanned(
                name,
                "#[derive(Mapped)] requires #[mapped(embeddable)] or #[mapped(base)]\n\
                 \n  example:\n  #[derive(Mapped)]\n  #[mapped(embeddable)]\n  pub struct Address { ... }",
            ))
        }
    };
    let table = type_attrs
        .table
        .unwrap_or_else(|| snake_case(&name.to_string()));
    let name_str = name.to_string();

    let mut infos = fields
        .iter()
        .map(|f| extract_field(f, kind))
        .collect::<syn::Result<Vec<_>>>()?;

    if kind == Kind::Entity {
        let explicit = infos.iter().filter(|f| f.id).count();
        if explicit > 1 {
            return Err(syn::Error::new_spanned(
                name,
                "#[derive(Entity)] allows a single #[entity(id)] field",
            ));
        }
        if explicit == 0 {
            match infos.iter_mut().find(|f| f.ident == "id" && !f.transient) {
                Some(field) => field.id = true,
                None => {
                    return Err(syn::Error::new_spanned(
                        name,
                        "#[derive(Entity)] requires an identity field\n\
                         \n  mark one with #[entity(id)] or name it `id`",
                    ))
                }
            }
        }
    }

    let (mapped, transient): (Vec<&FieldInfo>, Vec<&FieldInfo>) =
        infos.iter().partition(|f| !f.transient);

    let columns = mapped.iter().map(|f| {
        let field = f.ident.to_string();
        let column = &f.column;
        let ty = &f.ty;
        let id = f.id;
        let generated = if f.id && !f.assigned {
            quote!(<#ty as #krate::value::FieldType>::COLUMN_TYPE == #krate::value::ColumnType::Integer)
        } else {
            quote!(false)
        };
        quote! {
            .column(#krate::entity::ColumnDescriptor {
                field: #field,
                column: #column,
                column_type: <#ty as #krate::value::FieldType>::COLUMN_TYPE,
                nullable: <#ty as #krate::value::FieldType>::NULLABLE,
                id: #id,
                generated: #generated,
            })
        }
    });

    let mapped_impl = quote! {
        impl #krate::entity::Mapped for #name {
            fn descriptor() -> &'static #krate::entity::EntityDescriptor {
                static DESCRIPTOR: ::std::sync::OnceLock<#krate::entity::EntityDescriptor> =
                    ::std::sync::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    #krate::entity::EntityDescriptor::new(
                        ::core::concat!(::core::module_path!(), "::", #name_str),
                        #table,
                        #marker,
                    )
                    #(#columns)*
                })
            }
        }
    };

    if kind == Kind::Mapped {
        return Ok(mapped_impl);
    }

    let id_field = mapped
        .iter()
        .find(|f| f.id)
        .ok_or_else(|| syn::Error::new_spanned(name, "missing identity field"))?;
    let id_ident = &id_field.ident;
    let id_ty = &id_field.ty;
    let id_column = &id_field.column;

    let value_exprs = mapped.iter().map(|f| {
        let ident = &f.ident;
        quote!(::core::convert::Into::into(::core::clone::Clone::clone(&self.#ident)))
    });
    let decode_fields = mapped.iter().map(|f| {
        let ident = &f.ident;
        let ty = &f.ty;
        let column = &f.column;
        quote! {
            #ident: <#ty as #krate::value::FromValue>::from_value(record.take(#column)?, #column)?
        }
    });
    let default_fields = transient.iter().map(|f| {
        let ident = &f.ident;
        quote!(#ident: ::core::default::Default::default())
    });

    Ok(quote! {
        #mapped_impl

        impl #krate::entity::Entity for #name {
            fn id(&self) -> #krate::value::Value {
                ::core::convert::Into::into(::core::clone::Clone::clone(&self.#id_ident))
            }

            fn set_id(
                &mut self,
                id: #krate::value::Value,
            ) -> ::core::result::Result<(), #krate::value::ValueError> {
                self.#id_ident = <#id_ty as #krate::value::FromValue>::from_value(id, #id_column)?;
                ::core::result::Result::Ok(())
            }

            fn to_values(&self) -> ::std::vec::Vec<#krate::value::Value> {
                ::std::vec![#(#value_exprs),*]
            }

            fn from_record(
                record: &mut #krate::entity::Record,
            ) -> ::core::result::Result<Self, #krate::value::ValueError> {
                ::core::result::Result::Ok(Self {
                    #(#decode_fields,)*
                    #(#default_fields,)*
                })
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::snake_case;

    #[test]
    fn snake_case_table_names() {
        assert_eq!(snake_case("User"), "user");
        assert_eq!(snake_case("UserAccount"), "user_account");
        assert_eq!(snake_case("order"), "order");
    }
}
