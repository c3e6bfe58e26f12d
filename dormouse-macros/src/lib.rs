extern crate proc_macro;
use proc_macro::TokenStream;

pub(crate) mod crate_path;
pub(crate) mod entity_derive;

/// Derive macro for a persistable entity.
///
/// Generates `Mapped` (the descriptor discovery and the executor read) and
/// `Entity` (identity access and row conversion).
///
/// # Struct-level attribute
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `#[entity(table = "...")]` | Table name (default: the type name in snake case) |
///
/// # Field attributes
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `#[entity(id)]` | Identity field, generated by the database when it is an integer. A field named `id` is picked up without the attribute. |
/// | `#[entity(assigned)]` | Identity field whose value the application supplies |
/// | `#[entity(column = "...")]` | Column name (default: the field name) |
/// | `#[entity(transient)]` | Not mapped; filled with `Default::default()` when loading |
///
/// Every mapped field type must implement `FieldType` (integers, floats,
/// `bool`, `String`, `Vec<u8>` and `Option`s of those).
///
/// # Example
///
/// ```ignore
/// use dormouse::prelude::*;
///
/// #[derive(Debug, Clone, Entity)]
/// #[entity(table = "users")]
/// pub struct User {
///     #[entity(id)]
///     pub id: i64,
///     pub name: String,
///     #[entity(column = "e_mail")]
///     pub email: Option<String>,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity_derive::expand_entity(input)
}

/// Derive macro for a mapping fragment: an embeddable value or a mapped
/// base type. The type takes part in discovery but gets no table.
///
/// ```ignore
/// #[derive(Debug, Clone, Mapped)]
/// #[mapped(embeddable)]
/// pub struct Address {
///     pub street: String,
///     pub city: String,
/// }
/// ```
#[proc_macro_derive(Mapped, attributes(mapped))]
pub fn derive_mapped(input: TokenStream) -> TokenStream {
    entity_derive::expand_mapped(input)
}
