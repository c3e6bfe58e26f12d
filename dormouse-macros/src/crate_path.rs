//! Crate path resolution for generated code.
//!
//! Detects whether the user depends on `dormouse` (facade) or `dormouse-data`
//! directly, and returns the appropriate path prefix for generated code.

use proc_macro2::TokenStream;
use proc_macro_crate::{crate_name, FoundCrate};
use quote::quote;

fn found_path(found: FoundCrate, itself: &str) -> TokenStream {
    let name = match found {
        FoundCrate::Itself => itself.to_string(),
        FoundCrate::Name(name) => name,
    };
    let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
    quote!(::#ident)
}

/// Returns the token stream for accessing `dormouse_data` types.
///
/// Both the facade and `dormouse-data` expose the `entity` and `value`
/// modules at their root. Integration tests of the facade see it as
/// `Itself`, so that case still resolves through the crate name.
pub fn dormouse_data_path() -> TokenStream {
    if let Ok(found) = crate_name("dormouse") {
        found_path(found, "dormouse")
    } else if let Ok(found) = crate_name("dormouse-data") {
        found_path(found, "dormouse_data")
    } else {
        // Fallback - assume the facade is available (for error messages)
        quote!(::dormouse)
    }
}
