//! Derives for the backend packet types: wire encoding and decoding,
//! and `From` conversions into the per-phase packet enums.

use syn::{parse_macro_input, DeriveInput};

mod from_variants;
mod protocol;

fn expand(
    input: proc_macro::TokenStream,
    derive: fn(&DeriveInput) -> syn::Result<proc_macro2::TokenStream>,
) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive(&input).unwrap_or_else(syn::Error::into_compile_error).into()
}

/// Field options: `varint`, `varlong`, `angle`, `bool_prefixed`,
/// `length_prefix = "varint" | "inferred"` and `varint_items`. Enums
/// need `discriminant = "varint"` and an `id` or `fallback` per variant.
#[proc_macro_derive(Encode, attributes(encoding))]
pub fn derive_encode(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    expand(input, protocol::derive_encode_on)
}

#[proc_macro_derive(Decode, attributes(encoding))]
pub fn derive_decode(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    expand(input, protocol::derive_decode_on)
}

#[proc_macro_derive(FromVariants)]
pub fn derive_from_variants(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    expand(input, from_variants::derive_from_variants_on)
}
