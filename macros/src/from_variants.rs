//! Derives `From<Inner>` for every single-field tuple variant of an enum.

use proc_macro2::TokenStream;
use quote::{quote, ToTokens};
use syn::{Data, DeriveInput, Fields};

pub fn derive_from_variants_on(input: &DeriveInput) -> syn::Result<TokenStream> {
    let Data::Enum(en) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "FromVariants can only be derived on enums",
        ));
    };

    let enum_ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut seen = Vec::new();
    let mut impls = Vec::new();
    for variant in &en.variants {
        let Fields::Unnamed(fields) = &variant.fields else {
            continue;
        };
        if fields.unnamed.len() != 1 {
            continue;
        }

        let ty = &fields.unnamed[0].ty;
        // Two variants wrapping the same type would produce conflicting impls.
        let key = ty.to_token_stream().to_string();
        if seen.contains(&key) {
            return Err(syn::Error::new_spanned(
                ty,
                "type is wrapped by more than one variant",
            ));
        }
        seen.push(key);

        let variant_ident = &variant.ident;
        impls.push(quote! {
            impl #impl_generics From<#ty> for #enum_ident #ty_generics #where_clause {
                fn from(value: #ty) -> Self {
                    Self::#variant_ident(value)
                }
            }
        });
    }

    Ok(quote! {
        #(#impls)*
    })
}
