//! `Encode`/`Decode` derives for backend packet types.
//!
//! Every field is turned into a [`FieldCodec`] first, so option
//! validation happens once and both derives generate code from the same
//! description.

use darling::{FromDeriveInput, FromField, FromMeta, FromVariant};
use proc_macro2::{Ident, Span, TokenStream};
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields};

#[derive(Default, FromField)]
#[darling(attributes(encoding), default)]
struct FieldOptions {
    varint: bool,
    varlong: bool,
    /// One byte, 256 steps per full turn.
    angle: bool,
    /// `Option<T>` preceded by a presence flag.
    bool_prefixed: bool,
    length_prefix: Option<ListLength>,
    varint_items: bool,
}

#[derive(Clone, Copy, FromMeta)]
enum ListLength {
    #[darling(rename = "varint")]
    VarInt,
    /// Everything up to the end of the packet. Last field only.
    #[darling(rename = "inferred")]
    Inferred,
}

/// How one field is laid out on the wire.
enum FieldCodec {
    Plain,
    VarInt,
    VarLong,
    Angle,
    Optional,
    List { length: ListLength, varint_items: bool },
}

impl FieldOptions {
    fn codec(&self, span: Span) -> syn::Result<FieldCodec> {
        let chosen = [
            self.varint,
            self.varlong,
            self.angle,
            self.bool_prefixed,
            self.length_prefix.is_some(),
        ];
        if chosen.iter().filter(|set| **set).count() > 1 {
            return Err(syn::Error::new(span, "conflicting encoding options"));
        }
        if self.varint_items && self.length_prefix.is_none() {
            return Err(syn::Error::new(span, "`varint_items` needs a `length_prefix`"));
        }
        Ok(match self.length_prefix {
            Some(length) => FieldCodec::List {
                length,
                varint_items: self.varint_items,
            },
            None if self.varint => FieldCodec::VarInt,
            None if self.varlong => FieldCodec::VarLong,
            None if self.angle => FieldCodec::Angle,
            None if self.bool_prefixed => FieldCodec::Optional,
            None => FieldCodec::Plain,
        })
    }
}

#[derive(FromDeriveInput)]
#[darling(attributes(encoding))]
struct EnumOptions {
    discriminant: Discriminant,
}

/// Only varint packet ids occur in the Java protocol.
#[derive(FromMeta)]
enum Discriminant {
    #[darling(rename = "varint")]
    VarInt,
}

#[derive(FromVariant)]
#[darling(attributes(encoding))]
struct VariantOptions {
    #[darling(default)]
    id: Option<i32>,
    /// Takes every id no other variant claims, as a `RawPacket`.
    #[darling(default)]
    fallback: bool,
}

struct Field {
    name: Ident,
    codec: FieldCodec,
}

enum Shape {
    Named,
    Tuple,
    Unit,
}

/// The fields of a struct or of one enum variant.
struct Body {
    shape: Shape,
    fields: Vec<Field>,
}

impl Body {
    fn parse(fields: &Fields) -> syn::Result<Self> {
        let shape = match fields {
            Fields::Named(_) => Shape::Named,
            Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => Shape::Tuple,
            Fields::Unnamed(unnamed) => {
                return Err(syn::Error::new_spanned(
                    unnamed,
                    "only single-field tuple variants are supported",
                ))
            }
            Fields::Unit => Shape::Unit,
        };
        let fields = fields
            .iter()
            .enumerate()
            .map(|(index, field)| {
                let options = FieldOptions::from_field(field)?;
                let span = field
                    .ident
                    .as_ref()
                    .map_or_else(Span::call_site, Ident::span);
                Ok(Field {
                    name: field.ident.clone().unwrap_or_else(|| format_ident!("__{index}")),
                    codec: options.codec(span)?,
                })
            })
            .collect::<syn::Result<_>>()?;
        Ok(Self { shape, fields })
    }

    fn names(&self) -> impl Iterator<Item = &Ident> {
        self.fields.iter().map(|field| &field.name)
    }

    /// Pattern (after the path) binding every field by its name.
    fn pattern(&self) -> TokenStream {
        let names = self.names();
        match self.shape {
            Shape::Named => quote! { { #(#names),* } },
            Shape::Tuple => quote! { ( #(#names),* ) },
            Shape::Unit => quote! {},
        }
    }

    fn encode(&self) -> TokenStream {
        let writes = self.fields.iter().map(encode_field);
        quote! { #(#writes)* }
    }

    /// Reads every field into a local, then builds `path` from them.
    fn decode_into(&self, path: TokenStream) -> TokenStream {
        let reads = self.fields.iter().map(decode_field);
        let pattern = self.pattern();
        quote! {
            #(#reads)*
            Ok(#path #pattern)
        }
    }
}

/// `value` is a reference to the field.
fn encode_field(field: &Field) -> TokenStream {
    let value = &field.name;
    match &field.codec {
        FieldCodec::Plain => quote! {
            crate::protocol::Encode::encode(#value, encoder);
        },
        FieldCodec::VarInt => quote! {
            encoder.write_var_int((*#value).try_into().unwrap_or(i32::MAX));
        },
        FieldCodec::VarLong => quote! {
            encoder.write_var_long((*#value).try_into().unwrap_or(i64::MAX));
        },
        FieldCodec::Angle => quote! {
            encoder.write_angle(*#value);
        },
        FieldCodec::Optional => quote! {
            encoder.write_bool(#value.is_some());
            if let Some(present) = #value {
                crate::protocol::Encode::encode(present, encoder);
            }
        },
        FieldCodec::List { length, varint_items } => {
            let length = match length {
                ListLength::VarInt => quote! {
                    encoder.write_var_int(#value.len().try_into().unwrap_or(i32::MAX));
                },
                ListLength::Inferred => quote! {},
            };
            let item = if *varint_items {
                quote! { encoder.write_var_int((*item).try_into().unwrap_or(i32::MAX)); }
            } else {
                quote! { crate::protocol::Encode::encode(item, encoder); }
            };
            quote! {
                #length
                for item in #value.iter() {
                    #item
                }
            }
        }
    }
}

fn decode_field(field: &Field) -> TokenStream {
    let name = &field.name;
    let read = match &field.codec {
        FieldCodec::Plain => quote! { crate::protocol::Decode::decode(decoder)? },
        FieldCodec::VarInt => quote! { decoder.read_var_int()?.try_into()? },
        FieldCodec::VarLong => quote! { decoder.read_var_long()?.try_into()? },
        FieldCodec::Angle => quote! { decoder.read_angle()? },
        FieldCodec::Optional => quote! {
            if decoder.read_bool()? {
                Some(crate::protocol::Decode::decode(decoder)?)
            } else {
                None
            }
        },
        FieldCodec::List { length, varint_items } => {
            let item = if *varint_items {
                quote! { decoder.read_var_int()?.try_into()? }
            } else {
                quote! { crate::protocol::Decode::decode(decoder)? }
            };
            match length {
                ListLength::VarInt => quote! {{
                    let count = usize::try_from(decoder.read_var_int()?)?;
                    let mut items = Vec::with_capacity(count.min(decoder.buffer().len()));
                    for _ in 0..count {
                        items.push(#item);
                    }
                    items
                }},
                ListLength::Inferred => quote! {{
                    let mut items = Vec::new();
                    while !decoder.is_finished() {
                        items.push(#item);
                    }
                    items
                }},
            }
        }
    };
    quote! { let #name = #read; }
}

struct Variant {
    ident: Ident,
    id: Option<i32>,
    fallback: bool,
    body: Body,
}

enum Input {
    Struct(Body),
    Enum(Vec<Variant>),
}

fn parse_input(input: &DeriveInput) -> syn::Result<Input> {
    match &input.data {
        Data::Struct(data) => {
            if let Fields::Unnamed(unnamed) = &data.fields {
                return Err(syn::Error::new_spanned(
                    unnamed,
                    "tuple structs are not supported",
                ));
            }
            Body::parse(&data.fields).map(Input::Struct)
        }
        Data::Enum(data) => {
            let EnumOptions {
                discriminant: Discriminant::VarInt,
            } = EnumOptions::from_derive_input(input)?;
            let mut variants = Vec::new();
            for variant in &data.variants {
                let options = VariantOptions::from_variant(variant)?;
                if options.id.is_none() && !options.fallback {
                    return Err(syn::Error::new_spanned(
                        &variant.ident,
                        "variant needs `id = ..` or `fallback`",
                    ));
                }
                variants.push(Variant {
                    ident: variant.ident.clone(),
                    id: options.id,
                    fallback: options.fallback,
                    body: Body::parse(&variant.fields)?,
                });
            }
            if variants.iter().filter(|variant| variant.fallback).count() > 1 {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "at most one variant can be the fallback",
                ));
            }
            Ok(Input::Enum(variants))
        }
        Data::Union(data) => Err(syn::Error::new_spanned(
            data.union_token,
            "unions cannot be encoded",
        )),
    }
}

pub fn derive_encode_on(input: &DeriveInput) -> syn::Result<TokenStream> {
    let body = match parse_input(input)? {
        Input::Struct(body) if body.fields.is_empty() => quote! {},
        Input::Struct(body) => {
            let pattern = body.pattern();
            let encode = body.encode();
            quote! {
                let Self #pattern = self;
                #encode
            }
        }
        Input::Enum(variants) => {
            let arms = variants.iter().map(|variant| {
                let ident = &variant.ident;
                let pattern = variant.body.pattern();
                let encode = variant.body.encode();
                // The raw packet writes its own id.
                let id = match variant.id {
                    Some(id) if !variant.fallback => quote! { encoder.write_var_int(#id); },
                    _ => quote! {},
                };
                quote! {
                    Self::#ident #pattern => {
                        #id
                        #encode
                    }
                }
            });
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
    };
    let ident = &input.ident;
    Ok(quote! {
        impl crate::protocol::Encode for #ident {
            fn encode(&self, encoder: &mut crate::protocol::Encoder) {
                #body
            }
        }
    })
}

pub fn derive_decode_on(input: &DeriveInput) -> syn::Result<TokenStream> {
    let body = match parse_input(input)? {
        Input::Struct(body) => body.decode_into(quote! { Self }),
        Input::Enum(variants) => {
            let mut arms = Vec::new();
            let mut fallback = quote! {
                id => Err(crate::protocol::DecodeError::Other(
                    ::anyhow::anyhow!("unknown packet id {id:#04x}")
                )),
            };
            for variant in &variants {
                let ident = &variant.ident;
                if variant.fallback {
                    fallback = quote! {
                        id => Ok(Self::#ident(crate::protocol::RawPacket::read_body(id, decoder))),
                    };
                    continue;
                }
                let Some(id) = variant.id else { continue };
                let decode = variant.body.decode_into(quote! { Self::#ident });
                arms.push(quote! { #id => { #decode } });
            }
            quote! {
                match decoder.read_var_int()? {
                    #(#arms)*
                    #fallback
                }
            }
        }
    };
    let ident = &input.ident;
    Ok(quote! {
        impl crate::protocol::Decode for #ident {
            fn decode(
                decoder: &mut crate::protocol::Decoder,
            ) -> ::std::result::Result<Self, crate::protocol::DecodeError> {
                #body
            }
        }
    })
}
