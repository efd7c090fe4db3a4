#![doc(html_root_url = "https://docs.rs/wireproto/0.1.0")]
#![cfg_attr(not(feature = "std"), no_std)]
#![doc = include_str!("../README.md")]

// Re-export the alloc crate for use within derived code.
#[doc(hidden)]
pub extern crate alloc;

// Re-export the bytes crate for use within derived code.
pub use bytes;

mod buffer;
mod descriptor;
mod dynamic;
mod error;
mod extension;
mod message;
mod unknown;

#[doc(hidden)]
pub mod encoding;

pub use crate::buffer::{Bookmark, Encoder};
pub use crate::descriptor::{
    DefaultValue, EnumDescriptor, EnumValueDescriptor, ExtensionRange, Field, FieldKind,
    FieldLabel, MessageDescriptor, MessageKind, MethodDescriptor, RepeatedStorage, ScalarType,
    Schema, ServiceDescriptor, Syntax, TypeAlias,
};
#[cfg(feature = "std")]
pub use crate::descriptor::{
    global, read, register_enum, register_extension, register_message, register_schema,
    register_service, register_type_alias, Registry,
};
pub use crate::dynamic::{deserialize, deserialize_into, serialize, serialize_into, DynamicMessage, Value};
pub use crate::encoding::length_delimiter::{
    decode_length_delimiter, encode_length_delimiter, length_delimiter_len,
};
pub use crate::error::{
    DecodeError, DescriptorError, EncodeError, ExtensionError, SerializeError, UnknownEnumSymbol,
    UnknownEnumValue,
};
pub use crate::extension::ExtensionStore;
pub use crate::message::Message;
pub use crate::unknown::{UnknownField, UnknownFieldList};

// See `encoding::DecodeContext` for more info.
// 100 is the default recursion limit in the C++ implementation.
#[cfg(not(feature = "no-recursion-limit"))]
const RECURSION_LIMIT: u32 = 100;
