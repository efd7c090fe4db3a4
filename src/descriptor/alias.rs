//! Type aliases: a first-class but non-standard field type that lets a schema
//! transmit a value through the wire format without that value being one of the
//! built-in scalar, message, or enum kinds.
//!
//! The only alias the original system ships is a `:symbol` type that serializes a
//! qualified Lisp identifier as a UTF-8 string. That is non-standard outside this
//! codebase (the canonical wire format has no symbol type), so it is kept as an
//! opt-in plugin registered the same way a schema's messages and enums are,
//! rather than being wired into the core scalar table in [`ScalarType`](crate::descriptor::ScalarType).

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::encoding::WireType;
use crate::DecodeError;

/// A registered bridge between a Rust-side string representation and its wire
/// encoding. Currently only length-delimited (UTF-8) aliases are supported, which
/// covers the symbol alias the source system defines; the wire type is still
/// recorded explicitly so a future alias with a different wire shape doesn't
/// require changing the registration interface.
#[derive(Clone)]
pub struct TypeAlias {
    name: String,
    wire_type: WireType,
    serialize: Arc<dyn Fn(&str) -> Vec<u8> + Send + Sync>,
    deserialize: Arc<dyn Fn(&[u8]) -> Result<String, DecodeError> + Send + Sync>,
}

impl TypeAlias {
    pub fn new(
        name: impl Into<String>,
        wire_type: WireType,
        serialize: impl Fn(&str) -> Vec<u8> + Send + Sync + 'static,
        deserialize: impl Fn(&[u8]) -> Result<String, DecodeError> + Send + Sync + 'static,
    ) -> Self {
        TypeAlias {
            name: name.into(),
            wire_type,
            serialize: Arc::new(serialize),
            deserialize: Arc::new(deserialize),
        }
    }

    /// The symbol alias described in the design notes: an identifier transmitted
    /// verbatim as a length-delimited UTF-8 payload.
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::new(
            name,
            WireType::LengthDelimited,
            |value: &str| value.as_bytes().to_vec(),
            |bytes: &[u8]| {
                core::str::from_utf8(bytes)
                    .map(String::from)
                    .map_err(|_| crate::error::decode_error_kind::InvalidString::new().into())
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    pub fn encode(&self, value: &str) -> Vec<u8> {
        (self.serialize)(value)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String, DecodeError> {
        (self.deserialize)(bytes)
    }
}

impl core::fmt::Debug for TypeAlias {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TypeAlias")
            .field("name", &self.name)
            .field("wire_type", &self.wire_type)
            .finish_non_exhaustive()
    }
}
