//! Field descriptors: the attributes the codec needs to dispatch a single
//! message field to the right typed encoder/decoder.

use alloc::string::String;

use crate::encoding::WireType;

/// The primitive wire-level types enumerated in the wire format table. Message, group,
/// enum, and alias fields are not primitive: they are represented by [`FieldKind`]
/// variants that carry a qualified reference instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Bool,
    Fixed32,
    Sfixed32,
    Float,
    Fixed64,
    Sfixed64,
    Double,
    String,
    Bytes,
}

impl ScalarType {
    /// The wire type used to encode a lone, non-packed value of this scalar type.
    pub fn wire_type(self) -> WireType {
        match self {
            ScalarType::Int32
            | ScalarType::Int64
            | ScalarType::Uint32
            | ScalarType::Uint64
            | ScalarType::Sint32
            | ScalarType::Sint64
            | ScalarType::Bool => WireType::Varint,
            ScalarType::Fixed32 | ScalarType::Sfixed32 | ScalarType::Float => {
                WireType::ThirtyTwoBit
            }
            ScalarType::Fixed64 | ScalarType::Sfixed64 | ScalarType::Double => {
                WireType::SixtyFourBit
            }
            ScalarType::String | ScalarType::Bytes => WireType::LengthDelimited,
        }
    }

    /// Whether values of this type may participate in packed repeated encoding.
    /// Strings and byte sequences never pack: the wire format reserves packing for
    /// types whose lone encoding isn't already length-delimited.
    pub fn packable(self) -> bool {
        !matches!(self, ScalarType::String | ScalarType::Bytes)
    }
}

/// Field multiplicity, as declared in proto2 source. Unlike proto3, presence of
/// `optional` and `required` fields is tracked explicitly rather than inferred from
/// the zero value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldLabel {
    Required,
    Optional,
    Repeated,
}

/// What a field's value actually refers to: either a primitive scalar, or a
/// reference to another descriptor resolved through the owning [`Registry`](crate::descriptor::Registry).
///
/// References are qualified names rather than owned descriptor handles, per the
/// two-phase registration design: a message may reference another message (or
/// itself) before that message finishes registering, and the cycle is broken by
/// looking the name up again at codec time instead of holding a strong reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarType),
    /// Qualified name of the referenced enum.
    Enum(String),
    /// Qualified name of the referenced message.
    Message(String),
    /// Qualified name of the referenced group message (kind `Group`).
    Group(String),
    /// Name of the registered [`TypeAlias`](crate::descriptor::TypeAlias).
    Alias(String),
}

impl FieldKind {
    pub fn wire_type(&self) -> WireType {
        match self {
            FieldKind::Scalar(ty) => ty.wire_type(),
            FieldKind::Enum(_) => WireType::Varint,
            FieldKind::Message(_) => WireType::LengthDelimited,
            FieldKind::Group(_) => WireType::StartGroup,
            FieldKind::Alias(_) => WireType::LengthDelimited,
        }
    }

    pub fn packable(&self) -> bool {
        match self {
            FieldKind::Scalar(ty) => ty.packable(),
            FieldKind::Enum(_) => true,
            FieldKind::Message(_) | FieldKind::Group(_) | FieldKind::Alias(_) => false,
        }
    }
}

/// A scalar default value, as declared on a field. `None` on [`Field::default`] is the
/// "no default supplied" sentinel; it is distinct from e.g. `DefaultValue::I64(0)`.
#[derive(Clone, Debug, PartialEq)]
pub enum DefaultValue {
    I64(i64),
    U64(u64),
    Bool(bool),
    F64(f64),
    Str(String),
    Bytes(alloc::vec::Vec<u8>),
    /// Default value of an enum field, given as the symbolic name.
    EnumSymbol(String),
}

/// How a repeated field's values are held in the generated record. The wire format
/// is identical either way; this only affects which accessor shape a code generator
/// would produce, and the descriptor model keeps it purely as metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RepeatedStorage {
    Vector,
    List,
}

impl Default for RepeatedStorage {
    fn default() -> Self {
        RepeatedStorage::Vector
    }
}

/// One field of a [`MessageDescriptor`](crate::descriptor::MessageDescriptor).
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    name: String,
    number: u32,
    label: FieldLabel,
    kind: FieldKind,
    default: Option<DefaultValue>,
    packed: bool,
    lazy: bool,
    storage: RepeatedStorage,
    accessor_name: Option<String>,
}

impl Field {
    /// Creates a new field descriptor. `packed` is only meaningful when `label` is
    /// `Repeated` and `kind` is packable; it is ignored (treated as unset)
    /// otherwise, matching the wire format's own restriction.
    pub fn new(name: impl Into<String>, number: u32, label: FieldLabel, kind: FieldKind) -> Self {
        Field {
            name: name.into(),
            number,
            label,
            kind,
            default: None,
            packed: false,
            lazy: false,
            storage: RepeatedStorage::Vector,
            accessor_name: None,
        }
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_packed(mut self, packed: bool) -> Self {
        self.packed = packed;
        self
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_storage(mut self, storage: RepeatedStorage) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_accessor_name(mut self, name: impl Into<String>) -> Self {
        self.accessor_name = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accessor_name(&self) -> &str {
        self.accessor_name.as_deref().unwrap_or(&self.name)
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn label(&self) -> FieldLabel {
        self.label
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Whether this repeated scalar field should be encoded with packed encoding.
    /// Always `false` for non-repeated fields and for types that cannot pack.
    pub fn is_packed(&self) -> bool {
        self.packed && self.label == FieldLabel::Repeated && self.kind.packable()
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn storage(&self) -> RepeatedStorage {
        self.storage
    }

    pub fn is_required(&self) -> bool {
        self.label == FieldLabel::Required
    }

    pub fn is_repeated(&self) -> bool {
        self.label == FieldLabel::Repeated
    }
}
