//! Message descriptors: an ordered set of fields plus extension ranges.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::descriptor::field::Field;
use crate::error::DescriptorError;

/// Field numbers below this value are reserved for the wire format itself and are
/// always rejected (number 0 can never appear as a tag's field number).
const MIN_FIELD_NUMBER: u32 = 1;
/// Highest field number representable in a 32-bit tag alongside a 3-bit wire type.
const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;
/// Field numbers in this inclusive range are reserved by the protobuf implementation
/// for internal use and may never be declared by a message.
const RESERVED_RANGE: core::ops::RangeInclusive<u32> = 19000..=19999;

/// What kind of message a [`MessageDescriptor`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// An ordinary message type.
    Regular,
    /// A deprecated proto2 group: delimited with `START_GROUP`/`END_GROUP` tags
    /// rather than a length prefix, but otherwise just a message.
    Group,
    /// A synthetic message introduced solely to hold the fields of an `extend`
    /// block; never instantiated on its own.
    ExtensionBlock,
}

/// An inclusive span of field numbers set aside within a message for fields
/// declared elsewhere (an `extend Foo { ... }` block).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtensionRange {
    pub from: u32,
    pub to: u32,
}

impl ExtensionRange {
    pub fn new(from: u32, to: u32) -> Self {
        ExtensionRange { from, to }
    }

    pub fn contains(&self, number: u32) -> bool {
        (self.from..=self.to).contains(&number)
    }
}

/// Dense or sparse lookup from field number to index within
/// [`MessageDescriptor::fields`]. The source system builds a dense vector when the
/// field numbers are contiguous enough for direct indexing to pay for itself, and
/// falls back to an associative map otherwise (e.g. a message with one field
/// numbered 5000).
#[derive(Clone, Debug)]
enum FieldIndex {
    Dense(Vec<Option<u32>>),
    Sparse(BTreeMap<u32, u32>),
}

/// Fields are kept in a vector no more than this factor larger than the field
/// count before the index falls back to a sparse map.
const DENSITY_FACTOR: usize = 4;

impl FieldIndex {
    fn build(fields: &[Field]) -> Self {
        let max_number = fields.iter().map(Field::number).max().unwrap_or(0) as usize;
        if fields.is_empty() || max_number > fields.len() * DENSITY_FACTOR {
            let mut map = BTreeMap::new();
            for (i, field) in fields.iter().enumerate() {
                map.insert(field.number(), i as u32);
            }
            FieldIndex::Sparse(map)
        } else {
            let mut dense = alloc::vec![None; max_number + 1];
            for (i, field) in fields.iter().enumerate() {
                dense[field.number() as usize] = Some(i as u32);
            }
            FieldIndex::Dense(dense)
        }
    }

    fn get(&self, number: u32) -> Option<usize> {
        match self {
            FieldIndex::Dense(v) => v.get(number as usize).copied().flatten().map(|i| i as usize),
            FieldIndex::Sparse(m) => m.get(&number).copied().map(|i| i as usize),
        }
    }
}

/// Describes one protobuf message: its ordered fields, extension ranges, kind, and
/// place in the schema's namespace.
#[derive(Clone, Debug)]
pub struct MessageDescriptor {
    name: String,
    /// Qualified name of the enclosing message, or `None` for a top-level message.
    parent: Option<String>,
    /// Canonical name of the owning [`Schema`](crate::descriptor::Schema).
    schema: String,
    kind: MessageKind,
    /// Fields in ascending field-number order (ties broken by definition order),
    /// which doubles as the order serialization emits them in.
    fields: Vec<Field>,
    field_index: FieldIndex,
    extension_ranges: Vec<ExtensionRange>,
}

impl MessageDescriptor {
    /// Builds a message descriptor, validating every field's number against the
    /// reserved-range and uniqueness invariants from the data model.
    ///
    /// Fields are accepted in any order and are sorted by field number (stably, so
    /// that fields sharing a number through a bug are reported deterministically)
    /// before being stored.
    pub fn new(
        name: impl Into<String>,
        parent: Option<String>,
        schema: impl Into<String>,
        kind: MessageKind,
        mut fields: Vec<Field>,
        extension_ranges: Vec<ExtensionRange>,
    ) -> Result<Self, DescriptorError> {
        let name = name.into();
        let schema = schema.into();
        let qualified = match &parent {
            Some(p) => format!("{p}.{name}"),
            None => format!("{schema}.{name}"),
        };

        for field in &fields {
            let number = field.number();
            if number < MIN_FIELD_NUMBER || number > MAX_FIELD_NUMBER {
                return Err(DescriptorError::FieldNumberOutOfRange {
                    message: qualified.clone(),
                    number: number as i64,
                });
            }
            if RESERVED_RANGE.contains(&number) {
                return Err(DescriptorError::ReservedFieldNumber {
                    message: qualified.clone(),
                    number: number as i32,
                });
            }
        }

        fields.sort_by_key(|f| f.number());
        for pair in fields.windows(2) {
            if pair[0].number() == pair[1].number() {
                return Err(DescriptorError::DuplicateFieldNumber {
                    message: qualified.clone(),
                    number: pair[0].number() as i32,
                });
            }
        }
        for range in &extension_ranges {
            if fields.iter().any(|f| range.contains(f.number())) {
                return Err(DescriptorError::DuplicateFieldNumber {
                    message: qualified.clone(),
                    number: range.from as i32,
                });
            }
        }

        let field_index = FieldIndex::build(&fields);
        Ok(MessageDescriptor {
            name,
            parent,
            schema,
            kind,
            fields,
            field_index,
            extension_ranges,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Fields in ascending field-number order; this is also serialization order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn extension_ranges(&self) -> &[ExtensionRange] {
        &self.extension_ranges
    }

    /// Computes the dotted qualified name by walking to the parent, as the data
    /// model requires.
    pub fn qualified_name(&self) -> String {
        match &self.parent {
            Some(p) => format!("{p}.{}", self.name),
            None => format!("{}.{}", self.schema, self.name),
        }
    }

    /// O(1) (dense case) or O(log n) (sparse case) lookup of a field by its wire
    /// number.
    pub fn field_by_number(&self, number: u32) -> Option<&Field> {
        self.field_index.get(number).map(|i| &self.fields[i])
    }

    /// The index of a field within [`Self::fields`], for callers (the dynamic
    /// message codec) that keep a parallel per-field slot array and need to
    /// translate a wire number into a position in it.
    pub fn field_position(&self, number: u32) -> Option<usize> {
        self.field_index.get(number)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn is_extension_number(&self, number: u32) -> bool {
        self.extension_ranges.iter().any(|r| r.contains(number))
    }

    pub fn is_extendable(&self) -> bool {
        !self.extension_ranges.is_empty()
    }
}
