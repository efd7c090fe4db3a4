//! The dynamic message codec: read and write wire-format bytes against a
//! [`MessageDescriptor`] at runtime, with no generated or derived code involved.
//!
//! Every other module in this crate (`encoding`, `message`, `unknown`) was built
//! for the generated-code path: a concrete Rust type implements [`Message`] and
//! the compiler picks the right scalar encoder for each field at compile time.
//! [`DynamicMessage`] has no such type to lean on; it holds a [`MessageDescriptor`]
//! and dispatches field-by-field at runtime, resolving `Enum`/`Message`/`Group`/
//! `Alias` field references through a [`Registry`] as it goes. It still reuses the
//! same low-level primitives: the per-scalar-type `encode`/`merge` functions in
//! [`crate::encoding`], [`merge_loop`](crate::encoding::merge_loop) for bounded
//! submessage and packed-repeated decoding, and [`UnknownFieldList`] for
//! round-trip fidelity of fields the current descriptor doesn't recognize.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use bytes::{Buf, Bytes};

use crate::buffer::Encoder;
use crate::descriptor::{Field, FieldKind, FieldLabel, MessageDescriptor, Registry, ScalarType};
use crate::encoding::{self, decode_key, DecodeContext, WireType};
use crate::error::decode_error_kind::{
    BufferUnderflow, MissingRequiredField as DecodeMissingRequiredField, UnexpectedEndGroupTag,
    UnresolvedDescriptor,
};
use crate::error::SerializeError;
use crate::extension::ExtensionStore;
use crate::unknown::UnknownFieldList;
use crate::{DecodeError, Message};

/// A single field value, tagged by the kind of field it can occupy.
///
/// `Enum` only ever holds a symbol that resolved successfully against its
/// [`EnumDescriptor`](crate::descriptor::EnumDescriptor): a wire index with no
/// matching symbol is never assigned to a field slot at all (it is retained in
/// the owning message's unknown-field set instead), so code reading a `Value`
/// never has to consider an "unresolved enum" case.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    Bool(bool),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Bytes),
    Message(Box<DynamicMessage>),
    Enum(String),
    Alias(String),
}

/// A packed presence+value bitset for non-repeated boolean scalar fields: 2 bits
/// per field position (one for "has a value", one for the value itself), instead
/// of the far larger `Slot` a boolean field would otherwise occupy. Every other
/// field kind uses [`Slot`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct BoolIndex {
    bits: Vec<u8>,
}

impl BoolIndex {
    fn ensure(&mut self, position: usize) {
        let needed_bytes = position / 4 + 1;
        if self.bits.len() < needed_bytes {
            self.bits.resize(needed_bytes, 0);
        }
    }

    fn set(&mut self, position: usize, value: bool) {
        self.ensure(position);
        let byte = position / 4;
        let shift = (position % 4) * 2;
        self.bits[byte] |= 0b01 << shift;
        if value {
            self.bits[byte] |= 0b10 << shift;
        } else {
            self.bits[byte] &= !(0b10 << shift);
        }
    }

    fn clear(&mut self, position: usize) {
        if position / 4 >= self.bits.len() {
            return;
        }
        let byte = position / 4;
        let shift = (position % 4) * 2;
        self.bits[byte] &= !(0b11 << shift);
    }

    fn get(&self, position: usize) -> Option<bool> {
        let byte = position / 4;
        if byte >= self.bits.len() {
            return None;
        }
        let shift = (position % 4) * 2;
        let cell = (self.bits[byte] >> shift) & 0b11;
        if cell & 0b01 == 0 {
            None
        } else {
            Some(cell & 0b10 != 0)
        }
    }
}

/// Storage for one field's value(s), parallel to [`MessageDescriptor::fields`].
/// Non-repeated boolean scalar fields are the exception: they live in
/// [`DynamicMessage::bools`] instead, and their slot here is always `Empty`.
#[derive(Clone, Debug, Default, PartialEq)]
enum Slot {
    #[default]
    Empty,
    Single(Value),
    Repeated(Vec<Value>),
}

fn is_nonrepeated_bool(field: &Field) -> bool {
    field.label() != FieldLabel::Repeated && matches!(field.kind(), FieldKind::Scalar(ScalarType::Bool))
}

/// A message instance addressed purely through its [`MessageDescriptor`], with no
/// generated Rust type backing it.
#[derive(Clone, Debug, PartialEq)]
pub struct DynamicMessage {
    descriptor: MessageDescriptor,
    slots: Vec<Slot>,
    bools: BoolIndex,
    unknown: UnknownFieldList,
    extensions: ExtensionStore,
}

impl DynamicMessage {
    pub fn new(descriptor: MessageDescriptor) -> Self {
        let len = descriptor.fields().len();
        DynamicMessage {
            descriptor,
            slots: alloc::vec![Slot::Empty; len],
            bools: BoolIndex::default(),
            unknown: UnknownFieldList::new(),
            extensions: ExtensionStore::new(),
        }
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    pub fn unknown_fields(&self) -> &UnknownFieldList {
        &self.unknown
    }

    pub fn extensions(&self) -> &ExtensionStore {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut ExtensionStore {
        &mut self.extensions
    }

    fn position(&self, number: u32) -> Option<usize> {
        self.descriptor.field_position(number)
    }

    /// Whether a field currently holds a value (for a repeated field, whether it
    /// holds at least one element).
    pub fn is_set(&self, number: u32) -> bool {
        let Some(pos) = self.position(number) else {
            return false;
        };
        if is_nonrepeated_bool(&self.descriptor.fields()[pos]) {
            return self.bools.get(pos).is_some();
        }
        match &self.slots[pos] {
            Slot::Empty => false,
            Slot::Single(_) => true,
            Slot::Repeated(values) => !values.is_empty(),
        }
    }

    /// The value of a non-repeated field, or `None` if unset.
    pub fn get(&self, number: u32) -> Option<Value> {
        let pos = self.position(number)?;
        if is_nonrepeated_bool(&self.descriptor.fields()[pos]) {
            return self.bools.get(pos).map(Value::Bool);
        }
        match &self.slots[pos] {
            Slot::Single(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// The values of a repeated field. Empty if the field is unset or not
    /// repeated.
    pub fn get_repeated(&self, number: u32) -> &[Value] {
        match self.position(number).map(|pos| &self.slots[pos]) {
            Some(Slot::Repeated(values)) => values,
            _ => &[],
        }
    }

    /// Sets a non-repeated field's value, overwriting whatever it previously held.
    pub fn set_scalar(&mut self, number: u32, value: Value) {
        let Some(pos) = self.position(number) else {
            return;
        };
        if is_nonrepeated_bool(&self.descriptor.fields()[pos]) {
            if let Value::Bool(b) = value {
                self.bools.set(pos, b);
            }
            return;
        }
        self.slots[pos] = Slot::Single(value);
    }

    /// Appends a value to a repeated field.
    pub fn push_repeated(&mut self, number: u32, value: Value) {
        let Some(pos) = self.position(number) else {
            return;
        };
        match &mut self.slots[pos] {
            Slot::Repeated(values) => values.push(value),
            slot @ Slot::Empty => *slot = Slot::Repeated(alloc::vec![value]),
            Slot::Single(_) => {}
        }
    }

    /// Clears a field back to "unset".
    pub fn clear_field(&mut self, number: u32) {
        let Some(pos) = self.position(number) else {
            return;
        };
        if is_nonrepeated_bool(&self.descriptor.fields()[pos]) {
            self.bools.clear(pos);
            return;
        }
        self.slots[pos] = Slot::Empty;
    }
}

/// Serializes `record` to a newly allocated buffer.
pub fn serialize(record: &DynamicMessage, registry: &Registry) -> Result<Vec<u8>, SerializeError> {
    let mut enc = Encoder::new();
    encode_message(record, &mut enc, registry)?;
    Ok(enc.into_vec())
}

/// Serializes `record` into `buf`, returning the number of bytes written.
pub fn serialize_into(
    record: &DynamicMessage,
    buf: &mut impl bytes::BufMut,
    registry: &Registry,
) -> Result<usize, SerializeError> {
    let mut enc = Encoder::new();
    encode_message(record, &mut enc, registry)?;
    let len = enc.len();
    buf.put_slice(enc.as_slice());
    Ok(len)
}

fn encode_message(
    record: &DynamicMessage,
    enc: &mut Encoder,
    registry: &Registry,
) -> Result<(), SerializeError> {
    let descriptor = &record.descriptor;
    for (pos, field) in descriptor.fields().iter().enumerate() {
        encode_field(descriptor, field, pos, record, enc, registry)?;
    }
    for field in registry.extensions_for(&descriptor.qualified_name()) {
        if let Ok(Some(value)) = record.extensions.get(descriptor, field.number()) {
            encode_value(field.number(), field, value, enc, registry)?;
        }
    }
    record.unknown.encode_raw(enc);
    Ok(())
}

fn encode_field(
    descriptor: &MessageDescriptor,
    field: &Field,
    pos: usize,
    record: &DynamicMessage,
    enc: &mut Encoder,
    registry: &Registry,
) -> Result<(), SerializeError> {
    if is_nonrepeated_bool(field) {
        if let Some(value) = record.bools.get(pos) {
            encode_value(field.number(), field, &Value::Bool(value), enc, registry)?;
        } else if field.is_required() {
            return Err(SerializeError::MissingRequiredField {
                message: descriptor.qualified_name(),
                field: field.name().into(),
            });
        }
        return Ok(());
    }

    match &record.slots[pos] {
        Slot::Empty => {
            if field.is_required() {
                return Err(SerializeError::MissingRequiredField {
                    message: descriptor.qualified_name(),
                    field: field.name().into(),
                });
            }
            Ok(())
        }
        Slot::Single(value) => encode_value(field.number(), field, value, enc, registry),
        Slot::Repeated(values) => {
            if values.is_empty() {
                return Ok(());
            }
            if field.is_packed() {
                encode_packed(field.number(), field, values, enc, registry)
            } else {
                for value in values {
                    encode_value(field.number(), field, value, enc, registry)?;
                }
                Ok(())
            }
        }
    }
}

/// Encodes one lone (non-packed) value for `tag`.
fn encode_value(
    tag: u32,
    field: &Field,
    value: &Value,
    enc: &mut Encoder,
    registry: &Registry,
) -> Result<(), SerializeError> {
    match value {
        Value::I32(v) => match field.kind() {
            FieldKind::Scalar(ScalarType::Sint32) => encoding::sint32::encode(tag, v, enc),
            FieldKind::Scalar(ScalarType::Sfixed32) => encoding::sfixed32::encode(tag, v, enc),
            _ => encoding::int32::encode(tag, v, enc),
        },
        Value::I64(v) => match field.kind() {
            FieldKind::Scalar(ScalarType::Sint64) => encoding::sint64::encode(tag, v, enc),
            FieldKind::Scalar(ScalarType::Sfixed64) => encoding::sfixed64::encode(tag, v, enc),
            _ => encoding::int64::encode(tag, v, enc),
        },
        Value::U32(v) => match field.kind() {
            FieldKind::Scalar(ScalarType::Fixed32) => encoding::fixed32::encode(tag, v, enc),
            _ => encoding::uint32::encode(tag, v, enc),
        },
        Value::U64(v) => match field.kind() {
            FieldKind::Scalar(ScalarType::Fixed64) => encoding::fixed64::encode(tag, v, enc),
            _ => encoding::uint64::encode(tag, v, enc),
        },
        Value::Bool(v) => encoding::bool::encode(tag, v, enc),
        Value::F32(v) => encoding::float::encode(tag, v, enc),
        Value::F64(v) => encoding::double::encode(tag, v, enc),
        Value::String(v) => encoding::string::encode(tag, v, enc),
        Value::Bytes(v) => encoding::bytes::encode(tag, v, enc),
        Value::Enum(symbol) => {
            let FieldKind::Enum(enum_name) = field.kind() else {
                unreachable!("enum value stored on a non-enum field descriptor")
            };
            let e = registry
                .enum_(enum_name)
                .expect("enum referenced by a registered field is itself registered");
            let number = e.number_for(symbol)?;
            encoding::int32::encode(tag, &number, enc);
        }
        Value::Alias(raw) => {
            let FieldKind::Alias(alias_name) = field.kind() else {
                unreachable!("alias value stored on a non-alias field descriptor")
            };
            let alias = registry
                .type_alias(alias_name)
                .expect("alias referenced by a registered field is itself registered");
            let payload = alias.encode(raw);
            encoding::encode_key(tag, alias.wire_type(), enc);
            encoding::encode_varint(payload.len() as u64, enc);
            enc.emit_bytes(&payload);
        }
        Value::Message(nested) => match field.kind() {
            FieldKind::Group(_) => {
                encoding::encode_key(tag, WireType::StartGroup, enc);
                encode_message(nested, enc, registry)?;
                encoding::encode_key(tag, WireType::EndGroup, enc);
            }
            _ => {
                encoding::encode_key(tag, WireType::LengthDelimited, enc);
                let mark = enc.reserve_length_prefix();
                let start = enc.cursor();
                encode_message(nested, enc, registry)?;
                let written = enc.cursor() - start;
                enc.rewrite_prefix(mark, written);
            }
        },
    }
    Ok(())
}

/// Packed encoding for a repeated scalar or enum field: delegates to the
/// already-correct per-scalar-type `encode_packed` functions (e.g.
/// [`encoding::sint32::encode_packed`], [`encoding::fixed64::encode_packed`]),
/// each of which writes its own tag, a length prefix computed by summing every
/// element's own width, and the payload in that type's own wire
/// representation — the same representation [`encode_value`] uses for a lone
/// occurrence of the same type. Dispatching by raw `Value` variant alone (as
/// opposed to `field.kind()`) would conflate, say, `int32` and `sint32`, which
/// share a `Value::I32` payload but differ in wire encoding (plain varint vs.
/// zig-zag) and, for `sfixed32`, differ in wire type entirely (varint vs.
/// fixed 4 bytes).
fn encode_packed(
    tag: u32,
    field: &Field,
    values: &[Value],
    enc: &mut Encoder,
    registry: &Registry,
) -> Result<(), SerializeError> {
    fn as_i32(value: &Value) -> i32 {
        match value {
            Value::I32(v) => *v,
            _ => unreachable!("packed element type disagrees with field descriptor"),
        }
    }
    fn as_i64(value: &Value) -> i64 {
        match value {
            Value::I64(v) => *v,
            _ => unreachable!("packed element type disagrees with field descriptor"),
        }
    }
    fn as_u32(value: &Value) -> u32 {
        match value {
            Value::U32(v) => *v,
            _ => unreachable!("packed element type disagrees with field descriptor"),
        }
    }
    fn as_u64(value: &Value) -> u64 {
        match value {
            Value::U64(v) => *v,
            _ => unreachable!("packed element type disagrees with field descriptor"),
        }
    }
    fn as_bool(value: &Value) -> bool {
        match value {
            Value::Bool(v) => *v,
            _ => unreachable!("packed element type disagrees with field descriptor"),
        }
    }
    fn as_f32(value: &Value) -> f32 {
        match value {
            Value::F32(v) => *v,
            _ => unreachable!("packed element type disagrees with field descriptor"),
        }
    }
    fn as_f64(value: &Value) -> f64 {
        match value {
            Value::F64(v) => *v,
            _ => unreachable!("packed element type disagrees with field descriptor"),
        }
    }

    match field.kind() {
        FieldKind::Scalar(ScalarType::Int32) => {
            encoding::int32::encode_packed(tag, &values.iter().map(as_i32).collect::<Vec<_>>(), enc)
        }
        FieldKind::Scalar(ScalarType::Sint32) => {
            encoding::sint32::encode_packed(tag, &values.iter().map(as_i32).collect::<Vec<_>>(), enc)
        }
        FieldKind::Scalar(ScalarType::Sfixed32) => {
            encoding::sfixed32::encode_packed(tag, &values.iter().map(as_i32).collect::<Vec<_>>(), enc)
        }
        FieldKind::Scalar(ScalarType::Uint32) => {
            encoding::uint32::encode_packed(tag, &values.iter().map(as_u32).collect::<Vec<_>>(), enc)
        }
        FieldKind::Scalar(ScalarType::Fixed32) => {
            encoding::fixed32::encode_packed(tag, &values.iter().map(as_u32).collect::<Vec<_>>(), enc)
        }
        FieldKind::Scalar(ScalarType::Int64) => {
            encoding::int64::encode_packed(tag, &values.iter().map(as_i64).collect::<Vec<_>>(), enc)
        }
        FieldKind::Scalar(ScalarType::Sint64) => {
            encoding::sint64::encode_packed(tag, &values.iter().map(as_i64).collect::<Vec<_>>(), enc)
        }
        FieldKind::Scalar(ScalarType::Sfixed64) => {
            encoding::sfixed64::encode_packed(tag, &values.iter().map(as_i64).collect::<Vec<_>>(), enc)
        }
        FieldKind::Scalar(ScalarType::Uint64) => {
            encoding::uint64::encode_packed(tag, &values.iter().map(as_u64).collect::<Vec<_>>(), enc)
        }
        FieldKind::Scalar(ScalarType::Fixed64) => {
            encoding::fixed64::encode_packed(tag, &values.iter().map(as_u64).collect::<Vec<_>>(), enc)
        }
        FieldKind::Scalar(ScalarType::Bool) => {
            encoding::bool::encode_packed(tag, &values.iter().map(as_bool).collect::<Vec<_>>(), enc)
        }
        FieldKind::Scalar(ScalarType::Float) => {
            encoding::float::encode_packed(tag, &values.iter().map(as_f32).collect::<Vec<_>>(), enc)
        }
        FieldKind::Scalar(ScalarType::Double) => {
            encoding::double::encode_packed(tag, &values.iter().map(as_f64).collect::<Vec<_>>(), enc)
        }
        FieldKind::Scalar(ScalarType::String | ScalarType::Bytes) => {
            unreachable!("non-packable scalar type reached packed encoding")
        }
        FieldKind::Enum(enum_name) => {
            let e = registry
                .enum_(enum_name)
                .expect("enum referenced by a registered field is itself registered");
            let mut numbers = Vec::with_capacity(values.len());
            for value in values {
                let Value::Enum(symbol) = value else {
                    unreachable!("packed element type disagrees with field descriptor")
                };
                numbers.push(e.number_for(symbol)?);
            }
            encoding::int32::encode_packed(tag, &numbers, enc);
        }
        FieldKind::Message(_) | FieldKind::Group(_) | FieldKind::Alias(_) => {
            unreachable!("non-packable field kind reached packed encoding")
        }
    }
    Ok(())
}

/// Deserializes a new [`DynamicMessage`] of type `descriptor` from `bytes`.
pub fn deserialize(
    descriptor: MessageDescriptor,
    bytes: &[u8],
    registry: &Registry,
) -> Result<DynamicMessage, DecodeError> {
    let mut record = DynamicMessage::new(descriptor);
    deserialize_into(bytes, &mut record, registry)?;
    Ok(record)
}

/// Decodes `bytes` into `record`, merging onto whatever it already held (repeated
/// fields are appended to, scalar fields are overwritten), matching the "last
/// value wins" rule for an unexpectedly-repeated non-repeated field.
pub fn deserialize_into(
    mut bytes: &[u8],
    record: &mut DynamicMessage,
    registry: &Registry,
) -> Result<(), DecodeError> {
    decode_fields(&mut bytes, DecodeContext::default(), record, registry)?;
    check_required(record)?;
    Ok(())
}

fn check_required(record: &DynamicMessage) -> Result<(), DecodeError> {
    for field in record.descriptor.fields() {
        if field.is_required() && !record.is_set(field.number()) {
            return Err(DecodeMissingRequiredField::new(field.name().into()).into());
        }
    }
    Ok(())
}

fn decode_fields(
    buf: &mut impl Buf,
    ctx: DecodeContext,
    record: &mut DynamicMessage,
    registry: &Registry,
) -> Result<(), DecodeError> {
    while buf.has_remaining() {
        let (tag, wire_type) = decode_key(buf)?;
        decode_one_field(tag, wire_type, buf, ctx.clone(), record, registry)?;
    }
    Ok(())
}

fn decode_one_field(
    tag: u32,
    wire_type: WireType,
    buf: &mut impl Buf,
    ctx: DecodeContext,
    record: &mut DynamicMessage,
    registry: &Registry,
) -> Result<(), DecodeError> {
    if let Some(pos) = record.position(tag) {
        let field = record.descriptor.fields()[pos].clone();
        return decode_into_slot(&field, pos, wire_type, buf, ctx, record, registry);
    }

    if record.descriptor.is_extension_number(tag) {
        let host = record.descriptor.qualified_name();
        if let Some(field) = registry.extension(&host, tag).cloned() {
            let value = decode_value(&field, wire_type, buf, ctx.clone(), registry)?;
            if let Some(value) = value {
                let _ = record.extensions.set(&record.descriptor, tag, value);
                return Ok(());
            }
            return record.unknown.merge_field(tag, wire_type, buf, ctx);
        }
    }

    record.unknown.merge_field(tag, wire_type, buf, ctx)
}

fn decode_into_slot(
    field: &Field,
    pos: usize,
    wire_type: WireType,
    buf: &mut impl Buf,
    ctx: DecodeContext,
    record: &mut DynamicMessage,
    registry: &Registry,
) -> Result<(), DecodeError> {
    if field.is_repeated() {
        return decode_repeated(field, pos, wire_type, buf, ctx, record, registry);
    }

    match decode_value(field, wire_type, buf, ctx.clone(), registry)? {
        Some(value) => {
            if is_nonrepeated_bool(field) {
                if let Value::Bool(b) = value {
                    record.bools.set(pos, b);
                }
            } else {
                record.slots[pos] = Slot::Single(value);
            }
        }
        None => {
            // An enum index with no matching symbol: retained as an unknown
            // field rather than assigned.
            record
                .unknown
                .merge_field(field.number(), wire_type, buf, ctx)?;
        }
    }
    Ok(())
}

fn decode_repeated(
    field: &Field,
    pos: usize,
    wire_type: WireType,
    buf: &mut impl Buf,
    ctx: DecodeContext,
    record: &mut DynamicMessage,
    registry: &Registry,
) -> Result<(), DecodeError> {
    if wire_type == WireType::LengthDelimited && field.kind().packable() {
        // Packed: one length prefix, then elements back to back with no tags.
        let element_wire_type = field.kind().wire_type();
        return encoding::merge_loop(record, buf, ctx, |record, buf, ctx| {
            let value = decode_scalar_or_enum(field, element_wire_type, buf, ctx, registry)?;
            if let Some(value) = value {
                match &mut record.slots[pos] {
                    Slot::Repeated(values) => values.push(value),
                    slot @ Slot::Empty => *slot = Slot::Repeated(alloc::vec![value]),
                    Slot::Single(_) => {}
                }
            }
            Ok(())
        });
    }

    match decode_value(field, wire_type, buf, ctx.clone(), registry)? {
        Some(value) => {
            match &mut record.slots[pos] {
                Slot::Repeated(values) => values.push(value),
                slot @ Slot::Empty => *slot = Slot::Repeated(alloc::vec![value]),
                Slot::Single(_) => {}
            }
            Ok(())
        }
        None => record.unknown.merge_field(field.number(), wire_type, buf, ctx),
    }
}

/// Decodes one value of `field`'s type from a non-packed occurrence. Returns
/// `Ok(None)` exactly when the field is an enum and the wire index had no
/// registered symbol; every other unrecognized-input case is an `Err`.
fn decode_value(
    field: &Field,
    wire_type: WireType,
    buf: &mut impl Buf,
    ctx: DecodeContext,
    registry: &Registry,
) -> Result<Option<Value>, DecodeError> {
    match field.kind() {
        FieldKind::Scalar(_) | FieldKind::Enum(_) => {
            decode_scalar_or_enum(field, wire_type, buf, ctx, registry)
        }
        FieldKind::Message(name) => {
            let nested_descriptor = registry
                .message(name)
                .ok_or_else(|| UnresolvedDescriptor::new(name.clone()).into_decode_error())?
                .clone();
            encoding::check_wire_type(WireType::LengthDelimited, wire_type)?;
            ctx.limit_reached()?;
            let mut nested = DynamicMessage::new(nested_descriptor);
            encoding::merge_loop(&mut nested, buf, ctx.enter_recursion(), |nested, buf, ctx| {
                let (tag, wt) = decode_key(buf)?;
                decode_one_field(tag, wt, buf, ctx, nested, registry)
            })?;
            Ok(Some(Value::Message(Box::new(nested))))
        }
        FieldKind::Group(name) => {
            let nested_descriptor = registry
                .message(name)
                .ok_or_else(|| UnresolvedDescriptor::new(name.clone()).into_decode_error())?
                .clone();
            encoding::check_wire_type(WireType::StartGroup, wire_type)?;
            ctx.limit_reached()?;
            let mut nested = DynamicMessage::new(nested_descriptor);
            decode_group_body(field.number(), &mut nested, buf, ctx.enter_recursion(), registry)?;
            Ok(Some(Value::Message(Box::new(nested))))
        }
        FieldKind::Alias(name) => {
            let alias = registry
                .type_alias(name)
                .ok_or_else(|| UnresolvedDescriptor::new(name.clone()).into_decode_error())?;
            encoding::check_wire_type(alias.wire_type(), wire_type)?;
            let len = encoding::decode_varint(buf)?;
            if len > buf.remaining() as u64 {
                return Err(BufferUnderflow::new().into());
            }
            let bytes = buf.copy_to_bytes(len as usize);
            let value = alias.decode(&bytes)?;
            Ok(Some(Value::Alias(value)))
        }
    }
}

fn decode_group_body(
    tag: u32,
    nested: &mut DynamicMessage,
    buf: &mut impl Buf,
    ctx: DecodeContext,
    registry: &Registry,
) -> Result<(), DecodeError> {
    loop {
        let (field_tag, field_wire_type) = decode_key(buf)?;
        if field_wire_type == WireType::EndGroup {
            if field_tag != tag {
                return Err(UnexpectedEndGroupTag::new().into());
            }
            return Ok(());
        }
        decode_one_field(field_tag, field_wire_type, buf, ctx.clone(), nested, registry)?;
    }
}

/// Decodes a scalar or enum value. Used both directly (non-packed) and as the
/// per-element callback inside a packed [`encoding::merge_loop`].
fn decode_scalar_or_enum(
    field: &Field,
    wire_type: WireType,
    buf: &mut impl Buf,
    ctx: DecodeContext,
    registry: &Registry,
) -> Result<Option<Value>, DecodeError> {
    match field.kind() {
        FieldKind::Scalar(scalar) => {
            let value = match scalar {
                ScalarType::Int32 => {
                    let mut v = 0i32;
                    encoding::int32::merge(wire_type, &mut v, buf, ctx)?;
                    Value::I32(v)
                }
                ScalarType::Sint32 => {
                    let mut v = 0i32;
                    encoding::sint32::merge(wire_type, &mut v, buf, ctx)?;
                    Value::I32(v)
                }
                ScalarType::Sfixed32 => {
                    let mut v = 0i32;
                    encoding::sfixed32::merge(wire_type, &mut v, buf, ctx)?;
                    Value::I32(v)
                }
                ScalarType::Int64 => {
                    let mut v = 0i64;
                    encoding::int64::merge(wire_type, &mut v, buf, ctx)?;
                    Value::I64(v)
                }
                ScalarType::Sint64 => {
                    let mut v = 0i64;
                    encoding::sint64::merge(wire_type, &mut v, buf, ctx)?;
                    Value::I64(v)
                }
                ScalarType::Sfixed64 => {
                    let mut v = 0i64;
                    encoding::sfixed64::merge(wire_type, &mut v, buf, ctx)?;
                    Value::I64(v)
                }
                ScalarType::Uint32 => {
                    let mut v = 0u32;
                    encoding::uint32::merge(wire_type, &mut v, buf, ctx)?;
                    Value::U32(v)
                }
                ScalarType::Fixed32 => {
                    let mut v = 0u32;
                    encoding::fixed32::merge(wire_type, &mut v, buf, ctx)?;
                    Value::U32(v)
                }
                ScalarType::Uint64 => {
                    let mut v = 0u64;
                    encoding::uint64::merge(wire_type, &mut v, buf, ctx)?;
                    Value::U64(v)
                }
                ScalarType::Fixed64 => {
                    let mut v = 0u64;
                    encoding::fixed64::merge(wire_type, &mut v, buf, ctx)?;
                    Value::U64(v)
                }
                ScalarType::Bool => {
                    let mut v = false;
                    encoding::bool::merge(wire_type, &mut v, buf, ctx)?;
                    Value::Bool(v)
                }
                ScalarType::Float => {
                    let mut v = 0f32;
                    encoding::float::merge(wire_type, &mut v, buf, ctx)?;
                    Value::F32(v)
                }
                ScalarType::Double => {
                    let mut v = 0f64;
                    encoding::double::merge(wire_type, &mut v, buf, ctx)?;
                    Value::F64(v)
                }
                ScalarType::String => {
                    let mut v = String::new();
                    encoding::string::merge(wire_type, &mut v, buf, ctx)?;
                    Value::String(v)
                }
                ScalarType::Bytes => {
                    let mut v = Bytes::new();
                    encoding::bytes::merge(wire_type, &mut v, buf, ctx)?;
                    Value::Bytes(v)
                }
            };
            Ok(Some(value))
        }
        FieldKind::Enum(name) => {
            encoding::check_wire_type(WireType::Varint, wire_type)?;
            let raw = encoding::decode_varint(buf)? as i32;
            let e = registry
                .enum_(name)
                .ok_or_else(|| UnresolvedDescriptor::new(name.clone()).into_decode_error())?;
            Ok(e.value_by_number(raw).map(|v| Value::Enum(v.symbol().into())))
        }
        _ => unreachable!("decode_scalar_or_enum called on a non-scalar, non-enum field"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DefaultValue, ExtensionRange, FieldLabel, MessageKind};

    fn leaf_descriptor() -> MessageDescriptor {
        MessageDescriptor::new(
            "Leaf",
            None,
            "test.schema",
            MessageKind::Regular,
            alloc::vec![
                Field::new("value", 1, FieldLabel::Optional, FieldKind::Scalar(ScalarType::Int32)),
                Field::new("name", 2, FieldLabel::Optional, FieldKind::Scalar(ScalarType::String)),
                Field::new("flag", 3, FieldLabel::Optional, FieldKind::Scalar(ScalarType::Bool)),
                Field::new(
                    "tags",
                    4,
                    FieldLabel::Repeated,
                    FieldKind::Scalar(ScalarType::Int32),
                )
                .with_packed(true),
            ],
            Vec::new(),
        )
        .unwrap()
    }

    fn registry_with(descriptors: Vec<MessageDescriptor>) -> Registry {
        let mut registry = Registry::new();
        for d in descriptors {
            registry.register_message(d).unwrap();
        }
        registry
    }

    #[test]
    fn round_trips_scalar_fields() {
        let descriptor = leaf_descriptor();
        let registry = registry_with(alloc::vec![descriptor.clone()]);

        let mut msg = DynamicMessage::new(descriptor.clone());
        msg.set_scalar(1, Value::I32(42));
        msg.set_scalar(2, Value::String("hello".into()));
        msg.set_scalar(3, Value::Bool(true));
        msg.push_repeated(4, Value::I32(1));
        msg.push_repeated(4, Value::I32(2));
        msg.push_repeated(4, Value::I32(3));

        let bytes = serialize(&msg, &registry).unwrap();
        let decoded = deserialize(descriptor, &bytes, &registry).unwrap();

        assert_eq!(decoded.get(1), Some(Value::I32(42)));
        assert_eq!(decoded.get(2), Some(Value::String("hello".into())));
        assert_eq!(decoded.get(3), Some(Value::Bool(true)));
        assert_eq!(
            decoded.get_repeated(4),
            &[Value::I32(1), Value::I32(2), Value::I32(3)]
        );
    }

    #[test]
    fn missing_required_field_fails_to_serialize() {
        let descriptor = MessageDescriptor::new(
            "Needy",
            None,
            "test.schema",
            MessageKind::Regular,
            alloc::vec![Field::new(
                "must_have",
                1,
                FieldLabel::Required,
                FieldKind::Scalar(ScalarType::Int32),
            )],
            Vec::new(),
        )
        .unwrap();
        let registry = registry_with(alloc::vec![descriptor.clone()]);
        let msg = DynamicMessage::new(descriptor);

        assert!(matches!(
            serialize(&msg, &registry),
            Err(SerializeError::MissingRequiredField { .. })
        ));
    }

    #[test]
    fn unknown_fields_round_trip_verbatim() {
        let descriptor = MessageDescriptor::new(
            "Slim",
            None,
            "test.schema",
            MessageKind::Regular,
            alloc::vec![Field::new(
                "value",
                1,
                FieldLabel::Optional,
                FieldKind::Scalar(ScalarType::Int32),
            )],
            Vec::new(),
        )
        .unwrap();
        let fat_descriptor = MessageDescriptor::new(
            "Fat",
            None,
            "test.schema",
            MessageKind::Regular,
            alloc::vec![
                Field::new("value", 1, FieldLabel::Optional, FieldKind::Scalar(ScalarType::Int32)),
                Field::new("extra", 2, FieldLabel::Optional, FieldKind::Scalar(ScalarType::String)),
            ],
            Vec::new(),
        )
        .unwrap();
        let registry = registry_with(alloc::vec![descriptor.clone(), fat_descriptor.clone()]);

        let mut fat = DynamicMessage::new(fat_descriptor);
        fat.set_scalar(1, Value::I32(7));
        fat.set_scalar(2, Value::String("surprise".into()));
        let bytes = serialize(&fat, &registry).unwrap();

        let slim = deserialize(descriptor, &bytes, &registry).unwrap();
        assert_eq!(slim.get(1), Some(Value::I32(7)));
        assert!(slim.unknown_fields().iter().next().is_some());

        let round_tripped = serialize(&slim, &registry).unwrap();
        assert_eq!(round_tripped, bytes);
    }

    /// `msg { sint64 s=1; uint64 u=2; int64 i=3; }`, checked against the
    /// bit-exact scenarios enumerated for this message shape.
    fn svi_descriptor() -> MessageDescriptor {
        MessageDescriptor::new(
            "Svi",
            None,
            "test.schema",
            MessageKind::Regular,
            alloc::vec![
                Field::new("s", 1, FieldLabel::Optional, FieldKind::Scalar(ScalarType::Sint64)),
                Field::new("u", 2, FieldLabel::Optional, FieldKind::Scalar(ScalarType::Uint64)),
                Field::new("i", 3, FieldLabel::Optional, FieldKind::Scalar(ScalarType::Int64)),
            ],
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn concrete_wire_format_scenarios() {
        let descriptor = svi_descriptor();
        let registry = registry_with(alloc::vec![descriptor.clone()]);

        let mut u10 = DynamicMessage::new(descriptor.clone());
        u10.set_scalar(2, Value::U64(10));
        assert_eq!(serialize(&u10, &registry).unwrap(), alloc::vec![0x10, 0x0A]);

        let mut s10 = DynamicMessage::new(descriptor.clone());
        s10.set_scalar(1, Value::I64(10));
        assert_eq!(serialize(&s10, &registry).unwrap(), alloc::vec![0x08, 0x14]);

        let mut s_neg10 = DynamicMessage::new(descriptor.clone());
        s_neg10.set_scalar(1, Value::I64(-10));
        assert_eq!(serialize(&s_neg10, &registry).unwrap(), alloc::vec![0x08, 0x13]);

        let mut i10 = DynamicMessage::new(descriptor.clone());
        i10.set_scalar(3, Value::I64(10));
        assert_eq!(serialize(&i10, &registry).unwrap(), alloc::vec![0x18, 0x0A]);

        let mut i_neg10 = DynamicMessage::new(descriptor.clone());
        i_neg10.set_scalar(3, Value::I64(-10));
        assert_eq!(
            serialize(&i_neg10, &registry).unwrap(),
            alloc::vec![0x18, 0xF6, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]
        );

        let empty = DynamicMessage::new(descriptor);
        assert_eq!(serialize(&empty, &registry).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn unknown_field_before_known_field_decodes_known_and_retains_unknown() {
        let descriptor = svi_descriptor();
        let registry = registry_with(alloc::vec![descriptor.clone()]);

        // Unknown field 99, wire type VARINT, value 1; followed by known field
        // `u` (number 2, VARINT) with value 10. Tag for field 99/VARINT is
        // (99 << 3) | 0 = 792, a two-byte varint: 0x98, 0x06.
        let bytes = alloc::vec![0x98, 0x06, 0x01, 0x10, 0x0A];
        let decoded = deserialize(descriptor, &bytes, &registry).unwrap();
        assert_eq!(decoded.get(2), Some(Value::U64(10)));
        assert!(decoded.unknown_fields().iter().next().is_some());

        let re_encoded = serialize(&decoded, &registry).unwrap();
        assert_eq!(re_encoded, bytes);
    }

    #[test]
    fn packed_and_unpacked_repeated_scalars_decode_equal() {
        let descriptor = MessageDescriptor::new(
            "Repeated",
            None,
            "test.schema",
            MessageKind::Regular,
            alloc::vec![Field::new(
                "values",
                1,
                FieldLabel::Repeated,
                FieldKind::Scalar(ScalarType::Int32),
            )
            .with_packed(true)],
            Vec::new(),
        )
        .unwrap();
        let unpacked_descriptor = MessageDescriptor::new(
            "RepeatedUnpacked",
            None,
            "test.schema",
            MessageKind::Regular,
            alloc::vec![Field::new(
                "values",
                1,
                FieldLabel::Repeated,
                FieldKind::Scalar(ScalarType::Int32),
            )],
            Vec::new(),
        )
        .unwrap();
        let registry = registry_with(alloc::vec![descriptor.clone(), unpacked_descriptor.clone()]);

        let mut packed = DynamicMessage::new(descriptor.clone());
        packed.push_repeated(1, Value::I32(1));
        packed.push_repeated(1, Value::I32(2));
        packed.push_repeated(1, Value::I32(3));
        let packed_bytes = serialize(&packed, &registry).unwrap();

        let mut unpacked = DynamicMessage::new(unpacked_descriptor.clone());
        unpacked.push_repeated(1, Value::I32(1));
        unpacked.push_repeated(1, Value::I32(2));
        unpacked.push_repeated(1, Value::I32(3));
        let unpacked_bytes = serialize(&unpacked, &registry).unwrap();

        // Decoding the packed bytes against the unpacked descriptor and vice
        // versa must both succeed and agree on the resulting values, since a
        // length-delimited payload on a repeated scalar field is always
        // interpreted as packed regardless of the field's own `packed` flag.
        let decoded_from_packed = deserialize(unpacked_descriptor, &packed_bytes, &registry).unwrap();
        let decoded_from_unpacked = deserialize(descriptor, &unpacked_bytes, &registry).unwrap();
        assert_eq!(decoded_from_packed.get_repeated(1), decoded_from_unpacked.get_repeated(1));
        assert_eq!(
            decoded_from_packed.get_repeated(1),
            &[Value::I32(1), Value::I32(2), Value::I32(3)]
        );
    }

    #[test]
    fn packed_zigzag_and_fixed_width_fields_use_their_own_wire_representation() {
        let descriptor = MessageDescriptor::new(
            "PackedMix",
            None,
            "test.schema",
            MessageKind::Regular,
            alloc::vec![
                Field::new("s", 1, FieldLabel::Repeated, FieldKind::Scalar(ScalarType::Sint32))
                    .with_packed(true),
                Field::new("f", 2, FieldLabel::Repeated, FieldKind::Scalar(ScalarType::Sfixed64))
                    .with_packed(true),
            ],
            Vec::new(),
        )
        .unwrap();
        let registry = registry_with(alloc::vec![descriptor.clone()]);

        let mut msg = DynamicMessage::new(descriptor.clone());
        msg.push_repeated(1, Value::I32(10));
        msg.push_repeated(1, Value::I32(-10));
        msg.push_repeated(2, Value::I64(-10));

        let bytes = serialize(&msg, &registry).unwrap();

        // Field 1 (sint32, packed): tag 0x0A, length 2, zig-zag(10)=20,
        // zig-zag(-10)=19 — each one byte, not the 10-byte two's-complement
        // varint a plain `int32` packed encoder would have produced for -10.
        // Field 2 (sfixed64, packed): tag 0x12, length 8, one 8-byte
        // little-endian value rather than a varint-encoded two's-complement
        // representation.
        let mut expected = alloc::vec![0x0A, 0x02, 0x14, 0x13];
        expected.push(0x12);
        expected.push(8);
        expected.extend_from_slice(&(-10i64).to_le_bytes());
        assert_eq!(bytes, expected);

        let decoded = deserialize(descriptor, &bytes, &registry).unwrap();
        assert_eq!(decoded.get_repeated(1), &[Value::I32(10), Value::I32(-10)]);
        assert_eq!(decoded.get_repeated(2), &[Value::I64(-10)]);
    }

    #[test]
    fn truncated_submessage_length_fails_deterministically() {
        let inner = MessageDescriptor::new(
            "Inner",
            None,
            "test.schema",
            MessageKind::Regular,
            alloc::vec![Field::new("v", 1, FieldLabel::Optional, FieldKind::Scalar(ScalarType::Int32))],
            Vec::new(),
        )
        .unwrap();
        let outer = MessageDescriptor::new(
            "Outer",
            None,
            "test.schema",
            MessageKind::Regular,
            alloc::vec![Field::new(
                "inner",
                1,
                FieldLabel::Optional,
                FieldKind::Message("test.schema.Inner".into()),
            )],
            Vec::new(),
        )
        .unwrap();
        let registry = registry_with(alloc::vec![inner, outer.clone()]);

        // Tag for field 1 (LENGTH_DELIMITED), declared length 5, but only 2
        // bytes actually follow.
        let bytes = alloc::vec![0x0A, 0x05, 0x08, 0x01];
        assert!(deserialize(outer, &bytes, &registry).is_err());
    }

    #[test]
    fn extension_fields_round_trip() {
        let host = MessageDescriptor::new(
            "Host",
            None,
            "test.schema",
            MessageKind::Regular,
            Vec::new(),
            alloc::vec![ExtensionRange::new(100, 199)],
        )
        .unwrap();
        let mut registry = Registry::new();
        registry.register_message(host.clone()).unwrap();
        registry
            .register_extension(
                &host.qualified_name(),
                Field::new("bonus", 100, FieldLabel::Optional, FieldKind::Scalar(ScalarType::String))
                    .with_default(DefaultValue::Str(String::new())),
            )
            .unwrap();

        let mut msg = DynamicMessage::new(host.clone());
        msg.extensions_mut()
            .set(&host, 100, Value::String("extended".into()))
            .unwrap();

        let bytes = serialize(&msg, &registry).unwrap();
        let decoded = deserialize(host.clone(), &bytes, &registry).unwrap();
        assert_eq!(
            decoded.extensions().get(&host, 100).unwrap(),
            Some(&Value::String("extended".into()))
        );
    }
}
