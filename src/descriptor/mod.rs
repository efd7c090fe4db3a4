//! The schema descriptor model: the static shape of messages, fields, enums, and
//! services that the message codec (see [`crate::dynamic`]) dispatches against.
//!
//! This module owns no wire-format logic itself; it is pure data plus the
//! registry side-tables used to resolve the cyclic references a real schema
//! contains (a field referencing a message that, transitively, references the
//! field's own message). Two-phase registration is expected of callers: build
//! every [`MessageDescriptor`] and [`EnumDescriptor`] by name first, then register
//! them, with field type references expressed as qualified-name strings (see
//! [`FieldKind`]) rather than owned handles, so no reference cycle ever needs to
//! exist in memory.

mod alias;
mod enum_;
mod field;
mod message;
#[cfg(feature = "std")]
mod registry;
mod schema;
mod service;

pub use alias::TypeAlias;
pub use enum_::{EnumDescriptor, EnumValueDescriptor};
pub use field::{DefaultValue, Field, FieldKind, FieldLabel, RepeatedStorage, ScalarType};
pub use message::{ExtensionRange, MessageDescriptor, MessageKind};
#[cfg(feature = "std")]
pub use registry::{global, read, register_enum, register_extension, register_message,
    register_schema, register_service, register_type_alias, Registry};
pub use schema::{Schema, Syntax};
pub use service::{MethodDescriptor, ServiceDescriptor};
