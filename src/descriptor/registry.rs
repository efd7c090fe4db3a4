//! The registry: process-wide side-tables keyed by canonical symbol (messages,
//! enums, type aliases, services) and canonical name (schemas).
//!
//! A `Registry` is populated once, at initialization time, before any codec call;
//! afterwards it is treated as immutable. [`Registry`] itself is a plain value so
//! callers that want several independent registries (tests, multi-tenant servers)
//! can thread one through explicitly; [`global`] additionally exposes a
//! thread-safe init-once singleton for the common case of one process, one schema
//! set, matching the two lifecycle options the design notes call out.

use alloc::collections::BTreeMap;
use alloc::string::String;
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::descriptor::alias::TypeAlias;
use crate::descriptor::enum_::EnumDescriptor;
use crate::descriptor::field::Field;
use crate::descriptor::message::MessageDescriptor;
use crate::descriptor::schema::{Schema, Syntax};
use crate::descriptor::service::ServiceDescriptor;
use crate::error::DescriptorError;

/// Side-tables for every descriptor kind the codec needs to resolve at runtime.
///
/// Lookups are by qualified dotted name, except extensions, which are keyed by
/// `(host qualified name, field number)` since an extension field does not have a
/// stable name of its own independent of where it's declared.
#[derive(Debug, Default)]
pub struct Registry {
    schemas: BTreeMap<String, Schema>,
    messages: BTreeMap<String, MessageDescriptor>,
    enums: BTreeMap<String, EnumDescriptor>,
    aliases: BTreeMap<String, TypeAlias>,
    services: BTreeMap<String, ServiceDescriptor>,
    extensions: BTreeMap<(String, u32), Field>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Registers a schema. Only proto2 schemas are accepted; rebinding an
    /// already-registered name is an error, per the init-once lifecycle.
    pub fn register_schema(&mut self, schema: Schema) -> Result<(), DescriptorError> {
        if schema.syntax() != Syntax::Proto2 {
            // Syntax is a closed enum with only the Proto2 variant today, so this
            // is unreachable, but kept as a forward-compatible guard: if `Syntax`
            // ever grows a Proto3/Proto1 variant this must keep rejecting it.
            return Err(DescriptorError::Rebind {
                name: schema.name().into(),
            });
        }
        if self.schemas.contains_key(schema.name()) {
            return Err(DescriptorError::Rebind {
                name: schema.name().into(),
            });
        }
        self.schemas.insert(schema.name().into(), schema);
        Ok(())
    }

    /// Registers a message descriptor under its qualified name.
    pub fn register_message(&mut self, message: MessageDescriptor) -> Result<(), DescriptorError> {
        let qualified = message.qualified_name();
        if self.messages.contains_key(&qualified) {
            return Err(DescriptorError::Rebind { name: qualified });
        }
        self.messages.insert(qualified, message);
        Ok(())
    }

    /// Registers an enum descriptor under its qualified name.
    pub fn register_enum(&mut self, e: EnumDescriptor) -> Result<(), DescriptorError> {
        let qualified = e.qualified_name();
        if self.enums.contains_key(&qualified) {
            return Err(DescriptorError::Rebind { name: qualified });
        }
        self.enums.insert(qualified, e);
        Ok(())
    }

    /// Registers a service descriptor under its qualified name.
    pub fn register_service(&mut self, service: ServiceDescriptor) -> Result<(), DescriptorError> {
        let qualified = service.qualified_name();
        if self.services.contains_key(&qualified) {
            return Err(DescriptorError::Rebind { name: qualified });
        }
        self.services.insert(qualified, service);
        Ok(())
    }

    /// Registers a type alias under its own (unqualified) name; aliases live in a
    /// flat namespace shared across schemas, matching how the source system
    /// resolves them as a single global plugin table.
    pub fn register_type_alias(&mut self, alias: TypeAlias) -> Result<(), DescriptorError> {
        if self.aliases.contains_key(alias.name()) {
            return Err(DescriptorError::Rebind {
                name: alias.name().into(),
            });
        }
        self.aliases.insert(alias.name().into(), alias);
        Ok(())
    }

    /// Registers a field as an extension of `host`, validating that its number
    /// falls within one of `host`'s declared extension ranges.
    pub fn register_extension(&mut self, host: &str, field: Field) -> Result<(), DescriptorError> {
        let host_descriptor = self
            .messages
            .get(host)
            .ok_or_else(|| DescriptorError::UnresolvedTypeReference {
                from: field.name().into(),
                to: host.into(),
            })?;
        if !host_descriptor.is_extension_number(field.number()) {
            return Err(DescriptorError::FieldNumberOutOfRange {
                message: host.into(),
                number: field.number() as i64,
            });
        }
        let key = (String::from(host), field.number());
        if self.extensions.contains_key(&key) {
            return Err(DescriptorError::DuplicateFieldNumber {
                message: host.into(),
                number: field.number() as i32,
            });
        }
        self.extensions.insert(key, field);
        Ok(())
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn message(&self, qualified_name: &str) -> Option<&MessageDescriptor> {
        self.messages.get(qualified_name)
    }

    pub fn enum_(&self, qualified_name: &str) -> Option<&EnumDescriptor> {
        self.enums.get(qualified_name)
    }

    pub fn service(&self, qualified_name: &str) -> Option<&ServiceDescriptor> {
        self.services.get(qualified_name)
    }

    pub fn type_alias(&self, name: &str) -> Option<&TypeAlias> {
        self.aliases.get(name)
    }

    pub fn extension(&self, host: &str, number: u32) -> Option<&Field> {
        self.extensions.get(&(String::from(host), number))
    }

    /// All extensions registered against `host`, in field-number order.
    pub fn extensions_for(&self, host: &str) -> impl Iterator<Item = &Field> {
        self.extensions
            .range((String::from(host), 0)..(String::from(host), u32::MAX))
            .map(|(_, field)| field)
    }
}

static GLOBAL: OnceLock<RwLock<Registry>> = OnceLock::new();

/// The process-wide init-once registry singleton.
///
/// Schemas registered here never mutate or disappear once inserted; rebinding a
/// name already present is reported as [`DescriptorError::Rebind`] rather than
/// silently overwriting it, so "registered once" is enforced rather than merely
/// documented.
pub fn global() -> &'static RwLock<Registry> {
    GLOBAL.get_or_init(|| RwLock::new(Registry::new()))
}

pub fn read() -> RwLockReadGuard<'static, Registry> {
    global().read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write() -> RwLockWriteGuard<'static, Registry> {
    global().write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registers a schema into the global registry. Must precede codec use for any of
/// its messages.
pub fn register_schema(schema: Schema) -> Result<(), DescriptorError> {
    write().register_schema(schema)
}

pub fn register_message(message: MessageDescriptor) -> Result<(), DescriptorError> {
    write().register_message(message)
}

pub fn register_enum(e: EnumDescriptor) -> Result<(), DescriptorError> {
    write().register_enum(e)
}

pub fn register_service(service: ServiceDescriptor) -> Result<(), DescriptorError> {
    write().register_service(service)
}

pub fn register_type_alias(alias: TypeAlias) -> Result<(), DescriptorError> {
    write().register_type_alias(alias)
}

pub fn register_extension(host: &str, field: Field) -> Result<(), DescriptorError> {
    write().register_extension(host, field)
}
