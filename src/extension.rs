//! The extension store: a per-instance slot for extension-range fields.
//!
//! Extension fields are declared outside the message that reserves their number
//! range (an `extend Foo { ... }` block), so a record can't give them a fixed
//! slot the way it does for its own fields. Instead every record carries one
//! [`ExtensionStore`], keyed by the extending field's number, and the host
//! message's extension ranges (see [`MessageDescriptor::is_extendable`]) gate
//! whether the store will actually hold anything for that record's type.

use alloc::collections::BTreeMap;

use crate::descriptor::MessageDescriptor;
use crate::dynamic::Value;
use crate::error::ExtensionError;

/// Per-instance storage for a record's extension field values, keyed by field
/// number. Owned by the record it's attached to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtensionStore {
    values: BTreeMap<u32, Value>,
}

impl ExtensionStore {
    pub fn new() -> Self {
        ExtensionStore::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn check_extendable(host: &MessageDescriptor, field: u32) -> Result<(), ExtensionError> {
        if host.is_extendable() {
            Ok(())
        } else {
            Err(ExtensionError::NotFound {
                host: host.qualified_name(),
                field,
            })
        }
    }

    /// Returns the extension value for `field`, or `None` if it was never set.
    /// Fails if `host` declares no extension ranges at all.
    pub fn get(&self, host: &MessageDescriptor, field: u32) -> Result<Option<&Value>, ExtensionError> {
        Self::check_extendable(host, field)?;
        Ok(self.values.get(&field))
    }

    /// Sets the extension value for `field`. Fails if `host` declares no
    /// extension ranges at all.
    pub fn set(&mut self, host: &MessageDescriptor, field: u32, value: Value) -> Result<(), ExtensionError> {
        Self::check_extendable(host, field)?;
        self.values.insert(field, value);
        Ok(())
    }

    /// Whether `field` currently holds a value. Defaults to `false` for a
    /// non-extendable host rather than failing, since "does this extension have a
    /// value" is a meaningful question to ask even about a type that turns out
    /// not to support extensions.
    pub fn has(&self, host: &MessageDescriptor, field: u32) -> bool {
        if !host.is_extendable() {
            return false;
        }
        self.values.contains_key(&field)
    }

    /// Clears the extension value for `field`. Fails if `host` declares no
    /// extension ranges at all.
    pub fn clear(&mut self, host: &MessageDescriptor, field: u32) -> Result<(), ExtensionError> {
        Self::check_extendable(host, field)?;
        self.values.remove(&field);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Value)> {
        self.values.iter().map(|(&number, value)| (number, value))
    }
}
