//! Custom type registry
//!
//! User-extensible value types travel on the wire as a one-byte type code
//! plus an opaque payload. The registry maps each code to the functions that
//! produce and consume that payload. It is process-wide, registered into at
//! startup, and read on every custom-typed value thereafter: read-mostly, so
//! a reader-writer lock is enough. A decode error on one message never
//! touches the registry.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::error::{ProtocolError, Result};

/// Serialize function: host payload in, wire payload out
pub type SerializeFn = fn(&[u8]) -> Result<Vec<u8>>;
/// Deserialize function: wire payload in, host payload out
pub type DeserializeFn = fn(&[u8]) -> Result<Vec<u8>>;

/// One registered custom type
#[derive(Clone)]
pub struct CustomTypeEntry {
    /// Wire code, unique per process
    pub code: u8,
    /// Human-readable name for diagnostics
    pub name: &'static str,
    pub serialize: SerializeFn,
    pub deserialize: DeserializeFn,
}

impl std::fmt::Debug for CustomTypeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomTypeEntry")
            .field("code", &self.code)
            .field("name", &self.name)
            .finish()
    }
}

/// Process-wide table of custom type entries
///
/// Readers never observe a partially-inserted entry: the map is only
/// mutated under the write lock and entries are immutable once inserted.
pub struct CustomTypeRegistry {
    entries: RwLock<HashMap<u8, CustomTypeEntry>>,
}

impl CustomTypeRegistry {
    /// Create an empty registry (tests use this; production code goes
    /// through [`global`])
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a custom type; duplicate codes are rejected
    pub fn register(&self, entry: CustomTypeEntry) -> Result<()> {
        let mut entries = self.entries.write().expect("custom type lock poisoned");
        if entries.contains_key(&entry.code) {
            return Err(ProtocolError::DuplicateCustomType(entry.code));
        }
        tracing::debug!(code = entry.code, name = entry.name, "Registered custom type");
        entries.insert(entry.code, entry);
        Ok(())
    }

    /// Look up an entry by wire code
    pub fn lookup(&self, code: u8) -> Option<CustomTypeEntry> {
        self.entries
            .read()
            .expect("custom type lock poisoned")
            .get(&code)
            .cloned()
    }

    /// Run the registered serializer for `code` over a host payload
    pub fn serialize(&self, code: u8, data: &[u8]) -> Result<Vec<u8>> {
        let entry = self
            .lookup(code)
            .ok_or(ProtocolError::UnknownCustomType(code))?;
        (entry.serialize)(data)
    }

    /// Run the registered deserializer for `code` over a wire payload
    pub fn deserialize(&self, code: u8, data: &[u8]) -> Result<Vec<u8>> {
        let entry = self
            .lookup(code)
            .ok_or(ProtocolError::UnknownCustomType(code))?;
        (entry.deserialize)(data)
    }
}

impl Default for CustomTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide registry instance
pub fn global() -> &'static CustomTypeRegistry {
    static REGISTRY: OnceLock<CustomTypeRegistry> = OnceLock::new();
    REGISTRY.get_or_init(CustomTypeRegistry::new)
}

/// Register a custom type into the process-wide registry
pub fn register_custom_type(entry: CustomTypeEntry) -> Result<()> {
    global().register(entry)
}
