//! Conventional names the host and guest agree on.
//!
//! Nothing in a WebAssembly module says which export is an allocator; the
//! host relies on names. `AbiConventions` bundles those names so a host can
//! be pointed at guests built by different toolchains (TinyGo exports
//! `malloc`/`free`, hand-written guests often export `allocate_buffer`).

use serde::{Deserialize, Serialize};

/// Default import namespace for host capabilities.
pub const DEFAULT_NAMESPACE: &str = "env";

/// Default name of the guest's linear memory export.
pub const DEFAULT_MEMORY_EXPORT: &str = "memory";

/// Default name of the guest allocator export: `(len: i32) -> (ptr: i32)`.
pub const DEFAULT_ALLOC_EXPORT: &str = "malloc";

/// Default name of the guest deallocator export: `(ptr: i32)`.
pub const DEFAULT_FREE_EXPORT: &str = "free";

/// Import namespace of the WASI preview1 system interface.
pub const WASI_PREVIEW1_NAMESPACE: &str = "wasi_snapshot_preview1";

/// Export and namespace names used by the buffer exchange protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbiConventions {
    /// Import namespace host capabilities are registered under.
    pub namespace: String,
    /// Name of the exported linear memory.
    pub memory_export: String,
    /// Guest allocator export taking one length and returning one pointer.
    pub alloc_export: String,
    /// Optional guest deallocator export taking one pointer.
    /// `None` means host allocations are never returned to the guest.
    pub free_export: Option<String>,
}

impl Default for AbiConventions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            memory_export: DEFAULT_MEMORY_EXPORT.to_string(),
            alloc_export: DEFAULT_ALLOC_EXPORT.to_string(),
            free_export: Some(DEFAULT_FREE_EXPORT.to_string()),
        }
    }
}

impl AbiConventions {
    /// Use a different allocator export.
    pub fn with_alloc_export(mut self, name: impl Into<String>) -> Self {
        self.alloc_export = name.into();
        self
    }

    /// Use a different deallocator export, or none.
    pub fn with_free_export(mut self, name: Option<&str>) -> Self {
        self.free_export = name.map(str::to_string);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let conv = AbiConventions::default();
        assert_eq!(conv.namespace, "env");
        assert_eq!(conv.memory_export, "memory");
        assert_eq!(conv.alloc_export, "malloc");
        assert_eq!(conv.free_export.as_deref(), Some("free"));
    }

    #[test]
    fn test_builders() {
        let conv = AbiConventions::default()
            .with_alloc_export("allocate_buffer")
            .with_free_export(None);
        assert_eq!(conv.alloc_export, "allocate_buffer");
        assert!(conv.free_export.is_none());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let conv: AbiConventions =
            serde_json::from_str(r#"{ "alloc_export": "allocate_buffer", "free_export": null }"#)
                .unwrap();
        assert_eq!(conv.namespace, "env");
        assert_eq!(conv.alloc_export, "allocate_buffer");
        assert!(conv.free_export.is_none());
    }
}
