//! `wasmbridge-abi`: boundary ABI types for exchanging data with WASM guests.
//!
//! A guest module can only pass integers across its function boundary. This
//! crate defines the engine-independent half of the protocol layered on top:
//!
//! - `PackedPointer`: a `(pointer, length)` pair packed into one `u64`
//! - `Value` / `Signature`: unsigned numeric boundary values and types
//! - `Buffer` / `OwnershipMode`: spans of guest memory tagged with who frees them
//! - `region`: bounds-checked reads and writes over a memory snapshot
//! - `AbiConventions`: export names for memory, allocator and deallocator
//! - `AbiError`: failures detectable without an execution engine
//!
//! The Wasmtime-backed host lives in `wasmbridge-sandbox`.

pub mod error;
pub mod codec;
pub mod value;
pub mod buffer;
pub mod region;
pub mod conventions;

// Re-export commonly used types at the crate root.
pub use error::AbiError;
pub use codec::{pack, unpack, PackedPointer};
pub use value::{NumType, Signature, Value};
pub use buffer::{Buffer, OwnershipMode};
pub use conventions::{AbiConventions, WASI_PREVIEW1_NAMESPACE};
