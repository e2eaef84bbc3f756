//! `wasmbridge-sandbox`: Wasmtime host for exchanging data with WASM guests.
//!
//! Guest functions can only take and return integers. This crate layers a
//! small protocol on top so the host and a guest can pass strings and byte
//! buffers in both directions:
//!
//! - **Memory access:** every read and write of linear memory is bounds-checked
//! - **Buffer exchange:** packed or paired `(ptr, len)` results, host writes
//!   through the guest allocator, scoped release of transient buffers
//! - **Host functions:** a registry of capabilities resolved against the
//!   guest's imports before any guest code runs
//! - **Dispatch:** numeric calls into guest exports with arity checks
//! - **Lifecycle:** `Unloaded -> Loaded -> Instantiated -> Closed`
//! - **WASI:** optional `wasi_snapshot_preview1` linking for guests built
//!   for a WASI target
//!
//! The primary entry point is [`Sandbox`], which produces [`GuestModule`]s.

pub mod error;
pub mod config;
pub mod context;
pub mod memory;
pub mod host_impl;
pub mod validation;
pub mod dispatch;
pub mod exchange;
pub mod registry;
pub mod linker;
pub mod runtime;

pub use error::SandboxError;
pub use config::SandboxConfig;
pub use context::{GuestContext, InstanceContext};
pub use memory::MemoryView;
pub use host_impl::{GuestLog, HostState};
pub use validation::{ImportDecl, ImportKind, ModuleInterface};
pub use exchange::ResultEncoding;
pub use registry::{HostCall, HostFunction, HostFunctionRegistry};
pub use runtime::{GuestModule, ModuleState, Sandbox};

pub use wasmbridge_abi::{Buffer, OwnershipMode, PackedPointer, Signature, Value};
