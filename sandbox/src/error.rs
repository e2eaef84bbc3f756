//! Sandbox error types.

use wasmbridge_abi::{AbiError, OwnershipMode};

/// Top-level error type for the sandbox crate.
///
/// None of these are retried: a failed call sequence is reported to the
/// caller, who decides whether to drop the module or the request.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Memory access outside the current linear memory size.
    #[error("out of bounds: offset {offset} + length {len} exceeds memory size {size}")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    /// A guest import has no registered host function.
    #[error("unresolved import {namespace}::{name}")]
    UnresolvedImport { namespace: String, name: String },

    /// A guest import or export does not have the expected numeric signature.
    #[error("signature mismatch for {name}: {detail}")]
    SignatureMismatch { name: String, detail: String },

    /// The named function is not exported by the guest.
    #[error("export not found: {0}")]
    ExportNotFound(String),

    /// Argument count disagrees with the exported signature.
    #[error("arity mismatch calling {name}: expected {expected} arguments, got {actual}")]
    ArityMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// The guest allocator rejected or failed a request.
    #[error("allocation of {len} bytes failed: {reason}")]
    AllocationFailed { len: u32, reason: String },

    /// The binary could not be compiled or lacks required structure.
    #[error("invalid module: {0}")]
    InvalidModule(String),

    /// A host function with this namespace and name is already registered.
    #[error("duplicate host function {namespace}::{name}")]
    DuplicateHostFunction { namespace: String, name: String },

    /// Attempted to release a buffer the host does not own.
    #[error("cannot release a {0} buffer")]
    ReleaseRejected(OwnershipMode),

    /// A result list could not be decoded as a pointer-length pair.
    #[error("malformed result: {0}")]
    MalformedResult(String),

    /// Lifecycle operation attempted in the wrong state.
    #[error("module is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// WASM guest trapped.
    #[error("guest trapped: {0}")]
    GuestTrapped(String),

    /// Fuel exhausted during execution.
    #[error("fuel exhausted (instruction limit)")]
    FuelExhausted,

    /// Any other Wasmtime engine error.
    #[error("wasmtime error: {0}")]
    Wasmtime(#[from] anyhow::Error),
}

impl SandboxError {
    pub(crate) fn allocation_failed(len: u32, reason: impl Into<String>) -> Self {
        Self::AllocationFailed {
            len,
            reason: reason.into(),
        }
    }
}

impl From<AbiError> for SandboxError {
    fn from(err: AbiError) -> Self {
        match err {
            AbiError::OutOfBounds { offset, len, size } => Self::OutOfBounds { offset, len, size },
            AbiError::ReleaseRejected(mode) => Self::ReleaseRejected(mode),
            AbiError::MalformedResult(msg) => Self::MalformedResult(msg),
        }
    }
}

/// Convert an error returned by a Wasmtime call into a `SandboxError`.
///
/// Errors raised by host functions travel through the guest as trap payloads
/// and are recovered here unchanged. Fuel exhaustion becomes
/// `FuelExhausted`; other traps become `GuestTrapped`.
pub(crate) fn classify(err: anyhow::Error) -> SandboxError {
    let err = match err.downcast::<SandboxError>() {
        Ok(inner) => return inner,
        Err(err) => err,
    };
    match err.downcast_ref::<wasmtime::Trap>() {
        Some(wasmtime::Trap::OutOfFuel) => SandboxError::FuelExhausted,
        Some(trap) => SandboxError::GuestTrapped(trap.to_string()),
        None => SandboxError::Wasmtime(err),
    }
}
