//! Boundary ABI error types.
//!
//! `AbiError` covers the failures that can be detected without an execution
//! engine: span checks against a memory size, ownership violations, and
//! result lists that do not carry a pointer-length pair. The sandbox crate
//! folds these into its own error type.

use crate::buffer::OwnershipMode;

/// Engine-independent error raised by the boundary ABI helpers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    /// The span `[offset, offset + len)` does not fit in a region of `size` bytes.
    #[error("out of bounds: offset {offset} + length {len} exceeds memory size {size}")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    /// Attempted to release a buffer the host does not own.
    #[error("cannot release a {0} buffer")]
    ReleaseRejected(OwnershipMode),

    /// A guest result list could not be read as a pointer-length pair.
    #[error("malformed result: {0}")]
    MalformedResult(String),
}

impl AbiError {
    /// Create an out-of-bounds error for the given span.
    pub fn out_of_bounds(offset: usize, len: usize, size: usize) -> Self {
        Self::OutOfBounds {
            offset: offset as u64,
            len: len as u64,
            size: size as u64,
        }
    }

    /// Create a malformed-result error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResult(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_display() {
        let err = AbiError::out_of_bounds(65536, 1, 65536);
        let s = err.to_string();
        assert!(s.contains("65536"));
        assert!(s.contains("length 1"));
    }

    #[test]
    fn test_release_rejected_names_mode() {
        let err = AbiError::ReleaseRejected(OwnershipMode::GuestOwned);
        assert!(err.to_string().contains("guest-owned"));
    }
}
