//! Buffers and their ownership tags.
//!
//! Every span of guest memory the host hands around carries an
//! [`OwnershipMode`], so releasing memory the host never allocated is an
//! error rather than a silent corruption of the guest allocator.

use std::fmt;

use crate::codec::PackedPointer;
use crate::error::AbiError;

/// Who is responsible for a buffer's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnershipMode {
    /// Allocated by the host through the guest's allocator export.
    /// The host must release it.
    HostOwned,
    /// Produced by (or handed over to) the guest. The host must never
    /// release it, and must copy it out before the guest allocates again.
    GuestOwned,
    /// Valid for the duration of the current call only.
    Borrowed,
}

impl fmt::Display for OwnershipMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostOwned => write!(f, "host-owned"),
            Self::GuestOwned => write!(f, "guest-owned"),
            Self::Borrowed => write!(f, "borrowed"),
        }
    }
}

/// A `(pointer, length)` view into a guest's linear memory.
///
/// Buffers do not borrow the memory they describe; aliasing is not tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Buffer {
    ptr: u32,
    len: u32,
    mode: OwnershipMode,
}

impl Buffer {
    pub fn new(ptr: u32, len: u32, mode: OwnershipMode) -> Self {
        Self { ptr, len, mode }
    }

    /// A buffer the host allocated and must release.
    pub fn host_owned(ptr: u32, len: u32) -> Self {
        Self::new(ptr, len, OwnershipMode::HostOwned)
    }

    /// A buffer produced by the guest.
    pub fn guest_owned(ptr: u32, len: u32) -> Self {
        Self::new(ptr, len, OwnershipMode::GuestOwned)
    }

    /// A buffer valid only for the current call (e.g. host function arguments).
    pub fn borrowed(ptr: u32, len: u32) -> Self {
        Self::new(ptr, len, OwnershipMode::Borrowed)
    }

    /// A guest-owned buffer from a packed pointer.
    pub fn from_packed(packed: PackedPointer, mode: OwnershipMode) -> Self {
        let (ptr, len) = packed.unpack();
        Self::new(ptr, len, mode)
    }

    pub fn ptr(&self) -> u32 {
        self.ptr
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn mode(&self) -> OwnershipMode {
        self.mode
    }

    /// Pack this buffer's span.
    pub fn packed(&self) -> PackedPointer {
        PackedPointer::pack(self.ptr, self.len)
    }

    /// Check that this buffer may be released by the host.
    pub fn check_release(&self) -> Result<(), AbiError> {
        match self.mode {
            OwnershipMode::HostOwned => Ok(()),
            mode => Err(AbiError::ReleaseRejected(mode)),
        }
    }

    /// Hand a host-owned buffer over to the guest.
    ///
    /// After the handover the guest is responsible for the memory and the
    /// host can no longer release it.
    pub fn into_guest(self) -> Self {
        Self {
            mode: OwnershipMode::GuestOwned,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_host_owned_releases() {
        assert!(Buffer::host_owned(8, 4).check_release().is_ok());
        assert_eq!(
            Buffer::guest_owned(8, 4).check_release(),
            Err(AbiError::ReleaseRejected(OwnershipMode::GuestOwned))
        );
        assert_eq!(
            Buffer::borrowed(8, 4).check_release(),
            Err(AbiError::ReleaseRejected(OwnershipMode::Borrowed))
        );
    }

    #[test]
    fn test_handover_blocks_release() {
        let buf = Buffer::host_owned(100, 5).into_guest();
        assert_eq!(buf.mode(), OwnershipMode::GuestOwned);
        assert_eq!((buf.ptr(), buf.len()), (100, 5));
        assert!(buf.check_release().is_err());
    }

    #[test]
    fn test_from_packed() {
        let buf = Buffer::from_packed(PackedPointer::pack(16, 11), OwnershipMode::GuestOwned);
        assert_eq!(buf.ptr(), 16);
        assert_eq!(buf.len(), 11);
        assert_eq!(buf.packed().raw(), (16u64 << 32) | 11);
    }
}
