//! Pointer-length codec.
//!
//! Guest functions can only return integers, and the portable subset of
//! WebAssembly allows a single result. A `(pointer, length)` pair is therefore
//! packed into one `u64`: pointer in the high 32 bits, length in the low 32.
//! Where multi-value returns are available the same pair may instead travel
//! as two `i32` results. Both forms decode to the same pair.
//!
//! Pointers and lengths are always unsigned; no sign extension happens in
//! either direction.

use crate::error::AbiError;
use crate::value::Value;

/// A `(pointer, length)` pair packed into a single 64-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PackedPointer(u64);

impl PackedPointer {
    /// Pack a pointer and length: `(pointer << 32) | length`.
    pub const fn pack(pointer: u32, length: u32) -> Self {
        Self(((pointer as u64) << 32) | length as u64)
    }

    /// Wrap a raw packed value as returned by a guest.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw 64-bit value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The pointer half (high 32 bits).
    pub const fn pointer(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// The length half (low 32 bits).
    pub const fn length(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    /// Split into `(pointer, length)`.
    pub const fn unpack(self) -> (u32, u32) {
        (self.pointer(), self.length())
    }

    /// Encode as the two-value form, for guests that take or return the pair
    /// as separate `i32`s.
    pub const fn to_pair(self) -> [Value; 2] {
        [Value::I32(self.pointer()), Value::I32(self.length())]
    }

    /// Decode a guest function's result list.
    ///
    /// Accepts either a single `i64` (packed form) or two `i32`s (pair form).
    pub fn decode_results(results: &[Value]) -> Result<Self, AbiError> {
        match results {
            [Value::I64(raw)] => Ok(Self::from_raw(*raw)),
            [Value::I32(ptr), Value::I32(len)] => Ok(Self::pack(*ptr, *len)),
            other => Err(AbiError::malformed(format!(
                "expected one i64 or two i32 results, got {:?}",
                other
            ))),
        }
    }
}

impl From<u64> for PackedPointer {
    fn from(raw: u64) -> Self {
        Self::from_raw(raw)
    }
}

impl From<PackedPointer> for u64 {
    fn from(packed: PackedPointer) -> Self {
        packed.raw()
    }
}

/// Pack a pointer and length into one `u64`.
pub const fn pack(pointer: u32, length: u32) -> u64 {
    PackedPointer::pack(pointer, length).raw()
}

/// Unpack a `u64` into `(pointer, length)`.
pub const fn unpack(value: u64) -> (u32, u32) {
    PackedPointer::from_raw(value).unpack()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout() {
        assert_eq!(pack(1, 2), 0x0000_0001_0000_0002);
        assert_eq!(pack(0xDEAD_BEEF, 0), 0xDEAD_BEEF_0000_0000);
        assert_eq!(pack(0, u32::MAX), 0x0000_0000_FFFF_FFFF);
    }

    #[test]
    fn test_unpack_edges() {
        let edges = [0u32, 1, 0x7FFF_FFFF, 0x8000_0000, u32::MAX];
        for &ptr in &edges {
            for &len in &edges {
                assert_eq!(unpack(pack(ptr, len)), (ptr, len));
            }
        }
    }

    #[test]
    fn test_high_bit_is_not_sign_extended() {
        let packed = PackedPointer::from_raw(u64::MAX);
        assert_eq!(packed.unpack(), (u32::MAX, u32::MAX));
    }

    #[test]
    fn test_pair_and_packed_agree() {
        let packed = PackedPointer::pack(4096, 11);
        let from_single = PackedPointer::decode_results(&[Value::I64(packed.raw())]).unwrap();
        let from_pair = PackedPointer::decode_results(&packed.to_pair()).unwrap();
        assert_eq!(from_single, from_pair);
        assert_eq!(from_pair.unpack(), (4096, 11));
    }

    #[test]
    fn test_decode_rejects_other_shapes() {
        assert!(PackedPointer::decode_results(&[]).is_err());
        assert!(PackedPointer::decode_results(&[Value::I32(3)]).is_err());
        assert!(PackedPointer::decode_results(&[Value::I64(1), Value::I64(2)]).is_err());
    }
}
