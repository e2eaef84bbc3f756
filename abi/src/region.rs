//! Bounds-checked access to a linear memory snapshot.
//!
//! These helpers work on plain byte slices so they can be used with any
//! engine's view of guest memory. Every access validates
//! `offset + len <= mem.len()` without overflow before touching memory.

use crate::error::AbiError;

/// Validate that `[offset, offset + len)` lies inside a region of `size` bytes.
pub fn check_range(size: usize, offset: u32, len: u32) -> Result<(), AbiError> {
    let start = offset as usize;
    let end = start
        .checked_add(len as usize)
        .ok_or_else(|| AbiError::out_of_bounds(start, len as usize, size))?;
    if end > size {
        return Err(AbiError::out_of_bounds(start, len as usize, size));
    }
    Ok(())
}

/// Borrow `len` bytes at `offset`.
pub fn slice(mem: &[u8], offset: u32, len: u32) -> Result<&[u8], AbiError> {
    check_range(mem.len(), offset, len)?;
    let start = offset as usize;
    Ok(&mem[start..start + len as usize])
}

/// Copy `len` bytes at `offset` out of the region.
pub fn read_bytes(mem: &[u8], offset: u32, len: u32) -> Result<Vec<u8>, AbiError> {
    slice(mem, offset, len).map(<[u8]>::to_vec)
}

/// Overwrite `data.len()` bytes at `offset`. The region never grows.
pub fn write_bytes(mem: &mut [u8], offset: u32, data: &[u8]) -> Result<(), AbiError> {
    let len = u32::try_from(data.len())
        .map_err(|_| AbiError::out_of_bounds(offset as usize, data.len(), mem.len()))?;
    check_range(mem.len(), offset, len)?;
    let start = offset as usize;
    mem[start..start + data.len()].copy_from_slice(data);
    Ok(())
}

/// Read a little-endian `u32` at `offset`.
pub fn read_u32_le(mem: &[u8], offset: u32) -> Result<u32, AbiError> {
    let bytes = slice(mem, offset, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Write a little-endian `u32` at `offset`.
pub fn write_u32_le(mem: &mut [u8], offset: u32, value: u32) -> Result<(), AbiError> {
    write_bytes(mem, offset, &value.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bytes_basic() {
        let mem = vec![10, 20, 30, 40, 50];
        assert_eq!(read_bytes(&mem, 1, 3).unwrap(), vec![20, 30, 40]);
    }

    #[test]
    fn test_read_bytes_out_of_bounds() {
        let mem = vec![10, 20, 30];
        assert!(read_bytes(&mem, 1, 3).is_err());
        assert!(read_bytes(&mem, 3, 1).is_err());
        assert!(read_bytes(&mem, u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn test_boundary_is_exclusive() {
        let mem = vec![0u8; 8];
        assert!(check_range(8, 0, 8).is_ok());
        assert!(check_range(8, 8, 0).is_ok());
        assert_eq!(
            check_range(8, 8, 1),
            Err(AbiError::OutOfBounds { offset: 8, len: 1, size: 8 })
        );
        assert!(read_bytes(&mem, 8, 0).unwrap().is_empty());
    }

    #[test]
    fn test_write_bytes_basic() {
        let mut mem = vec![0; 8];
        write_bytes(&mut mem, 2, &[0xAA, 0xBB]).unwrap();
        assert_eq!(mem, vec![0, 0, 0xAA, 0xBB, 0, 0, 0, 0]);
    }

    #[test]
    fn test_write_bytes_out_of_bounds_leaves_memory_untouched() {
        let mut mem = vec![0; 4];
        assert!(write_bytes(&mut mem, 2, &[1, 2, 3]).is_err());
        assert_eq!(mem, vec![0; 4]);
    }

    #[test]
    fn test_read_write_u32() {
        let mut mem = vec![0; 16];
        write_u32_le(&mut mem, 4, 0x1234_5678).unwrap();
        assert_eq!(&mem[4..8], &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(read_u32_le(&mem, 4).unwrap(), 0x1234_5678);
        assert!(read_u32_le(&mem, 13).is_err());
    }
}
