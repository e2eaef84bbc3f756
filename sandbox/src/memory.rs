//! Bounds-checked view of a guest's linear memory.
//!
//! `MemoryView` wraps the guest's exported `wasmtime::Memory` and routes every
//! access through `wasmbridge_abi::region`, so an out-of-range offset or
//! length is reported as `SandboxError::OutOfBounds` instead of being
//! truncated. Writes never grow memory.

use wasmtime::{AsContext, AsContextMut, Memory};

use wasmbridge_abi::{region, Buffer};

use crate::context::GuestContext;
use crate::error::SandboxError;
use crate::host_impl::HostState;

/// Bounds-checked read/write access to one module's linear memory.
#[derive(Debug, Clone, Copy)]
pub struct MemoryView {
    memory: Memory,
}

impl MemoryView {
    pub fn new(memory: Memory) -> Self {
        Self { memory }
    }

    /// Resolve the memory export named by the instance's conventions.
    pub fn resolve(ctx: &mut impl GuestContext) -> Result<Self, SandboxError> {
        let name = ctx.as_context().data().conventions.memory_export.clone();
        ctx.export_memory(&name)
            .map(Self::new)
            .ok_or_else(|| SandboxError::InvalidModule(format!("no memory export '{}'", name)))
    }

    /// The underlying Wasmtime memory.
    pub fn memory(&self) -> Memory {
        self.memory
    }

    /// Current size in bytes.
    pub fn size(&self, ctx: &impl AsContext<Data = HostState>) -> usize {
        self.memory.data_size(ctx)
    }

    /// Copy `len` bytes at `offset` out of guest memory.
    pub fn read(
        &self,
        ctx: &impl AsContext<Data = HostState>,
        offset: u32,
        len: u32,
    ) -> Result<Vec<u8>, SandboxError> {
        Ok(region::read_bytes(self.memory.data(ctx), offset, len)?)
    }

    /// Overwrite guest memory at `offset` with `data`.
    pub fn write(
        &self,
        ctx: &mut impl AsContextMut<Data = HostState>,
        offset: u32,
        data: &[u8],
    ) -> Result<(), SandboxError> {
        Ok(region::write_bytes(self.memory.data_mut(ctx), offset, data)?)
    }

    /// Read a little-endian `u32` at `offset`.
    pub fn read_u32_le(
        &self,
        ctx: &impl AsContext<Data = HostState>,
        offset: u32,
    ) -> Result<u32, SandboxError> {
        Ok(region::read_u32_le(self.memory.data(ctx), offset)?)
    }

    /// Write a little-endian `u32` at `offset`.
    pub fn write_u32_le(
        &self,
        ctx: &mut impl AsContextMut<Data = HostState>,
        offset: u32,
        value: u32,
    ) -> Result<(), SandboxError> {
        Ok(region::write_u32_le(self.memory.data_mut(ctx), offset, value)?)
    }

    /// Copy the bytes a buffer describes.
    pub fn read_buffer(
        &self,
        ctx: &impl AsContext<Data = HostState>,
        buffer: &Buffer,
    ) -> Result<Vec<u8>, SandboxError> {
        self.read(ctx, buffer.ptr(), buffer.len())
    }

    /// Read a buffer as text. Invalid UTF-8 sequences are replaced.
    pub fn read_string(
        &self,
        ctx: &impl AsContext<Data = HostState>,
        buffer: &Buffer,
    ) -> Result<String, SandboxError> {
        let bytes = self.read_buffer(ctx, buffer)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::{Engine, MemoryType, Store};

    use crate::config::SandboxConfig;

    fn one_page() -> (Store<HostState>, MemoryView) {
        let engine = Engine::default();
        let mut store = Store::new(&engine, HostState::new(&SandboxConfig::default()));
        let memory = Memory::new(&mut store, MemoryType::new(1, None)).unwrap();
        (store, MemoryView::new(memory))
    }

    #[test]
    fn test_write_then_read() {
        let (mut store, view) = one_page();
        view.write(&mut store, 100, b"hello").unwrap();
        assert_eq!(view.read(&store, 100, 5).unwrap(), b"hello");
    }

    #[test]
    fn test_read_past_end_fails() {
        let (store, view) = one_page();
        let size = view.size(&store) as u32;
        assert_eq!(size, 65536);
        assert!(view.read(&store, 0, size).is_ok());
        match view.read(&store, size, 1) {
            Err(SandboxError::OutOfBounds { offset, len, size }) => {
                assert_eq!((offset, len, size), (65536, 1, 65536));
            }
            other => panic!("expected OutOfBounds, got {:?}", other),
        }
        assert!(view.read(&store, size - 2, 3).is_err());
    }

    #[test]
    fn test_write_does_not_grow() {
        let (mut store, view) = one_page();
        assert!(view.write(&mut store, 65535, &[1, 2]).is_err());
        assert_eq!(view.size(&store), 65536);
    }

    #[test]
    fn test_u32_slots() {
        let (mut store, view) = one_page();
        view.write_u32_le(&mut store, 128, 4096).unwrap();
        assert_eq!(view.read_u32_le(&store, 128).unwrap(), 4096);
        assert!(view.read_u32_le(&store, 65534).is_err());
    }

    #[test]
    fn test_read_string_is_lossy() {
        let (mut store, view) = one_page();
        view.write(&mut store, 0, &[b'o', b'k', 0xFF]).unwrap();
        let text = view.read_string(&store, &Buffer::borrowed(0, 3)).unwrap();
        assert_eq!(text, "ok\u{FFFD}");
    }
}
