//! Moving byte buffers across the guest boundary.
//!
//! Guest to host: a guest export returns a packed pointer (or an `i32` pair);
//! the bytes it names are copied out of linear memory before anything else
//! runs in the guest.
//!
//! Host to guest: the host asks the guest allocator for space, writes the
//! bytes, and passes `(ptr, len)` as arguments. Transient allocations go
//! through [`with_guest_bytes`], which releases them on every exit path.
//!
//! Host functions answering a guest request use [`write_out_slots`]: the
//! response is copied into a fresh guest allocation whose pointer and length
//! are written into two slots the guest supplied. The guest owns it after.

use wasmbridge_abi::{AbiError, Buffer, PackedPointer, Value};

use crate::context::GuestContext;
use crate::dispatch;
use crate::error::SandboxError;
use crate::memory::MemoryView;

/// How a guest export returns a `(ptr, len)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultEncoding {
    /// One `i64`, pointer in the high half.
    #[default]
    Packed,
    /// Two `i32` results, pointer first.
    Pair,
}

impl ResultEncoding {
    fn decode(self, results: &[Value]) -> Result<PackedPointer, SandboxError> {
        match (self, results) {
            (Self::Packed, [Value::I64(_)]) | (Self::Pair, [Value::I32(_), Value::I32(_)]) => {
                Ok(PackedPointer::decode_results(results)?)
            }
            (encoding, other) => Err(AbiError::malformed(format!(
                "{:?} encoding cannot decode results {:?}",
                encoding, other
            ))
            .into()),
        }
    }
}

/// Interpret a result list as a guest-owned buffer, in either encoding.
///
/// The span is checked against the current memory size.
pub fn read_guest_buffer(
    ctx: &mut impl GuestContext,
    results: &[Value],
) -> Result<Buffer, SandboxError> {
    let packed = PackedPointer::decode_results(results)?;
    checked_guest_buffer(ctx, packed)
}

fn checked_guest_buffer(
    ctx: &mut impl GuestContext,
    packed: PackedPointer,
) -> Result<Buffer, SandboxError> {
    let view = MemoryView::resolve(ctx)?;
    let (ptr, len) = packed.unpack();
    wasmbridge_abi::region::check_range(view.size(&*ctx), ptr, len)?;
    Ok(Buffer::guest_owned(ptr, len))
}

/// Decode `results` with the expected encoding and copy the bytes out.
pub fn read_result(
    ctx: &mut impl GuestContext,
    results: &[Value],
    encoding: ResultEncoding,
) -> Result<Vec<u8>, SandboxError> {
    let packed = encoding.decode(results)?;
    let buffer = checked_guest_buffer(ctx, packed)?;
    MemoryView::resolve(ctx)?.read_buffer(&*ctx, &buffer)
}

/// Allocate guest memory and copy `bytes` into it.
///
/// The returned buffer is `HostOwned`. If the write fails the allocation is
/// released before the error is returned.
pub fn copy_in(ctx: &mut impl GuestContext, bytes: &[u8]) -> Result<Buffer, SandboxError> {
    let len = u32::try_from(bytes.len()).map_err(|_| {
        SandboxError::allocation_failed(u32::MAX, "payload larger than 4 GiB")
    })?;
    let view = MemoryView::resolve(ctx)?;
    let buffer = dispatch::allocate(ctx, len)?;
    if let Err(err) = view.write(ctx, buffer.ptr(), bytes) {
        release_after_failure(ctx, buffer);
        return Err(err);
    }
    Ok(buffer)
}

/// Run `f` with `bytes` placed in guest memory, then release the buffer.
///
/// The release happens whether `f` succeeds, fails, or the guest traps. If
/// both `f` and the release fail, the error from `f` wins. Empty input is
/// passed as a borrowed `(0, 0)` buffer without touching the allocator.
pub fn with_guest_bytes<C, R>(
    ctx: &mut C,
    bytes: &[u8],
    f: impl FnOnce(&mut C, Buffer) -> Result<R, SandboxError>,
) -> Result<R, SandboxError>
where
    C: GuestContext,
{
    if bytes.is_empty() {
        return f(ctx, Buffer::borrowed(0, 0));
    }

    let buffer = copy_in(ctx, bytes)?;
    match f(ctx, buffer) {
        Ok(value) => {
            dispatch::release(ctx, buffer)?;
            Ok(value)
        }
        Err(err) => {
            release_after_failure(ctx, buffer);
            Err(err)
        }
    }
}

fn release_after_failure(ctx: &mut impl GuestContext, buffer: Buffer) {
    if let Err(err) = dispatch::release(ctx, buffer) {
        tracing::warn!(ptr = buffer.ptr(), len = buffer.len(), error = %err, "release failed");
    }
}

/// Call a guest export as `name(ptr, len)` over `bytes` and read back the
/// bytes it returns.
pub fn call_with_bytes(
    ctx: &mut impl GuestContext,
    name: &str,
    bytes: &[u8],
    encoding: ResultEncoding,
) -> Result<Vec<u8>, SandboxError> {
    with_guest_bytes(ctx, bytes, |ctx, buffer| {
        let results = dispatch::invoke(
            ctx,
            name,
            &[Value::I32(buffer.ptr()), Value::I32(buffer.len())],
        )?;
        read_result(ctx, &results, encoding)
    })
}

/// [`call_with_bytes`] over UTF-8 text; the reply is decoded lossily.
pub fn call_with_str(
    ctx: &mut impl GuestContext,
    name: &str,
    text: &str,
    encoding: ResultEncoding,
) -> Result<String, SandboxError> {
    let bytes = call_with_bytes(ctx, name, text.as_bytes(), encoding)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Deliver `payload` to the guest through two output slots.
///
/// Both slot addresses are checked before anything is allocated. An empty
/// payload writes `(0, 0)`. Otherwise the payload is copied into a fresh
/// allocation, its pointer and length are written little-endian into the
/// slots, and the buffer is handed over to the guest.
pub fn write_out_slots(
    ctx: &mut impl GuestContext,
    payload: &[u8],
    ptr_slot: u32,
    len_slot: u32,
) -> Result<Buffer, SandboxError> {
    let view = MemoryView::resolve(ctx)?;
    let size = view.size(&*ctx);
    wasmbridge_abi::region::check_range(size, ptr_slot, 4)?;
    wasmbridge_abi::region::check_range(size, len_slot, 4)?;

    if payload.is_empty() {
        view.write_u32_le(ctx, ptr_slot, 0)?;
        view.write_u32_le(ctx, len_slot, 0)?;
        return Ok(Buffer::guest_owned(0, 0));
    }

    let buffer = copy_in(ctx, payload)?;
    // Allocation may have grown memory; the slots were in range before so
    // they still are.
    view.write_u32_le(ctx, ptr_slot, buffer.ptr())?;
    view.write_u32_le(ctx, len_slot, buffer.len())?;
    tracing::debug!(ptr = buffer.ptr(), len = buffer.len(), "handed buffer to guest");
    Ok(buffer.into_guest())
}
