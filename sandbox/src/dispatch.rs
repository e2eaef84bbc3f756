//! Numeric call dispatch into guest exports.
//!
//! The dispatcher resolves an export by name, checks the argument count
//! and types against its signature, and returns the results in declaration
//! order. An `i32` argument may widen into an `i64` parameter; every other
//! type difference is a `SignatureMismatch`. It knows nothing about
//! strings or buffers; `exchange` layers those on top.
//!
//! The allocator and deallocator exports named in the instance's
//! `AbiConventions` are also driven from here.

use wasmtime::{AsContext, FuncType, Val, ValType};

use wasmbridge_abi::{region, Buffer, NumType, Signature, Value};

use crate::context::GuestContext;
use crate::error::{classify, SandboxError};
use crate::memory::MemoryView;

/// Map a Wasmtime value type onto a boundary type.
pub(crate) fn num_type(ty: &ValType) -> Option<NumType> {
    match ty {
        ValType::I32 => Some(NumType::I32),
        ValType::I64 => Some(NumType::I64),
        _ => None,
    }
}

pub(crate) fn val_type(ty: NumType) -> ValType {
    match ty {
        NumType::I32 => ValType::I32,
        NumType::I64 => ValType::I64,
    }
}

/// The boundary signature of a Wasmtime function type, if it only uses integers.
pub fn signature_of(ty: &FuncType) -> Option<Signature> {
    let params = ty.params().map(|t| num_type(&t)).collect::<Option<Vec<_>>>()?;
    let results = ty.results().map(|t| num_type(&t)).collect::<Option<Vec<_>>>()?;
    Some(Signature { params, results })
}

pub(crate) fn to_val(value: Value) -> Val {
    match value {
        Value::I32(v) => Val::I32(v as i32),
        Value::I64(v) => Val::I64(v as i64),
    }
}

pub(crate) fn from_val(val: &Val) -> Result<Value, SandboxError> {
    match val {
        Val::I32(v) => Ok(Value::I32(*v as u32)),
        Val::I64(v) => Ok(Value::I64(*v as u64)),
        other => Err(SandboxError::SignatureMismatch {
            name: "<value>".into(),
            detail: format!("non-integer value {:?}", other),
        }),
    }
}

/// Whether the guest exports a function called `name`.
pub fn has_export(ctx: &mut impl GuestContext, name: &str) -> bool {
    ctx.export_func(name).is_some()
}

/// The numeric signature of an exported function.
pub fn signature(ctx: &mut impl GuestContext, name: &str) -> Result<Signature, SandboxError> {
    let func = ctx
        .export_func(name)
        .ok_or_else(|| SandboxError::ExportNotFound(name.to_string()))?;
    let ty = func.ty(&*ctx);
    signature_of(&ty).ok_or_else(|| SandboxError::SignatureMismatch {
        name: name.to_string(),
        detail: format!("export uses non-integer types: {:?}", ty),
    })
}

/// Invoke an exported guest function with numeric arguments.
pub fn invoke(
    ctx: &mut impl GuestContext,
    name: &str,
    args: &[Value],
) -> Result<Vec<Value>, SandboxError> {
    let func = ctx
        .export_func(name)
        .ok_or_else(|| SandboxError::ExportNotFound(name.to_string()))?;
    let sig = signature(ctx, name)?;
    if args.len() != sig.arity() {
        return Err(SandboxError::ArityMismatch {
            name: name.to_string(),
            expected: sig.arity(),
            actual: args.len(),
        });
    }

    for (index, (arg, ty)) in args.iter().zip(&sig.params).enumerate() {
        if !arg.fits(*ty) {
            return Err(SandboxError::SignatureMismatch {
                name: name.to_string(),
                detail: format!("argument {} is {}, parameter is {}", index, arg.ty(), ty),
            });
        }
    }

    let params: Vec<Val> = args
        .iter()
        .zip(&sig.params)
        .map(|(arg, ty)| to_val(arg.coerce(*ty)))
        .collect();
    let mut results = vec![Val::I32(0); sig.results.len()];

    tracing::trace!(export = name, args = params.len(), "invoking guest export");
    func.call(&mut *ctx, &params, &mut results).map_err(classify)?;

    results.iter().map(from_val).collect()
}

/// Ask the guest allocator for `len` bytes.
///
/// Returns a `HostOwned` buffer the caller must eventually pass to
/// [`release`] (or hand over to the guest). Fails with `AllocationFailed`
/// for zero-length requests, a missing or trapping allocator, a null
/// pointer, or a span outside linear memory.
pub fn allocate(ctx: &mut impl GuestContext, len: u32) -> Result<Buffer, SandboxError> {
    if len == 0 {
        return Err(SandboxError::allocation_failed(len, "zero-length allocation"));
    }
    let alloc_export = ctx.as_context().data().conventions.alloc_export.clone();

    let results = match invoke(ctx, &alloc_export, &[Value::I32(len)]) {
        Ok(results) => results,
        Err(SandboxError::ExportNotFound(_)) => {
            return Err(SandboxError::allocation_failed(
                len,
                format!("no allocator export '{}'", alloc_export),
            ));
        }
        Err(
            e @ (SandboxError::GuestTrapped(_)
            | SandboxError::ArityMismatch { .. }
            | SandboxError::SignatureMismatch { .. }),
        ) => {
            return Err(SandboxError::allocation_failed(len, e.to_string()));
        }
        Err(e) => return Err(e),
    };

    let ptr = match results.as_slice() {
        [Value::I32(ptr)] => *ptr,
        other => {
            return Err(SandboxError::allocation_failed(
                len,
                format!("allocator must return one i32 pointer, got {:?}", other),
            ));
        }
    };
    if ptr == 0 {
        return Err(SandboxError::allocation_failed(len, "allocator returned null"));
    }

    let view = MemoryView::resolve(ctx)?;
    if region::check_range(view.size(&*ctx), ptr, len).is_err() {
        return Err(SandboxError::allocation_failed(
            len,
            format!("allocator returned out-of-bounds pointer {}", ptr),
        ));
    }

    tracing::debug!(ptr, len, "allocated guest buffer");
    Ok(Buffer::host_owned(ptr, len))
}

/// Return a host-owned buffer to the guest allocator.
///
/// Buffers that are `GuestOwned` or `Borrowed` are rejected. When the guest
/// exports no deallocator the call succeeds without doing anything. The
/// deallocator may take `(ptr)` or `(ptr, len)`.
pub fn release(ctx: &mut impl GuestContext, buffer: Buffer) -> Result<(), SandboxError> {
    if let Err(e) = buffer.check_release() {
        tracing::warn!(ptr = buffer.ptr(), mode = %buffer.mode(), "rejected release");
        return Err(e.into());
    }
    let free_export = match ctx.as_context().data().conventions.free_export.clone() {
        Some(name) => name,
        None => return Ok(()),
    };
    if !has_export(ctx, &free_export) {
        return Ok(());
    }

    let args = match signature(ctx, &free_export)?.arity() {
        1 => vec![Value::I32(buffer.ptr())],
        2 => vec![Value::I32(buffer.ptr()), Value::I32(buffer.len())],
        n => {
            return Err(SandboxError::SignatureMismatch {
                name: free_export,
                detail: format!("deallocator takes {} parameters, expected 1 or 2", n),
            });
        }
    };
    invoke(ctx, &free_export, &args)?;
    tracing::debug!(ptr = buffer.ptr(), len = buffer.len(), "released guest buffer");
    Ok(())
}
