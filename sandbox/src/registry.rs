//! Host functions the guest can import.
//!
//! A `HostFunctionRegistry` maps `(namespace, name)` to a numeric signature
//! and a closure. It is built once, shared by every module a `Sandbox`
//! instantiates, and never changes after that. At instantiation every guest
//! import must resolve to an entry with the identical signature before any
//! guest code runs.
//!
//! Implementations get a [`HostCall`] bound to the calling instance. Through
//! it they can read guest memory, call guest exports (the allocator in
//! particular) and hand buffers back to the guest. An error returned by an
//! implementation aborts the guest call and reaches the outermost caller as
//! the same `SandboxError`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use wasmtime::{
    AsContext, AsContextMut, Caller, Func, FuncType, Linker, Memory, StoreContext,
    StoreContextMut, Val,
};

use wasmbridge_abi::{Buffer, Signature, Value};

use crate::context::GuestContext;
use crate::dispatch::{self, from_val, to_val, val_type};
use crate::error::SandboxError;
use crate::exchange;
use crate::host_impl::HostState;
use crate::memory::MemoryView;
use crate::validation::{ImportKind, ModuleInterface};

/// Boxed host function body.
pub type HostFn =
    dyn Fn(&mut HostCall<'_>, &[Value]) -> Result<Vec<Value>, SandboxError> + Send + Sync;

/// A registered host capability.
#[derive(Clone)]
pub struct HostFunction {
    pub namespace: String,
    pub name: String,
    pub signature: Signature,
    implementation: Arc<HostFn>,
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl HostFunction {
    fn call(
        &self,
        caller: Caller<'_, HostState>,
        params: &[Val],
        results: &mut [Val],
    ) -> anyhow::Result<()> {
        let args = params.iter().map(from_val).collect::<Result<Vec<_>, _>>()?;
        tracing::trace!(namespace = %self.namespace, name = %self.name, "host call");

        let mut call = HostCall {
            caller,
            function: &self.name,
        };
        let values = (self.implementation)(&mut call, &args)?;

        if !self.signature.accepts_results(&values) {
            return Err(SandboxError::SignatureMismatch {
                name: format!("{}::{}", self.namespace, self.name),
                detail: format!(
                    "implementation returned {:?}, declared {}",
                    values, self.signature
                ),
            }
            .into());
        }
        for (slot, value) in results.iter_mut().zip(values) {
            *slot = to_val(value);
        }
        Ok(())
    }

    fn func_type(&self, linker: &Linker<HostState>) -> FuncType {
        FuncType::new(
            linker.engine(),
            self.signature.params.iter().map(|t| val_type(*t)),
            self.signature.results.iter().map(|t| val_type(*t)),
        )
    }
}

/// Name-keyed table of host capabilities, grouped by namespace.
#[derive(Debug, Default, Clone)]
pub struct HostFunctionRegistry {
    namespaces: BTreeMap<String, BTreeMap<String, HostFunction>>,
}

impl HostFunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability under `namespace::name`.
    ///
    /// Fails with `DuplicateHostFunction` if the name is taken; the earlier
    /// registration stays in place.
    pub fn register<F>(
        &mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        signature: Signature,
        implementation: F,
    ) -> Result<(), SandboxError>
    where
        F: Fn(&mut HostCall<'_>, &[Value]) -> Result<Vec<Value>, SandboxError>
            + Send
            + Sync
            + 'static,
    {
        let (namespace, name) = (namespace.into(), name.into());
        let functions = self.namespaces.entry(namespace.clone()).or_default();
        if functions.contains_key(&name) {
            return Err(SandboxError::DuplicateHostFunction { namespace, name });
        }
        let function = HostFunction {
            namespace,
            name: name.clone(),
            signature,
            implementation: Arc::new(implementation),
        };
        functions.insert(name, function);
        Ok(())
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&HostFunction> {
        self.namespaces.get(namespace)?.get(name)
    }

    pub fn len(&self) -> usize {
        self.namespaces.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered functions ordered by namespace, then name.
    pub fn iter(&self) -> impl Iterator<Item = &HostFunction> {
        self.namespaces.values().flat_map(BTreeMap::values)
    }

    /// Check that every import of a module can be satisfied.
    ///
    /// Imports from a namespace in `linked` are left to whatever linked that
    /// namespace (WASI preview1, for instance) and are not checked here.
    pub fn resolve_imports(
        &self,
        interface: &ModuleInterface,
        linked: &[&str],
    ) -> Result<(), SandboxError> {
        for import in &interface.imports {
            if linked.contains(&import.namespace.as_str()) {
                continue;
            }
            let unresolved = || SandboxError::UnresolvedImport {
                namespace: import.namespace.clone(),
                name: import.name.clone(),
            };
            let expected = match &import.kind {
                ImportKind::Function(sig) => sig,
                ImportKind::Other(_) => return Err(unresolved()),
            };
            let host = self
                .get(&import.namespace, &import.name)
                .ok_or_else(unresolved)?;
            match expected {
                Some(sig) if *sig == host.signature => {}
                Some(sig) => {
                    return Err(SandboxError::SignatureMismatch {
                        name: import.to_string(),
                        detail: format!("guest imports {}, host provides {}", sig, host.signature),
                    });
                }
                None => {
                    return Err(SandboxError::SignatureMismatch {
                        name: import.to_string(),
                        detail: "guest import uses non-integer types".into(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Define every registered function in a linker.
    pub(crate) fn define(&self, linker: &mut Linker<HostState>) -> Result<(), SandboxError> {
        for function in self.iter() {
            let ty = function.func_type(linker);
            let (namespace, name) = (function.namespace.clone(), function.name.clone());
            let function = function.clone();
            linker.func_new(
                &namespace,
                &name,
                ty,
                move |caller: Caller<'_, HostState>, params: &[Val], results: &mut [Val]| {
                    function.call(caller, params, results)
                },
            )?;
        }
        Ok(())
    }
}

/// The calling instance, as seen from inside a host function.
pub struct HostCall<'a> {
    caller: Caller<'a, HostState>,
    function: &'a str,
}

impl HostCall<'_> {
    /// Name of the host function being executed.
    pub fn function(&self) -> &str {
        self.function
    }

    pub fn state(&self) -> &HostState {
        self.caller.data()
    }

    pub fn memory(&mut self) -> Result<MemoryView, SandboxError> {
        MemoryView::resolve(self)
    }

    /// Copy bytes out of guest memory. The span is only borrowed for this call.
    pub fn read_bytes(&mut self, ptr: u32, len: u32) -> Result<Vec<u8>, SandboxError> {
        let view = self.memory()?;
        view.read_buffer(&*self, &Buffer::borrowed(ptr, len))
    }

    /// Read guest text, replacing invalid UTF-8.
    pub fn read_string(&mut self, ptr: u32, len: u32) -> Result<String, SandboxError> {
        let view = self.memory()?;
        view.read_string(&*self, &Buffer::borrowed(ptr, len))
    }

    /// Call back into a guest export.
    pub fn invoke(&mut self, name: &str, args: &[Value]) -> Result<Vec<Value>, SandboxError> {
        dispatch::invoke(self, name, args)
    }

    /// Hand `payload` to the guest through two output slots.
    pub fn write_out_slots(
        &mut self,
        payload: &[u8],
        ptr_slot: u32,
        len_slot: u32,
    ) -> Result<Buffer, SandboxError> {
        exchange::write_out_slots(self, payload, ptr_slot, len_slot)
    }

    /// Record a guest log line against this function.
    pub fn log(&mut self, message: String) {
        let function = self.function;
        self.caller.data_mut().add_log(function, message);
    }
}

impl AsContext for HostCall<'_> {
    type Data = HostState;

    fn as_context(&self) -> StoreContext<'_, HostState> {
        self.caller.as_context()
    }
}

impl AsContextMut for HostCall<'_> {
    fn as_context_mut(&mut self) -> StoreContextMut<'_, HostState> {
        self.caller.as_context_mut()
    }
}

impl GuestContext for HostCall<'_> {
    fn export_func(&mut self, name: &str) -> Option<Func> {
        self.caller.export_func(name)
    }

    fn export_memory(&mut self, name: &str) -> Option<Memory> {
        self.caller.export_memory(name)
    }
}
