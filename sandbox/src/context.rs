//! Access to a running guest's exports.
//!
//! The protocol operations run in two situations: from the host, holding the
//! instance's `Store`, and from inside a host function, holding the guest's
//! `Caller`. `GuestContext` abstracts over both so the dispatcher, memory
//! view and buffer exchange are written once.

use wasmtime::{
    AsContext, AsContextMut, Caller, Extern, Func, Instance, Memory, Store, StoreContext,
    StoreContextMut,
};

use crate::host_impl::HostState;

/// A store context that can look up the current guest's exports.
pub trait GuestContext: AsContextMut<Data = HostState> {
    /// Look up an exported function.
    fn export_func(&mut self, name: &str) -> Option<Func>;

    /// Look up an exported memory.
    fn export_memory(&mut self, name: &str) -> Option<Memory>;
}

impl GuestContext for Caller<'_, HostState> {
    fn export_func(&mut self, name: &str) -> Option<Func> {
        self.get_export(name).and_then(Extern::into_func)
    }

    fn export_memory(&mut self, name: &str) -> Option<Memory> {
        self.get_export(name).and_then(Extern::into_memory)
    }
}

/// A module instance paired with the store that owns it.
pub struct InstanceContext<'a> {
    store: &'a mut Store<HostState>,
    instance: Instance,
}

impl<'a> InstanceContext<'a> {
    pub fn new(store: &'a mut Store<HostState>, instance: Instance) -> Self {
        Self { store, instance }
    }
}

impl AsContext for InstanceContext<'_> {
    type Data = HostState;

    fn as_context(&self) -> StoreContext<'_, HostState> {
        self.store.as_context()
    }
}

impl AsContextMut for InstanceContext<'_> {
    fn as_context_mut(&mut self) -> StoreContextMut<'_, HostState> {
        self.store.as_context_mut()
    }
}

impl GuestContext for InstanceContext<'_> {
    fn export_func(&mut self, name: &str) -> Option<Func> {
        self.instance.get_func(&mut *self.store, name)
    }

    fn export_memory(&mut self, name: &str) -> Option<Memory> {
        self.instance.get_memory(&mut *self.store, name)
    }
}
