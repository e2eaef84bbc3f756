//! Sandbox runtime: Wasmtime engine, module loading and the module lifecycle.
//!
//! The `Sandbox` owns the engine, the configuration and the host function
//! registry. Each guest it produces is a [`GuestModule`] moving through
//!
//! ```text
//! Unloaded -> Loaded -> Instantiated -> Closed
//! ```
//!
//! in one direction only. Any failure while loading or instantiating is
//! fatal and leaves the module `Closed`. Closing drops the store, which
//! releases the instance and its linear memory.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use wasmtime::{Config, Engine, Instance, Linker, Module, Store};

use wasmbridge_abi::{Buffer, Value, WASI_PREVIEW1_NAMESPACE};

use crate::config::SandboxConfig;
use crate::context::InstanceContext;
use crate::dispatch;
use crate::error::{classify, SandboxError};
use crate::exchange::{self, ResultEncoding};
use crate::host_impl::{GuestLog, HostState};
use crate::linker::register_standard_env;
use crate::memory::MemoryView;
use crate::registry::HostFunctionRegistry;
use crate::validation::{ImportDecl, ModuleInterface};

/// Engine, configuration and host capabilities shared by every guest.
pub struct Sandbox {
    engine: Engine,
    config: SandboxConfig,
    registry: Arc<HostFunctionRegistry>,
}

impl fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("config", &self.config)
            .field("host_functions", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Sandbox {
    /// Create a sandbox whose guests may import the functions in `registry`.
    pub fn new(config: SandboxConfig, registry: HostFunctionRegistry) -> Result<Self, SandboxError> {
        let engine = create_engine(&config)?;
        Ok(Self {
            engine,
            config,
            registry: Arc::new(registry),
        })
    }

    /// Create a sandbox providing the standard `env` capabilities.
    pub fn with_standard_env(config: SandboxConfig) -> Result<Self, SandboxError> {
        let mut registry = HostFunctionRegistry::new();
        register_standard_env(&mut registry, &config.conventions.namespace)?;
        Self::new(config, registry)
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn registry(&self) -> &HostFunctionRegistry {
        &self.registry
    }

    /// A fresh, unloaded module.
    pub fn module(&self) -> GuestModule {
        GuestModule {
            engine: self.engine.clone(),
            config: self.config.clone(),
            registry: Arc::clone(&self.registry),
            stage: Stage::Unloaded,
        }
    }

    /// Compile a module from a binary (or WAT text).
    pub fn load(&self, wasm: &[u8]) -> Result<GuestModule, SandboxError> {
        let mut module = self.module();
        module.load(wasm)?;
        Ok(module)
    }

    /// Compile a module from a `.wasm` or `.wat` file.
    pub fn load_file(&self, path: &Path) -> Result<GuestModule, SandboxError> {
        let mut module = self.module();
        module.load_file(path)?;
        Ok(module)
    }

    /// Compile and instantiate in one step.
    pub fn instantiate(&self, wasm: &[u8]) -> Result<GuestModule, SandboxError> {
        let mut module = self.load(wasm)?;
        module.instantiate()?;
        Ok(module)
    }
}

/// Create a Wasmtime engine for the given configuration.
fn create_engine(config: &SandboxConfig) -> Result<Engine, SandboxError> {
    let mut wasm_config = Config::new();

    // Fuel metering only when a limit is configured
    wasm_config.consume_fuel(config.fuel_limit.is_some());

    // One caller per instance; no shared memories
    wasm_config.wasm_threads(false);

    // Pair results and memory.copy in guests
    wasm_config.wasm_multi_value(true);
    wasm_config.wasm_bulk_memory(true);

    Ok(Engine::new(&wasm_config)?)
}

/// Where a module is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Unloaded,
    Loaded,
    Instantiated,
    Closed,
}

impl ModuleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loaded => "loaded",
            Self::Instantiated => "instantiated",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Stage {
    Unloaded,
    Loaded {
        module: Module,
        interface: ModuleInterface,
    },
    Instantiated {
        store: Store<HostState>,
        instance: Instance,
        interface: ModuleInterface,
    },
    Closed,
}

impl Stage {
    fn state(&self) -> ModuleState {
        match self {
            Self::Unloaded => ModuleState::Unloaded,
            Self::Loaded { .. } => ModuleState::Loaded,
            Self::Instantiated { .. } => ModuleState::Instantiated,
            Self::Closed => ModuleState::Closed,
        }
    }
}

/// One guest module and everything it owns.
pub struct GuestModule {
    engine: Engine,
    config: SandboxConfig,
    registry: Arc<HostFunctionRegistry>,
    stage: Stage,
}

impl fmt::Debug for GuestModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestModule")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl GuestModule {
    pub fn state(&self) -> ModuleState {
        self.stage.state()
    }

    fn invalid_state(&self, expected: ModuleState) -> SandboxError {
        SandboxError::InvalidState {
            expected: expected.as_str(),
            actual: self.state().as_str(),
        }
    }

    fn require(&self, expected: ModuleState) -> Result<(), SandboxError> {
        if self.state() == expected {
            Ok(())
        } else {
            Err(self.invalid_state(expected))
        }
    }

    /// Compile a module. A malformed binary closes the module.
    pub fn load(&mut self, wasm: &[u8]) -> Result<(), SandboxError> {
        self.require(ModuleState::Unloaded)?;
        let compiled = Module::new(&self.engine, wasm);
        self.finish_load(compiled)
    }

    /// Compile a module read from disk.
    pub fn load_file(&mut self, path: &Path) -> Result<(), SandboxError> {
        self.require(ModuleState::Unloaded)?;
        let compiled = Module::from_file(&self.engine, path);
        self.finish_load(compiled)
    }

    fn finish_load(&mut self, compiled: anyhow::Result<Module>) -> Result<(), SandboxError> {
        match compiled {
            Ok(module) => {
                let interface = ModuleInterface::inspect(&module);
                tracing::debug!(
                    exports = interface.exports.len(),
                    imports = interface.imports.len(),
                    "module loaded"
                );
                self.stage = Stage::Loaded { module, interface };
                Ok(())
            }
            Err(e) => {
                self.stage = Stage::Closed;
                Err(SandboxError::InvalidModule(format!("{:#}", e)))
            }
        }
    }

    /// Resolve imports, link and instantiate.
    ///
    /// Fails with `InvalidModule` if the memory export is missing and with
    /// `UnresolvedImport` or `SignatureMismatch` before any guest code runs.
    /// A failing start function surfaces as `GuestTrapped`. On any error the
    /// module is closed.
    pub fn instantiate(&mut self) -> Result<(), SandboxError> {
        self.require(ModuleState::Loaded)?;
        let (module, interface) = match std::mem::replace(&mut self.stage, Stage::Closed) {
            Stage::Loaded { module, interface } => (module, interface),
            _ => return Err(self.invalid_state(ModuleState::Loaded)),
        };

        match self.link(&module, &interface) {
            Ok((store, instance)) => {
                tracing::debug!("module instantiated");
                self.stage = Stage::Instantiated {
                    store,
                    instance,
                    interface,
                };
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, "instantiation failed, module closed");
                Err(e)
            }
        }
    }

    fn link(
        &self,
        module: &Module,
        interface: &ModuleInterface,
    ) -> Result<(Store<HostState>, Instance), SandboxError> {
        interface.require_memory(&self.config.conventions.memory_export)?;
        let linked: &[&str] = if self.config.wasi {
            &[WASI_PREVIEW1_NAMESPACE]
        } else {
            &[]
        };
        self.registry.resolve_imports(interface, linked)?;

        let mut store = Store::new(&self.engine, HostState::new(&self.config));
        store.limiter(|state| &mut state.limits);
        if let Some(fuel) = self.config.fuel_limit {
            store.set_fuel(fuel)?;
        }

        let mut linker = Linker::new(&self.engine);
        self.registry.define(&mut linker)?;
        if self.config.wasi {
            wasmtime_wasi::preview1::add_to_linker_sync(&mut linker, |state| state.wasi_ctx())?;
        }
        let instance = linker.instantiate(&mut store, module).map_err(classify)?;
        Ok((store, instance))
    }

    /// Tear the module down. Closing a closed module does nothing.
    pub fn close(&mut self) {
        if self.state() != ModuleState::Closed {
            tracing::debug!(from = %self.state(), "module closed");
        }
        self.stage = Stage::Closed;
    }

    /// Declared imports and exports. Available once loaded.
    pub fn interface(&self) -> Result<&ModuleInterface, SandboxError> {
        match &self.stage {
            Stage::Loaded { interface, .. } | Stage::Instantiated { interface, .. } => {
                Ok(interface)
            }
            _ => Err(self.invalid_state(ModuleState::Loaded)),
        }
    }

    /// Names of the callable exported functions.
    pub fn exports(&self) -> Result<Vec<&str>, SandboxError> {
        Ok(self.interface()?.exports.keys().map(String::as_str).collect())
    }

    pub fn imports(&self) -> Result<&[ImportDecl], SandboxError> {
        Ok(&self.interface()?.imports)
    }

    /// Store and instance of an instantiated module.
    pub fn context(&mut self) -> Result<InstanceContext<'_>, SandboxError> {
        let actual = self.state();
        match &mut self.stage {
            Stage::Instantiated {
                store, instance, ..
            } => Ok(InstanceContext::new(store, *instance)),
            _ => Err(SandboxError::InvalidState {
                expected: ModuleState::Instantiated.as_str(),
                actual: actual.as_str(),
            }),
        }
    }

    pub fn has_export(&mut self, name: &str) -> Result<bool, SandboxError> {
        Ok(dispatch::has_export(&mut self.context()?, name))
    }

    /// Invoke an export with numeric arguments.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Vec<Value>, SandboxError> {
        dispatch::invoke(&mut self.context()?, name, args)
    }

    /// Invoke an export and read the buffer its result describes.
    pub fn call_returning_bytes(
        &mut self,
        name: &str,
        args: &[Value],
        encoding: ResultEncoding,
    ) -> Result<Vec<u8>, SandboxError> {
        let mut ctx = self.context()?;
        let results = dispatch::invoke(&mut ctx, name, args)?;
        exchange::read_result(&mut ctx, &results, encoding)
    }

    /// Pass `bytes` to `name(ptr, len)` and read back the bytes it returns.
    pub fn call_with_bytes(
        &mut self,
        name: &str,
        bytes: &[u8],
        encoding: ResultEncoding,
    ) -> Result<Vec<u8>, SandboxError> {
        exchange::call_with_bytes(&mut self.context()?, name, bytes, encoding)
    }

    pub fn call_with_str(
        &mut self,
        name: &str,
        text: &str,
        encoding: ResultEncoding,
    ) -> Result<String, SandboxError> {
        exchange::call_with_str(&mut self.context()?, name, text, encoding)
    }

    /// Current linear memory size in bytes.
    pub fn memory_size(&mut self) -> Result<usize, SandboxError> {
        let mut ctx = self.context()?;
        let view = MemoryView::resolve(&mut ctx)?;
        Ok(view.size(&ctx))
    }

    pub fn read_memory(&mut self, offset: u32, len: u32) -> Result<Vec<u8>, SandboxError> {
        let mut ctx = self.context()?;
        let view = MemoryView::resolve(&mut ctx)?;
        view.read(&ctx, offset, len)
    }

    pub fn write_memory(&mut self, offset: u32, bytes: &[u8]) -> Result<(), SandboxError> {
        let mut ctx = self.context()?;
        let view = MemoryView::resolve(&mut ctx)?;
        view.write(&mut ctx, offset, bytes)
    }

    /// Ask the guest allocator for `len` bytes. The caller must release it.
    pub fn allocate(&mut self, len: u32) -> Result<Buffer, SandboxError> {
        dispatch::allocate(&mut self.context()?, len)
    }

    /// Allocate and fill a buffer with `bytes`. The caller must release it.
    pub fn copy_in(&mut self, bytes: &[u8]) -> Result<Buffer, SandboxError> {
        exchange::copy_in(&mut self.context()?, bytes)
    }

    pub fn release(&mut self, buffer: Buffer) -> Result<(), SandboxError> {
        dispatch::release(&mut self.context()?, buffer)
    }

    /// Messages recorded from the logging capabilities. Empty unless
    /// instantiated.
    pub fn logs(&self) -> &[GuestLog] {
        match &self.stage {
            Stage::Instantiated { store, .. } => store.data().logs.as_slice(),
            _ => &[],
        }
    }

    /// Fuel left, when metering is enabled.
    pub fn fuel_remaining(&self) -> Option<u64> {
        match &self.stage {
            Stage::Instantiated { store, .. } if self.config.fuel_limit.is_some() => {
                store.get_fuel().ok()
            }
            _ => None,
        }
    }
}
