//! Per-instance mutable state held in the Wasmtime Store.
//!
//! `HostState` carries the protocol conventions, the store limits, the WASI
//! preview1 context and the log lines recorded from the guest for one module
//! instance. It is created
//! at instantiation and dropped when the module is closed; nothing in it is
//! shared between instances.

use wasmtime::{StoreLimits, StoreLimitsBuilder};
use wasmtime_wasi::preview1::WasiP1Ctx;
use wasmtime_wasi::WasiCtxBuilder;

use wasmbridge_abi::AbiConventions;

use crate::config::SandboxConfig;

/// A message a guest emitted through a logging capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestLog {
    /// Name of the capability that received the message.
    pub function: String,
    /// Decoded message text.
    pub message: String,
}

/// Per-instance mutable state held in the Wasmtime `Store`.
pub struct HostState {
    /// Export names used for memory and allocation.
    pub conventions: AbiConventions,
    /// Log lines recorded from the guest.
    pub logs: Vec<GuestLog>,
    /// Store resource limits (linear memory growth).
    pub limits: StoreLimits,
    wasi: WasiP1Ctx,
    record_logs: bool,
    max_log_lines: usize,
}

impl HostState {
    /// Create the state for a new module instance.
    pub fn new(config: &SandboxConfig) -> Self {
        let limits = StoreLimitsBuilder::new()
            .memory_size(config.max_memory_bytes())
            .instances(1)
            .memories(1)
            .build();

        // Only reachable when the linker defines preview1. Without
        // `wasi_inherit_stdio` the guest gets no stdio, args or environment.
        let mut builder = WasiCtxBuilder::new();
        if config.wasi && config.wasi_inherit_stdio {
            builder.inherit_stdout();
            builder.inherit_stderr();
        }

        Self {
            conventions: config.conventions.clone(),
            logs: Vec::new(),
            limits,
            wasi: builder.build_p1(),
            record_logs: config.enable_guest_logs,
            max_log_lines: config.max_log_lines,
        }
    }

    /// The WASI preview1 context backing `wasi_snapshot_preview1` imports.
    pub fn wasi_ctx(&mut self) -> &mut WasiP1Ctx {
        &mut self.wasi
    }

    /// Record a log line. Silently drops lines past the configured cap.
    pub fn add_log(&mut self, function: &str, message: String) {
        if !self.record_logs || self.logs.len() >= self.max_log_lines {
            return;
        }
        self.logs.push(GuestLog {
            function: function.to_string(),
            message,
        });
    }
}
