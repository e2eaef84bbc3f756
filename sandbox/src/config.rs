//! Sandbox configuration.

use serde::{Deserialize, Serialize};
use wasmbridge_abi::AbiConventions;

/// Size of one WebAssembly page.
pub const WASM_PAGE_SIZE: u64 = 65536;

/// Configuration for the WASM sandbox.
///
/// Controls memory limits, optional instruction fuel, guest log collection,
/// WASI preview1 linking, and the export names used by the buffer exchange
/// protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Maximum linear memory pages (1 page = 64 KiB).
    /// Default: 256 pages = 16 MiB.
    pub max_memory_pages: u32,

    /// Wasmtime fuel limit per module instance. `None` disables metering.
    pub fuel_limit: Option<u64>,

    /// Whether to record messages from the logging capabilities.
    pub enable_guest_logs: bool,

    /// Maximum number of recorded guest log lines; later lines are dropped.
    pub max_log_lines: usize,

    /// Link WASI preview1 (`wasi_snapshot_preview1`) so guests built for
    /// a WASI target can instantiate. Off by default.
    pub wasi: bool,

    /// With `wasi` on, let the guest write to the host's stdout and stderr.
    /// Otherwise its output is discarded.
    pub wasi_inherit_stdio: bool,

    /// Export and namespace names the protocol relies on.
    pub conventions: AbiConventions,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_memory_pages: 256, // 16 MiB
            fuel_limit: None,
            enable_guest_logs: true,
            max_log_lines: 256,
            wasi: false,
            wasi_inherit_stdio: true,
            conventions: AbiConventions::default(),
        }
    }
}

impl SandboxConfig {
    /// Maximum linear memory size in bytes.
    pub fn max_memory_bytes(&self) -> usize {
        (self.max_memory_pages as u64 * WASM_PAGE_SIZE) as usize
    }
}
