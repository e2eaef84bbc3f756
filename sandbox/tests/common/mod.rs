//! Shared test helpers for integration tests.
//!
//! Provides the fixture guest module (written in WAT) and sandbox factory
//! functions used across all integration test files.

#![allow(dead_code)]

use wasmbridge_sandbox::{GuestModule, Sandbox, SandboxConfig, Value};

/// Fixture guest.
///
/// Memory layout:
/// ```text
/// 16   "hello world"
/// 64   "hello"
/// 80   "from wasm"
/// 96   "hello "
/// 128  output pointer slot
/// 132  output length slot
/// 4096 bump allocator heap
/// ```
/// `free` never reclaims anything; it counts calls so tests can check that
/// the host released what it allocated.
pub const GUEST: &str = r#"
(module
    (import "env" "host_log_uint32" (func $log_u32 (param i32)))
    (import "env" "host_log_string" (func $log_str (param i32 i32)))
    (import "env" "host_talk" (func $talk (param i32 i32 i32 i32)))
    (import "env" "host_get_string" (func $get_string (param i32 i32)))

    (memory (export "memory") 1)
    (data (i32.const 16) "hello world")
    (data (i32.const 64) "hello")
    (data (i32.const 80) "from wasm")
    (data (i32.const 96) "hello ")

    (global $heap (mut i32) (i32.const 4096))
    (global $frees (mut i32) (i32.const 0))

    (func $pack (param $ptr i32) (param $len i32) (result i64)
        local.get $ptr
        i64.extend_i32_u
        i64.const 32
        i64.shl
        local.get $len
        i64.extend_i32_u
        i64.or)

    (func $malloc (export "malloc") (param $len i32) (result i32)
        (local $ptr i32)
        local.get $len
        i32.eqz
        if
            i32.const 0
            return
        end
        global.get $heap
        local.set $ptr
        global.get $heap
        local.get $len
        i32.add
        global.set $heap
        local.get $ptr)

    (func (export "free") (param i32)
        global.get $frees
        i32.const 1
        i32.add
        global.set $frees)

    (func (export "free_count") (result i32)
        global.get $frees)

    (func (export "add") (param i32 i32) (result i32)
        (local $sum i32)
        local.get 0
        local.get 1
        i32.add
        local.set $sum
        local.get $sum
        call $log_u32
        local.get $sum)

    (func (export "hello_world") (result i64)
        i32.const 16
        i32.const 11
        call $pack)

    (func (export "hello_world_pair") (result i32 i32)
        i32.const 16
        i32.const 11)

    (func (export "log_hello")
        i32.const 80
        i32.const 9
        call $log_str)

    (func (export "bad_log")
        i32.const 65530
        i32.const 100
        call $log_str)

    (func (export "greet") (param $ptr i32) (param $len i32) (result i64)
        (local $out i32)
        local.get $len
        i32.const 6
        i32.add
        call $malloc
        local.set $out
        local.get $out
        i32.const 96
        i32.const 6
        memory.copy
        local.get $out
        i32.const 6
        i32.add
        local.get $ptr
        local.get $len
        memory.copy
        local.get $out
        local.get $len
        i32.const 6
        i32.add
        call $pack)

    (func (export "converse") (result i64)
        i32.const 64
        i32.const 5
        i32.const 128
        i32.const 132
        call $talk
        i32.const 128
        i32.load
        i32.const 132
        i32.load
        call $pack)

    (func (export "fetch") (result i64)
        i32.const 128
        i32.const 132
        call $get_string
        i32.const 128
        i32.load
        i32.const 132
        i32.load
        call $pack)

    (func (export "boom") (param i32 i32) (result i64)
        unreachable)

    (func (export "spin")
        (loop $forever
            br $forever))

    (func (export "grow") (param i32) (result i32)
        local.get 0
        memory.grow)
)
"#;

/// A sandbox with the standard `env` capabilities and default config.
pub fn sandbox() -> Sandbox {
    sandbox_with_config(SandboxConfig::default())
}

pub fn sandbox_with_config(config: SandboxConfig) -> Sandbox {
    Sandbox::with_standard_env(config).unwrap()
}

/// The fixture guest, instantiated with default config.
pub fn guest() -> GuestModule {
    sandbox().instantiate(GUEST.as_bytes()).unwrap()
}

/// How many times the guest's `free` export has run.
pub fn free_count(module: &mut GuestModule) -> u32 {
    module.call("free_count", &[]).unwrap()[0].as_u32()
}

pub fn i32s(values: &[u32]) -> Vec<Value> {
    values.iter().copied().map(Value::I32).collect()
}
