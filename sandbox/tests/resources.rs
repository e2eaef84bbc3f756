//! Resource limit tests: fuel exhaustion, memory limits, guest log caps.

mod common;

use wasmbridge_sandbox::{SandboxConfig, SandboxError, Value};

use common::*;

// ── Fuel ──

#[test]
fn test_fuel_exhaustion() {
    let config = SandboxConfig {
        fuel_limit: Some(10_000),
        ..SandboxConfig::default()
    };
    let mut module = sandbox_with_config(config)
        .instantiate(GUEST.as_bytes())
        .unwrap();

    match module.call("spin", &[]) {
        Err(SandboxError::FuelExhausted) => {}
        other => panic!("expected FuelExhausted, got {:?}", other),
    }
    assert_eq!(module.fuel_remaining(), Some(0));
}

#[test]
fn test_sufficient_fuel() {
    let config = SandboxConfig {
        fuel_limit: Some(1_000_000),
        ..SandboxConfig::default()
    };
    let mut module = sandbox_with_config(config)
        .instantiate(GUEST.as_bytes())
        .unwrap();

    let before = module.fuel_remaining().unwrap();
    module.call("add", &i32s(&[20, 22])).unwrap();
    let after = module.fuel_remaining().unwrap();
    assert!(after < before, "fuel must be consumed: {} -> {}", before, after);
}

#[test]
fn test_no_fuel_limit_reports_none() {
    let mut module = guest();
    module.call("add", &i32s(&[1, 2])).unwrap();
    assert_eq!(module.fuel_remaining(), None);
}

// ── Memory ──

#[test]
fn test_memory_growth_capped() {
    let config = SandboxConfig {
        max_memory_pages: 2,
        ..SandboxConfig::default()
    };
    let mut module = sandbox_with_config(config)
        .instantiate(GUEST.as_bytes())
        .unwrap();

    assert_eq!(module.memory_size().unwrap(), 65536);
    // memory.grow returns the old page count, or -1 when refused.
    assert_eq!(module.call("grow", &i32s(&[1])).unwrap(), [Value::I32(1)]);
    assert_eq!(module.call("grow", &i32s(&[1])).unwrap(), [Value::I32(u32::MAX)]);
    assert_eq!(module.memory_size().unwrap(), 2 * 65536);
}

#[test]
fn test_initial_memory_over_limit_fails() {
    let wat = r#"(module (memory (export "memory") 4))"#;
    let config = SandboxConfig {
        max_memory_pages: 2,
        ..SandboxConfig::default()
    };
    let result = sandbox_with_config(config).instantiate(wat.as_bytes());
    assert!(result.is_err());
}

#[test]
fn test_host_reads_see_grown_memory() {
    let mut module = guest();
    assert!(module.read_memory(65536, 4).is_err());
    module.call("grow", &i32s(&[1])).unwrap();
    module.write_memory(65536, b"tail").unwrap();
    assert_eq!(module.read_memory(65536, 4).unwrap(), b"tail");
}

// ── Guest logs ──

#[test]
fn test_guest_log_cap() {
    let config = SandboxConfig {
        max_log_lines: 3,
        ..SandboxConfig::default()
    };
    let mut module = sandbox_with_config(config)
        .instantiate(GUEST.as_bytes())
        .unwrap();
    for i in 0..10 {
        module.call("add", &i32s(&[i, 0])).unwrap();
    }
    let messages: Vec<_> = module.logs().iter().map(|l| l.message.as_str()).collect();
    assert_eq!(messages, ["0", "1", "2"]);
}

#[test]
fn test_guest_logs_disabled() {
    let config = SandboxConfig {
        enable_guest_logs: false,
        ..SandboxConfig::default()
    };
    let mut module = sandbox_with_config(config)
        .instantiate(GUEST.as_bytes())
        .unwrap();
    module.call("log_hello", &[]).unwrap();
    assert!(module.logs().is_empty());
}
