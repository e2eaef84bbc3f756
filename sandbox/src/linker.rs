//! Standard host capabilities.
//!
//! Registers the conventional `env` functions guests built for this host
//! expect:
//!
//! | name              | params                                   | result |
//! |-------------------|------------------------------------------|--------|
//! | `host_log_string` | `ptr, len`                               |        |
//! | `host_log_uint32` | `value`                                  |        |
//! | `host_talk`       | `ptr, len, out_ptr_slot, out_len_slot`   |        |
//! | `host_get_string` | `out_ptr_slot, out_len_slot`             |        |
//! | `hostPrintString` | `ptr, len`                               | status |
//! | `hostTalk`        | `ptr, len, out_ptr_slot, out_len_slot`   | status |
//!
//! Responses are written into memory obtained from the guest allocator and
//! announced through the two output slots. The camel-case pair behaves like
//! its snake-case counterpart but returns an `i32` status, always 0 on
//! success; a failure aborts the guest call instead.

use wasmbridge_abi::{Signature, Value};

use crate::error::SandboxError;
use crate::registry::{HostCall, HostFunctionRegistry};

pub const LOG_STRING: &str = "host_log_string";
pub const LOG_U32: &str = "host_log_uint32";
pub const TALK: &str = "host_talk";
pub const GET_STRING: &str = "host_get_string";
pub const PRINT_STRING: &str = "hostPrintString";
pub const TALK_STATUS: &str = "hostTalk";

const STATUS_OK: Value = Value::I32(0);

/// Default text served by `host_get_string`.
pub const DEFAULT_HOST_STRING: &str = "this is a string coming from the host";

/// Register the two logging capabilities.
///
/// Messages go to `tracing` at info level under the `wasmbridge::guest`
/// target and are recorded in the instance's guest log.
pub fn register_logging(
    registry: &mut HostFunctionRegistry,
    namespace: &str,
) -> Result<(), SandboxError> {
    registry.register(namespace, LOG_STRING, Signature::i32s(2, 0), |call, args| {
        let message = call.read_string(args[0].as_u32(), args[1].as_u32())?;
        tracing::info!(target: "wasmbridge::guest", function = LOG_STRING, "{}", message);
        call.log(message);
        Ok(vec![])
    })?;

    registry.register(namespace, LOG_U32, Signature::i32s(1, 0), |call, args| {
        let value = args[0].as_u32();
        tracing::info!(target: "wasmbridge::guest", function = LOG_U32, value);
        call.log(value.to_string());
        Ok(vec![])
    })
}

/// Register `host_talk`, answering each guest request with `responder`.
pub fn register_talk<F>(
    registry: &mut HostFunctionRegistry,
    namespace: &str,
    responder: F,
) -> Result<(), SandboxError>
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    registry.register(namespace, TALK, Signature::i32s(4, 0), move |call, args| {
        talk(call, args, &responder)?;
        Ok(vec![])
    })
}

fn talk(
    call: &mut HostCall<'_>,
    args: &[Value],
    responder: &dyn Fn(&str) -> String,
) -> Result<(), SandboxError> {
    let request = call.read_string(args[0].as_u32(), args[1].as_u32())?;
    let response = responder(&request);
    tracing::debug!(
        function = call.function(),
        request = %request,
        response_len = response.len(),
        "talk"
    );
    call.write_out_slots(response.as_bytes(), args[2].as_u32(), args[3].as_u32())?;
    Ok(())
}

/// Register the status-returning `hostPrintString` and `hostTalk`.
///
/// `hostPrintString` logs the guest text like `host_log_string`. `hostTalk`
/// answers through the output slots like `host_talk`.
pub fn register_status_variants<F>(
    registry: &mut HostFunctionRegistry,
    namespace: &str,
    responder: F,
) -> Result<(), SandboxError>
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    registry.register(namespace, PRINT_STRING, Signature::i32s(2, 1), |call, args| {
        let message = call.read_string(args[0].as_u32(), args[1].as_u32())?;
        tracing::info!(target: "wasmbridge::guest", function = PRINT_STRING, "{}", message);
        call.log(message);
        Ok(vec![STATUS_OK])
    })?;

    registry.register(namespace, TALK_STATUS, Signature::i32s(4, 1), move |call, args| {
        talk(call, args, &responder)?;
        Ok(vec![STATUS_OK])
    })
}

/// Register `host_get_string`, always serving `text`.
pub fn register_get_string(
    registry: &mut HostFunctionRegistry,
    namespace: &str,
    text: impl Into<String>,
) -> Result<(), SandboxError> {
    let text: String = text.into();
    registry.register(namespace, GET_STRING, Signature::i32s(2, 0), move |call, args| {
        call.write_out_slots(text.as_bytes(), args[0].as_u32(), args[1].as_u32())?;
        Ok(vec![])
    })
}

/// Register every capability with its default behavior: both talk
/// variants upper-case their input and `host_get_string` serves
/// [`DEFAULT_HOST_STRING`].
pub fn register_standard_env(
    registry: &mut HostFunctionRegistry,
    namespace: &str,
) -> Result<(), SandboxError> {
    register_logging(registry, namespace)?;
    register_talk(registry, namespace, |request| request.to_uppercase())?;
    register_get_string(registry, namespace, DEFAULT_HOST_STRING)?;
    register_status_variants(registry, namespace, |request| request.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_env_registers_all() {
        let mut registry = HostFunctionRegistry::new();
        register_standard_env(&mut registry, "env").unwrap();
        assert_eq!(registry.len(), 6);
        assert_eq!(
            registry.get("env", PRINT_STRING).unwrap().signature,
            Signature::i32s(2, 1)
        );
        assert_eq!(
            registry.get("env", TALK_STATUS).unwrap().signature,
            Signature::i32s(4, 1)
        );
        assert_eq!(registry.get("env", TALK).unwrap().signature, Signature::i32s(4, 0));
        assert_eq!(registry.get("env", LOG_U32).unwrap().signature, Signature::i32s(1, 0));
    }

    #[test]
    fn test_standard_env_twice_is_duplicate() {
        let mut registry = HostFunctionRegistry::new();
        register_standard_env(&mut registry, "env").unwrap();
        assert!(matches!(
            register_logging(&mut registry, "env"),
            Err(SandboxError::DuplicateHostFunction { .. })
        ));
    }
}
