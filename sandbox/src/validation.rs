//! Module interface inspection.
//!
//! Before a compiled module is instantiated the sandbox reads its import and
//! export declarations and checks them against the protocol:
//!
//! 1. The conventional memory export is present
//! 2. Every function import resolves in the host function registry (done by
//!    `HostFunctionRegistry::resolve_imports` over the interface built here)
//!
//! Functions using non-integer types are recorded without a signature; they
//! exist but cannot be called through the dispatcher.

use std::collections::BTreeMap;
use std::fmt;

use wasmtime::{ExternType, Module};

use wasmbridge_abi::Signature;

use crate::dispatch::signature_of;
use crate::error::SandboxError;

/// What kind of item an import asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    /// A function; `None` if it uses non-integer types.
    Function(Option<Signature>),
    /// A memory, table or global. The host never provides these.
    Other(&'static str),
}

/// One import declaration of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub namespace: String,
    pub name: String,
    pub kind: ImportKind,
}

impl fmt::Display for ImportDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.namespace, self.name)
    }
}

/// The declared imports and exports of a compiled module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleInterface {
    /// Exported functions with an integer-only signature.
    pub exports: BTreeMap<String, Signature>,
    /// Export names of non-function items and non-integer functions.
    pub other_exports: Vec<String>,
    /// Imports in declaration order.
    pub imports: Vec<ImportDecl>,
    memories: Vec<String>,
}

impl ModuleInterface {
    /// Read the interface of a compiled module.
    pub fn inspect(module: &Module) -> Self {
        let mut interface = Self::default();

        for export in module.exports() {
            match export.ty() {
                ExternType::Func(ty) => match signature_of(&ty) {
                    Some(sig) => {
                        interface.exports.insert(export.name().to_string(), sig);
                    }
                    None => interface.other_exports.push(export.name().to_string()),
                },
                ExternType::Memory(_) => {
                    interface.memories.push(export.name().to_string());
                    interface.other_exports.push(export.name().to_string());
                }
                _ => interface.other_exports.push(export.name().to_string()),
            }
        }

        for import in module.imports() {
            let kind = match import.ty() {
                ExternType::Func(ty) => ImportKind::Function(signature_of(&ty)),
                ExternType::Memory(_) => ImportKind::Other("memory"),
                ExternType::Table(_) => ImportKind::Other("table"),
                ExternType::Global(_) => ImportKind::Other("global"),
                _ => ImportKind::Other("unknown"),
            };
            interface.imports.push(ImportDecl {
                namespace: import.module().to_string(),
                name: import.name().to_string(),
                kind,
            });
        }

        interface
    }

    /// Signature of an exported function.
    pub fn export(&self, name: &str) -> Option<&Signature> {
        self.exports.get(name)
    }

    /// Whether a memory is exported under `name`.
    pub fn exports_memory(&self, name: &str) -> bool {
        self.memories.iter().any(|m| m == name)
    }

    /// Fail with `InvalidModule` unless memory is exported under `name`.
    pub fn require_memory(&self, name: &str) -> Result<(), SandboxError> {
        if self.exports_memory(name) {
            Ok(())
        } else {
            Err(SandboxError::InvalidModule(format!(
                "module must export memory '{}'",
                name
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmbridge_abi::NumType;
    use wasmtime::Engine;

    fn compile(wat: &str) -> Module {
        Module::new(&Engine::default(), wat).unwrap()
    }

    #[test]
    fn test_inspect_exports_and_imports() {
        let module = compile(
            r#"
            (module
                (import "env" "host_log_uint32" (func (param i32)))
                (import "env" "weird" (func (param f64)))
                (memory (export "memory") 1)
                (func (export "add") (param i32 i32) (result i32)
                    local.get 0
                    local.get 1
                    i32.add)
                (func (export "half") (param f32) (result f32)
                    local.get 0)
            )
        "#,
        );
        let interface = ModuleInterface::inspect(&module);

        assert_eq!(interface.export("add"), Some(&Signature::i32s(2, 1)));
        assert!(interface.export("half").is_none());
        assert!(interface.other_exports.contains(&"half".to_string()));
        assert!(interface.exports_memory("memory"));

        assert_eq!(interface.imports.len(), 2);
        assert_eq!(interface.imports[0].to_string(), "env::host_log_uint32");
        assert_eq!(
            interface.imports[0].kind,
            ImportKind::Function(Some(Signature::new([NumType::I32], [])))
        );
        assert_eq!(interface.imports[1].kind, ImportKind::Function(None));
    }

    #[test]
    fn test_require_memory() {
        let module = compile(r#"(module (func (export "nop")))"#);
        let interface = ModuleInterface::inspect(&module);
        assert!(matches!(
            interface.require_memory("memory"),
            Err(SandboxError::InvalidModule(_))
        ));

        let module = compile(r#"(module (memory (export "mem") 1))"#);
        let interface = ModuleInterface::inspect(&module);
        assert!(interface.require_memory("mem").is_ok());
        assert!(interface.require_memory("memory").is_err());
    }

    #[test]
    fn test_memory_import_is_not_a_function() {
        let module = compile(r#"(module (import "env" "memory" (memory 1)))"#);
        let interface = ModuleInterface::inspect(&module);
        assert_eq!(interface.imports[0].kind, ImportKind::Other("memory"));
    }
}
