//! Transient code-generation state
//!
//! One `CodeGen` lives for the duration of a single file's generation.
//! Everything it holds resets at block boundaries (§3 Lifecycles) — the
//! struct itself is the reset point: a fresh statement/function clears the
//! length cache and pending-temporary queue explicitly rather than relying
//! on drop order.

use crate::codegen::atomics::TargetProfile;
use crate::symbols::CodeGenSymbols;
use std::collections::HashMap;

/// Generation-wide configuration, independent of any one file.
#[derive(Debug, Clone)]
pub struct CodeGenConfig {
    pub cpp: bool,
    pub debug: bool,
    pub target: TargetProfile,
}

impl Default for CodeGenConfig {
    fn default() -> Self {
        CodeGenConfig { cpp: false, debug: false, target: TargetProfile::unknown() }
    }
}

/// Per-file generation state, threaded through the statement dispatcher,
/// assignment classifier, and expression generator.
pub struct CodeGen<'a> {
    pub symbols: &'a CodeGenSymbols,
    pub config: CodeGenConfig,
    /// Scope currently being generated, for unqualified-member resolution
    /// inside `scope` bodies (`None` at file scope).
    pub current_scope: Option<String>,
    /// Qualified name of the function currently being generated, used to
    /// look up `scope_usage` and for enum-typed `return` resolution.
    pub current_function: Option<String>,
    /// Expected return type name for `return` statements when the current
    /// function returns an enum (§4.7).
    pub current_return_enum: Option<String>,
    /// `.length` string cache: source variable name -> cached temp name,
    /// live only for the statement currently being generated (§4.8).
    pub length_cache: HashMap<String, String>,
    /// C statements that must be emitted before the statement under
    /// construction (strlen caches, compound-literal temporaries, hoisted
    /// call results). Flushed by the statement dispatcher, never carried
    /// into a loop body (§4.7).
    pub pending_temps: Vec<String>,
    /// Monotonic counter for temporary names (`__cnx_tmp0`, `__cnx_tmp1`, …).
    temp_counter: u32,
}

impl<'a> CodeGen<'a> {
    pub fn new(symbols: &'a CodeGenSymbols, config: CodeGenConfig) -> Self {
        CodeGen {
            symbols,
            config,
            current_scope: None,
            current_function: None,
            current_return_enum: None,
            length_cache: HashMap::new(),
            pending_temps: Vec::new(),
            temp_counter: 0,
        }
    }

    pub fn fresh_temp(&mut self, hint: &str) -> String {
        let name = format!("__cnx_tmp_{hint}_{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }

    /// Resets per-statement transient state. Called by the statement
    /// dispatcher after flushing `pending_temps` into the output.
    pub fn reset_statement_state(&mut self) {
        self.length_cache.clear();
        self.pending_temps.clear();
    }

    /// Qualifies a bare scope-member name with the current scope, if any
    /// (`Scope_name` in C, `Scope::name` in C++).
    pub fn qualify(&self, name: &str) -> String {
        match &self.current_scope {
            Some(scope) if self.config.cpp => format!("{scope}::{name}"),
            Some(scope) => format!("{scope}_{name}"),
            None => name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::CodeGenSymbols;

    #[test]
    fn fresh_temp_names_are_unique() {
        let symbols = CodeGenSymbols::default();
        let mut cg = CodeGen::new(&symbols, CodeGenConfig::default());
        let a = cg.fresh_temp("len");
        let b = cg.fresh_temp("len");
        assert_ne!(a, b);
    }

    #[test]
    fn qualify_prefixes_with_scope_in_c_mode() {
        let symbols = CodeGenSymbols::default();
        let mut cg = CodeGen::new(&symbols, CodeGenConfig::default());
        cg.current_scope = Some("Counter".to_string());
        assert_eq!(cg.qualify("value"), "Counter_value");
    }

    #[test]
    fn qualify_uses_double_colon_in_cpp_mode() {
        let symbols = CodeGenSymbols::default();
        let config = CodeGenConfig { cpp: true, ..CodeGenConfig::default() };
        let mut cg = CodeGen::new(&symbols, config);
        cg.current_scope = Some("Counter".to_string());
        assert_eq!(cg.qualify("value"), "Counter::value");
    }
}
