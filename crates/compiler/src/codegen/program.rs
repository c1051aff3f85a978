//! Per-file translation-unit assembly
//!
//! Walks one parsed `.cnx` file's top-level declarations in source order and
//! emits the corresponding `.c`/`.cpp` text: global variable definitions,
//! free-function bodies, and scope-member definitions (qualified statics and
//! methods). Type declarations (`struct`/`enum`/`bitmap`/`register`/
//! `callback`) contribute no source-file text of their own — they are
//! emitted once, into the header, by `header_gen.rs`.

use crate::ast::{Decl, FunctionDecl, Program, ScopeMember};
use crate::codegen::format;
use crate::codegen::state::{CodeGen, CodeGenConfig};
use crate::codegen::statements;
use crate::error::CodeGenError;
use crate::symbols::CodeGenSymbols;
use crate::types::CnxType;

fn params_as_cnx(params: &[crate::ast::Param], symbols: &CodeGenSymbols) -> Vec<(String, CnxType)> {
    params
        .iter()
        .map(|p| (p.name.clone(), resolve_display_type(&p.ty, symbols)))
        .collect()
}

/// A best-effort `TypeRef -> CnxType` resolution for signature formatting —
/// identical in shape to `symbols::resolve_type_ref`, but that function is
/// private to the collection pass; re-deriving it here keeps this module
/// from depending on collection internals for a read-only lookup.
fn resolve_display_type(ty: &crate::ast::TypeRef, symbols: &CodeGenSymbols) -> CnxType {
    use crate::ast::TypeRef;
    match ty {
        TypeRef::Primitive(p) => CnxType::Primitive(*p),
        TypeRef::BoundedString(n) => CnxType::BoundedString { capacity: *n },
        TypeRef::UnboundedString => CnxType::UnboundedString,
        TypeRef::Array { element, dims } => CnxType::Array {
            element: Box::new(resolve_display_type(element, symbols)),
            dims: dims.clone(),
        },
        TypeRef::Named(name) => {
            if symbols.structs.contains_key(name) {
                CnxType::Struct(name.clone())
            } else if symbols.enums.contains_key(name) {
                CnxType::Enum(name.clone())
            } else if symbols.bitmaps.contains_key(name) {
                CnxType::Bitmap(name.clone())
            } else if symbols.callbacks.contains_key(name) {
                CnxType::Callback(name.clone())
            } else {
                CnxType::Opaque(name.clone())
            }
        }
    }
}

fn generate_function(
    func: &FunctionDecl,
    qualified_name: &str,
    scope: Option<&str>,
    symbols: &CodeGenSymbols,
    config: &CodeGenConfig,
    out: &mut String,
) -> Result<(), CodeGenError> {
    let params = params_as_cnx(&func.params, symbols);
    let return_type = resolve_display_type(&func.return_type, symbols);
    let mangled = match scope {
        Some(s) if config.cpp => format!("{s}::{}", func.name),
        Some(s) => format!("{s}_{}", func.name),
        None => qualified_name.to_string(),
    };
    out.push_str(&format::format_prototype(&mangled, &params, &return_type, config.cpp));
    out.push_str(" {\n");

    let mut gen = CodeGen::new(symbols, config.clone());
    gen.current_scope = scope.map(str::to_string);
    gen.current_function = Some(qualified_name.to_string());
    gen.current_return_enum = match &return_type {
        CnxType::Enum(name) => Some(name.clone()),
        _ => None,
    };
    let lines = statements::generate_block(&func.body, &mut gen)?;
    for line in lines {
        out.push_str("    ");
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str("}\n\n");
    Ok(())
}

fn generate_global_var(v: &crate::ast::VarDecl, symbols: &CodeGenSymbols, config: &CodeGenConfig, out: &mut String) {
    let ty = resolve_display_type(&v.ty, symbols);
    let mut gen = CodeGen::new(symbols, config.clone());
    let decl = format::format_declaration(&v.name, &ty);
    let prefix = if v.modifiers.is_volatile { "volatile " } else { "" };
    match &v.init {
        Some(e) => out.push_str(&format!("{prefix}{decl} = {};\n", crate::codegen::expr::generate(e, &gen))),
        None => out.push_str(&format!("{prefix}{decl};\n")),
    }
    let _ = &mut gen;
}

fn generate_scope_var(scope_name: &str, v: &crate::ast::VarDecl, symbols: &CodeGenSymbols, config: &CodeGenConfig, out: &mut String) {
    let ty = resolve_display_type(&v.ty, symbols);
    let qualified = if config.cpp { format!("{scope_name}::{}", v.name) } else { format!("{scope_name}_{}", v.name) };
    let gen = CodeGen::new(symbols, config.clone());
    let base = format::c_type_name(&ty);
    let suffix = format::array_suffix(&ty);
    let storage = if config.cpp { "" } else { "static " };
    match &v.init {
        Some(e) => out.push_str(&format!("{storage}{base} {qualified}{suffix} = {};\n", crate::codegen::expr::generate(e, &gen))),
        None => out.push_str(&format!("{storage}{base} {qualified}{suffix};\n")),
    }
}

/// Generates the full `.c`/`.cpp` body text for one parsed file (everything
/// after the `#include "file.h"` line, which `pipeline.rs` prepends).
pub fn generate_source(program: &Program, symbols: &CodeGenSymbols, config: &CodeGenConfig) -> Result<String, CodeGenError> {
    let mut out = String::new();

    for decl in &program.decls {
        if let Decl::GlobalVar(v) = decl {
            generate_global_var(v, symbols, config, &mut out);
        }
    }
    out.push('\n');

    for decl in &program.decls {
        match decl {
            Decl::Function(f) => {
                generate_function(f, &f.name, None, symbols, config, &mut out)?;
            }
            Decl::Scope(s) => {
                for member in &s.members {
                    match member {
                        ScopeMember::Var(v) => generate_scope_var(&s.name, v, symbols, config, &mut out),
                        ScopeMember::Function(f) => {
                            let qualified = format!("{}.{}", s.name, f.name);
                            generate_function(f, &qualified, Some(&s.name), symbols, config, &mut out)?;
                        }
                        ScopeMember::Register(_) => {}
                    }
                }
            }
            Decl::Struct(_) | Decl::Enum(_) | Decl::Bitmap(_) | Decl::Register(_) | Decl::Callback(_) | Decl::GlobalVar(_) => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::symbols::collect_symbols;

    #[test]
    fn generates_global_var_definition() {
        let prog = parse_source("u32 counter <- 0;", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let out = generate_source(&prog, &symbols, &CodeGenConfig::default()).unwrap();
        assert!(out.contains("uint32_t counter = 0;"));
    }

    #[test]
    fn generates_free_function_body() {
        let prog = parse_source("void f() { u8 x <- 1; }", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let out = generate_source(&prog, &symbols, &CodeGenConfig::default()).unwrap();
        assert!(out.contains("void f(void) {"));
        assert!(out.contains("uint8_t x = 1;"));
    }

    #[test]
    fn generates_qualified_scope_function_and_static_member() {
        let prog = parse_source(
            "scope Counter { private u32 value <- 0; public void bump() { value <- value + 1; } }",
            "t.cnx",
        )
        .unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let out = generate_source(&prog, &symbols, &CodeGenConfig::default()).unwrap();
        assert!(out.contains("static uint32_t Counter_value = 0;"));
        assert!(out.contains("void Counter_bump(void) {"));
        assert!(out.contains("Counter_value = "));
    }
}
