//! Header generation (§4.9)
//!
//! Emits the companion `.h`/`.hpp` for one parsed file: include guard,
//! system/user includes, an `extern "C"` wrapper in C mode, forward
//! declarations for unresolved external types, enum/bitmap/struct/callback
//! definitions, `extern`-qualified variable declarations, and function
//! prototypes. Walks the AST directly (rather than `CodeGenSymbols`'s
//! hash maps) so declaration order in the header matches source order.

use std::fmt::Write;

use crate::ast::{
    BitmapDecl, CallbackDecl, Decl, EnumDecl, FunctionDecl, Program, RegisterDecl,
    RegisterMemberDecl, ScopeMember, StructDecl, VarDecl,
};
use crate::codegen::format;
use crate::codegen::state::CodeGenConfig;
use crate::error::HeaderGenError;
use crate::symbols::CodeGenSymbols;
use crate::types::{ArrayDim, CnxType, Visibility};

pub const GENERATED_MARKER: &str = crate::header_parser::GENERATED_MARKER;

fn guard_name(stem: &str, cpp: bool) -> String {
    let mut guard: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    guard.push_str(if cpp { "_HPP" } else { "_H" });
    guard
}

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

fn emit_enum(e: &EnumDecl, out: &mut String) -> Result<(), HeaderGenError> {
    let mut members = e.members.clone();
    members.sort_by_key(|m| m.value);
    writeln!(out, "typedef enum {{")?;
    for m in &members {
        writeln!(out, "    {}_{} = {},", e.name, m.name, m.value)?;
    }
    writeln!(out, "}} {};\n", e.name)?;
    Ok(())
}

fn emit_bitmap(b: &BitmapDecl, out: &mut String) -> Result<(), HeaderGenError> {
    writeln!(out, "typedef {} {};", b.backing.c_type(), b.name)?;
    let mut fields = b.fields.clone();
    fields.sort_by_key(|f| f.offset);
    for f in &fields {
        writeln!(out, "/* {}.{}: bit {}, width {} */", b.name, f.name, f.offset, f.width)?;
    }
    out.push('\n');
    Ok(())
}

fn emit_struct(s: &StructDecl, symbols: &CodeGenSymbols, cpp: bool, out: &mut String) -> Result<(), HeaderGenError> {
    if cpp {
        writeln!(out, "struct {} {{", s.name)?;
    } else {
        writeln!(out, "typedef struct {{")?;
    }
    for f in &s.fields {
        let ty = resolve_display_type(&f.ty, symbols);
        writeln!(out, "    {};", format::format_declaration(&f.name, &ty))?;
    }
    if cpp {
        writeln!(out, "}};\n")?;
    } else {
        writeln!(out, "}} {};\n", s.name)?;
    }
    Ok(())
}

fn emit_callback(c: &CallbackDecl, symbols: &CodeGenSymbols, out: &mut String) -> Result<(), HeaderGenError> {
    let ret = resolve_display_type(&c.return_type, symbols);
    let param_types: Vec<String> = if c.params.is_empty() {
        vec!["void".to_string()]
    } else {
        c.params
            .iter()
            .map(|p| format::c_type_name(&resolve_display_type(&p.ty, symbols)))
            .collect()
    };
    writeln!(
        out,
        "typedef {} (*{})({});\n",
        format::c_type_name(&ret),
        c.name,
        param_types.join(", ")
    )?;
    Ok(())
}

fn array_dim_text(dim: &ArrayDim) -> String {
    match dim {
        ArrayDim::Const(n) => n.to_string(),
        ArrayDim::Macro(m) => m.clone(),
    }
}

/// Emits one register as a CMSIS-style volatile struct overlay: a `_t`
/// struct laid out in offset order, and a macro that casts the base
/// address to a pointer to it so `Reg.MEMBER` reads/writes as ordinary C
/// struct member access (matching what `member_chain`'s `base_target`
/// rendering produces for register reads/writes). Members are declared in
/// offset order only — no explicit padding bytes are synthesized, so a
/// register whose members skip reserved space relies on the backing type's
/// natural alignment lining the next member up; see DESIGN.md.
fn emit_register(name: &str, reg: &RegisterDecl, symbols: &CodeGenSymbols, out: &mut String) -> Result<(), HeaderGenError> {
    let mut members: Vec<&RegisterMemberDecl> = reg.members.iter().collect();
    members.sort_by(|a, b| match (&a.offset, &b.offset) {
        (ArrayDim::Const(x), ArrayDim::Const(y)) => x.cmp(y),
        (ArrayDim::Const(_), ArrayDim::Macro(_)) => std::cmp::Ordering::Less,
        (ArrayDim::Macro(_), ArrayDim::Const(_)) => std::cmp::Ordering::Greater,
        (ArrayDim::Macro(x), ArrayDim::Macro(y)) => x.cmp(y),
    });
    writeln!(out, "typedef struct {{")?;
    for m in &members {
        let ty = resolve_display_type(&m.c_type, symbols);
        writeln!(
            out,
            "    volatile {}; /* offset {} */",
            format::format_declaration(&m.name, &ty),
            array_dim_text(&m.offset)
        )?;
    }
    writeln!(out, "}} {name}_t;")?;
    writeln!(out, "#define {name} (*(volatile {name}_t*)({}))\n", array_dim_text(&reg.base_address))?;
    Ok(())
}

fn emit_global_var_extern(v: &VarDecl, symbols: &CodeGenSymbols, out: &mut String) -> Result<(), HeaderGenError> {
    let ty = resolve_display_type(&v.ty, symbols);
    let prefix = if v.modifiers.is_volatile { "extern volatile " } else { "extern " };
    let decl = format::format_declaration(&v.name, &ty);
    writeln!(out, "{prefix}{decl};")?;
    Ok(())
}

fn emit_scope_var_extern(
    scope_name: &str,
    v: &VarDecl,
    symbols: &CodeGenSymbols,
    cpp: bool,
    out: &mut String,
) -> Result<(), HeaderGenError> {
    let ty = resolve_display_type(&v.ty, symbols);
    let qualified = if cpp { format!("{scope_name}::{}", v.name) } else { format!("{scope_name}_{}", v.name) };
    let prefix = if v.modifiers.is_volatile { "extern volatile " } else { "extern " };
    let base = format::c_type_name(&ty);
    let suffix = format::array_suffix(&ty);
    writeln!(out, "{prefix}{base} {qualified}{suffix};")?;
    Ok(())
}

fn emit_function_prototype(
    f: &FunctionDecl,
    qualified_name: &str,
    symbols: &CodeGenSymbols,
    cpp: bool,
    out: &mut String,
) -> Result<(), HeaderGenError> {
    let params: Vec<(String, CnxType)> = f
        .params
        .iter()
        .map(|p| (p.name.clone(), resolve_display_type(&p.ty, symbols)))
        .collect();
    let ret = resolve_display_type(&f.return_type, symbols);
    writeln!(out, "{};", format::format_prototype(qualified_name, &params, &ret, cpp))?;
    Ok(())
}

/// Generates the full `.h`/`.hpp` text for one parsed file. `stem` is the
/// file's base name (no extension), used to derive the include guard;
/// `cnx_source_path` is recorded in the marker comment so header symbol
/// collection (`header_parser::is_generated_header`) can trace a generated
/// header back to the `.cnx` file that produced it.
pub fn generate_header(
    program: &Program,
    symbols: &CodeGenSymbols,
    config: &CodeGenConfig,
    stem: &str,
    cnx_source_path: &str,
) -> Result<String, HeaderGenError> {
    let mut out = String::new();
    writeln!(out, "{GENERATED_MARKER} from {cnx_source_path}")?;

    let guard = guard_name(stem, config.cpp);
    writeln!(out, "#ifndef {guard}\n#define {guard}\n")?;
    writeln!(out, "#include <stdint.h>\n#include <stdbool.h>\n")?;

    if !config.cpp {
        writeln!(out, "#ifdef __cplusplus\nextern \"C\" {{\n#endif\n")?;
    }

    for name in &symbols.opaque_types {
        if config.cpp {
            writeln!(out, "struct {name};")?;
        } else {
            writeln!(out, "typedef struct {name} {name};")?;
        }
    }
    if !symbols.opaque_types.is_empty() {
        out.push('\n');
    }

    for decl in &program.decls {
        match decl {
            Decl::Enum(e) => emit_enum(e, &mut out)?,
            Decl::Bitmap(b) => emit_bitmap(b, &mut out)?,
            Decl::Struct(s) => emit_struct(s, symbols, config.cpp, &mut out)?,
            Decl::Callback(c) => emit_callback(c, symbols, &mut out)?,
            Decl::Register(r) => emit_register(&r.name, r, symbols, &mut out)?,
            _ => {}
        }
    }

    for decl in &program.decls {
        if let Decl::GlobalVar(v) = decl {
            emit_global_var_extern(v, symbols, &mut out)?;
        }
    }
    out.push('\n');

    for decl in &program.decls {
        match decl {
            Decl::Function(f) => emit_function_prototype(f, &f.name, symbols, config.cpp, &mut out)?,
            Decl::Scope(s) => {
                for member in &s.members {
                    match member {
                        ScopeMember::Var(v) if member.visibility() == Visibility::Public => {
                            emit_scope_var_extern(&s.name, v, symbols, config.cpp, &mut out)?
                        }
                        ScopeMember::Function(f) if member.visibility() == Visibility::Public => {
                            let qualified = if config.cpp {
                                format!("{}::{}", s.name, f.name)
                            } else {
                                format!("{}_{}", s.name, f.name)
                            };
                            emit_function_prototype(f, &qualified, symbols, config.cpp, &mut out)?;
                        }
                        // Registers inside a scope are reachable only via the
                        // scope prefix (ast.rs: ScopeMember::visibility is
                        // always Private for Register), so no declaration
                        // escapes into the header.
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    if !config.cpp {
        writeln!(out, "\n#ifdef __cplusplus\n}}\n#endif")?;
    }
    writeln!(out, "\n#endif /* {guard} */")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::symbols::collect_symbols;

    fn gen(src: &str, cpp: bool) -> String {
        let prog = parse_source(src, "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let config = CodeGenConfig { cpp, ..CodeGenConfig::default() };
        generate_header(&prog, &symbols, &config, "t", "t.cnx").unwrap()
    }

    #[test]
    fn emits_include_guard_and_marker() {
        let out = gen("void f() {}", false);
        assert!(out.starts_with(GENERATED_MARKER));
        assert!(out.contains("#ifndef T_H"));
        assert!(out.contains("#endif /* T_H */"));
    }

    #[test]
    fn wraps_c_mode_in_extern_c() {
        let out = gen("void f() {}", false);
        assert!(out.contains("extern \"C\""));
    }

    #[test]
    fn omits_extern_c_in_cpp_mode() {
        let out = gen("void f() {}", true);
        assert!(!out.contains("extern \"C\""));
    }

    #[test]
    fn emits_sorted_enum_members_with_prefix() {
        let out = gen("enum Mode { ON = 1, OFF = 0 }\nvoid f() {}", false);
        let off_pos = out.find("Mode_OFF = 0").unwrap();
        let on_pos = out.find("Mode_ON = 1").unwrap();
        assert!(off_pos < on_pos);
    }

    #[test]
    fn emits_function_prototype() {
        let out = gen("u8 f() { return 1; }", false);
        assert!(out.contains("uint8_t f(void);"));
    }

    #[test]
    fn only_public_scope_members_get_declarations() {
        let out = gen(
            "scope Counter { private u32 value <- 0; public u32 get() { return value; } }",
            false,
        );
        assert!(out.contains("uint32_t Counter_get(void);"));
        assert!(!out.contains("Counter_value"));
    }

    #[test]
    fn register_emits_volatile_overlay_macro() {
        let out = gen("register GPIOA @ 0x1000 { public MODER @ 0 : u32; }", false);
        assert!(out.contains("typedef struct {"));
        assert!(out.contains("volatile uint32_t MODER"));
        assert!(out.contains("#define GPIOA (*(volatile GPIOA_t*)(4096))"));
    }
}
