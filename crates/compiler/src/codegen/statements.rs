//! Statement dispatcher
//!
//! Ties the assignment classifier, control-flow lowerings, and expression
//! generator together into a single per-statement emission pass, managing
//! the length-cache/pending-temp lifecycle described in `state.rs`.

use crate::ast::{AssignStmt, BinaryOp, Expr, Stmt, TypeRef, UnaryOp, VarDecl};
use crate::codegen::assignment::{self, AssignmentKind};
use crate::codegen::atomics;
use crate::codegen::control_flow;
use crate::codegen::expr;
use crate::codegen::member_chain::{self, PostfixOp};
use crate::codegen::state::CodeGen;
use crate::codegen::strings;
use crate::error::CodeGenError;
use crate::types::{CnxType, Primitive};
use std::collections::HashMap;

/// A purely textual rendering of a `TypeRef` — declarations inside a
/// function body have no symbol-table entry of their own (only globals and
/// scope members do), so this does not attempt struct/enum/bitmap
/// resolution beyond using the written name verbatim.
fn type_ref_text(ty: &TypeRef) -> (String, String) {
    match ty {
        TypeRef::Primitive(p) => (p.c_type().to_string(), String::new()),
        TypeRef::BoundedString(n) => ("char".to_string(), format!("[{}]", n + 1)),
        TypeRef::UnboundedString => ("const char*".to_string(), String::new()),
        TypeRef::Named(name) => (name.clone(), String::new()),
        TypeRef::Array { element, dims } => {
            let (base, _) = type_ref_text(element);
            let suffix: String = dims.iter().map(|d| format!("[{d}]")).collect();
            (base, suffix)
        }
    }
}

fn format_var_decl(v: &VarDecl, gen: &CodeGen) -> String {
    let (base, suffix) = type_ref_text(&v.ty);
    let mut prefix = String::new();
    if v.modifiers.is_const {
        prefix.push_str("const ");
    }
    if v.modifiers.is_volatile {
        prefix.push_str("volatile ");
    }
    let init = v.init.as_ref().map(|e| format!(" = {}", expr::generate(e, gen)));
    format!("{prefix}{base} {}{suffix}{};", v.name, init.unwrap_or_default())
}

/// Generates one statement, appending the resulting C lines (already
/// correctly indented relative to the caller's block) to `out`.
pub fn generate_stmt(stmt: &Stmt, gen: &mut CodeGen, out: &mut Vec<String>) -> Result<(), CodeGenError> {
    match stmt {
        Stmt::VarDecl(v) => out.push(format_var_decl(&v.decl, gen)),
        Stmt::Assign(a) => generate_assign(a, gen, out)?,
        Stmt::Expr(e) => out.push(format!("{};", expr::generate(e, gen))),
        Stmt::If { cond, then_branch, else_branch, .. } => {
            control_flow::validate_condition(cond)?;
            hoist_length_cache(cond, Some(then_branch), gen, out);
            out.push(format!("if ({}) {{", expr::generate(cond, gen)));
            generate_block_into(then_branch, gen, out)?;
            out.push("}".to_string());
            if let Some(else_stmts) = else_branch {
                out.push("else {".to_string());
                generate_block_into(else_stmts, gen, out)?;
                out.push("}".to_string());
            }
        }
        Stmt::While { cond, body, .. } => {
            control_flow::validate_condition(cond)?;
            hoist_length_cache(cond, None, gen, out);
            out.push(format!("while ({}) {{", expr::generate(cond, gen)));
            generate_block_into(body, gen, out)?;
            out.push("}".to_string());
        }
        Stmt::DoWhile { body, cond, .. } => {
            control_flow::validate_condition(cond)?;
            control_flow::validate_do_while_condition(cond, &infer_condition_type(cond, gen))?;
            out.push("do {".to_string());
            generate_block_into(body, gen, out)?;
            out.push(format!("}} while ({});", expr::generate(cond, gen)));
        }
        Stmt::For { init, cond, update, body, .. } => {
            if let Some(c) = cond {
                control_flow::validate_condition(c)?;
            }
            let init_text = match init {
                Some(s) => {
                    let mut buf = Vec::new();
                    generate_stmt(s, gen, &mut buf)?;
                    buf.join(" ").trim_end_matches(';').to_string()
                }
                None => String::new(),
            };
            let cond_text = cond.as_ref().map(|c| expr::generate(c, gen)).unwrap_or_default();
            let update_text = match update {
                Some(s) => {
                    let mut buf = Vec::new();
                    generate_stmt(s, gen, &mut buf)?;
                    buf.join(" ").trim_end_matches(';').to_string()
                }
                None => String::new(),
            };
            out.push(format!("for ({init_text}; {cond_text}; {update_text}) {{"));
            generate_block_into(body, gen, out)?;
            out.push("}".to_string());
        }
        Stmt::Switch { discriminant, cases, default, span } => {
            let enum_name = match gen.symbols.lookup_var_type(discriminant_root(discriminant), gen.current_scope.as_deref()) {
                Some(CnxType::Enum(name)) => Some(name.clone()),
                _ => None,
            };
            out.push(format!("switch ({}) {{", expr::generate(discriminant, gen)));
            for case in cases {
                for label in &case.labels {
                    let text = control_flow::lower_case_label(label, enum_name.as_deref(), &case.span, gen.symbols)?;
                    out.push(format!("case {text}:"));
                }
                generate_block_into(&case.body, gen, out)?;
                out.push("break;".to_string());
            }
            if control_flow::needs_synthesized_default(default) {
                out.push("default: break;".to_string());
            } else if let Some(default_body) = default {
                out.push("default:".to_string());
                generate_block_into(default_body, gen, out)?;
                out.push("break;".to_string());
            }
            let _ = span;
            out.push("}".to_string());
        }
        Stmt::Return { value, .. } => {
            let text = match value {
                None => "return;".to_string(),
                Some(e) => {
                    if let (Some(enum_name), crate::ast::Expr::Identifier { name, span }) =
                        (&gen.current_return_enum, e)
                    {
                        let qualified = control_flow::resolve_return_enum_member(name, enum_name, span, gen.symbols)?;
                        format!("return {qualified};")
                    } else {
                        format!("return {};", expr::generate(e, gen))
                    }
                }
            };
            out.push(text);
        }
        Stmt::Break { .. } => out.push("break;".to_string()),
        Stmt::Critical { body, span } => {
            control_flow::validate_critical_body(body, span)?;
            let mut inner = Vec::new();
            generate_block_into(body, gen, &mut inner)?;
            out.extend(control_flow::wrap_critical(&inner));
        }
    }
    Ok(())
}

/// A best-effort boolean-ness check for `validate_do_while_condition`: no
/// full type inference exists here, so only the syntactic shapes that are
/// unambiguously boolean (a literal, a comparison/logical operator, a `!`)
/// or an identifier with a known symbol-table type are resolved; anything
/// else is assumed boolean rather than risk a false-positive E0701.
fn infer_condition_type(cond: &Expr, gen: &CodeGen) -> CnxType {
    match cond {
        Expr::BoolLiteral { .. } => CnxType::Primitive(Primitive::Bool),
        Expr::Binary { op, .. } if matches!(
            op,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::And | BinaryOp::Or
        ) => CnxType::Primitive(Primitive::Bool),
        Expr::Unary { op: UnaryOp::Not, .. } => CnxType::Primitive(Primitive::Bool),
        Expr::Identifier { name, .. } => gen
            .symbols
            .lookup_var_type(name, gen.current_scope.as_deref())
            .cloned()
            .unwrap_or(CnxType::Primitive(Primitive::Bool)),
        _ => CnxType::Primitive(Primitive::Bool),
    }
}

fn discriminant_root(expr: &crate::ast::Expr) -> &str {
    match expr {
        crate::ast::Expr::Identifier { name, .. } => name,
        crate::ast::Expr::Member { name, .. } => name,
        _ => "",
    }
}

/// Counts `.length` accesses across a condition (and, for `if`, its
/// then-branch per §4.8), declaring cached temporaries for any variable
/// reaching two or more reads.
fn hoist_length_cache(
    cond: &crate::ast::Expr,
    then_branch: Option<&[Stmt]>,
    gen: &mut CodeGen,
    out: &mut Vec<String>,
) {
    let mut counts: HashMap<String, u32> = HashMap::new();
    strings::count_length_accesses(cond, &mut counts);
    if let Some(body) = then_branch {
        for stmt in body {
            count_length_in_stmt(stmt, &mut counts);
        }
    }
    for decl in strings::hoisted_declarations(&counts) {
        out.push(decl);
    }
    for (name, count) in &counts {
        if *count >= 2 {
            gen.length_cache.insert(name.clone(), strings::cache_temp_name(name));
        }
    }
}

fn count_length_in_stmt(stmt: &Stmt, counts: &mut HashMap<String, u32>) {
    match stmt {
        Stmt::Expr(e) => strings::count_length_accesses(e, counts),
        Stmt::Assign(a) => strings::count_length_accesses(&a.value, counts),
        Stmt::VarDecl(v) => {
            if let Some(init) = &v.decl.init {
                strings::count_length_accesses(init, counts);
            }
        }
        _ => {}
    }
}

/// Generates a nested statement block (loop/if/switch/critical body),
/// flushing each statement's hoisted temporaries ahead of it and resetting
/// per-statement state (§4.7/§4.8) between statements. Propagates the first
/// error encountered, just like the top-level `generate_block`.
fn generate_block_into(stmts: &[Stmt], gen: &mut CodeGen, out: &mut Vec<String>) -> Result<(), CodeGenError> {
    for stmt in stmts {
        let mut lines = Vec::new();
        generate_stmt(stmt, gen, &mut lines)?;
        out.append(&mut gen.pending_temps.drain(..).collect());
        out.append(&mut lines);
        gen.reset_statement_state();
    }
    Ok(())
}

/// Generates a top-level function-body statement block.
pub fn generate_block(stmts: &[Stmt], gen: &mut CodeGen) -> Result<Vec<String>, CodeGenError> {
    let mut out = Vec::new();
    generate_block_into(stmts, gen, &mut out)?;
    Ok(out)
}

/// `classify_assignment`'s `base_target` is built from raw source
/// identifiers and carries no scope qualification of its own (§4.4/§4.5 are
/// deliberately `CodeGen`-independent so they can be unit-tested without a
/// generation context). This mirrors `expr::generate_identifier`'s
/// qualification rule against the *first* path segment: a bare access to a
/// member of the scope currently being generated, or an explicit
/// `Scope.member` access, both collapse to `Scope_member` (C) /
/// `Scope::member` (C++); any further dotted tail (a struct field inside
/// that member) is left untouched.
fn requalify_target(base_target: &str, gen: &CodeGen) -> String {
    let (root, rest) = match base_target.split_once('.') {
        Some((r, rest)) => (r, Some(rest)),
        None => (base_target, None),
    };

    if gen.symbols.scopes.contains(root) {
        if let Some(rest) = rest {
            let (member, tail) = match rest.split_once('.') {
                Some((m, t)) => (m, Some(t)),
                None => (rest, None),
            };
            let qualified = if gen.config.cpp { format!("{root}::{member}") } else { format!("{root}_{member}") };
            return match tail {
                Some(t) => format!("{qualified}.{t}"),
                None => qualified,
            };
        }
        return root.to_string();
    }

    if let Some(scope) = gen.current_scope.clone() {
        if gen.symbols.scope_var_types.contains_key(&(scope, root.to_string())) {
            let qualified = gen.qualify(root);
            return match rest {
                Some(rest) => format!("{qualified}.{rest}"),
                None => qualified,
            };
        }
    }

    base_target.to_string()
}

/// `classify_assignment`'s `base_target` only ever carries `.member` dots —
/// `member_chain::analyze` never appends `[index]` text, since most kinds
/// never need it (a bit index is consumed separately, not part of the
/// addressed target). The kinds that *do* address through a subscript
/// (`buf[i]`, `s.arr[i].field`, ...) route through this instead: it
/// re-flattens the original target expression, replicates `fingerprint`'s
/// `global.`/`this.`/`Scope.` root-stripping, then renders every member dot
/// and index bracket in source order via `expr::generate`.
fn full_target_text(target: &Expr, gen: &CodeGen) -> String {
    let (root, mut ops) = member_chain::flatten_postfix(target);
    let root_name = match root {
        Expr::Identifier { name, .. } => name.clone(),
        other => return expr::render_postfix_text(expr::generate(other, gen), &ops, gen),
    };

    let effective_root = if root_name == "global" || root_name == "this" {
        if let Some(PostfixOp::Member(name)) = ops.first().cloned() {
            ops.remove(0);
            name
        } else {
            root_name.clone()
        }
    } else if gen.symbols.scopes.contains(&root_name) {
        if let Some(PostfixOp::Member(name)) = ops.first().cloned() {
            ops.remove(0);
            format!("{root_name}.{name}")
        } else {
            root_name.clone()
        }
    } else {
        root_name.clone()
    };

    let root_text = requalify_target(&effective_root, gen);
    expr::render_postfix_text(root_text, &ops, gen)
}

fn generate_assign(a: &AssignStmt, gen: &mut CodeGen, out: &mut Vec<String>) -> Result<(), CodeGenError> {
    let classified = assignment::classify_assignment(&a.target, a.op, gen.current_scope.as_deref(), gen.symbols);
    let rhs = expr::generate(&a.value, gen);
    let base_target = requalify_target(&classified.base_target, gen);

    match classified.kind {
        AssignmentKind::BitmapFieldSingleBit | AssignmentKind::BitmapFieldMultiBit => {
            if let Some(CnxType::Bitmap(bitmap)) = &classified.base_type {
                let field_name = classified.base_target.rsplit('.').next().unwrap_or("");
                if let Some(field) = gen.symbols.bitmap_field(bitmap, field_name) {
                    out.push(assignment::lower_bitmap_field(&base_target, &field, &rhs));
                    return Ok(());
                }
            }
            out.push(format!("{base_target} = {rhs};"));
        }
        AssignmentKind::IntegerBit | AssignmentKind::ArrayElementBit | AssignmentKind::ThisBit
        | AssignmentKind::ScopedRegisterBit | AssignmentKind::RegisterBit | AssignmentKind::GlobalRegisterBit => {
            let width = classified.base_type.as_ref().and_then(CnxType::bit_width).unwrap_or(32);
            if let Some(idx) = index_text(&a.target, 0, gen) {
                out.push(assignment::lower_integer_bit(&base_target, &idx, width, &rhs));
            } else {
                out.push(format!("{base_target} = {rhs};"));
            }
        }
        AssignmentKind::IntegerBitRange | AssignmentKind::RegisterBitRange | AssignmentKind::ThisBitRange
        | AssignmentKind::ScopedRegisterBitRange | AssignmentKind::StructChainBitRange => {
            if let (Some(lo), Some(hi)) = (index_text(&a.target, 0, gen), index_text(&a.target, 1, gen)) {
                out.push(assignment::lower_integer_bit_range(&base_target, &lo, &hi, &rhs));
            } else {
                out.push(format!("{base_target} = {rhs};"));
            }
        }
        AssignmentKind::ArraySlice => {
            if let (Some(off), Some(len)) = (index_text(&a.target, 0, gen), index_text(&a.target, 1, gen)) {
                out.push(assignment::lower_array_slice(&base_target, &off, &len, &rhs));
            } else {
                out.push(format!("{base_target} = {rhs};"));
            }
        }
        AssignmentKind::AtomicRmw => {
            let op = a.op.binary_op().unwrap_or(crate::ast::BinaryOp::Add);
            let c_type = classified
                .base_type
                .as_ref()
                .and_then(|t| match t {
                    CnxType::Primitive(p) => Some(p.c_type()),
                    _ => None,
                })
                .unwrap_or("uint32_t");
            out.extend(atomics::lower_atomic_rmw(&base_target, c_type, op, &rhs, gen.config.target));
        }
        AssignmentKind::OverflowClamp => {
            let op = a.op.binary_op().unwrap_or(crate::ast::BinaryOp::Add);
            let primitive = match &classified.base_type {
                Some(CnxType::Primitive(p)) => *p,
                _ => Primitive::I32,
            };
            out.push(assignment::lower_overflow_clamp(&base_target, primitive, op, &rhs, gen.config.debug));
        }
        AssignmentKind::StringSimple
        | AssignmentKind::StringThisMember
        | AssignmentKind::StringGlobal
        | AssignmentKind::StringStructField
        | AssignmentKind::StringStructArrayElement
        | AssignmentKind::StringArrayElement => {
            let capacity = match &classified.base_type {
                Some(CnxType::BoundedString { capacity }) => *capacity,
                _ => 63,
            };
            out.extend(assignment::lower_string_copy(&base_target, capacity, &rhs));
        }
        AssignmentKind::StructMemberBitmapField
        | AssignmentKind::RegisterMemberBitmapField
        | AssignmentKind::ScopedRegisterMemberBitmapField
        | AssignmentKind::BitmapArrayElementField => {
            let full_target = full_target_text(&a.target, gen);
            if let Some(field) = &classified.resolved_bitmap_field {
                out.push(assignment::lower_bitmap_field(&full_target, field, &rhs));
            } else {
                out.push(format!("{full_target} = {rhs};"));
            }
        }
        AssignmentKind::ArrayElement
        | AssignmentKind::MultiDimArrayElement
        | AssignmentKind::GlobalArray
        | AssignmentKind::ThisArray
        | AssignmentKind::GlobalMember
        | AssignmentKind::ThisMember
        | AssignmentKind::MemberChain => {
            let full_target = full_target_text(&a.target, gen);
            out.push(format!("{full_target} = {rhs};"));
        }
        _ => {
            out.push(format!("{base_target} = {rhs};"));
        }
    }
    Ok(())
}

/// Renders the `n`th bit-subscript expression on an assignment target, if
/// present — reused by the bit/bit-range lowerings above.
fn index_text(target: &crate::ast::Expr, n: usize, gen: &CodeGen) -> Option<String> {
    let (_, ops) = crate::codegen::member_chain::flatten_postfix(target);
    for op in ops.iter().rev() {
        if let crate::codegen::member_chain::PostfixOp::Index(args) = op {
            return args.get(n).map(|e| expr::generate(e, gen));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::state::CodeGenConfig;
    use crate::parser::parse_source;
    use crate::symbols::collect_symbols;

    fn gen_function_body(src: &str) -> (Vec<String>, crate::symbols::CodeGenSymbols) {
        let prog = parse_source(src, "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        (Vec::new(), symbols)
    }

    #[test]
    fn var_decl_renders_with_initializer() {
        let (_, symbols) = gen_function_body("void f() {}");
        let mut gen = CodeGen::new(&symbols, CodeGenConfig::default());
        let decl = VarDecl {
            name: "x".to_string(),
            ty: TypeRef::Primitive(Primitive::U32),
            modifiers: Default::default(),
            init: Some(crate::ast::Expr::IntLiteral { value: 5, suffix: None, span: crate::diagnostics::SourceSpan::unknown() }),
            visibility: None,
            span: crate::diagnostics::SourceSpan::unknown(),
        };
        let line = format_var_decl(&decl, &gen);
        assert_eq!(line, "uint32_t x = 5;");
        let _ = &mut gen;
    }

    #[test]
    fn integer_bit_assignment_lowers_to_mask_shift() {
        let prog = parse_source("u8 flags <- 0;\nvoid g() { flags[3] <- true; }", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let mut gen = CodeGen::new(&symbols, CodeGenConfig::default());
        let func = prog.decls.iter().find_map(|d| match d {
            crate::ast::Decl::Function(f) if f.name == "g" => Some(f),
            _ => None,
        }).unwrap();
        let out = generate_block(&func.body, &mut gen).unwrap();
        assert!(out.iter().any(|l| l.contains("& ~(1u << (3))")));
    }

    #[test]
    fn plain_array_element_assignment_keeps_its_subscript() {
        let prog = parse_source("u8 buf[16];\nvoid g() { buf[0] <- 1; }", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let mut gen = CodeGen::new(&symbols, CodeGenConfig::default());
        let func = prog.decls.iter().find_map(|d| match d {
            crate::ast::Decl::Function(f) if f.name == "g" => Some(f),
            _ => None,
        }).unwrap();
        let out = generate_block(&func.body, &mut gen).unwrap();
        assert!(out.iter().any(|l| l == "buf[0] = 1;"));
    }

    #[test]
    fn struct_array_element_assignment_keeps_its_subscript() {
        let prog = parse_source(
            "struct S { u8 arr[4]; }\nS s;\nvoid g() { s.arr[1] <- 2; }",
            "t.cnx",
        ).unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let mut gen = CodeGen::new(&symbols, CodeGenConfig::default());
        let func = prog.decls.iter().find_map(|d| match d {
            crate::ast::Decl::Function(f) if f.name == "g" => Some(f),
            _ => None,
        }).unwrap();
        let out = generate_block(&func.body, &mut gen).unwrap();
        assert!(out.iter().any(|l| l == "s.arr[1] = 2;"));
    }

    #[test]
    fn chained_struct_bitmap_field_assignment_lowers_mask_and_keeps_path() {
        let prog = parse_source(
            "bitmap Flags : u8 { enabled @ 0 : 1 }\nstruct S { Flags f; }\nS s;\nvoid g() { s.f.enabled <- true; }",
            "t.cnx",
        ).unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let mut gen = CodeGen::new(&symbols, CodeGenConfig::default());
        let func = prog.decls.iter().find_map(|d| match d {
            crate::ast::Decl::Function(f) if f.name == "g" => Some(f),
            _ => None,
        }).unwrap();
        let out = generate_block(&func.body, &mut gen).unwrap();
        assert!(out.iter().any(|l| l.contains("s.f.enabled") && l.contains("<< 0")));
    }

    #[test]
    fn bitmap_array_element_field_assignment_keeps_subscript_and_lowers_mask() {
        let prog = parse_source(
            "bitmap Flags : u8 { enabled @ 0 : 1 }\nFlags arr[4];\nvoid g() { arr[0].enabled <- true; }",
            "t.cnx",
        ).unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let mut gen = CodeGen::new(&symbols, CodeGenConfig::default());
        let func = prog.decls.iter().find_map(|d| match d {
            crate::ast::Decl::Function(f) if f.name == "g" => Some(f),
            _ => None,
        }).unwrap();
        let out = generate_block(&func.body, &mut gen).unwrap();
        assert!(out.iter().any(|l| l.contains("arr[0].enabled") && l.contains("<< 0")));
    }

    #[test]
    fn switch_without_default_gets_synthesized_default() {
        let prog = parse_source(
            "void g() { switch (1) { case 1: break; } }",
            "t.cnx",
        ).unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let mut gen = CodeGen::new(&symbols, CodeGenConfig::default());
        let func = match &prog.decls[0] {
            crate::ast::Decl::Function(f) => f,
            _ => panic!(),
        };
        let out = generate_block(&func.body, &mut gen).unwrap();
        assert!(out.iter().any(|l| l.trim() == "default: break;"));
    }
}
