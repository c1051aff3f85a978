//! Symbol Collector
//!
//! One AST walk per `.cnx` file, producing an immutable `CodeGenSymbols`
//! snapshot (§4.2). The code generator reads this instead of touching the
//! AST's named-type references, and never mutates it once collection for a
//! file set completes (§3 Lifecycles).

use crate::ast::{Decl, Expr, Program, ScopeMember, Stmt};
use crate::error::SymbolError;
use crate::types::{check_bitfields_non_overlapping, ArrayDim, BitField, CnxType, Primitive, Visibility};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub ty: CnxType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterMemberInfo {
    pub offset: ArrayDim,
    pub c_type: CnxType,
    pub bitmap_type: Option<String>,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterInfo {
    pub base_address: ArrayDim,
    pub members: HashMap<String, RegisterMemberInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitmapInfo {
    pub backing: Primitive,
    pub fields: HashMap<String, BitField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallbackInfo {
    pub params: Vec<CnxType>,
    pub return_type: CnxType,
}

/// Read-only snapshot produced by symbol collection; consumed by code and
/// header generation (§4.2, §9 "pure maps produced during stage A").
#[derive(Debug, Default, Clone)]
pub struct CodeGenSymbols {
    pub scopes: HashSet<String>,
    pub structs: HashMap<String, Vec<(String, FieldInfo)>>,
    /// Enum member values, in declaration order (emission sorts by value).
    pub enums: HashMap<String, Vec<(String, i64)>>,
    pub bitmaps: HashMap<String, BitmapInfo>,
    pub registers: HashMap<String, RegisterInfo>,
    pub callbacks: HashMap<String, CallbackInfo>,
    /// `(scope, member) -> visibility`.
    pub scope_visibility: HashMap<(String, String), Visibility>,
    /// `scope -> functions (qualified `Scope.fn` or free function name) that reference it`.
    pub scope_usage: HashMap<String, HashSet<String>>,
    /// `(scope, const name) -> value`, for inlining private consts.
    pub private_const_values: HashMap<(String, String), i64>,
    pub function_return_types: HashMap<String, CnxType>,
    pub opaque_types: HashSet<String>,
    /// Top-level global variable types, keyed by name. Not explicitly named
    /// by §4.2 but required for the member-chain analyzer to resolve a
    /// chain's root type; populated the same pass as everything else.
    pub global_vars: HashMap<String, CnxType>,
    /// `(scope, var name) -> type`, the scope-member analogue of `global_vars`.
    pub scope_var_types: HashMap<(String, String), CnxType>,
}

impl CodeGenSymbols {
    /// Folds another file's collection pass into this one. The project
    /// namespace is flat (struct/enum/scope/... names are unique across a
    /// file set per §3 Ownership), so every map merges by plain `extend`;
    /// the orchestrator calls this once per file in dependency order to
    /// build the aggregated table §2 item 5 hands to code generation.
    pub fn merge(&mut self, other: CodeGenSymbols) {
        self.scopes.extend(other.scopes);
        self.structs.extend(other.structs);
        self.enums.extend(other.enums);
        self.bitmaps.extend(other.bitmaps);
        self.registers.extend(other.registers);
        self.callbacks.extend(other.callbacks);
        self.scope_visibility.extend(other.scope_visibility);
        for (scope, funcs) in other.scope_usage {
            self.scope_usage.entry(scope).or_default().extend(funcs);
        }
        self.private_const_values.extend(other.private_const_values);
        self.function_return_types.extend(other.function_return_types);
        self.opaque_types.extend(other.opaque_types);
        self.global_vars.extend(other.global_vars);
        self.scope_var_types.extend(other.scope_var_types);
    }

    pub fn has_public_symbols(&self) -> bool {
        self.scope_visibility
            .iter()
            .any(|(_, v)| *v == Visibility::Public)
            || !self.structs.is_empty()
            || !self.enums.is_empty()
            || !self.bitmaps.is_empty()
            || !self.registers.is_empty()
            || !self.callbacks.is_empty()
    }

    /// Resolves a bare identifier's type: current-scope member first, then
    /// file-global. Used by the member-chain analyzer to seed a chain walk.
    pub fn lookup_var_type(&self, name: &str, scope: Option<&str>) -> Option<&CnxType> {
        if let Some(scope) = scope {
            if let Some(ty) = self.scope_var_types.get(&(scope.to_string(), name.to_string())) {
                return Some(ty);
            }
        }
        self.global_vars.get(name)
    }

    pub fn is_bitmap(&self, name: &str) -> bool {
        self.bitmaps.contains_key(name)
    }

    pub fn is_enum(&self, name: &str) -> bool {
        self.enums.contains_key(name)
    }

    pub fn enum_value(&self, enum_name: &str, member: &str) -> Option<i64> {
        self.enums
            .get(enum_name)?
            .iter()
            .find(|(m, _)| m == member)
            .map(|(_, v)| *v)
    }

    /// Searches every enum for a member with this name; used to build the
    /// "did you mean `Enum.X`?" hint for unqualified members (§3, E0424).
    pub fn find_enum_owning_member(&self, member: &str) -> Option<&str> {
        self.enums
            .iter()
            .find(|(_, members)| members.iter().any(|(m, _)| m == member))
            .map(|(name, _)| name.as_str())
    }

    pub fn bitmap_field(&self, bitmap: &str, field: &str) -> Option<BitField> {
        self.bitmaps.get(bitmap)?.fields.get(field).copied()
    }

    pub fn register_member(&self, reg: &str, member: &str) -> Option<&RegisterMemberInfo> {
        self.registers.get(reg)?.members.get(member)
    }
}

fn resolve_type_ref(ty: &crate::ast::TypeRef, symbols: &CodeGenSymbols) -> CnxType {
    use crate::ast::TypeRef;
    match ty {
        TypeRef::Primitive(p) => CnxType::Primitive(*p),
        TypeRef::BoundedString(n) => CnxType::BoundedString { capacity: *n },
        TypeRef::UnboundedString => CnxType::UnboundedString,
        TypeRef::Array { element, dims } => CnxType::Array {
            element: Box::new(resolve_type_ref(element, symbols)),
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

/// Walks a program's declarations and builds the symbol snapshot. Runs in
/// two internal passes (names first, then type resolution) so forward
/// references within a single file resolve correctly; callers still see
/// one combined collection step per file, matching the §4.2 contract.
pub fn collect_symbols(program: &Program) -> Result<CodeGenSymbols, Vec<SymbolError>> {
    let mut symbols = CodeGenSymbols::default();
    let mut errors = Vec::new();

    // Pass 1: register every named type so forward references resolve.
    for decl in &program.decls {
        match decl {
            Decl::Struct(s) => {
                symbols.structs.insert(s.name.clone(), Vec::new());
            }
            Decl::Enum(e) => {
                symbols.enums.insert(e.name.clone(), Vec::new());
            }
            Decl::Bitmap(b) => {
                symbols.bitmaps.insert(
                    b.name.clone(),
                    BitmapInfo { backing: b.backing, fields: HashMap::new() },
                );
            }
            Decl::Callback(_) => {}
            Decl::Register(r) => {
                symbols.registers.insert(
                    r.name.clone(),
                    RegisterInfo { base_address: r.base_address.clone(), members: HashMap::new() },
                );
            }
            Decl::Scope(s) => {
                symbols.scopes.insert(s.name.clone());
            }
            Decl::GlobalVar(_) | Decl::Function(_) => {}
        }
    }

    // Pass 2: fill in bodies now that all names are known.
    for decl in &program.decls {
        match decl {
            Decl::Struct(s) => {
                let fields = s
                    .fields
                    .iter()
                    .map(|f| (f.name.clone(), FieldInfo { ty: resolve_type_ref(&f.ty, &symbols) }))
                    .collect();
                symbols.structs.insert(s.name.clone(), fields);
            }
            Decl::Enum(e) => {
                let mut seen: HashMap<i64, &str> = HashMap::new();
                let mut members = Vec::new();
                for m in &e.members {
                    if let Some(first) = seen.get(&m.value) {
                        errors.push(SymbolError::DuplicateEnumValue {
                            enum_name: e.name.clone(),
                            first: first.to_string(),
                            second: m.name.clone(),
                            value: m.value,
                        });
                    } else {
                        seen.insert(m.value, &m.name);
                    }
                    members.push((m.name.clone(), m.value));
                }
                symbols.enums.insert(e.name.clone(), members);
            }
            Decl::Bitmap(b) => {
                let field_list: Vec<(String, BitField)> = b
                    .fields
                    .iter()
                    .map(|f| (f.name.clone(), BitField { offset: f.offset, width: f.width }))
                    .collect();
                if let Err(reason) =
                    check_bitfields_non_overlapping(&field_list, b.backing.bit_width())
                {
                    errors.push(SymbolError::OverlappingBitmapFields {
                        bitmap: b.name.clone(),
                        reason,
                    });
                }
                let fields = field_list.into_iter().collect();
                symbols.bitmaps.insert(b.name.clone(), BitmapInfo { backing: b.backing, fields });
            }
            Decl::Callback(c) => {
                let params = c.params.iter().map(|p| resolve_type_ref(&p.ty, &symbols)).collect();
                let return_type = resolve_type_ref(&c.return_type, &symbols);
                symbols.callbacks.insert(c.name.clone(), CallbackInfo { params, return_type });
            }
            Decl::Register(r) => {
                let mut members = HashMap::new();
                for m in &r.members {
                    if let Some(bitmap_name) = &m.bitmap_type {
                        if !symbols.bitmaps.contains_key(bitmap_name) {
                            errors.push(SymbolError::UnknownBitmapBackingType {
                                bitmap: bitmap_name.clone(),
                                ty: "register member overlay".to_string(),
                            });
                        }
                    }
                    members.insert(
                        m.name.clone(),
                        RegisterMemberInfo {
                            offset: m.offset.clone(),
                            c_type: resolve_type_ref(&m.c_type, &symbols),
                            bitmap_type: m.bitmap_type.clone(),
                            visibility: m.visibility,
                        },
                    );
                }
                symbols.registers.insert(
                    r.name.clone(),
                    RegisterInfo { base_address: r.base_address.clone(), members },
                );
            }
            Decl::Function(f) => {
                symbols
                    .function_return_types
                    .insert(f.name.clone(), resolve_type_ref(&f.return_type, &symbols));
                walk_stmts_for_scope_usage(&f.body, &f.name, &mut symbols.scope_usage);
            }
            Decl::Scope(s) => {
                for member in &s.members {
                    symbols
                        .scope_visibility
                        .insert((s.name.clone(), member.name().to_string()), member.visibility());
                    if let ScopeMember::Var(v) = member {
                        let var_ty = resolve_type_ref(&v.ty, &symbols);
                        symbols.scope_var_types.insert((s.name.clone(), v.name.clone()), var_ty);
                        if member.visibility() == Visibility::Private {
                            if let Some(Expr::IntLiteral { value, .. }) = &v.init {
                                if v.modifiers.is_const {
                                    symbols
                                        .private_const_values
                                        .insert((s.name.clone(), v.name.clone()), *value);
                                }
                            }
                        }
                    }
                    if let ScopeMember::Function(f) = member {
                        let qualified = format!("{}.{}", s.name, f.name);
                        symbols
                            .function_return_types
                            .insert(qualified.clone(), resolve_type_ref(&f.return_type, &symbols));
                        walk_stmts_for_scope_usage(&f.body, &qualified, &mut symbols.scope_usage);
                    }
                    if let ScopeMember::Register(r) = member {
                        let qualified = format!("{}.{}", s.name, r.name);
                        let mut members = HashMap::new();
                        for m in &r.members {
                            if let Some(bitmap_name) = &m.bitmap_type {
                                if !symbols.bitmaps.contains_key(bitmap_name) {
                                    errors.push(SymbolError::UnknownBitmapBackingType {
                                        bitmap: bitmap_name.clone(),
                                        ty: "register member overlay".to_string(),
                                    });
                                }
                            }
                            members.insert(
                                m.name.clone(),
                                RegisterMemberInfo {
                                    offset: m.offset.clone(),
                                    c_type: resolve_type_ref(&m.c_type, &symbols),
                                    bitmap_type: m.bitmap_type.clone(),
                                    visibility: m.visibility,
                                },
                            );
                        }
                        symbols.registers.insert(
                            qualified,
                            RegisterInfo { base_address: r.base_address.clone(), members },
                        );
                    }
                }
            }
            Decl::GlobalVar(v) => {
                let ty = resolve_type_ref(&v.ty, &symbols);
                symbols.global_vars.insert(v.name.clone(), ty);
            }
        }
    }

    if errors.is_empty() {
        Ok(symbols)
    } else {
        Err(errors)
    }
}

/// Records, per scope, the set of functions whose body references a member
/// of that scope (`Scope.x` or, from inside the scope, a bare member name).
fn walk_stmts_for_scope_usage(
    stmts: &[Stmt],
    function_name: &str,
    usage: &mut HashMap<String, HashSet<String>>,
) {
    for stmt in stmts {
        walk_stmt_for_scope_usage(stmt, function_name, usage);
    }
}

fn walk_stmt_for_scope_usage(
    stmt: &Stmt,
    function_name: &str,
    usage: &mut HashMap<String, HashSet<String>>,
) {
    match stmt {
        Stmt::VarDecl(v) => {
            if let Some(e) = &v.decl.init {
                walk_expr_for_scope_usage(e, function_name, usage);
            }
        }
        Stmt::Assign(a) => {
            walk_expr_for_scope_usage(&a.target, function_name, usage);
            walk_expr_for_scope_usage(&a.value, function_name, usage);
        }
        Stmt::Expr(e) => walk_expr_for_scope_usage(e, function_name, usage),
        Stmt::If { cond, then_branch, else_branch, .. } => {
            walk_expr_for_scope_usage(cond, function_name, usage);
            walk_stmts_for_scope_usage(then_branch, function_name, usage);
            if let Some(e) = else_branch {
                walk_stmts_for_scope_usage(e, function_name, usage);
            }
        }
        Stmt::While { cond, body, .. } => {
            walk_expr_for_scope_usage(cond, function_name, usage);
            walk_stmts_for_scope_usage(body, function_name, usage);
        }
        Stmt::DoWhile { body, cond, .. } => {
            walk_stmts_for_scope_usage(body, function_name, usage);
            walk_expr_for_scope_usage(cond, function_name, usage);
        }
        Stmt::For { init, cond, update, body, .. } => {
            if let Some(s) = init {
                walk_stmt_for_scope_usage(s, function_name, usage);
            }
            if let Some(c) = cond {
                walk_expr_for_scope_usage(c, function_name, usage);
            }
            if let Some(s) = update {
                walk_stmt_for_scope_usage(s, function_name, usage);
            }
            walk_stmts_for_scope_usage(body, function_name, usage);
        }
        Stmt::Switch { discriminant, cases, default, .. } => {
            walk_expr_for_scope_usage(discriminant, function_name, usage);
            for case in cases {
                walk_stmts_for_scope_usage(&case.body, function_name, usage);
            }
            if let Some(d) = default {
                walk_stmts_for_scope_usage(d, function_name, usage);
            }
        }
        Stmt::Return { value, .. } => {
            if let Some(e) = value {
                walk_expr_for_scope_usage(e, function_name, usage);
            }
        }
        Stmt::Break { .. } => {}
        Stmt::Critical { body, .. } => walk_stmts_for_scope_usage(body, function_name, usage),
    }
}

fn walk_expr_for_scope_usage(
    expr: &Expr,
    function_name: &str,
    usage: &mut HashMap<String, HashSet<String>>,
) {
    if let Expr::Member { base, .. } = expr {
        if let Expr::Identifier { name, .. } = base.as_ref() {
            usage.entry(name.clone()).or_default().insert(function_name.to_string());
        }
        walk_expr_for_scope_usage(base, function_name, usage);
    }
    match expr {
        Expr::Index { base, args, .. } => {
            walk_expr_for_scope_usage(base, function_name, usage);
            for a in args {
                walk_expr_for_scope_usage(a, function_name, usage);
            }
        }
        Expr::Call { callee, args, .. } => {
            walk_expr_for_scope_usage(callee, function_name, usage);
            for a in args {
                walk_expr_for_scope_usage(a, function_name, usage);
            }
        }
        Expr::Unary { expr, .. } => walk_expr_for_scope_usage(expr, function_name, usage),
        Expr::Binary { lhs, rhs, .. } => {
            walk_expr_for_scope_usage(lhs, function_name, usage);
            walk_expr_for_scope_usage(rhs, function_name, usage);
        }
        Expr::Ternary { cond, then_expr, else_expr, .. } => {
            walk_expr_for_scope_usage(cond, function_name, usage);
            walk_expr_for_scope_usage(then_expr, function_name, usage);
            walk_expr_for_scope_usage(else_expr, function_name, usage);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    #[test]
    fn collects_struct_fields() {
        let prog = parse_source("struct Point { i32 x; i32 y; }", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let fields = symbols.structs.get("Point").unwrap();
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn merge_folds_in_another_files_symbols() {
        let a = parse_source("struct Point { i32 x; i32 y; }", "a.cnx").unwrap();
        let b = parse_source("enum Mode { ON, OFF }", "b.cnx").unwrap();
        let mut merged = collect_symbols(&a).unwrap();
        merged.merge(collect_symbols(&b).unwrap());
        assert!(merged.structs.contains_key("Point"));
        assert!(merged.enums.contains_key("Mode"));
    }

    #[test]
    fn rejects_duplicate_enum_values() {
        let prog = parse_source("enum E { A = 1, B = 1 }", "t.cnx").unwrap();
        let err = collect_symbols(&prog).unwrap_err();
        assert!(matches!(err[0], SymbolError::DuplicateEnumValue { .. }));
    }

    #[test]
    fn rejects_overlapping_bitmap_fields() {
        let prog = parse_source("bitmap B : u8 { a @ 0 : 4, b @ 2 : 4 }", "t.cnx").unwrap();
        let err = collect_symbols(&prog).unwrap_err();
        assert!(matches!(err[0], SymbolError::OverlappingBitmapFields { .. }));
    }

    #[test]
    fn records_global_and_scope_var_types() {
        let prog = parse_source(
            "u32 counter <- 0;\nscope Counter { private u32 value <- 0; }",
            "t.cnx",
        )
        .unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        assert_eq!(symbols.lookup_var_type("counter", None), Some(&CnxType::Primitive(Primitive::U32)));
        assert_eq!(
            symbols.lookup_var_type("value", Some("Counter")),
            Some(&CnxType::Primitive(Primitive::U32))
        );
    }

    #[test]
    fn finds_enum_owning_unqualified_member() {
        let prog = parse_source("enum EMode { OFF = 0, ON = 1 }", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        assert_eq!(symbols.find_enum_owning_member("ON"), Some("EMode"));
    }

    #[test]
    fn records_scope_member_visibility() {
        let prog = parse_source(
            "scope Counter { private u32 value <- 0; public u32 get() { return value; } }",
            "t.cnx",
        )
        .unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        assert_eq!(
            symbols.scope_visibility.get(&("Counter".to_string(), "value".to_string())),
            Some(&Visibility::Private)
        );
    }

    #[test]
    fn records_scope_variable_usage() {
        let prog = parse_source(
            "scope Counter { private u32 value <- 0; public void bump() { value <- 1; } }",
            "t.cnx",
        )
        .unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let used_by = symbols.scope_usage.get("value").cloned().unwrap_or_default();
        assert!(used_by.contains("Counter.bump"));
    }

    #[test]
    fn resolves_register_member_bitmap_overlay() {
        let prog = parse_source(
            "bitmap ModeBits : u32 { enabled @ 0 : 1 }\nregister GPIOA @ 0x1000 { public MODER @ 0 : u32 as ModeBits; }",
            "t.cnx",
        )
        .unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let member = symbols.register_member("GPIOA", "MODER").unwrap();
        assert_eq!(member.bitmap_type.as_deref(), Some("ModeBits"));
    }
}
