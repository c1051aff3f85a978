//! Member-Chain Analyzer (§4.5)
//!
//! Walks a base identifier plus its trailing `.member` / `[..]` postfix
//! chain with a small state machine, tracking the current type as it
//! crosses struct fields and array dimensions. Single canonical
//! implementation (SPEC_FULL.md §B.2) — the teacher's multiple
//! co-existing analyzers are not reproduced.

use crate::ast::Expr;
use crate::symbols::CodeGenSymbols;
use crate::types::CnxType;

#[derive(Debug, Clone)]
pub enum PostfixOp {
    Member(String),
    Index(Vec<Expr>),
}

/// Splits `base.a[i].b` into its root identifier expression and the
/// ordered postfix op chain.
pub fn flatten_postfix(expr: &Expr) -> (&Expr, Vec<PostfixOp>) {
    let mut ops = Vec::new();
    let mut cur = expr;
    loop {
        match cur {
            Expr::Member { base, name, .. } => {
                ops.push(PostfixOp::Member(name.clone()));
                cur = base;
            }
            Expr::Index { base, args, .. } => {
                ops.push(PostfixOp::Index(args.clone()));
                cur = base;
            }
            _ => break,
        }
    }
    ops.reverse();
    (cur, ops)
}

#[derive(Debug, Clone, Default)]
struct ChainState {
    current_type: Option<CnxType>,
    current_struct_type: Option<String>,
    is_current_array: bool,
    array_dims_remaining: usize,
}

/// Result handed to the assignment classifier / expression generator when
/// the chain's last op is a subscript on a (by then) non-array integer.
#[derive(Debug, Clone)]
pub struct ChainResult {
    pub is_bit_access: bool,
    pub base_target: String,
    pub bit_args: Vec<Expr>,
    pub base_type: Option<CnxType>,
    pub is_register_access: bool,
    pub is_array: bool,
    pub is_string: bool,
}

/// Walks `root` (an identifier, register member, or scope-qualified access)
/// plus its postfix chain, returning the classified target description.
pub fn analyze(
    root_name: &str,
    root_type: Option<CnxType>,
    ops: &[PostfixOp],
    symbols: &CodeGenSymbols,
) -> ChainResult {
    let is_register_access = symbols.registers.contains_key(root_name);
    let mut state = ChainState {
        current_struct_type: match &root_type {
            Some(CnxType::Struct(n)) => Some(n.clone()),
            _ => None,
        },
        is_current_array: matches!(root_type, Some(CnxType::Array { .. })),
        array_dims_remaining: match &root_type {
            Some(CnxType::Array { dims, .. }) => dims.len(),
            _ => 0,
        },
        current_type: root_type,
    };

    let mut base_target = root_name.to_string();
    let mut last_index_args: Vec<Expr> = Vec::new();
    let mut last_subscript_was_array = false;
    let mut last_subscript_was_string = false;
    let mut saw_trailing_subscript = false;

    for (i, op) in ops.iter().enumerate() {
        let is_last = i == ops.len() - 1;
        match op {
            PostfixOp::Member(name) => {
                base_target.push('.');
                base_target.push_str(name);
                saw_trailing_subscript = false;
                let field_type = struct_field_type(&state.current_struct_type, name, symbols);
                state.is_current_array = matches!(field_type, Some(CnxType::Array { .. }));
                state.array_dims_remaining = match &field_type {
                    Some(CnxType::Array { dims, .. }) => dims.len(),
                    _ => 0,
                };
                state.current_struct_type = match &field_type {
                    Some(CnxType::Struct(n)) => Some(n.clone()),
                    _ => None,
                };
                state.current_type = field_type;
            }
            PostfixOp::Index(args) => {
                saw_trailing_subscript = true;
                last_index_args = args.clone();
                // Classify against the type as it stood *before* this
                // subscript is applied — the subscript classifier's
                // `is_array` answers "was the thing just indexed an array".
                last_subscript_was_array = state.is_current_array;
                last_subscript_was_string = matches!(
                    state.current_type,
                    Some(CnxType::BoundedString { .. }) | Some(CnxType::UnboundedString)
                );
                if state.array_dims_remaining > 0 {
                    state.array_dims_remaining -= 1;
                    if state.array_dims_remaining == 0 {
                        state.is_current_array = false;
                    }
                } else {
                    state.is_current_array = false;
                }
                if !is_last && !state.is_current_array {
                    // An array-of-struct now fully indexed: descend into
                    // the element type for the next member access.
                    if let Some(CnxType::Array { element, .. }) = &state.current_type {
                        state.current_type = Some((**element).clone());
                        state.current_struct_type = match state.current_type.as_ref() {
                            Some(CnxType::Struct(n)) => Some(n.clone()),
                            _ => None,
                        };
                    }
                }
            }
        }
    }

    let subscript_kind = crate::codegen::subscript::classify(crate::codegen::subscript::SubscriptInput {
        type_known: state.current_type.is_some() || is_register_access,
        is_array: last_subscript_was_array,
        is_string: last_subscript_was_string,
        is_parameter: false,
        is_register_access,
        subscript_count: last_index_args.len(),
    });
    let is_bit_access = saw_trailing_subscript
        && matches!(
            subscript_kind,
            crate::codegen::subscript::SubscriptKind::BitSingle
                | crate::codegen::subscript::SubscriptKind::BitRange
        );

    ChainResult {
        is_bit_access,
        base_target,
        bit_args: last_index_args,
        base_type: state.current_type,
        is_register_access,
        is_array: last_subscript_was_array,
        is_string: last_subscript_was_string,
    }
}

fn struct_field_type(
    struct_name: &Option<String>,
    field: &str,
    symbols: &CodeGenSymbols,
) -> Option<CnxType> {
    let struct_name = struct_name.as_ref()?;
    let fields = symbols.structs.get(struct_name)?;
    fields.iter().find(|(n, _)| n == field).map(|(_, info)| info.ty.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::symbols::collect_symbols;

    #[test]
    fn flattens_nested_member_and_index() {
        let prog = parse_source(
            "struct Inner { u8 flags; }\nstruct Outer { Inner child; }\nvoid f() { Outer o; o.child.flags[0] <- true; }",
            "t.cnx",
        )
        .unwrap();
        let func = match &prog.decls[2] {
            crate::ast::Decl::Function(f) => f,
            _ => panic!("expected function"),
        };
        let assign = match &func.body[1] {
            crate::ast::Stmt::Assign(a) => a,
            _ => panic!("expected assignment"),
        };
        let (root, ops) = flatten_postfix(&assign.target);
        assert!(matches!(root, Expr::Identifier { name, .. } if name == "o"));
        assert_eq!(ops.len(), 3);
    }

    #[test]
    fn bit_access_on_plain_integer_subscript() {
        let prog = parse_source("u8 flags <- 0;", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let index_expr = Expr::IntLiteral { value: 3, suffix: None, span: crate::diagnostics::SourceSpan::unknown() };
        let ops = vec![PostfixOp::Index(vec![index_expr])];
        let root_type = symbols.lookup_var_type("flags", None).cloned();
        let result = analyze("flags", root_type, &ops, &symbols);
        assert!(result.is_bit_access);
    }

    #[test]
    fn array_indexing_is_not_bit_access() {
        let prog = parse_source("u8 buf[16];", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let index_expr = Expr::IntLiteral { value: 0, suffix: None, span: crate::diagnostics::SourceSpan::unknown() };
        let ops = vec![PostfixOp::Index(vec![index_expr])];
        let root_type = symbols.lookup_var_type("buf", None).cloned();
        let result = analyze("buf", root_type, &ops, &symbols);
        assert!(!result.is_bit_access);
        assert!(result.is_array);
    }
}
