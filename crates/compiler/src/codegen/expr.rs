//! Expression code generation (non-assignment reads)
//!
//! Literal/operator emission is a straightforward recursive descent;
//! member/subscript chains reuse the §4.5/§4.6 analyzer and classifier so a
//! read of `reg.MEMBER[3]` agrees with the write side in `assignment.rs`.

use crate::ast::{BinaryOp, Expr, TemplatePart, UnaryOp};
use crate::codegen::member_chain::{self, PostfixOp};
use crate::codegen::state::CodeGen;
use crate::codegen::strings::cache_temp_name;
use crate::codegen::subscript::{self, SubscriptInput, SubscriptKind};
use crate::types::CnxType;

fn binop_str(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Or => "||",
        BinaryOp::And => "&&",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
        BinaryOp::BitAnd => "&",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
    }
}

fn unop_str(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::Not => "!",
        UnaryOp::BitNot => "~",
    }
}

/// Qualifies a bare identifier read against `this.`/scope membership; plain
/// locals and parameters pass through unchanged.
fn generate_identifier(name: &str, gen: &CodeGen) -> String {
    if name == "this" || name == "global" {
        return name.to_string();
    }
    if let Some(scope) = &gen.current_scope {
        if gen.symbols.scope_var_types.contains_key(&(scope.clone(), name.to_string())) {
            return gen.qualify(name);
        }
    }
    name.to_string()
}

/// Generates a `.member`/`[index]` chain read, routing a trailing
/// `.length` through the strlen cache and bit-range reads through a
/// mask/shift extraction.
fn generate_chain(expr: &Expr, gen: &CodeGen) -> String {
    let (root, ops) = member_chain::flatten_postfix(expr);
    let root_name = match root {
        Expr::Identifier { name, .. } => name.clone(),
        // A chain rooted in something other than a plain identifier (e.g.
        // a call result) carries no symbol-table type info to classify
        // against — render the root, then the ops, as plain postfix text.
        other => return render_postfix_text(generate(other, gen), &ops, gen),
    };

    if let Some((base, PostfixOp::Member(name))) = ops.split_last().map(|(l, r)| (r, l.clone())) {
        if name == "length" && base.is_empty() {
            if let Some(cached) = gen.length_cache.get(&root_name) {
                return cached.clone();
            }
            return format!("strlen({})", generate_identifier(&root_name, gen));
        }
    }

    let effective_root = generate_identifier(&root_name, gen);
    let root_type = if root_name == "this" {
        None
    } else {
        gen.symbols.lookup_var_type(&root_name, gen.current_scope.as_deref()).cloned()
    };
    let chain = member_chain::analyze(&root_name, root_type, &ops, gen.symbols);

    if chain.is_bit_access {
        if let Some(CnxType::Bitmap(bitmap)) = &chain.base_type {
            if let Some(field) = gen.symbols.bitmap_field(bitmap, chain.base_target.rsplit('.').next().unwrap_or("")) {
                let mask = field.mask();
                return format!("(({} >> {}) & {}u)", chain.base_target, field.offset, mask);
            }
        }
        if let Some(idx) = chain.bit_args.first() {
            let idx_text = generate(idx, gen);
            return format!("(({} >> ({})) & 1u)", chain.base_target, idx_text);
        }
    }

    // Fall back to a literal dotted/bracketed rendering of the chain.
    render_postfix_text(effective_root, &ops, gen)
}

pub(crate) fn render_postfix_text(root_text: String, ops: &[PostfixOp], gen: &CodeGen) -> String {
    let mut text = root_text;
    for op in ops {
        match op {
            PostfixOp::Member(name) => {
                text.push('.');
                text.push_str(name);
            }
            PostfixOp::Index(args) => {
                let rendered: Vec<String> = args.iter().map(|a| generate(a, gen)).collect();
                text.push('[');
                text.push_str(&rendered.join(", "));
                text.push(']');
            }
        }
    }
    text
}

/// Generates C source text for any expression.
pub fn generate(expr: &Expr, gen: &CodeGen) -> String {
    match expr {
        Expr::IntLiteral { value, .. } => value.to_string(),
        Expr::FloatLiteral { value, .. } => format!("{value}"),
        Expr::BoolLiteral { value, .. } => if *value { "true".to_string() } else { "false".to_string() },
        Expr::CharLiteral { value, .. } => format!("'{value}'"),
        Expr::StringLiteral { value, .. } => format!("\"{value}\""),
        Expr::TemplateString { parts, .. } => generate_template(parts, gen),
        Expr::Identifier { name, .. } => generate_identifier(name, gen),
        Expr::Member { .. } | Expr::Index { .. } => generate_chain(expr, gen),
        Expr::Call { callee, args, .. } => {
            let callee_text = generate(callee, gen);
            let arg_text: Vec<String> = args.iter().map(|a| generate(a, gen)).collect();
            format!("{callee_text}({})", arg_text.join(", "))
        }
        Expr::Unary { op, expr, .. } => format!("({}{})", unop_str(*op), generate(expr, gen)),
        Expr::Binary { op, lhs, rhs, .. } => {
            format!("({} {} {})", generate(lhs, gen), binop_str(*op), generate(rhs, gen))
        }
        Expr::Ternary { cond, then_expr, else_expr, .. } => {
            format!("({} ? {} : {})", generate(cond, gen), generate(then_expr, gen), generate(else_expr, gen))
        }
    }
}

/// Renders a template string's literal/expression parts into the
/// `snprintf`-style format string and argument list its statement-level
/// lowering needs; `statements.rs` is responsible for actually hoisting a
/// buffer and emitting the `snprintf` call (§4.1, "lowers to string
/// concatenation").
pub fn generate_template_parts(parts: &[TemplatePart], gen: &CodeGen) -> (String, Vec<String>) {
    let mut format_str = String::new();
    let mut args = Vec::new();
    for part in parts {
        match part {
            TemplatePart::Literal(s) => format_str.push_str(&s.replace('%', "%%")),
            TemplatePart::Expr(e) => {
                format_str.push_str("%s");
                args.push(generate(e, gen));
            }
        }
    }
    (format_str, args)
}

fn generate_template(parts: &[TemplatePart], gen: &CodeGen) -> String {
    let (format_str, args) = generate_template_parts(parts, gen);
    if args.is_empty() {
        return format!("\"{format_str}\"");
    }
    format!("/* template */ \"{format_str}\", {}", args.join(", "))
}

/// Classifies a subscript read the same way the assignment classifier does,
/// for callers that need the kind without the full chain machinery (e.g.
/// deciding whether to route a read through `memcpy` for a slice).
pub fn classify_read_subscript(is_array: bool, is_string: bool, is_register_access: bool, subscript_count: usize) -> SubscriptKind {
    subscript::classify(SubscriptInput {
        type_known: true,
        is_array,
        is_string,
        is_parameter: false,
        is_register_access,
        subscript_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::state::{CodeGen, CodeGenConfig};
    use crate::diagnostics::SourceSpan;
    use crate::parser::parse_source;
    use crate::symbols::collect_symbols;

    fn span() -> SourceSpan {
        SourceSpan::unknown()
    }

    #[test]
    fn generates_binary_expression() {
        let prog = parse_source("void f() {}", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let gen = CodeGen::new(&symbols, CodeGenConfig::default());
        let expr = Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(Expr::IntLiteral { value: 1, suffix: None, span: span() }),
            rhs: Box::new(Expr::IntLiteral { value: 2, suffix: None, span: span() }),
            span: span(),
        };
        assert_eq!(generate(&expr, &gen), "(1 + 2)");
    }

    #[test]
    fn qualifies_scope_variable_read() {
        let prog = parse_source("scope Motor { private u8 speed <- 0; }", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let mut gen = CodeGen::new(&symbols, CodeGenConfig::default());
        gen.current_scope = Some("Motor".to_string());
        assert_eq!(generate_identifier("speed", &gen), "Motor_speed");
    }

    #[test]
    fn bit_read_extracts_with_mask_and_shift() {
        let prog = parse_source("u8 flags <- 0;\nvoid f() {}", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let gen = CodeGen::new(&symbols, CodeGenConfig::default());
        let expr = Expr::Index {
            base: Box::new(Expr::Identifier { name: "flags".into(), span: span() }),
            args: vec![Expr::IntLiteral { value: 2, suffix: None, span: span() }],
            span: span(),
        };
        let text = generate(&expr, &gen);
        assert!(text.contains(">> (2)"));
        assert!(text.contains("& 1u"));
    }

    #[test]
    fn length_access_uses_cache_when_present() {
        let prog = parse_source("void f() {}", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let mut gen = CodeGen::new(&symbols, CodeGenConfig::default());
        gen.length_cache.insert("s".to_string(), cache_temp_name("s"));
        let expr = Expr::Member { base: Box::new(Expr::Identifier { name: "s".into(), span: span() }), name: "length".into(), span: span() };
        assert_eq!(generate(&expr, &gen), "__cnx_len_s");
    }
}
