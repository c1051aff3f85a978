//! String-length caching (§4.8)
//!
//! Before emitting a condition (and, for `if`, its then-branch), count
//! `.length` occurrences per string variable. Any variable reaching two or
//! more reads gets a `size_t __cnx_len_<name> = strlen(<name>);` temporary
//! hoisted before the statement; subsequent `.length` reads within that
//! statement's lifetime route to the cached name instead.

use crate::ast::{Expr, TemplatePart};
use std::collections::HashMap;

/// Counts `<ident>.length` occurrences reachable from `expr`, keyed by the
/// base identifier name.
pub fn count_length_accesses(expr: &Expr, counts: &mut HashMap<String, u32>) {
    if let Expr::Member { base, name, .. } = expr {
        if name == "length" {
            if let Expr::Identifier { name: var, .. } = base.as_ref() {
                *counts.entry(var.clone()).or_insert(0) += 1;
            }
        }
        count_length_accesses(base, counts);
        return;
    }
    match expr {
        Expr::Index { base, args, .. } => {
            count_length_accesses(base, counts);
            for a in args {
                count_length_accesses(a, counts);
            }
        }
        Expr::Call { callee, args, .. } => {
            count_length_accesses(callee, counts);
            for a in args {
                count_length_accesses(a, counts);
            }
        }
        Expr::Unary { expr, .. } => count_length_accesses(expr, counts),
        Expr::Binary { lhs, rhs, .. } => {
            count_length_accesses(lhs, counts);
            count_length_accesses(rhs, counts);
        }
        Expr::Ternary { cond, then_expr, else_expr, .. } => {
            count_length_accesses(cond, counts);
            count_length_accesses(then_expr, counts);
            count_length_accesses(else_expr, counts);
        }
        Expr::TemplateString { parts, .. } => {
            for p in parts {
                if let TemplatePart::Expr(e) = p {
                    count_length_accesses(e, counts);
                }
            }
        }
        _ => {}
    }
}

/// The cache's C name for a given source variable.
pub fn cache_temp_name(var: &str) -> String {
    format!("__cnx_len_{var}")
}

/// Given occurrence counts gathered across a condition (and, for `if`, its
/// then-branch), returns the declarations to hoist before the statement, in
/// a stable (sorted) order for deterministic output.
pub fn hoisted_declarations(counts: &HashMap<String, u32>) -> Vec<String> {
    let mut names: Vec<&String> = counts.iter().filter(|(_, &c)| c >= 2).map(|(n, _)| n).collect();
    names.sort();
    names
        .into_iter()
        .map(|name| format!("size_t {} = strlen({name});", cache_temp_name(name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::SourceSpan;

    fn ident(name: &str) -> Expr {
        Expr::Identifier { name: name.to_string(), span: SourceSpan::unknown() }
    }

    fn length_of(name: &str) -> Expr {
        Expr::Member { base: Box::new(ident(name)), name: "length".to_string(), span: SourceSpan::unknown() }
    }

    #[test]
    fn counts_repeated_length_access() {
        let expr = Expr::Binary {
            op: crate::ast::BinaryOp::Lt,
            lhs: Box::new(length_of("s")),
            rhs: Box::new(length_of("s")),
            span: SourceSpan::unknown(),
        };
        let mut counts = HashMap::new();
        count_length_accesses(&expr, &mut counts);
        assert_eq!(counts.get("s"), Some(&2));
    }

    #[test]
    fn single_occurrence_is_not_hoisted() {
        let mut counts = HashMap::new();
        counts.insert("s".to_string(), 1);
        assert!(hoisted_declarations(&counts).is_empty());
    }

    #[test]
    fn two_or_more_occurrences_are_hoisted() {
        let mut counts = HashMap::new();
        counts.insert("s".to_string(), 2);
        let decls = hoisted_declarations(&counts);
        assert_eq!(decls, vec!["size_t __cnx_len_s = strlen(s);".to_string()]);
    }
}
