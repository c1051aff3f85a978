//! Control-flow lowerings (§4.7)
//!
//! Condition hoisting lives in `CodeGen::pending_temps` and is driven from
//! `statements.rs`; this module holds the pure, independently-testable
//! pieces: call-in-condition rejection, do-while boolean enforcement,
//! switch-label lowering (enum qualification + binary-literal rewriting),
//! empty-default synthesis, critical-block validation, and the
//! "did you mean `Enum.X`?" hint for bare enum returns.

use crate::ast::{CaseLabel, Expr, Stmt};
use crate::diagnostics::{ErrorCode, SourceSpan};
use crate::error::CodeGenError;
use crate::symbols::CodeGenSymbols;
use crate::types::{CnxType, Primitive};

/// §4.7/SPEC_FULL.md §B.5: a binary-literal case label widens to `ULL` once
/// its width exceeds 32 bits — a typed suffix decides that directly, an
/// unsuffixed literal falls back to its own magnitude.
fn binary_literal_needs_ull(value: i64, suffix: Option<&str>) -> bool {
    if let Some(suffix) = suffix {
        if let Some(primitive) = Primitive::from_suffix(suffix) {
            return primitive.bit_width() > 32;
        }
    }
    (value as u64) > u32::MAX as u64
}

/// §3/E0702: no function calls inside `if`/`while`/`for`/`do-while`
/// conditions.
pub fn validate_condition(cond: &Expr) -> Result<(), CodeGenError> {
    if cond.contains_call() {
        return Err(CodeGenError::FunctionCallInCondition {
            code: ErrorCode::E0702,
            span: cond.span().clone(),
        });
    }
    Ok(())
}

/// §4.7/E0701: `do { ... } while (cond);` requires a boolean condition.
pub fn validate_do_while_condition(cond: &Expr, cond_type: &CnxType) -> Result<(), CodeGenError> {
    if !matches!(cond_type, CnxType::Primitive(Primitive::Bool)) {
        return Err(CodeGenError::NonBooleanDoWhileCondition {
            code: ErrorCode::E0701,
            span: cond.span().clone(),
        });
    }
    Ok(())
}

/// Lowers one `case` label to its C source text. `enum_name` is the
/// discriminant's known enum type, if any — bare identifiers are qualified
/// against it first, falling back to a whole-program search so a member
/// from the wrong enum still gets a useful hint rather than silently
/// compiling.
pub fn lower_case_label(
    label: &CaseLabel,
    enum_name: Option<&str>,
    span: &SourceSpan,
    symbols: &CodeGenSymbols,
) -> Result<String, CodeGenError> {
    match label {
        CaseLabel::IntLiteral(v) => Ok(v.to_string()),
        CaseLabel::BinLiteral { value, suffix, .. } => {
            if binary_literal_needs_ull(*value, suffix.as_deref()) {
                Ok(format!("0x{value:X}ULL"))
            } else {
                Ok(format!("0x{value:X}"))
            }
        }
        CaseLabel::Char(c) => Ok(format!("'{c}'")),
        CaseLabel::Identifier(name) => {
            if let Some(enum_name) = enum_name {
                if symbols.enum_value(enum_name, name).is_some() {
                    return Ok(format!("{enum_name}_{name}"));
                }
            }
            match symbols.find_enum_owning_member(name) {
                Some(owner) => Ok(format!("{owner}_{name}")),
                None => Err(CodeGenError::UnqualifiedEnumMember {
                    code: ErrorCode::E0424,
                    member: name.clone(),
                    span: span.clone(),
                    suggestion: None,
                }),
            }
        }
    }
}

/// §4.7: a `switch` with no `default` gets a synthesized empty one so every
/// emitted switch is exhaustive from C's point of view.
pub fn needs_synthesized_default(default: &Option<Vec<Stmt>>) -> bool {
    default.is_none()
}

/// §3/E0423: a `critical` block's direct statements may not `return` or
/// `break` out from under the PRIMASK guard. Nested loops/ifs are exempt —
/// only top-level exits of the critical block itself are rejected.
pub fn validate_critical_body(body: &[Stmt], span: &SourceSpan) -> Result<(), CodeGenError> {
    for stmt in body {
        if stmt.is_return_or_break() {
            let kind = match stmt {
                Stmt::Return { .. } => "return",
                Stmt::Break { .. } => "break",
                _ => unreachable!(),
            };
            return Err(CodeGenError::CriticalBlockExit {
                code: ErrorCode::E0423,
                kind: kind.to_string(),
                span: span.clone(),
            });
        }
    }
    Ok(())
}

/// PRIMASK save/disable/restore wrapper for a `critical { ... }` block's
/// already-generated body lines.
pub fn wrap_critical(body_lines: &[String]) -> Vec<String> {
    let mut out = vec![
        "{".to_string(),
        "    uint32_t __cnx_primask = __cnx_get_PRIMASK();".to_string(),
        "    __cnx_disable_irq();".to_string(),
    ];
    for line in body_lines {
        out.push(format!("    {line}"));
    }
    out.push("    __cnx_set_PRIMASK(__cnx_primask);".to_string());
    out.push("}".to_string());
    out
}

/// §4.7: `return SOME_MEMBER;` from a function whose return type is an
/// enum — qualifies the bare member, with a "did you mean" hint when the
/// member belongs to a different enum than the declared return type.
pub fn resolve_return_enum_member(
    member: &str,
    return_enum: &str,
    span: &SourceSpan,
    symbols: &CodeGenSymbols,
) -> Result<String, CodeGenError> {
    if symbols.enum_value(return_enum, member).is_some() {
        return Ok(format!("{return_enum}_{member}"));
    }
    let suggestion = symbols
        .find_enum_owning_member(member)
        .map(|owner| format!("did you mean `{owner}.{member}`?"));
    Err(CodeGenError::UnqualifiedEnumMember {
        code: ErrorCode::E0424,
        member: member.to_string(),
        span: span.clone(),
        suggestion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::symbols::collect_symbols;

    fn span() -> SourceSpan {
        SourceSpan::unknown()
    }

    #[test]
    fn rejects_call_in_condition() {
        let cond = Expr::Call {
            callee: Box::new(Expr::Identifier { name: "f".into(), span: span() }),
            args: vec![],
            span: span(),
        };
        assert!(validate_condition(&cond).is_err());
    }

    #[test]
    fn accepts_call_free_condition() {
        let cond = Expr::BoolLiteral { value: true, span: span() };
        assert!(validate_condition(&cond).is_ok());
    }

    #[test]
    fn rejects_non_boolean_do_while_condition() {
        let cond = Expr::IntLiteral { value: 1, suffix: None, span: span() };
        let err = validate_do_while_condition(&cond, &CnxType::Primitive(Primitive::I32));
        assert!(err.is_err());
    }

    #[test]
    fn binary_literal_case_label_becomes_hex() {
        let prog = parse_source("void f() {}", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let label = CaseLabel::BinLiteral { raw: "0b1010".into(), value: 10, suffix: None };
        assert_eq!(lower_case_label(&label, None, &span(), &symbols).unwrap(), "0xA");
    }

    #[test]
    fn unsuffixed_binary_literal_over_32_bits_gets_ull() {
        let prog = parse_source("void f() {}", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let value = 1i64 << 40;
        let label = CaseLabel::BinLiteral { raw: "0b1".into(), value, suffix: None };
        assert_eq!(lower_case_label(&label, None, &span(), &symbols).unwrap(), format!("0x{value:X}ULL"));
    }

    #[test]
    fn u64_suffixed_binary_literal_gets_ull_even_when_small() {
        let prog = parse_source("void f() {}", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let label = CaseLabel::BinLiteral { raw: "0b1010".into(), value: 10, suffix: Some("u64".into()) };
        assert_eq!(lower_case_label(&label, None, &span(), &symbols).unwrap(), "0xAULL");
    }

    #[test]
    fn unsuffixed_binary_literal_within_32_bits_stays_plain_hex() {
        let prog = parse_source("void f() {}", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let label = CaseLabel::BinLiteral { raw: "0b11111111111111111111111111111111".into(), value: u32::MAX as i64, suffix: None };
        assert_eq!(lower_case_label(&label, None, &span(), &symbols).unwrap(), "0xFFFFFFFF");
    }

    #[test]
    fn enum_member_case_label_qualified_against_discriminant_enum() {
        let prog = parse_source("enum EMode { OFF = 0, ON = 1 }\nvoid f() {}", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let label = CaseLabel::Identifier("ON".into());
        assert_eq!(lower_case_label(&label, Some("EMode"), &span(), &symbols).unwrap(), "EMode_ON");
    }

    #[test]
    fn missing_default_is_flagged_for_synthesis() {
        assert!(needs_synthesized_default(&None));
        assert!(!needs_synthesized_default(&Some(vec![])));
    }

    #[test]
    fn critical_block_rejects_top_level_return() {
        let body = vec![Stmt::Return { value: None, span: span() }];
        assert!(validate_critical_body(&body, &span()).is_err());
    }

    #[test]
    fn critical_block_accepts_nested_return() {
        let inner = Stmt::Return { value: None, span: span() };
        let body = vec![Stmt::If { cond: Expr::BoolLiteral { value: true, span: span() }, then_branch: vec![inner], else_branch: None, span: span() }];
        assert!(validate_critical_body(&body, &span()).is_ok());
    }

    #[test]
    fn critical_wrapper_guards_with_primask() {
        let lines = wrap_critical(&["x = 1;".to_string()]);
        assert!(lines.iter().any(|l| l.contains("__cnx_disable_irq")));
        assert!(lines.iter().any(|l| l.contains("__cnx_set_PRIMASK")));
    }

    #[test]
    fn return_enum_member_suggests_correct_owner_on_mismatch() {
        let prog = parse_source("enum A { X = 0 }\nenum B { Y = 0 }\nvoid f() {}", "t.cnx").unwrap();
        let symbols = collect_symbols(&prog).unwrap();
        let err = resolve_return_enum_member("Y", "A", &span(), &symbols).unwrap_err();
        match err {
            CodeGenError::UnqualifiedEnumMember { suggestion, .. } => {
                assert_eq!(suggestion, Some("did you mean `B.Y`?".to_string()));
            }
            _ => panic!("wrong error variant"),
        }
    }
}
