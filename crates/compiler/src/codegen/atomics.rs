//! Atomic RMW and critical-section lowering
//!
//! §4.4 `ATOMIC_RMW`, §4.7 `critical`. Global-scope atomics lower to an
//! LDREX/STREX retry loop on targets that advertise exclusive access, and
//! to a PRIMASK save/disable/restore wrapper elsewhere; scoped atomics are
//! out of reach of this lowering and instead use the clamp/wrap rules of
//! `OVERFLOW_CLAMP` (§3 invariants).

use crate::ast::BinaryOp;
use crate::types::Primitive;

/// Per-`--target` capability table (SPEC_FULL.md §B.3). Unknown targets
/// default to no exclusive-access support, which routes every atomic RMW
/// through the PRIMASK path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetProfile {
    pub id: &'static str,
    pub has_ldrex_strex: bool,
}

impl TargetProfile {
    pub fn lookup(target: &str) -> Self {
        match target {
            "cortex-m3" => TargetProfile { id: "cortex-m3", has_ldrex_strex: true },
            "cortex-m4" => TargetProfile { id: "cortex-m4", has_ldrex_strex: true },
            "cortex-m7" => TargetProfile { id: "cortex-m7", has_ldrex_strex: true },
            "cortex-m0" => TargetProfile { id: "cortex-m0", has_ldrex_strex: false },
            "host" => TargetProfile { id: "host", has_ldrex_strex: false },
            _ => TargetProfile::unknown(),
        }
    }

    pub fn unknown() -> Self {
        TargetProfile { id: "unknown", has_ldrex_strex: false }
    }
}

fn binop_helper_name(op: BinaryOp) -> Option<&'static str> {
    Some(match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::BitAnd => "and",
        BinaryOp::BitOr => "or",
        BinaryOp::BitXor => "xor",
        _ => return None,
    })
}

/// Emits the lowering for a compound assignment on a global atomic integer:
/// an LDREX/STREX retry loop when the target supports it, else a
/// PRIMASK-guarded read-modify-write.
pub fn lower_atomic_rmw(
    target_lvalue: &str,
    c_type: &str,
    op: BinaryOp,
    rhs_expr: &str,
    profile: TargetProfile,
) -> Vec<String> {
    let op_name = binop_helper_name(op).unwrap_or("add");
    let op_symbol = binop_symbol(op);
    if profile.has_ldrex_strex {
        vec![
            "do {".to_string(),
            format!("    {c_type} __cnx_old = __cnx_ldrex((volatile {c_type}*)&{target_lvalue});"),
            format!("    {c_type} __cnx_new = __cnx_old {op_symbol} ({rhs_expr});"),
            format!("}} while (__cnx_strex(__cnx_new, (volatile {c_type}*)&{target_lvalue}) != 0);"),
        ]
    } else {
        let _ = op_name;
        vec![
            "{".to_string(),
            "    uint32_t __cnx_primask = __cnx_get_PRIMASK();".to_string(),
            "    __cnx_disable_irq();".to_string(),
            format!("    {target_lvalue} = {target_lvalue} {op_symbol} ({rhs_expr});"),
            "    __cnx_set_PRIMASK(__cnx_primask);".to_string(),
            "}".to_string(),
        ]
    }
}

fn binop_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
        _ => "+",
    }
}

/// `OVERFLOW_CLAMP` lowering (§4.4): `x += v` becomes a call to a
/// saturating helper. In `--debug` mode the clamp family is swapped for a
/// panic family of identical signature (SPEC_FULL.md §B.4).
pub fn lower_clamp_assign(
    target_lvalue: &str,
    primitive: Primitive,
    op: BinaryOp,
    rhs_expr: &str,
    debug: bool,
) -> String {
    let op_name = match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        _ => "add",
    };
    let family = if debug { "cnx_panic" } else { "cnx_clamp" };
    let ty = primitive.c_type();
    format!("{target_lvalue} = {family}_{op_name}_{ty}({target_lvalue}, {rhs_expr});")
}

/// The helper preamble emitted once per translation unit that uses atomics
/// or clamp arithmetic (§4.4, SPEC_FULL.md §B.4): both the clamp and panic
/// families are always available, selected per-call by `lower_clamp_assign`.
pub fn clamp_helper_prototypes(primitive: Primitive) -> Vec<String> {
    let ty = primitive.c_type();
    let mut lines = Vec::new();
    for op in ["add", "sub", "mul"] {
        lines.push(format!("static inline {ty} cnx_clamp_{op}_{ty}({ty} a, {ty} b);"));
        lines.push(format!("static inline {ty} cnx_panic_{op}_{ty}({ty} a, {ty} b);"));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_target_has_no_exclusive_access() {
        let profile = TargetProfile::lookup("bogus");
        assert!(!profile.has_ldrex_strex);
    }

    #[test]
    fn cortex_m4_supports_ldrex_strex() {
        assert!(TargetProfile::lookup("cortex-m4").has_ldrex_strex);
    }

    #[test]
    fn ldrex_strex_lowering_used_on_capable_target() {
        let lines = lower_atomic_rmw("counter", "uint32_t", BinaryOp::Add, "1", TargetProfile::lookup("cortex-m4"));
        assert!(lines.iter().any(|l| l.contains("__cnx_ldrex")));
    }

    #[test]
    fn primask_lowering_used_on_incapable_target() {
        let lines = lower_atomic_rmw("counter", "uint32_t", BinaryOp::Add, "1", TargetProfile::unknown());
        assert!(lines.iter().any(|l| l.contains("PRIMASK")));
    }

    #[test]
    fn clamp_lowering_swaps_to_panic_family_in_debug() {
        let normal = lower_clamp_assign("x", Primitive::U8, BinaryOp::Add, "v", false);
        let debug = lower_clamp_assign("x", Primitive::U8, BinaryOp::Add, "v", true);
        assert!(normal.contains("cnx_clamp_add_uint8_t"));
        assert!(debug.contains("cnx_panic_add_uint8_t"));
    }
}
