//! Assignment Classifier (§4.4)
//!
//! The heart of the code generator. Builds a structural fingerprint of an
//! assignment target, runs it through a priority cascade (first match
//! wins), and lowers the winning kind to C. Built on top of the
//! member-chain analyzer (§4.5) and subscript classifier (§4.6) rather
//! than re-deriving their bit-vs-array logic.

use crate::ast::{AssignOp, BinaryOp, Expr};
use crate::codegen::atomics::{self, TargetProfile};
use crate::codegen::member_chain::{self, ChainResult, PostfixOp};
use crate::codegen::subscript::{self, SubscriptInput, SubscriptKind};
use crate::symbols::CodeGenSymbols;
use crate::types::{BitField, CnxType, Primitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    BitmapFieldSingleBit,
    BitmapFieldMultiBit,
    StructMemberBitmapField,
    RegisterMemberBitmapField,
    ScopedRegisterMemberBitmapField,
    StructChainBitRange,
    MultiDimArrayElement,
    ArrayElementBit,
    RegisterBit,
    RegisterBitRange,
    BitmapArrayElementField,
    GlobalMember,
    GlobalArray,
    GlobalRegisterBit,
    ThisMember,
    ThisArray,
    ThisBit,
    ThisBitRange,
    ScopedRegisterBit,
    ScopedRegisterBitRange,
    ArrayElement,
    ArraySlice,
    IntegerBit,
    IntegerBitRange,
    StringArrayElement,
    AtomicRmw,
    OverflowClamp,
    StringSimple,
    StringThisMember,
    StringGlobal,
    StringStructField,
    StringStructArrayElement,
    MemberChain,
    Simple,
}

/// Everything the classifier needs about the target beyond its raw AST,
/// gathered once by `fingerprint` and consulted by every cascade rule.
struct Fingerprint<'a> {
    root_name: String,
    root_type: Option<CnxType>,
    ops: Vec<PostfixOp>,
    has_global: bool,
    has_this: bool,
    is_scope_qualified: bool,
    root_bitmap_name: Option<String>,
    chain: ChainResult,
    is_compound: bool,
    is_string_target: bool,
    is_clamp_integer: bool,
    is_atomic_global: bool,
    symbols: &'a CodeGenSymbols,
}

fn fingerprint<'a>(
    target: &Expr,
    op: AssignOp,
    current_scope: Option<&str>,
    symbols: &'a CodeGenSymbols,
) -> Fingerprint<'a> {
    let (root, mut ops) = member_chain::flatten_postfix(target);
    let root_name = match root {
        Expr::Identifier { name, .. } => name.clone(),
        _ => String::new(),
    };

    let has_global = root_name == "global";
    let has_this = root_name == "this";

    // `global.x` / `this.x` strip their pseudo-root and resolve the real
    // root from the first member op instead.
    let (effective_root, is_scope_qualified) = if has_global || has_this {
        if let Some(PostfixOp::Member(name)) = ops.first().cloned() {
            ops.remove(0);
            (name, false)
        } else {
            (root_name.clone(), false)
        }
    } else if symbols.scopes.contains(&root_name) {
        if let Some(PostfixOp::Member(name)) = ops.first().cloned() {
            ops.remove(0);
            (format!("{root_name}.{name}"), true)
        } else {
            (root_name.clone(), true)
        }
    } else {
        (root_name.clone(), false)
    };

    let root_type = if has_this {
        current_scope.and_then(|s| symbols.scope_var_types.get(&(s.to_string(), effective_root.clone())).cloned())
    } else if is_scope_qualified {
        symbols.scope_var_types.get(&(root_name.clone(), effective_root.rsplit('.').next().unwrap_or("").to_string())).cloned()
    } else {
        symbols.lookup_var_type(&effective_root, current_scope).cloned()
    };

    let root_bitmap_name = match &root_type {
        Some(CnxType::Bitmap(n)) => Some(n.clone()),
        _ => None,
    };
    let chain = member_chain::analyze(&effective_root, root_type.clone(), &ops, symbols);
    let is_string_target = chain.is_string;
    let is_clamp_integer = matches!(op, AssignOp::AddAssign | AssignOp::SubAssign | AssignOp::MulAssign)
        && matches!(&chain.base_type, Some(CnxType::Primitive(p)) if p.is_integer());
    let is_atomic_global = op.is_compound()
        && !has_this
        && !is_scope_qualified
        && symbols.global_vars.contains_key(&effective_root)
        && matches!(&chain.base_type, Some(CnxType::Primitive(p)) if p.is_integer());

    Fingerprint {
        root_name: effective_root,
        root_type: root_type.clone(),
        ops,
        has_global,
        has_this,
        is_scope_qualified,
        root_bitmap_name,
        chain,
        is_compound: op.is_compound(),
        is_string_target,
        is_clamp_integer,
        is_atomic_global,
        symbols,
    }
}

/// Runs the priority cascade and returns the winning kind.
pub fn classify(fp: &Fingerprint) -> AssignmentKind {
    // Priority 1: bitmap field assignment, at increasing qualification depth.
    if fp.ops.len() == 1 {
        if let PostfixOp::Member(field) = &fp.ops[0] {
            if let Some(bitmap) = &fp.root_bitmap_name {
                return match fp.symbols.bitmap_field(bitmap, field) {
                    Some(BitField { width: 1, .. }) => AssignmentKind::BitmapFieldSingleBit,
                    _ => AssignmentKind::BitmapFieldMultiBit,
                };
            }
        }
    }
    if fp.ops.len() == 2 {
        if let (PostfixOp::Member(member), PostfixOp::Member(_field)) = (&fp.ops[0], &fp.ops[1]) {
            let _ = member;
            if fp.symbols.registers.contains_key(&fp.root_name) {
                return if fp.is_scope_qualified {
                    AssignmentKind::ScopedRegisterMemberBitmapField
                } else {
                    AssignmentKind::RegisterMemberBitmapField
                };
            }
            return AssignmentKind::StructMemberBitmapField;
        }
    }

    // Priority 2.
    if fp.chain.bit_args.len() == 2 && fp.ops.len() > 1 && !fp.chain.is_register_access {
        return AssignmentKind::StructChainBitRange;
    }
    if fp.chain.is_register_access {
        return if fp.chain.bit_args.len() >= 2 { AssignmentKind::RegisterBitRange } else { AssignmentKind::RegisterBit };
    }
    if let [PostfixOp::Index(_), PostfixOp::Member(_)] = fp.ops.as_slice() {
        if let Some(CnxType::Array { element, .. }) = &fp.root_type {
            if matches!(element.as_ref(), CnxType::Bitmap(_)) {
                return AssignmentKind::BitmapArrayElementField;
            }
        }
    }
    if fp.chain.is_array && !fp.chain.is_bit_access && fp.chain.bit_args.len() >= 1 && fp.ops.len() > 1 {
        return AssignmentKind::MultiDimArrayElement;
    }
    if fp.chain.is_bit_access && fp.ops.len() > 1 {
        return AssignmentKind::ArrayElementBit;
    }

    // Priority 3: global./this. prefixes.
    if fp.has_global {
        if fp.chain.is_register_access {
            return AssignmentKind::GlobalRegisterBit;
        }
        return if fp.chain.is_array { AssignmentKind::GlobalArray } else { AssignmentKind::GlobalMember };
    }
    if fp.has_this {
        if fp.symbols.registers.contains_key(&fp.root_name) {
            return if fp.chain.bit_args.len() >= 2 { AssignmentKind::ScopedRegisterBitRange } else { AssignmentKind::ScopedRegisterBit };
        }
        if fp.chain.is_bit_access {
            return if fp.chain.bit_args.len() >= 2 { AssignmentKind::ThisBitRange } else { AssignmentKind::ThisBit };
        }
        return if fp.chain.is_array { AssignmentKind::ThisArray } else { AssignmentKind::ThisMember };
    }

    // Priority 4: plain `x[...]`.
    if !fp.chain.bit_args.is_empty() {
        if fp.is_string_target {
            return AssignmentKind::StringArrayElement;
        }
        let kind = subscript::classify(SubscriptInput {
            type_known: fp.chain.base_type.is_some(),
            is_array: fp.chain.is_array,
            is_string: fp.chain.is_string,
            is_parameter: false,
            is_register_access: false,
            subscript_count: fp.chain.bit_args.len(),
        });
        return match kind {
            SubscriptKind::ArrayElement => AssignmentKind::ArrayElement,
            SubscriptKind::ArraySlice => AssignmentKind::ArraySlice,
            SubscriptKind::BitSingle => AssignmentKind::IntegerBit,
            SubscriptKind::BitRange => AssignmentKind::IntegerBitRange,
        };
    }

    // Priority 5: compound ops on atomics/clamp integers.
    if fp.is_compound && fp.is_atomic_global {
        return AssignmentKind::AtomicRmw;
    }
    if fp.is_compound && fp.is_clamp_integer {
        return AssignmentKind::OverflowClamp;
    }

    // Priority 6: string targets.
    if fp.is_string_target {
        if fp.has_this {
            return AssignmentKind::StringThisMember;
        }
        if fp.has_global {
            return AssignmentKind::StringGlobal;
        }
        if fp.ops.len() > 1 {
            return AssignmentKind::StringStructArrayElement;
        }
        if fp.ops.len() == 1 {
            return AssignmentKind::StringStructField;
        }
        return AssignmentKind::StringSimple;
    }

    // Priority 7: any remaining member/subscript combination.
    if !fp.ops.is_empty() {
        return AssignmentKind::MemberChain;
    }

    AssignmentKind::Simple
}

/// Resolves the `BitField` a bitmap-routed kind needs for mask/shift
/// lowering, by walking the symbol tables directly rather than
/// `member_chain::analyze`'s type-walk (which only follows `Struct` roots).
fn resolve_chain_bitmap_field(fp: &Fingerprint, kind: AssignmentKind) -> Option<BitField> {
    match kind {
        AssignmentKind::StructMemberBitmapField => {
            let (member, field) = match fp.ops.as_slice() {
                [PostfixOp::Member(member), PostfixOp::Member(field)] => (member, field),
                _ => return None,
            };
            let struct_name = match &fp.root_type {
                Some(CnxType::Struct(name)) => name,
                _ => return None,
            };
            let fields = fp.symbols.structs.get(struct_name)?;
            let field_ty = &fields.iter().find(|(n, _)| n == member)?.1.ty;
            let bitmap_name = match field_ty {
                CnxType::Bitmap(name) => name,
                _ => return None,
            };
            fp.symbols.bitmap_field(bitmap_name, field)
        }
        AssignmentKind::RegisterMemberBitmapField | AssignmentKind::ScopedRegisterMemberBitmapField => {
            let (member, field) = match fp.ops.as_slice() {
                [PostfixOp::Member(member), PostfixOp::Member(field)] => (member, field),
                _ => return None,
            };
            let register = fp.symbols.registers.get(&fp.root_name)?;
            let bitmap_name = register.members.get(member)?.bitmap_type.as_ref()?;
            fp.symbols.bitmap_field(bitmap_name, field)
        }
        AssignmentKind::BitmapArrayElementField => {
            let field = match fp.ops.as_slice() {
                [PostfixOp::Index(_), PostfixOp::Member(field)] => field,
                _ => return None,
            };
            let bitmap_name = match &fp.root_type {
                Some(CnxType::Array { element, .. }) => match element.as_ref() {
                    CnxType::Bitmap(name) => name,
                    _ => return None,
                },
                _ => return None,
            };
            fp.symbols.bitmap_field(bitmap_name, field)
        }
        _ => None,
    }
}

/// Bitmap field mask/shift update: `x = (x & ~(mask<<off)) | ((v & mask) << off)`,
/// with the single-bit special case using `|=`/`&= ~`.
pub fn lower_bitmap_field(target: &str, field: &BitField, rhs: &str) -> String {
    if field.width == 1 {
        return format!(
            "{target} = ({target} & ~(1u << {off})) | (({rhs} & 1u) << {off});",
            off = field.offset
        );
    }
    let mask = field.mask();
    format!(
        "{target} = ({target} & ~({mask}u << {off})) | (({rhs} & {mask}u) << {off});",
        off = field.offset
    )
}

/// Integer bit/bit-range lowering (§4.4): identical in shape to the bitmap
/// lowering but derives its mask from the integer's own bit width.
pub fn lower_integer_bit(target: &str, bit_index_expr: &str, width: u32, rhs: &str) -> String {
    let _ = width;
    format!(
        "{target} = ({target} & ~(1u << ({bit_index_expr}))) | (({rhs} & 1u) << ({bit_index_expr}));"
    )
}

pub fn lower_integer_bit_range(target: &str, lo_expr: &str, hi_expr: &str, rhs: &str) -> String {
    format!(
        "{target} = ({target} & ~(((1ull << ({hi_expr} - {lo_expr} + 1)) - 1) << ({lo_expr}))) \
         | (({rhs} & ((1ull << ({hi_expr} - {lo_expr} + 1)) - 1)) << ({lo_expr}));"
    )
}

/// `buffer[offset, length] <- source` lowers to a bounded `memcpy`.
pub fn lower_array_slice(target: &str, offset_expr: &str, length_expr: &str, source: &str) -> String {
    format!("memcpy(&{target}[{offset_expr}], {source}, {length_expr});")
}

/// Bounded string copy with explicit NUL termination (§4.4 `STRING_*`).
pub fn lower_string_copy(target: &str, capacity: u64, source: &str) -> Vec<String> {
    vec![
        format!("strncpy({target}, {source}, {});", capacity),
        format!("{target}[{}] = '\\0';", capacity),
    ]
}

/// `ATOMIC_RMW` / `OVERFLOW_CLAMP` share their lowering with `atomics.rs`;
/// these thin wrappers keep the classifier's output self-contained.
pub fn lower_atomic_rmw(target: &str, c_type: &str, op: BinaryOp, rhs: &str, profile: TargetProfile) -> Vec<String> {
    atomics::lower_atomic_rmw(target, c_type, op, rhs, profile)
}

pub fn lower_overflow_clamp(target: &str, primitive: Primitive, op: BinaryOp, rhs: &str, debug: bool) -> String {
    atomics::lower_clamp_assign(target, primitive, op, rhs, debug)
}

/// Public entry point: classify and return both the kind and the
/// fingerprint's derived facts the generator needs to lower it.
pub struct ClassifiedAssignment {
    pub kind: AssignmentKind,
    pub base_target: String,
    pub bit_args_count: usize,
    pub base_type: Option<CnxType>,
    pub is_register_access: bool,
    /// The mask/shift pair for a bitmap-field-routed kind, resolved here so
    /// the generator never needs its own bitmap-type lookup.
    pub resolved_bitmap_field: Option<BitField>,
}

pub fn classify_assignment(
    target: &Expr,
    op: AssignOp,
    current_scope: Option<&str>,
    symbols: &CodeGenSymbols,
) -> ClassifiedAssignment {
    let fp = fingerprint(target, op, current_scope, symbols);
    let kind = classify(&fp);
    let resolved_bitmap_field = resolve_chain_bitmap_field(&fp, kind);
    ClassifiedAssignment {
        kind,
        base_target: fp.chain.base_target.clone(),
        bit_args_count: fp.chain.bit_args.len(),
        base_type: fp.chain.base_type.clone(),
        is_register_access: fp.chain.is_register_access,
        resolved_bitmap_field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::symbols::collect_symbols;

    fn target_of(src: &str) -> (crate::ast::Program, Expr, AssignOp) {
        let prog = parse_source(src, "t.cnx").unwrap();
        let func = prog.decls.iter().rev().find_map(|d| match d {
            crate::ast::Decl::Function(f) => Some(f.clone()),
            _ => None,
        }).unwrap();
        let assign = func.body.iter().find_map(|s| match s {
            crate::ast::Stmt::Assign(a) => Some(a.clone()),
            _ => None,
        }).unwrap();
        (prog, assign.target, assign.op)
    }

    #[test]
    fn classifies_bitmap_single_bit_field() {
        let (prog, target, op) = target_of(
            "bitmap Flags : u8 { enabled @ 0 : 1 }\nFlags f;\nvoid g() { f.enabled <- true; }",
        );
        let symbols = collect_symbols(&prog).unwrap();
        let result = classify_assignment(&target, op, None, &symbols);
        assert_eq!(result.kind, AssignmentKind::BitmapFieldSingleBit);
    }

    #[test]
    fn classifies_plain_integer_bit_access() {
        let (prog, target, op) = target_of("u8 flags <- 0;\nvoid g() { flags[3] <- true; }");
        let symbols = collect_symbols(&prog).unwrap();
        let result = classify_assignment(&target, op, None, &symbols);
        assert_eq!(result.kind, AssignmentKind::IntegerBit);
    }

    #[test]
    fn classifies_array_element() {
        let (prog, target, op) = target_of("u8 buf[16];\nvoid g() { buf[0] <- 1; }");
        let symbols = collect_symbols(&prog).unwrap();
        let result = classify_assignment(&target, op, None, &symbols);
        assert_eq!(result.kind, AssignmentKind::ArrayElement);
    }

    #[test]
    fn classifies_global_prefixed_member() {
        let (prog, target, op) = target_of("struct S { u8 x; }\nS s;\nvoid g() { global.s.x <- 1; }");
        let symbols = collect_symbols(&prog).unwrap();
        let result = classify_assignment(&target, op, None, &symbols);
        assert_eq!(result.kind, AssignmentKind::GlobalMember);
    }

    #[test]
    fn classifies_bitmap_array_element_field() {
        let (prog, target, op) = target_of(
            "bitmap Flags : u8 { enabled @ 0 : 1 }\nFlags arr[4];\nvoid g() { arr[0].enabled <- true; }",
        );
        let symbols = collect_symbols(&prog).unwrap();
        let result = classify_assignment(&target, op, None, &symbols);
        assert_eq!(result.kind, AssignmentKind::BitmapArrayElementField);
        assert_eq!(result.resolved_bitmap_field, Some(BitField { offset: 0, width: 1 }));
    }

    #[test]
    fn bitmap_field_lowering_uses_mask_and_shift() {
        let field = BitField { offset: 4, width: 3 };
        let line = lower_bitmap_field("f", &field, "v");
        assert!(line.contains("<< 4"));
        assert!(line.contains('7'));
    }

    #[test]
    fn array_slice_lowering_uses_memcpy() {
        let line = lower_array_slice("buf", "off", "len", "src");
        assert!(line.starts_with("memcpy("));
    }
}
