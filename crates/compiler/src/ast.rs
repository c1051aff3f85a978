//! Abstract Syntax Tree for C-Next
//!
//! One AST per `.cnx` file. The parser is the sole owner of these nodes;
//! the symbol collector and code generator hold only indirect references
//! (bare strings) into them, never mutating a node (§3 Ownership).

use crate::diagnostics::SourceSpan;
use crate::types::{ArrayDim, Primitive, Visibility};

/// A type as written in source, before the symbol collector resolves named
/// references to struct/enum/bitmap/callback definitions.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Primitive(Primitive),
    BoundedString(u64),
    UnboundedString,
    /// struct / enum / bitmap / callback / opaque name, resolved later.
    Named(String),
    Array {
        element: Box<TypeRef>,
        dims: Vec<ArrayDim>,
    },
}

impl TypeRef {
    pub fn is_array(&self) -> bool {
        matches!(self, TypeRef::Array { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VarModifiers {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_atomic: bool,
    /// Saturating-arithmetic policy for `+= -= *=` (§3, §4.4 OVERFLOW_CLAMP).
    pub is_clamp: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: TypeRef,
    pub modifiers: VarModifiers,
    pub init: Option<Expr>,
    /// `None` for top-level globals (implicitly public); `Some` for scope members.
    pub visibility: Option<Visibility>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    pub body: Vec<Stmt>,
    pub visibility: Option<Visibility>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitmapFieldDecl {
    pub name: String,
    pub offset: u32,
    pub width: u32,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitmapDecl {
    pub name: String,
    pub backing: Primitive,
    pub fields: Vec<BitmapFieldDecl>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterMemberDecl {
    pub name: String,
    pub offset: ArrayDim,
    pub c_type: TypeRef,
    pub bitmap_type: Option<String>,
    pub visibility: Visibility,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterDecl {
    pub name: String,
    pub base_address: ArrayDim,
    pub members: Vec<RegisterMemberDecl>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallbackDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScopeMember {
    Var(VarDecl),
    Function(FunctionDecl),
    Register(RegisterDecl),
}

impl ScopeMember {
    pub fn name(&self) -> &str {
        match self {
            ScopeMember::Var(v) => &v.name,
            ScopeMember::Function(f) => &f.name,
            ScopeMember::Register(r) => &r.name,
        }
    }

    pub fn visibility(&self) -> Visibility {
        match self {
            ScopeMember::Var(v) => v.visibility.unwrap_or(Visibility::Private),
            ScopeMember::Function(f) => f.visibility.unwrap_or(Visibility::Private),
            // Registers inside a scope are only reachable via the scope
            // prefix; default to private unless declared public.
            ScopeMember::Register(_) => Visibility::Private,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeDecl {
    pub name: String,
    pub members: Vec<ScopeMember>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    GlobalVar(VarDecl),
    Function(FunctionDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Bitmap(BitmapDecl),
    Register(RegisterDecl),
    Callback(CallbackDecl),
    Scope(ScopeDecl),
}

/// A complete parsed `.cnx` file. `#include` directives are not part of the
/// core grammar (§4.1) — they are extracted directly from raw source text
/// by the resolver, independent of this AST.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub decls: Vec<Decl>,
}

// ============================================================================
//                                STATEMENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
}

impl AssignOp {
    pub fn is_compound(self) -> bool {
        !matches!(self, AssignOp::Assign)
    }

    /// The underlying binary operator for a compound assignment's RMW step.
    pub fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            AssignOp::Assign => return None,
            AssignOp::AddAssign => BinaryOp::Add,
            AssignOp::SubAssign => BinaryOp::Sub,
            AssignOp::MulAssign => BinaryOp::Mul,
            AssignOp::DivAssign => BinaryOp::Div,
            AssignOp::ModAssign => BinaryOp::Mod,
            AssignOp::AndAssign => BinaryOp::BitAnd,
            AssignOp::OrAssign => BinaryOp::BitOr,
            AssignOp::XorAssign => BinaryOp::BitXor,
            AssignOp::ShlAssign => BinaryOp::Shl,
            AssignOp::ShrAssign => BinaryOp::Shr,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignStmt {
    pub target: Expr,
    pub op: AssignOp,
    pub value: Expr,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclStmt {
    pub decl: VarDecl,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseLabel {
    /// Bare identifier: an enum member name (qualified or not) decided at codegen time.
    Identifier(String),
    IntLiteral(i64),
    /// Raw source text of a binary literal (`0b1010`), kept so codegen can
    /// rewrite it to hex per §4.7. `suffix` carries a typed width (`u64`,
    /// `i64`, ...) when the literal was written with one.
    BinLiteral { raw: String, value: i64, suffix: Option<String> },
    Char(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// Multiple labels joined by `||` in source share one body (§4.7).
    pub labels: Vec<CaseLabel>,
    pub body: Vec<Stmt>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    VarDecl(VarDeclStmt),
    Assign(AssignStmt),
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
        span: SourceSpan,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        span: SourceSpan,
    },
    DoWhile {
        body: Vec<Stmt>,
        cond: Expr,
        span: SourceSpan,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Box<Stmt>>,
        body: Vec<Stmt>,
        span: SourceSpan,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Vec<Stmt>>,
        span: SourceSpan,
    },
    Return {
        value: Option<Expr>,
        span: SourceSpan,
    },
    Break {
        span: SourceSpan,
    },
    Critical {
        body: Vec<Stmt>,
        span: SourceSpan,
    },
}

impl Stmt {
    pub fn span(&self) -> &SourceSpan {
        match self {
            Stmt::VarDecl(v) => &v.decl.span,
            Stmt::Assign(a) => &a.span,
            Stmt::Expr(e) => e.span(),
            Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::DoWhile { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Break { span }
            | Stmt::Critical { span, .. } => span,
        }
    }

    /// Whether this statement is a `return` or `break` — used to validate
    /// `critical` blocks (§3, §4.7).
    pub fn is_return_or_break(&self) -> bool {
        matches!(self, Stmt::Return { .. } | Stmt::Break { .. })
    }
}

// ============================================================================
//                               EXPRESSIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitOr,
    BitXor,
    BitAnd,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLiteral {
        value: i64,
        suffix: Option<Primitive>,
        span: SourceSpan,
    },
    FloatLiteral {
        value: f64,
        suffix: Option<Primitive>,
        span: SourceSpan,
    },
    BoolLiteral {
        value: bool,
        span: SourceSpan,
    },
    CharLiteral {
        value: char,
        span: SourceSpan,
    },
    StringLiteral {
        value: String,
        span: SourceSpan,
    },
    /// `` `hello ${expr}!` `` — lowered to string concatenation in codegen.
    TemplateString {
        parts: Vec<TemplatePart>,
        span: SourceSpan,
    },
    Identifier {
        name: String,
        span: SourceSpan,
    },
    /// `.name` member access (also covers the `.length` pseudo-property).
    Member {
        base: Box<Expr>,
        name: String,
        span: SourceSpan,
    },
    /// `base[args...]` — one arg is array/bit index, two is slice/bit-range.
    Index {
        base: Box<Expr>,
        args: Vec<Expr>,
        span: SourceSpan,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: SourceSpan,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        span: SourceSpan,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: SourceSpan,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        span: SourceSpan,
    },
}

impl Expr {
    pub fn span(&self) -> &SourceSpan {
        match self {
            Expr::IntLiteral { span, .. }
            | Expr::FloatLiteral { span, .. }
            | Expr::BoolLiteral { span, .. }
            | Expr::CharLiteral { span, .. }
            | Expr::StringLiteral { span, .. }
            | Expr::TemplateString { span, .. }
            | Expr::Identifier { span, .. }
            | Expr::Member { span, .. }
            | Expr::Index { span, .. }
            | Expr::Call { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Ternary { span, .. } => span,
        }
    }

    /// True if this expression tree contains a function call anywhere —
    /// used to reject calls inside loop/branch conditions (§3, E0702).
    pub fn contains_call(&self) -> bool {
        match self {
            Expr::Call { .. } => true,
            Expr::Member { base, .. } | Expr::Unary { expr: base, .. } => base.contains_call(),
            Expr::Index { base, args, .. } => {
                base.contains_call() || args.iter().any(Expr::contains_call)
            }
            Expr::Binary { lhs, rhs, .. } => lhs.contains_call() || rhs.contains_call(),
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
                ..
            } => cond.contains_call() || then_expr.contains_call() || else_expr.contains_call(),
            Expr::TemplateString { parts, .. } => parts.iter().any(|p| match p {
                TemplatePart::Expr(e) => e.contains_call(),
                TemplatePart::Literal(_) => false,
            }),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> SourceSpan {
        SourceSpan::new("t.cnx", 0, 0)
    }

    #[test]
    fn contains_call_detects_nested_call() {
        let call = Expr::Call {
            callee: Box::new(Expr::Identifier { name: "foo".into(), span: span() }),
            args: vec![],
            span: span(),
        };
        let wrapped = Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(call),
            rhs: Box::new(Expr::IntLiteral { value: 1, suffix: None, span: span() }),
            span: span(),
        };
        assert!(wrapped.contains_call());
    }

    #[test]
    fn contains_call_false_for_plain_arithmetic() {
        let e = Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(Expr::Identifier { name: "x".into(), span: span() }),
            rhs: Box::new(Expr::IntLiteral { value: 1, suffix: None, span: span() }),
            span: span(),
        };
        assert!(!e.contains_call());
    }

    #[test]
    fn assign_op_binary_op_mapping() {
        assert_eq!(AssignOp::AddAssign.binary_op(), Some(BinaryOp::Add));
        assert_eq!(AssignOp::Assign.binary_op(), None);
        assert!(AssignOp::AddAssign.is_compound());
        assert!(!AssignOp::Assign.is_compound());
    }
}
