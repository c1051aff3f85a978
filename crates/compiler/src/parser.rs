//! Recursive-descent parser for C-Next
//!
//! Consumes the token stream from `lexer.rs` and produces the AST of
//! `ast.rs`. Follows the precedence chain of §2: ternary → or → and →
//! equality → relational → bitwise or/xor/and → shift → additive →
//! multiplicative → unary → postfix → primary.

use crate::ast::*;
use crate::diagnostics::SourceSpan;
use crate::error::ParseError;
use crate::lexer::{tokenize, TemplatePartRaw, Token, TokenKind};
use crate::types::{ArrayDim, Primitive, Visibility};
use std::path::{Path, PathBuf};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file: PathBuf,
}

type PResult<T> = Result<T, ParseError>;

const MODIFIER_KEYWORDS: &[&str] = &["const", "volatile", "atomic", "clamp"];
const PRIMITIVE_KEYWORDS: &[&str] = &[
    "void", "bool", "u8", "i8", "u16", "i16", "u32", "i32", "u64", "i64", "f32", "f64",
];

impl Parser {
    pub fn new(source: &str, file: impl AsRef<Path>) -> PResult<Self> {
        let file = file.as_ref().to_path_buf();
        let tokens = tokenize(source, &file).map_err(|msg| {
            ParseError::UnexpectedToken(msg, SourceSpan::new(file.clone(), 0, 0))
        })?;
        Ok(Parser { tokens, pos: 0, file })
    }

    pub fn parse(&mut self) -> PResult<Program> {
        let mut decls = Vec::new();
        while !self.is_eof() {
            decls.push(self.parse_decl()?);
        }
        Ok(Program { decls })
    }

    // ------------------------------------------------------------------
    // Token stream helpers
    // ------------------------------------------------------------------

    fn is_eof(&self) -> bool {
        matches!(self.tokens[self.pos].kind, TokenKind::Eof)
    }

    fn span(&self) -> SourceSpan {
        self.tokens[self.pos].span.clone()
    }

    fn peek_ident(&self) -> Option<&str> {
        match &self.tokens[self.pos].kind {
            TokenKind::Identifier(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn check_keyword(&self, kw: &str) -> bool {
        self.peek_ident() == Some(kw)
    }

    fn check_punct(&self, p: &str) -> bool {
        matches!(&self.tokens[self.pos].kind, TokenKind::Punct(q) if *q == p)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if !self.is_eof() {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(&self, what: &str) -> ParseError {
        let tok = &self.tokens[self.pos];
        ParseError::UnexpectedToken(format!("expected {what}, found {:?}", tok.kind), tok.span.clone())
    }

    fn expect_punct(&mut self, p: &str) -> PResult<()> {
        if self.check_punct(p) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{p}`")))
        }
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.check_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_identifier(&mut self) -> PResult<String> {
        match &self.tokens[self.pos].kind {
            TokenKind::Identifier(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn expect_int_literal(&mut self) -> PResult<i64> {
        match self.tokens[self.pos].kind.clone() {
            TokenKind::IntLiteral { raw, .. } => {
                let span = self.span();
                self.advance();
                parse_int_literal(&raw).map_err(|_| ParseError::InvalidNumber(raw, span))
            }
            _ => Err(self.unexpected("integer literal")),
        }
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn parse_decl(&mut self) -> PResult<Decl> {
        if self.check_keyword("struct") {
            return Ok(Decl::Struct(self.parse_struct()?));
        }
        if self.check_keyword("enum") {
            return Ok(Decl::Enum(self.parse_enum()?));
        }
        if self.check_keyword("bitmap") {
            return Ok(Decl::Bitmap(self.parse_bitmap()?));
        }
        if self.check_keyword("register") {
            return Ok(Decl::Register(self.parse_register(Visibility::Public)?));
        }
        if self.check_keyword("scope") {
            return Ok(Decl::Scope(self.parse_scope()?));
        }
        if self.check_keyword("callback") {
            return Ok(Decl::Callback(self.parse_callback()?));
        }
        self.parse_var_or_function(None)
    }

    fn parse_struct(&mut self) -> PResult<StructDecl> {
        let span = self.span();
        self.advance(); // "struct"
        let name = self.expect_identifier()?;
        self.expect_punct("{")?;
        let mut fields = Vec::new();
        while !self.check_punct("}") {
            let fspan = self.span();
            let ty = self.parse_type_ref()?;
            let fname = self.expect_identifier()?;
            self.expect_punct(";")?;
            fields.push(FieldDecl { name: fname, ty, span: fspan });
        }
        self.expect_punct("}")?;
        Ok(StructDecl { name, fields, span })
    }

    fn parse_enum(&mut self) -> PResult<EnumDecl> {
        let span = self.span();
        self.advance(); // "enum"
        let name = self.expect_identifier()?;
        self.expect_punct("{")?;
        let mut members = Vec::new();
        let mut next_value = 0i64;
        while !self.check_punct("}") {
            let mspan = self.span();
            let mname = self.expect_identifier()?;
            let value = if self.eat_punct("=") {
                let negative = self.eat_punct("-");
                let v = self.expect_int_literal()?;
                if negative { -v } else { v }
            } else {
                next_value
            };
            next_value = value + 1;
            members.push(EnumMember { name: mname, value, span: mspan });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(EnumDecl { name, members, span })
    }

    fn parse_bitmap(&mut self) -> PResult<BitmapDecl> {
        let span = self.span();
        self.advance(); // "bitmap"
        let name = self.expect_identifier()?;
        self.expect_punct(":")?;
        let backing = self.parse_primitive_keyword()?;
        self.expect_punct("{")?;
        let mut fields = Vec::new();
        while !self.check_punct("}") {
            let fspan = self.span();
            let fname = self.expect_identifier()?;
            self.expect_punct("@")?;
            let offset = self.expect_int_literal()? as u32;
            self.expect_punct(":")?;
            let width = self.expect_int_literal()? as u32;
            fields.push(BitmapFieldDecl { name: fname, offset, width, span: fspan });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(BitmapDecl { name, backing, fields, span })
    }

    fn parse_register(&mut self, _outer_visibility: Visibility) -> PResult<RegisterDecl> {
        let span = self.span();
        self.advance(); // "register"
        let name = self.expect_identifier()?;
        self.expect_punct("@")?;
        let base_address = self.parse_array_dim()?;
        self.expect_punct("{")?;
        let mut members = Vec::new();
        while !self.check_punct("}") {
            let mspan = self.span();
            let visibility = if self.eat_keyword("public") {
                Visibility::Public
            } else if self.eat_keyword("private") {
                Visibility::Private
            } else {
                return Err(self.unexpected("`public` or `private`"));
            };
            let mname = self.expect_identifier()?;
            self.expect_punct("@")?;
            let offset = self.parse_array_dim()?;
            self.expect_punct(":")?;
            let c_type = self.parse_type_ref()?;
            let bitmap_type = if self.eat_keyword("as") {
                Some(self.expect_identifier()?)
            } else {
                None
            };
            self.expect_punct(";")?;
            members.push(RegisterMemberDecl {
                name: mname,
                offset,
                c_type,
                bitmap_type,
                visibility,
                span: mspan,
            });
        }
        self.expect_punct("}")?;
        Ok(RegisterDecl { name, base_address, members, span })
    }

    fn parse_callback(&mut self) -> PResult<CallbackDecl> {
        let span = self.span();
        self.advance(); // "callback"
        let name = self.expect_identifier()?;
        self.expect_punct("(")?;
        let params = self.parse_param_list()?;
        self.expect_punct(")")?;
        self.expect_punct("->")?;
        let return_type = self.parse_type_ref()?;
        self.expect_punct(";")?;
        Ok(CallbackDecl { name, params, return_type, span })
    }

    fn parse_scope(&mut self) -> PResult<ScopeDecl> {
        let span = self.span();
        self.advance(); // "scope"
        let name = self.expect_identifier()?;
        self.expect_punct("{")?;
        let mut members = Vec::new();
        while !self.check_punct("}") {
            let visibility = if self.eat_keyword("public") {
                Visibility::Public
            } else if self.eat_keyword("private") {
                Visibility::Private
            } else {
                return Err(self.unexpected("`public` or `private`"));
            };
            if self.check_keyword("register") {
                let mut reg = self.parse_register(visibility)?;
                // Scope registers don't carry their own visibility field in
                // the AST; member-level visibility inside is unaffected.
                let _ = &mut reg;
                members.push(ScopeMember::Register(reg));
                continue;
            }
            let decl = self.parse_var_or_function(Some(visibility))?;
            match decl {
                Decl::GlobalVar(v) => members.push(ScopeMember::Var(v)),
                Decl::Function(f) => members.push(ScopeMember::Function(f)),
                _ => unreachable!("parse_var_or_function only returns GlobalVar/Function"),
            }
        }
        self.expect_punct("}")?;
        Ok(ScopeDecl { name, members, span })
    }

    /// Shared by top-level globals/functions and scope members.
    fn parse_var_or_function(&mut self, visibility: Option<Visibility>) -> PResult<Decl> {
        let span = self.span();
        let modifiers = self.parse_modifiers();
        let ty = self.parse_type_ref()?;
        let name = self.expect_identifier()?;
        if self.check_punct("(") {
            self.advance();
            let params = self.parse_param_list()?;
            self.expect_punct(")")?;
            self.expect_punct("{")?;
            let body = self.parse_block_statements()?;
            self.expect_punct("}")?;
            return Ok(Decl::Function(FunctionDecl {
                name,
                params,
                return_type: ty,
                body,
                visibility,
                span,
            }));
        }
        let init = if self.eat_punct("<-") {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect_punct(";")?;
        Ok(Decl::GlobalVar(VarDecl {
            name,
            ty,
            modifiers,
            init,
            visibility,
            span,
        }))
    }

    fn parse_modifiers(&mut self) -> VarModifiers {
        let mut m = VarModifiers::default();
        loop {
            if self.eat_keyword("const") {
                m.is_const = true;
            } else if self.eat_keyword("volatile") {
                m.is_volatile = true;
            } else if self.eat_keyword("atomic") {
                m.is_atomic = true;
            } else if self.eat_keyword("clamp") {
                m.is_clamp = true;
            } else {
                break;
            }
        }
        m
    }

    fn parse_param_list(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.check_punct(")") {
            return Ok(params);
        }
        loop {
            let span = self.span();
            let ty = self.parse_type_ref()?;
            let name = self.expect_identifier()?;
            params.push(Param { name, ty, span });
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(params)
    }

    fn parse_primitive_keyword(&mut self) -> PResult<Primitive> {
        let ident = self.peek_ident().map(str::to_string);
        if let Some(ident) = ident {
            if let Some(p) = Primitive::from_suffix(&ident) {
                self.advance();
                return Ok(p);
            }
        }
        Err(self.unexpected("primitive type"))
    }

    fn parse_type_ref(&mut self) -> PResult<TypeRef> {
        let base = if self.check_keyword("string") {
            self.advance();
            if self.eat_punct("<") {
                let n = self.expect_int_literal()? as u64;
                self.expect_punct(">")?;
                TypeRef::BoundedString(n)
            } else {
                TypeRef::UnboundedString
            }
        } else if let Some(ident) = self.peek_ident() {
            if let Some(p) = Primitive::from_suffix(ident) {
                self.advance();
                TypeRef::Primitive(p)
            } else {
                let name = self.expect_identifier()?;
                TypeRef::Named(name)
            }
        } else {
            return Err(self.unexpected("type"));
        };

        let mut dims = Vec::new();
        while self.eat_punct("[") {
            let dim = self.parse_array_dim()?;
            self.expect_punct("]")?;
            dims.push(dim);
        }
        if dims.is_empty() {
            Ok(base)
        } else {
            Ok(TypeRef::Array { element: Box::new(base), dims })
        }
    }

    fn parse_array_dim(&mut self) -> PResult<ArrayDim> {
        if let Some(ident) = self.peek_ident() {
            if Primitive::from_suffix(ident).is_none() {
                let name = ident.to_string();
                self.advance();
                return Ok(ArrayDim::Macro(name));
            }
        }
        let n = self.expect_int_literal()? as u64;
        Ok(ArrayDim::Const(n))
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_block_statements(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.check_punct("}") {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        if self.check_keyword("if") {
            return self.parse_if();
        }
        if self.check_keyword("while") {
            return self.parse_while();
        }
        if self.check_keyword("do") {
            return self.parse_do_while();
        }
        if self.check_keyword("for") {
            return self.parse_for();
        }
        if self.check_keyword("switch") {
            return self.parse_switch();
        }
        if self.check_keyword("return") {
            let span = self.span();
            self.advance();
            let value = if self.check_punct(";") {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect_punct(";")?;
            return Ok(Stmt::Return { value, span });
        }
        if self.check_keyword("break") {
            let span = self.span();
            self.advance();
            self.expect_punct(";")?;
            return Ok(Stmt::Break { span });
        }
        if self.check_keyword("critical") {
            let span = self.span();
            self.advance();
            self.expect_punct("{")?;
            let body = self.parse_block_statements()?;
            self.expect_punct("}")?;
            return Ok(Stmt::Critical { body, span });
        }
        if self.is_decl_start() {
            let span = self.span();
            let modifiers = self.parse_modifiers();
            let ty = self.parse_type_ref()?;
            let name = self.expect_identifier()?;
            let init = if self.eat_punct("<-") {
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect_punct(";")?;
            return Ok(Stmt::VarDecl(VarDeclStmt {
                decl: VarDecl { name, ty, modifiers, init, visibility: None, span },
            }));
        }
        self.parse_assign_or_expr_stmt()
    }

    /// Lookahead to distinguish a local variable declaration (`u32 x <- 0;`)
    /// from an assignment/expression statement starting with an identifier.
    fn is_decl_start(&self) -> bool {
        if MODIFIER_KEYWORDS.iter().any(|kw| self.check_keyword(kw)) {
            return true;
        }
        if self.check_keyword("string") {
            return true;
        }
        match self.peek_ident() {
            Some(ident) if PRIMITIVE_KEYWORDS.contains(&ident) => true,
            Some(ident) => {
                // `Name x ...` where the next-next token is an identifier
                // (the variable name) means this is a declaration using a
                // named (struct/enum/bitmap/callback) type.
                matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::Identifier(_)))
                    && ident.chars().next().is_some_and(|c| c.is_uppercase())
            }
            None => false,
        }
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let span = self.span();
        self.advance(); // "if"
        self.expect_punct("(")?;
        let cond = self.parse_expr()?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;
        let then_branch = self.parse_block_statements()?;
        self.expect_punct("}")?;
        let else_branch = if self.eat_keyword("else") {
            if self.check_keyword("if") {
                Some(vec![self.parse_if()?])
            } else {
                self.expect_punct("{")?;
                let stmts = self.parse_block_statements()?;
                self.expect_punct("}")?;
                Some(stmts)
            }
        } else {
            None
        };
        Ok(Stmt::If { cond, then_branch, else_branch, span })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let span = self.span();
        self.advance(); // "while"
        self.expect_punct("(")?;
        let cond = self.parse_expr()?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;
        let body = self.parse_block_statements()?;
        self.expect_punct("}")?;
        Ok(Stmt::While { cond, body, span })
    }

    fn parse_do_while(&mut self) -> PResult<Stmt> {
        let span = self.span();
        self.advance(); // "do"
        self.expect_punct("{")?;
        let body = self.parse_block_statements()?;
        self.expect_punct("}")?;
        if !self.eat_keyword("while") {
            return Err(self.unexpected("`while`"));
        }
        self.expect_punct("(")?;
        let cond = self.parse_expr()?;
        self.expect_punct(")")?;
        self.expect_punct(";")?;
        Ok(Stmt::DoWhile { body, cond, span })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let span = self.span();
        self.advance(); // "for"
        self.expect_punct("(")?;
        let init = if self.check_punct(";") {
            None
        } else {
            Some(Box::new(self.parse_for_clause_stmt()?))
        };
        self.expect_punct(";")?;
        let cond = if self.check_punct(";") {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect_punct(";")?;
        let update = if self.check_punct(")") {
            None
        } else {
            Some(Box::new(self.parse_for_clause_stmt()?))
        };
        self.expect_punct(")")?;
        self.expect_punct("{")?;
        let body = self.parse_block_statements()?;
        self.expect_punct("}")?;
        Ok(Stmt::For { init, cond, update, body, span })
    }

    /// A `for` init/update clause: like a statement but without its own
    /// trailing `;` (the `for` grammar supplies the separators).
    fn parse_for_clause_stmt(&mut self) -> PResult<Stmt> {
        let span = self.span();
        if self.is_decl_start() {
            let modifiers = self.parse_modifiers();
            let ty = self.parse_type_ref()?;
            let name = self.expect_identifier()?;
            let init = if self.eat_punct("<-") {
                Some(self.parse_expr()?)
            } else {
                None
            };
            return Ok(Stmt::VarDecl(VarDeclStmt {
                decl: VarDecl { name, ty, modifiers, init, visibility: None, span },
            }));
        }
        let target = self.parse_postfix_expr()?;
        let op = self.parse_assign_op()?;
        let value = self.parse_expr()?;
        Ok(Stmt::Assign(AssignStmt { target, op, value, span }))
    }

    fn parse_switch(&mut self) -> PResult<Stmt> {
        let span = self.span();
        self.advance(); // "switch"
        self.expect_punct("(")?;
        let discriminant = self.parse_expr()?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;
        let mut cases = Vec::new();
        let mut default = None;
        while !self.check_punct("}") {
            if self.eat_keyword("default") {
                self.expect_punct(":")?;
                self.expect_punct("{")?;
                let body = self.parse_block_statements()?;
                self.expect_punct("}")?;
                default = Some(body);
                continue;
            }
            let cspan = self.span();
            if !self.eat_keyword("case") {
                return Err(self.unexpected("`case` or `default`"));
            }
            let mut labels = vec![self.parse_case_label()?];
            while self.eat_punct("||") {
                labels.push(self.parse_case_label()?);
            }
            self.expect_punct(":")?;
            self.expect_punct("{")?;
            let body = self.parse_block_statements()?;
            self.expect_punct("}")?;
            cases.push(SwitchCase { labels, body, span: cspan });
        }
        self.expect_punct("}")?;
        Ok(Stmt::Switch { discriminant, cases, default, span })
    }

    fn parse_case_label(&mut self) -> PResult<CaseLabel> {
        match self.tokens[self.pos].kind.clone() {
            TokenKind::Identifier(_) => Ok(CaseLabel::Identifier(self.expect_identifier()?)),
            TokenKind::IntLiteral { raw, suffix } => {
                let span = self.span();
                self.advance();
                if raw.starts_with("0b") || raw.starts_with("0B") {
                    let value = parse_int_literal(&raw)
                        .map_err(|_| ParseError::InvalidNumber(raw.clone(), span))?;
                    Ok(CaseLabel::BinLiteral { raw, value, suffix })
                } else {
                    let value = parse_int_literal(&raw)
                        .map_err(|_| ParseError::InvalidNumber(raw, span))?;
                    Ok(CaseLabel::IntLiteral(value))
                }
            }
            TokenKind::CharLiteral(c) => {
                self.advance();
                Ok(CaseLabel::Char(c))
            }
            _ => Err(self.unexpected("case label")),
        }
    }

    fn parse_assign_or_expr_stmt(&mut self) -> PResult<Stmt> {
        let span = self.span();
        let expr = self.parse_postfix_expr()?;
        if let Ok(op) = self.peek_assign_op() {
            let op = op;
            self.consume_assign_op();
            let value = self.parse_expr()?;
            self.expect_punct(";")?;
            return Ok(Stmt::Assign(AssignStmt { target: expr, op, value, span }));
        }
        self.expect_punct(";")?;
        Ok(Stmt::Expr(expr))
    }

    fn peek_assign_op(&self) -> PResult<AssignOp> {
        let p = match &self.tokens[self.pos].kind {
            TokenKind::Punct(p) => *p,
            _ => return Err(self.unexpected("assignment operator")),
        };
        Ok(match p {
            "<-" => AssignOp::Assign,
            "+<-" => AssignOp::AddAssign,
            "-<-" => AssignOp::SubAssign,
            "*<-" => AssignOp::MulAssign,
            "/<-" => AssignOp::DivAssign,
            "%<-" => AssignOp::ModAssign,
            "&<-" => AssignOp::AndAssign,
            "|<-" => AssignOp::OrAssign,
            "^<-" => AssignOp::XorAssign,
            "<<<-" => AssignOp::ShlAssign,
            ">><-" => AssignOp::ShrAssign,
            _ => return Err(self.unexpected("assignment operator")),
        })
    }

    fn parse_assign_op(&mut self) -> PResult<AssignOp> {
        let op = self.peek_assign_op()?;
        self.consume_assign_op();
        Ok(op)
    }

    fn consume_assign_op(&mut self) {
        self.advance();
    }

    // ------------------------------------------------------------------
    // Expressions (precedence chain)
    // ------------------------------------------------------------------

    pub fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> PResult<Expr> {
        let span = self.span();
        let cond = self.parse_or()?;
        if self.eat_punct("?") {
            let then_expr = self.parse_expr()?;
            self.expect_punct(":")?;
            let else_expr = self.parse_expr()?;
            return Ok(Expr::Ternary {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
                span,
            });
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let span = self.span();
        let mut lhs = self.parse_and()?;
        while self.eat_punct("||") {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary { op: BinaryOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs), span: span.clone() };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let span = self.span();
        let mut lhs = self.parse_equality()?;
        while self.eat_punct("&&") {
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary { op: BinaryOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs), span: span.clone() };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let span = self.span();
        let mut lhs = self.parse_relational()?;
        loop {
            let op = if self.eat_punct("=") {
                BinaryOp::Eq
            } else if self.eat_punct("!=") {
                BinaryOp::Ne
            } else {
                break;
            };
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span: span.clone() };
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> PResult<Expr> {
        let span = self.span();
        let mut lhs = self.parse_bitwise()?;
        loop {
            let op = if self.eat_punct("<=") {
                BinaryOp::Le
            } else if self.eat_punct(">=") {
                BinaryOp::Ge
            } else if self.eat_punct("<") {
                BinaryOp::Lt
            } else if self.eat_punct(">") {
                BinaryOp::Gt
            } else {
                break;
            };
            let rhs = self.parse_bitwise()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span: span.clone() };
        }
        Ok(lhs)
    }

    /// Bitwise or/xor/and share one precedence tier (§2).
    fn parse_bitwise(&mut self) -> PResult<Expr> {
        let span = self.span();
        let mut lhs = self.parse_shift()?;
        loop {
            let op = if self.eat_punct("|") {
                BinaryOp::BitOr
            } else if self.eat_punct("^") {
                BinaryOp::BitXor
            } else if self.eat_punct("&") {
                BinaryOp::BitAnd
            } else {
                break;
            };
            let rhs = self.parse_shift()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span: span.clone() };
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> PResult<Expr> {
        let span = self.span();
        let mut lhs = self.parse_additive()?;
        loop {
            let op = if self.eat_punct("<<") {
                BinaryOp::Shl
            } else if self.eat_punct(">>") {
                BinaryOp::Shr
            } else {
                break;
            };
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span: span.clone() };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let span = self.span();
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = if self.eat_punct("+") {
                BinaryOp::Add
            } else if self.eat_punct("-") {
                BinaryOp::Sub
            } else {
                break;
            };
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span: span.clone() };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let span = self.span();
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.eat_punct("*") {
                BinaryOp::Mul
            } else if self.eat_punct("/") {
                BinaryOp::Div
            } else if self.eat_punct("%") {
                BinaryOp::Mod
            } else {
                break;
            };
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span: span.clone() };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let span = self.span();
        let op = if self.eat_punct("-") {
            Some(UnaryOp::Neg)
        } else if self.eat_punct("!") {
            Some(UnaryOp::Not)
        } else if self.eat_punct("~") {
            Some(UnaryOp::BitNot)
        } else {
            None
        };
        if let Some(op) = op {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary { op, expr: Box::new(expr), span });
        }
        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            let span = self.span();
            if self.eat_punct(".") {
                let name = self.expect_identifier()?;
                expr = Expr::Member { base: Box::new(expr), name, span };
            } else if self.eat_punct("(") {
                let args = self.parse_arg_list()?;
                self.expect_punct(")")?;
                expr = Expr::Call { callee: Box::new(expr), args, span };
            } else if self.eat_punct("[") {
                let mut args = vec![self.parse_expr()?];
                if self.eat_punct(",") {
                    args.push(self.parse_expr()?);
                }
                self.expect_punct("]")?;
                expr = Expr::Index { base: Box::new(expr), args, span };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_arg_list(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.check_punct(")") {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let span = self.span();
        match self.tokens[self.pos].kind.clone() {
            TokenKind::IntLiteral { raw, suffix } => {
                self.advance();
                let value = parse_int_literal(&raw)
                    .map_err(|_| ParseError::InvalidNumber(raw.clone(), span.clone()))?;
                let suffix = suffix.as_deref().and_then(Primitive::from_suffix);
                Ok(Expr::IntLiteral { value, suffix, span })
            }
            TokenKind::FloatLiteral { raw, suffix } => {
                self.advance();
                let value: f64 = raw
                    .parse()
                    .map_err(|_| ParseError::InvalidNumber(raw.clone(), span.clone()))?;
                let suffix = suffix.as_deref().and_then(Primitive::from_suffix);
                Ok(Expr::FloatLiteral { value, suffix, span })
            }
            TokenKind::CharLiteral(c) => {
                self.advance();
                Ok(Expr::CharLiteral { value: c, span })
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                Ok(Expr::StringLiteral { value: s, span })
            }
            TokenKind::TemplateString(raw_parts) => {
                self.advance();
                let mut parts = Vec::with_capacity(raw_parts.len());
                for part in raw_parts {
                    match part {
                        TemplatePartRaw::Literal(s) => parts.push(TemplatePart::Literal(s)),
                        TemplatePartRaw::Expr(src) => {
                            let mut sub = Parser::new(&src, self.file.clone())?;
                            let expr = sub.parse_expr()?;
                            parts.push(TemplatePart::Expr(expr));
                        }
                    }
                }
                Ok(Expr::TemplateString { parts, span })
            }
            TokenKind::Identifier(name) => {
                if name == "true" {
                    self.advance();
                    return Ok(Expr::BoolLiteral { value: true, span });
                }
                if name == "false" {
                    self.advance();
                    return Ok(Expr::BoolLiteral { value: false, span });
                }
                self.advance();
                Ok(Expr::Identifier { name, span })
            }
            TokenKind::Punct("(") => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}

/// Parses a decimal, hex (`0x`), or binary (`0b`) integer literal, ignoring
/// `_` digit-group separators.
fn parse_int_literal(raw: &str) -> Result<i64, std::num::ParseIntError> {
    let cleaned: String = raw.chars().filter(|c| *c != '_').collect();
    if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = cleaned.strip_prefix("0b").or_else(|| cleaned.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2)
    } else {
        cleaned.parse::<i64>()
    }
}

pub fn parse_source(source: &str, file: impl AsRef<Path>) -> PResult<Program> {
    Parser::new(source, file)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bit_assignment() {
        let prog = parse_source("void main() { u8 flags <- 0; flags[3] <- true; }", "t.cnx").unwrap();
        assert_eq!(prog.decls.len(), 1);
        match &prog.decls[0] {
            Decl::Function(f) => assert_eq!(f.body.len(), 2),
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn parses_bitmap_declaration() {
        let prog = parse_source(
            "bitmap Flags : u8 { Running @ 0 : 1, Mode @ 1 : 2 }",
            "t.cnx",
        )
        .unwrap();
        match &prog.decls[0] {
            Decl::Bitmap(b) => {
                assert_eq!(b.name, "Flags");
                assert_eq!(b.fields.len(), 2);
                assert_eq!(b.fields[1].offset, 1);
                assert_eq!(b.fields[1].width, 2);
            }
            _ => panic!("expected bitmap"),
        }
    }

    #[test]
    fn parses_enum_with_explicit_and_implicit_values() {
        let prog = parse_source("enum EMode { OFF = 0, ON, AUTO = 5 }", "t.cnx").unwrap();
        match &prog.decls[0] {
            Decl::Enum(e) => {
                assert_eq!(e.members[0].value, 0);
                assert_eq!(e.members[1].value, 1);
                assert_eq!(e.members[2].value, 5);
            }
            _ => panic!("expected enum"),
        }
    }

    #[test]
    fn parses_switch_with_fallthrough_and_default() {
        let src = r#"
            void f(EMode m) {
                switch (m) {
                    case OFF : { return; }
                    case ON || AUTO : { return; }
                }
            }
        "#;
        let prog = parse_source(src, "t.cnx").unwrap();
        match &prog.decls[0] {
            Decl::Function(f) => match &f.body[0] {
                Stmt::Switch { cases, default, .. } => {
                    assert_eq!(cases.len(), 2);
                    assert_eq!(cases[1].labels.len(), 2);
                    assert!(default.is_none());
                }
                _ => panic!("expected switch"),
            },
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn parses_do_while_and_rejects_nothing_itself() {
        let prog = parse_source("void f() { do { x <- 1; } while (x); }", "t.cnx").unwrap();
        match &prog.decls[0] {
            Decl::Function(f) => assert!(matches!(f.body[0], Stmt::DoWhile { .. })),
            _ => panic!(),
        }
    }

    #[test]
    fn parses_critical_block() {
        let prog = parse_source("void f() { critical { x <- 1; } }", "t.cnx").unwrap();
        match &prog.decls[0] {
            Decl::Function(f) => assert!(matches!(f.body[0], Stmt::Critical { .. })),
            _ => panic!(),
        }
    }

    #[test]
    fn parses_register_with_bitmap_overlay() {
        let src = "register GPIOA @ 0x40020000 { public MODER @ 0x00 : u32 as ModeBits; }";
        let prog = parse_source(src, "t.cnx").unwrap();
        match &prog.decls[0] {
            Decl::Register(r) => {
                assert_eq!(r.members[0].bitmap_type.as_deref(), Some("ModeBits"));
            }
            _ => panic!("expected register"),
        }
    }

    #[test]
    fn parses_scope_with_visibility() {
        let src = "scope Counter { private u32 value <- 0; public u32 get() { return value; } }";
        let prog = parse_source(src, "t.cnx").unwrap();
        match &prog.decls[0] {
            Decl::Scope(s) => {
                assert_eq!(s.members.len(), 2);
                assert_eq!(s.members[0].visibility(), Visibility::Private);
                assert_eq!(s.members[1].visibility(), Visibility::Public);
            }
            _ => panic!("expected scope"),
        }
    }

    #[test]
    fn parses_template_string() {
        let prog = parse_source(r#"void f() { string<16> s <- `hi ${x}`; }"#, "t.cnx").unwrap();
        match &prog.decls[0] {
            Decl::Function(f) => match &f.body[0] {
                Stmt::VarDecl(v) => {
                    assert!(matches!(v.decl.init, Some(Expr::TemplateString { .. })));
                }
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn operator_precedence_additive_before_shift() {
        // `1 + 2 << 3` should parse as `(1 + 2) << 3`.
        let prog = parse_source("void f() { x <- 1 + 2 << 3; }", "t.cnx").unwrap();
        match &prog.decls[0] {
            Decl::Function(f) => match &f.body[0] {
                Stmt::Assign(a) => match &a.value {
                    Expr::Binary { op: BinaryOp::Shl, lhs, .. } => {
                        assert!(matches!(**lhs, Expr::Binary { op: BinaryOp::Add, .. }));
                    }
                    other => panic!("expected shl at top, got {other:?}"),
                },
                _ => panic!(),
            },
            _ => panic!(),
        }
    }
}
