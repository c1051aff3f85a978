//! Tokenizer for C-Next source
//!
//! Split out from `parser.rs` (the teacher keeps lexing and parsing in one
//! file; C-Next's larger grammar — typed numeric suffixes, arrow-spelled
//! assignment operators, template strings — earns its own module).

use crate::diagnostics::SourceSpan;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    IntLiteral { raw: String, suffix: Option<String> },
    FloatLiteral { raw: String, suffix: Option<String> },
    CharLiteral(char),
    StringLiteral(String),
    /// Raw parts of a template string: literal chunks interleaved with
    /// un-parsed `${...}` expression source, re-parsed by the parser.
    TemplateString(Vec<TemplatePartRaw>),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePartRaw {
    Literal(String),
    Expr(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: SourceSpan,
}

/// Longest-match-first punctuation table. Order matters: longer operators
/// must be checked before their prefixes.
const PUNCTUATION: &[&str] = &[
    "<<<-", ">><-", "&<-", "|<-", "^<-", "+<-", "-<-", "*<-", "/<-", "%<-", "<-", "<<=", ">>=",
    "||", "&&", "!=", "<=", ">=", "<<", ">>", "::", "->", "..",
    "(", ")", "{", "}", "[", "]", ",", ";", ":", ".", "+", "-", "*", "/", "%", "&", "|", "^", "~",
    "!", "<", ">", "=", "?",
];

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
    file: &'a Path,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, file: &'a Path) -> Self {
        Lexer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 0,
            col: 0,
            file,
        }
    }

    fn span(&self) -> SourceSpan {
        SourceSpan::new(self.file.to_path_buf(), self.line, self.col)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while self.peek().is_some() && self.peek() != Some(b'\n') {
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.advance();
                    self.advance();
                    while self.peek().is_some()
                        && !(self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/'))
                    {
                        self.advance();
                    }
                    self.advance();
                    self.advance();
                }
                // Preprocessor directives (`#include ...`) are not part of
                // the core grammar; the resolver extracts them directly
                // from raw source text (§4.1), so the lexer just skips them.
                Some(b'#') => {
                    while self.peek().is_some() && self.peek() != Some(b'\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start_span = self.span();
            let Some(b) = self.peek() else {
                tokens.push(Token { kind: TokenKind::Eof, span: start_span });
                break;
            };
            let kind = if b.is_ascii_alphabetic() || b == b'_' {
                self.lex_identifier()
            } else if b.is_ascii_digit() {
                self.lex_number()?
            } else if b == b'\'' {
                self.lex_char()?
            } else if b == b'"' {
                self.lex_string()?
            } else if b == b'`' {
                self.lex_template_string()?
            } else {
                self.lex_punct(start_span.clone())?
            };
            tokens.push(Token { kind, span: start_span });
        }
        Ok(tokens)
    }

    fn lex_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::Identifier(self.source[start..self.pos].to_string())
    }

    fn lex_number(&mut self) -> Result<TokenKind, String> {
        let start = self.pos;
        let is_float;
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            self.advance();
            self.advance();
            while matches!(self.peek(), Some(b) if b.is_ascii_hexdigit()) {
                self.advance();
            }
            is_float = false;
        } else if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'b') | Some(b'B')) {
            self.advance();
            self.advance();
            while matches!(self.peek(), Some(b'0') | Some(b'1') | Some(b'_')) {
                self.advance();
            }
            is_float = false;
        } else {
            while matches!(self.peek(), Some(b) if b.is_ascii_digit() || b == b'_') {
                self.advance();
            }
            if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b) if b.is_ascii_digit()) {
                self.advance();
                while matches!(self.peek(), Some(b) if b.is_ascii_digit() || b == b'_') {
                    self.advance();
                }
                is_float = true;
            } else {
                is_float = false;
            }
        }
        let raw = self.source[start..self.pos].to_string();
        let suffix = self.lex_optional_suffix();
        if is_float {
            Ok(TokenKind::FloatLiteral { raw, suffix })
        } else {
            Ok(TokenKind::IntLiteral { raw, suffix })
        }
    }

    fn lex_optional_suffix(&mut self) -> Option<String> {
        const SUFFIXES: &[&str] = &["u8", "i8", "u16", "i16", "u32", "i32", "u64", "i64", "f32", "f64"];
        let start = self.pos;
        if !matches!(self.peek(), Some(b) if b.is_ascii_alphabetic()) {
            return None;
        }
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric()) {
            self.advance();
        }
        let text = &self.source[start..self.pos];
        if SUFFIXES.contains(&text) {
            Some(text.to_string())
        } else {
            // Not a known suffix: rewind, it belongs to the next token.
            self.pos = start;
            None
        }
    }

    fn lex_char(&mut self) -> Result<TokenKind, String> {
        self.advance(); // opening quote
        let c = match self.advance() {
            Some(b'\\') => match self.advance() {
                Some(b'n') => '\n',
                Some(b't') => '\t',
                Some(b'0') => '\0',
                Some(b'\\') => '\\',
                Some(b'\'') => '\'',
                Some(other) => other as char,
                None => return Err("unterminated char literal".to_string()),
            },
            Some(b) => b as char,
            None => return Err("unterminated char literal".to_string()),
        };
        if self.advance() != Some(b'\'') {
            return Err("char literal must contain exactly one character".to_string());
        }
        Ok(TokenKind::CharLiteral(c))
    }

    fn lex_string(&mut self) -> Result<TokenKind, String> {
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(b'n') => s.push('\n'),
                    Some(b't') => s.push('\t'),
                    Some(b'"') => s.push('"'),
                    Some(b'\\') => s.push('\\'),
                    Some(other) => s.push(other as char),
                    None => return Err("unterminated string literal".to_string()),
                },
                Some(b) => s.push(b as char),
                None => return Err("unterminated string literal".to_string()),
            }
        }
        Ok(TokenKind::StringLiteral(s))
    }

    fn lex_template_string(&mut self) -> Result<TokenKind, String> {
        self.advance(); // opening backtick
        let mut parts = Vec::new();
        let mut literal = String::new();
        loop {
            match self.peek() {
                Some(b'`') => {
                    self.advance();
                    break;
                }
                Some(b'$') if self.peek_at(1) == Some(b'{') => {
                    if !literal.is_empty() {
                        parts.push(TemplatePartRaw::Literal(std::mem::take(&mut literal)));
                    }
                    self.advance();
                    self.advance();
                    let start = self.pos;
                    let mut depth = 1;
                    while depth > 0 {
                        match self.advance() {
                            Some(b'{') => depth += 1,
                            Some(b'}') => depth -= 1,
                            Some(_) => {}
                            None => return Err("unterminated template expression".to_string()),
                        }
                    }
                    let expr_src = self.source[start..self.pos - 1].to_string();
                    parts.push(TemplatePartRaw::Expr(expr_src));
                }
                Some(b) => {
                    literal.push(b as char);
                    self.advance();
                }
                None => return Err("unterminated template string".to_string()),
            }
        }
        if !literal.is_empty() {
            parts.push(TemplatePartRaw::Literal(literal));
        }
        Ok(TokenKind::TemplateString(parts))
    }

    fn lex_punct(&mut self, span: SourceSpan) -> Result<TokenKind, String> {
        for candidate in PUNCTUATION {
            if self.source[self.pos..].starts_with(candidate) {
                for _ in 0..candidate.len() {
                    self.advance();
                }
                return Ok(TokenKind::Punct(candidate));
            }
        }
        Err(format!("unexpected character at {span}"))
    }
}

pub fn tokenize(source: &str, file: &Path) -> Result<Vec<Token>, String> {
    Lexer::new(source, file).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn toks(src: &str) -> Vec<TokenKind> {
        tokenize(src, &PathBuf::from("t.cnx"))
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_typed_integer_suffix() {
        let kinds = toks("200u8");
        assert_eq!(
            kinds[0],
            TokenKind::IntLiteral { raw: "200".into(), suffix: Some("u8".into()) }
        );
    }

    #[test]
    fn lexes_arrow_assignment_operators() {
        let kinds = toks("x <- 1 +<- 2");
        assert!(kinds.contains(&TokenKind::Punct("<-")));
        assert!(kinds.contains(&TokenKind::Punct("+<-")));
    }

    #[test]
    fn lexes_hex_and_binary_literals() {
        let kinds = toks("0xFF 0b1010");
        assert_eq!(kinds[0], TokenKind::IntLiteral { raw: "0xFF".into(), suffix: None });
        assert_eq!(kinds[1], TokenKind::IntLiteral { raw: "0b1010".into(), suffix: None });
    }

    #[test]
    fn lexes_equality_vs_single_equals() {
        let kinds = toks("a = b != c");
        assert!(kinds.contains(&TokenKind::Punct("=")));
        assert!(kinds.contains(&TokenKind::Punct("!=")));
    }

    #[test]
    fn lexes_template_string_with_interpolation() {
        let kinds = toks("`hello ${name}!`");
        match &kinds[0] {
            TokenKind::TemplateString(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[1], TemplatePartRaw::Expr("name".into()));
            }
            other => panic!("expected template string, got {other:?}"),
        }
    }

    #[test]
    fn skips_line_and_block_comments() {
        let kinds = toks("// comment\nx /* inline */ y");
        assert_eq!(kinds.len(), 3); // x, y, Eof
    }
}
