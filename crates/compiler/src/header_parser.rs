//! C/C++ header parser
//!
//! Produces an abstract symbol record from a native `.h`/`.hpp` file: enough
//! to let the symbol collector and code generator know a name exists and
//! roughly what kind of thing it is, without a full C/C++ grammar. Headers
//! this compiler generated itself (recognised by `GENERATED_MARKER` on the
//! first non-blank line) are skipped, since their symbols already live in
//! the C-Next symbol tables.

use std::path::Path;

/// First-non-blank-line marker written by the header generator (`header_gen.rs`).
pub const GENERATED_MARKER: &str = "// Generated by cnextc";

#[derive(Debug, Clone, PartialEq)]
pub enum HeaderSymbol {
    Function { name: String, return_type: String, params: Vec<String> },
    Variable { name: String, ty: String },
    Struct { name: String },
    Class { name: String },
    Enum { name: String },
    Typedef { alias: String, underlying: String },
    Namespace { name: String },
    /// A type referenced but whose definition wasn't found in this header
    /// (forward-declared or otherwise opaque).
    Opaque { name: String },
}

impl HeaderSymbol {
    pub fn name(&self) -> &str {
        match self {
            HeaderSymbol::Function { name, .. }
            | HeaderSymbol::Variable { name, .. }
            | HeaderSymbol::Struct { name }
            | HeaderSymbol::Class { name }
            | HeaderSymbol::Enum { name }
            | HeaderSymbol::Namespace { name }
            | HeaderSymbol::Opaque { name } => name,
            HeaderSymbol::Typedef { alias, .. } => alias,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderSymbols {
    pub symbols: Vec<HeaderSymbol>,
    /// True when this header was recognised as generator output and its
    /// body was skipped (§4.1: still eligible for the dependency graph).
    pub is_generated: bool,
}

/// Parses a header's top-level declarations. Not a full C/C++ grammar:
/// template bodies, macros, and function bodies are skipped wholesale by
/// brace-depth tracking; only the declaration shape at depth 0 is classified.
pub fn parse_header(source: &str, _path: &Path) -> HeaderSymbols {
    if is_generated_header(source) {
        return HeaderSymbols { symbols: Vec::new(), is_generated: true };
    }

    let stripped = strip_comments(source);
    let chunks = split_top_level_declarations(&stripped);
    let mut symbols = Vec::new();
    for chunk in chunks {
        if let Some(sym) = classify_declaration(&chunk) {
            symbols.push(sym);
        }
    }
    HeaderSymbols { symbols, is_generated: false }
}

pub fn is_generated_header(source: &str) -> bool {
    source
        .lines()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.trim_start().starts_with(GENERATED_MARKER))
        .unwrap_or(false)
}

/// Removes `//` and `/* */` comments, replacing them with spaces so token
/// boundaries and byte offsets used elsewhere stay stable.
fn strip_comments(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                if bytes[i] == b'\n' {
                    out.push('\n');
                }
                i += 1;
            }
            i += 2;
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    out
}

/// Splits source into top-level chunks, each ending at a `;` or a balanced
/// `{ ... }` seen at brace depth 0. Preprocessor lines (`#...`) are dropped;
/// they don't participate in symbol classification.
fn split_top_level_declarations(source: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut paren_depth = 0i32;

    for line in source.lines() {
        if depth == 0 && paren_depth == 0 && line.trim_start().starts_with('#') {
            continue;
        }
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => depth -= 1,
                '(' => paren_depth += 1,
                ')' => paren_depth -= 1,
                _ => {}
            }
            current.push(ch);
            if ch == ';' && depth == 0 {
                chunks.push(std::mem::take(&mut current));
            } else if ch == '}' && depth == 0 {
                current.push(';'); // normalize so the classifier sees one trailing terminator
                chunks.push(std::mem::take(&mut current));
            }
        }
        current.push(' ');
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

fn classify_declaration(chunk: &str) -> Option<HeaderSymbol> {
    let text = chunk.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(rest) = strip_keyword(text, "namespace") {
        let name = first_identifier(rest)?;
        return Some(HeaderSymbol::Namespace { name });
    }

    if let Some(rest) = strip_keyword(text, "typedef") {
        return classify_typedef(rest);
    }

    if let Some(rest) = strip_keyword(text, "struct") {
        if let Some(name) = first_identifier(rest) {
            return Some(HeaderSymbol::Struct { name });
        }
        return None;
    }

    if let Some(rest) = strip_keyword(text, "class") {
        if let Some(name) = first_identifier(rest) {
            return Some(HeaderSymbol::Class { name });
        }
        return None;
    }

    if let Some(rest) = strip_keyword(text, "enum") {
        let rest = strip_keyword(rest, "class").unwrap_or(rest);
        if let Some(name) = first_identifier(rest) {
            return Some(HeaderSymbol::Enum { name });
        }
        return None;
    }

    if let Some(rest) = strip_keyword(text, "extern") {
        let rest = rest.trim_start().strip_prefix("\"C\"").unwrap_or(rest);
        let rest = rest.trim().trim_start_matches('{').trim();
        if rest.is_empty() {
            return None;
        }
        return classify_signature(rest).or_else(|| classify_variable(rest));
    }

    classify_signature(text)
}

fn classify_typedef(rest: &str) -> Option<HeaderSymbol> {
    let body = rest.trim_end_matches(';').trim();
    // `typedef struct { ... } Name;` already collapsed the brace body into
    // one chunk by split_top_level_declarations; the alias is the last
    // identifier before the terminator.
    let alias = last_identifier(body)?;
    let underlying = body.rsplit_once(|c: char| c.is_whitespace() || c == '}')
        .map(|(head, _)| head.trim().to_string())
        .unwrap_or_default();
    Some(HeaderSymbol::Typedef { alias, underlying })
}

/// `RetType name(params);` — a function prototype.
fn classify_signature(text: &str) -> Option<HeaderSymbol> {
    let text = text.trim_end_matches(';').trim();
    let paren_start = text.find('(')?;
    let paren_end = text.rfind(')')?;
    if paren_end < paren_start {
        return None;
    }
    let head = text[..paren_start].trim();
    let name = last_identifier(head)?;
    let return_type = head
        .strip_suffix(&name)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    if return_type.is_empty() {
        return None;
    }
    let raw_params = text[paren_start + 1..paren_end].trim();
    let params = if raw_params.is_empty() || raw_params == "void" {
        Vec::new()
    } else {
        raw_params.split(',').map(|p| p.trim().to_string()).collect()
    };
    Some(HeaderSymbol::Function { name, return_type, params })
}

/// `Type name;` — a variable declaration (only reached after stripping `extern`).
fn classify_variable(text: &str) -> Option<HeaderSymbol> {
    let text = text.trim_end_matches(';').trim();
    if text.is_empty() || text.contains('(') {
        return None;
    }
    let name = last_identifier(text)?;
    let ty = text.strip_suffix(&name)?.trim().to_string();
    if ty.is_empty() {
        return None;
    }
    Some(HeaderSymbol::Variable { name, ty })
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let trimmed = text.trim_start();
    let rest = trimmed.strip_prefix(keyword)?;
    if rest.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
        return None; // matched a longer identifier, e.g. "structural"
    }
    Some(rest)
}

fn first_identifier(text: &str) -> Option<String> {
    let trimmed = text.trim_start();
    let end = trimmed
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    let ident = &trimmed[..end];
    if ident.is_empty() { None } else { Some(ident.to_string()) }
}

fn last_identifier(text: &str) -> Option<String> {
    let trimmed = text.trim_end_matches(|c: char| c.is_whitespace() || c == ';' || c == '*' || c == '&');
    let start = trimmed
        .char_indices()
        .rev()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, _)| i + 1)
        .unwrap_or(0);
    let ident = &trimmed[start..];
    if ident.is_empty() || ident.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        None
    } else {
        Some(ident.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(src: &str) -> HeaderSymbols {
        parse_header(src, &PathBuf::from("t.h"))
    }

    #[test]
    fn skips_generated_headers() {
        let src = "// Generated by cnextc\nvoid foo(void);\n";
        let result = parse(src);
        assert!(result.is_generated);
        assert!(result.symbols.is_empty());
    }

    #[test]
    fn parses_function_prototype() {
        let result = parse("int add(int a, int b);\n");
        assert_eq!(result.symbols.len(), 1);
        match &result.symbols[0] {
            HeaderSymbol::Function { name, return_type, params } => {
                assert_eq!(name, "add");
                assert_eq!(return_type, "int");
                assert_eq!(params.len(), 2);
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn parses_extern_variable() {
        let result = parse("extern volatile uint32_t gpio_state;\n");
        match &result.symbols[0] {
            HeaderSymbol::Variable { name, ty } => {
                assert_eq!(name, "gpio_state");
                assert!(ty.contains("volatile"));
            }
            other => panic!("expected variable, got {other:?}"),
        }
    }

    #[test]
    fn parses_struct_and_class_and_enum() {
        let result = parse("struct Point { int x; int y; };\nclass Widget { int w; };\nenum Mode { OFF, ON };\n");
        let names: Vec<&str> = result.symbols.iter().map(HeaderSymbol::name).collect();
        assert!(names.contains(&"Point"));
        assert!(names.contains(&"Widget"));
        assert!(names.contains(&"Mode"));
    }

    #[test]
    fn parses_namespace() {
        let result = parse("namespace drivers { void init(void); }\n");
        assert!(result.symbols.iter().any(|s| matches!(s, HeaderSymbol::Namespace { name } if name == "drivers")));
    }

    #[test]
    fn parses_extern_c_block_contents() {
        let result = parse("extern \"C\" {\nvoid c_entry(void);\n}\n");
        assert!(result.symbols.iter().any(|s| s.name() == "c_entry"));
    }

    #[test]
    fn ignores_preprocessor_lines() {
        let result = parse("#ifndef FOO_H\n#define FOO_H\nvoid foo(void);\n#endif\n");
        assert_eq!(result.symbols.len(), 1);
        assert_eq!(result.symbols[0].name(), "foo");
    }

    #[test]
    fn strips_comments_before_classification() {
        let result = parse("/* comment */ void foo(void); // trailing\n");
        assert_eq!(result.symbols.len(), 1);
    }
}
