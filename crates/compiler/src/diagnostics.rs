//! Structured diagnostics sink
//!
//! All diagnostics — errors and warnings alike — flow through here rather
//! than straight to stderr, so "source" mode (in-memory string → string)
//! can collect them without a terminal. Severity and the stable error-code
//! taxonomy of the error handling design are defined here; the `thiserror`
//! enums in `error.rs` carry an `ErrorCode` and convert into a `Diagnostic`
//! on their way into a sink.

use std::fmt;
use std::path::{Path, PathBuf};

/// A location within a source file. Lines/columns are 0-indexed for
/// editor/LSP-tooling compatibility, matching the convention of the
/// teacher's `SourceLocation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpan {
    pub file: PathBuf,
    pub line: usize,
    pub col: usize,
}

impl SourceSpan {
    pub fn new(file: impl Into<PathBuf>, line: usize, col: usize) -> Self {
        SourceSpan {
            file: file.into(),
            line,
            col,
        }
    }

    pub fn unknown() -> Self {
        SourceSpan {
            file: PathBuf::new(),
            line: 0,
            col: 0,
        }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line + 1, self.col + 1)
    }
}

/// Stable error/warning codes, per the error handling taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Unqualified enum member used in a non-enum context.
    E0424,
    /// Non-boolean `do-while` condition.
    E0701,
    /// Function call inside a loop/branch condition.
    E0702,
    /// Lexical error (malformed token).
    E0001,
    /// Parse error (unexpected token).
    E0002,
    /// Unknown symbol reference.
    E0410,
    /// Cross-scope private access.
    E0411,
    /// Missing `global.` register-access prefix.
    E0412,
    /// Out-of-range bit index or width.
    E0420,
    /// Overlapping bitmap fields.
    E0421,
    /// Non-integer target for bit access.
    E0422,
    /// `critical` block contains `return`/`break`.
    E0423,
    /// Unknown type in codegen.
    E0500,
    /// Incompatible assignment kind.
    E0501,
    /// Unresolved local include (warning).
    W0100,
    /// Circular include graph (warning).
    W0101,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::E0424 => "E0424",
            ErrorCode::E0701 => "E0701",
            ErrorCode::E0702 => "E0702",
            ErrorCode::E0001 => "E0001",
            ErrorCode::E0002 => "E0002",
            ErrorCode::E0410 => "E0410",
            ErrorCode::E0411 => "E0411",
            ErrorCode::E0412 => "E0412",
            ErrorCode::E0420 => "E0420",
            ErrorCode::E0421 => "E0421",
            ErrorCode::E0422 => "E0422",
            ErrorCode::E0423 => "E0423",
            ErrorCode::E0500 => "E0500",
            ErrorCode::E0501 => "E0501",
            ErrorCode::W0100 => "W0100",
            ErrorCode::W0101 => "W0101",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic: a code, a message, a location, and a severity.
/// Errors abort the file they occurred in; warnings never abort (§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    pub span: Option<SourceSpan>,
    /// "did you mean `X.Y`?"-style hint, when applicable.
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity: Severity::Error,
            message: message.into(),
            span: None,
            hint: None,
        }
    }

    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            severity: Severity::Warning,
            message: message.into(),
            span: None,
            hint: None,
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sev = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{sev}[{}]", self.code)?;
        if let Some(span) = &self.span {
            write!(f, " at {span}")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " ({hint})")?;
        }
        Ok(())
    }
}

/// Collects diagnostics emitted during a compilation run. Shared by the
/// resolver, symbol collector, and code generator; the orchestrator reads
/// it back after each stage.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        DiagnosticSink::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn warn_unresolved_include(&mut self, referencing_file: &Path, target: &str) {
        self.push(Diagnostic::warning(
            ErrorCode::W0100,
            format!("unresolved local include \"{target}\" referenced from {}", referencing_file.display()),
        ));
    }

    pub fn warn_cycle(&mut self, cycle_description: &str) {
        self.push(Diagnostic::warning(
            ErrorCode::W0101,
            format!("circular include graph: {cycle_description}"),
        ));
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn extend(&mut self, other: DiagnosticSink) {
        self.diagnostics.extend(other.diagnostics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_tracks_errors_separately_from_warnings() {
        let mut sink = DiagnosticSink::new();
        assert!(!sink.has_errors());
        sink.warn_cycle("a -> b -> a");
        assert!(!sink.has_errors());
        sink.push(Diagnostic::error(ErrorCode::E0424, "unqualified enum member `ON`").with_hint("did you mean `EMode.ON`?"));
        assert!(sink.has_errors());
        assert_eq!(sink.warnings().count(), 1);
        assert_eq!(sink.errors().count(), 1);
    }

    #[test]
    fn diagnostic_display_includes_code_and_hint() {
        let d = Diagnostic::error(ErrorCode::E0424, "bad member")
            .with_span(SourceSpan::new("a.cnx", 3, 1))
            .with_hint("did you mean `X.Y`?");
        let rendered = format!("{d}");
        assert!(rendered.contains("E0424"));
        assert!(rendered.contains("a.cnx:4:2"));
        assert!(rendered.contains("did you mean"));
    }
}
