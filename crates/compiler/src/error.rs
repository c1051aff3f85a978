//! Aggregated error types
//!
//! Each pipeline stage has its own error enum; `CnxError` aggregates them
//! with `#[from]` conversions so `?` works end-to-end through the
//! orchestrator, mirroring `fuel-vm`'s `InterpreterError` (see DESIGN.md).
//! These are the *fatal* counterparts to warnings, which travel through
//! `DiagnosticSink` instead and never stop compilation.

use crate::diagnostics::{Diagnostic, ErrorCode, Severity, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0} at {1}")]
    UnexpectedToken(String, SourceSpan),
    #[error("unterminated string literal at {0}")]
    UnterminatedString(SourceSpan),
    #[error("invalid numeric literal `{0}` at {1}")]
    InvalidNumber(String, SourceSpan),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("overlapping bitmap fields in `{bitmap}`: {reason}")]
    OverlappingBitmapFields { bitmap: String, reason: String },
    #[error("unknown backing type `{ty}` for bitmap `{bitmap}`")]
    UnknownBitmapBackingType { bitmap: String, ty: String },
    #[error("duplicate value {value} for enum members `{first}` and `{second}` in `{enum_name}`")]
    DuplicateEnumValue {
        enum_name: String,
        first: String,
        second: String,
        value: i64,
    },
}

#[derive(Debug, Error)]
pub enum CodeGenError {
    #[error("[{code}] unqualified enum member `{member}`")]
    UnqualifiedEnumMember {
        code: ErrorCode,
        member: String,
        span: SourceSpan,
        suggestion: Option<String>,
    },
    #[error("[{code}] non-boolean do-while condition")]
    NonBooleanDoWhileCondition { code: ErrorCode, span: SourceSpan },
    #[error("[{code}] function call in condition")]
    FunctionCallInCondition { code: ErrorCode, span: SourceSpan },
    #[error("[{code}] unknown symbol `{name}`")]
    UnknownSymbol {
        code: ErrorCode,
        name: String,
        span: SourceSpan,
        suggestion: Option<String>,
    },
    #[error("[{code}] cross-scope private access to `{name}`")]
    CrossScopePrivateAccess {
        code: ErrorCode,
        name: String,
        span: SourceSpan,
    },
    #[error("[{code}] register `{name}` requires a `global.` prefix here")]
    MissingRegisterPrefix {
        code: ErrorCode,
        name: String,
        span: SourceSpan,
    },
    #[error("[{code}] bit index/width out of range for `{target}` ({detail})")]
    BitRangeOutOfBounds {
        code: ErrorCode,
        target: String,
        detail: String,
        span: SourceSpan,
    },
    #[error("[{code}] `critical` block may not contain `{kind}`")]
    CriticalBlockExit {
        code: ErrorCode,
        kind: String,
        span: SourceSpan,
    },
    #[error("[{code}] unknown type `{name}`")]
    UnknownType {
        code: ErrorCode,
        name: String,
        span: SourceSpan,
    },
    #[error("[{code}] incompatible assignment: {detail}")]
    IncompatibleAssignment {
        code: ErrorCode,
        detail: String,
        span: SourceSpan,
    },
    #[error("format error: {0}")]
    Format(#[from] std::fmt::Error),
}

impl CodeGenError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            CodeGenError::UnqualifiedEnumMember { code, .. }
            | CodeGenError::NonBooleanDoWhileCondition { code, .. }
            | CodeGenError::FunctionCallInCondition { code, .. }
            | CodeGenError::UnknownSymbol { code, .. }
            | CodeGenError::CrossScopePrivateAccess { code, .. }
            | CodeGenError::MissingRegisterPrefix { code, .. }
            | CodeGenError::BitRangeOutOfBounds { code, .. }
            | CodeGenError::CriticalBlockExit { code, .. }
            | CodeGenError::UnknownType { code, .. }
            | CodeGenError::IncompatibleAssignment { code, .. } => Some(*code),
            CodeGenError::Format(_) => None,
        }
    }

    pub fn span(&self) -> Option<&SourceSpan> {
        match self {
            CodeGenError::UnqualifiedEnumMember { span, .. }
            | CodeGenError::NonBooleanDoWhileCondition { span, .. }
            | CodeGenError::FunctionCallInCondition { span, .. }
            | CodeGenError::UnknownSymbol { span, .. }
            | CodeGenError::CrossScopePrivateAccess { span, .. }
            | CodeGenError::MissingRegisterPrefix { span, .. }
            | CodeGenError::BitRangeOutOfBounds { span, .. }
            | CodeGenError::CriticalBlockExit { span, .. }
            | CodeGenError::UnknownType { span, .. }
            | CodeGenError::IncompatibleAssignment { span, .. } => Some(span),
            CodeGenError::Format(_) => None,
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        let code = self.code().unwrap_or(ErrorCode::E0500);
        let span = self.span().cloned();
        let suggestion = match &self {
            CodeGenError::UnqualifiedEnumMember { suggestion, .. }
            | CodeGenError::UnknownSymbol { suggestion, .. } => suggestion.clone(),
            _ => None,
        };
        let mut d = Diagnostic {
            code,
            severity: Severity::Error,
            message: self.to_string(),
            span,
            hint: None,
        };
        if let Some(hint) = suggestion {
            d = d.with_hint(hint);
        }
        d
    }
}

#[derive(Debug, Error)]
pub enum HeaderGenError {
    #[error("format error: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Top-level error aggregating every stage, used by the orchestrator.
#[derive(Debug, Error)]
pub enum CnxError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Symbol(#[from] SymbolError),
    #[error(transparent)]
    CodeGen(#[from] CodeGenError),
    #[error(transparent)]
    HeaderGen(#[from] HeaderGenError),
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codegen_error_converts_to_diagnostic_with_code() {
        let err = CodeGenError::UnqualifiedEnumMember {
            code: ErrorCode::E0424,
            member: "ON".into(),
            span: SourceSpan::new("a.cnx", 10, 4),
            suggestion: Some("did you mean `EMode.ON`?".into()),
        };
        let diag = err.into_diagnostic();
        assert_eq!(diag.code, ErrorCode::E0424);
        assert_eq!(diag.severity, Severity::Error);
        assert!(diag.hint.is_some());
    }

    #[test]
    fn cnx_error_from_codegen_error() {
        let err: CnxError = CodeGenError::NonBooleanDoWhileCondition {
            code: ErrorCode::E0701,
            span: SourceSpan::unknown(),
        }
        .into();
        assert!(matches!(err, CnxError::CodeGen(_)));
    }
}
