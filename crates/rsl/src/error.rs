//! Error codes and the error policy sink used by every compiler stage.
//!
//! Errors are categorized, counted, and reported through an [`ErrorPolicy`];
//! the three compiler stages each accumulate a local error count and a
//! nonzero count at a stage boundary aborts compilation with a stage-level
//! summary error.

use std::fmt;

use strum::{Display, FromRepr, IntoStaticStr};

/// Stable numeric error identifiers surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum ErrorCode {
    /// Opening a shader file failed.
    OpeningFileFailed = 1,
    /// Reading a shader file failed.
    ReadingFileFailed,
    /// An undefined symbol was found while parsing a shader.
    UndefinedSymbol,
    /// A syntax error occurred while parsing a shader.
    SyntaxError,
    /// Parsing a shader failed.
    ParsingFailed,
    /// A semantic error occurred while analyzing a shader.
    SemanticError,
    /// Semantic analysis of a shader failed.
    SemanticAnalysisFailed,
    /// An error occurred while generating code.
    CodeGenerationError,
    /// Code generation for a shader failed.
    CodeGenerationFailed,
    /// A memory allocation failed.
    OutOfMemory,
    /// An unknown color space was passed to `ctransform()` or used in a
    /// typecast expression.
    UnknownColorSpace,
    /// A display mode was requested that the target does not support.
    InvalidDisplayMode,
}

/// A single reported diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Sink that receives `(code, formatted message)` pairs from the compiler
/// stages and runtime host callouts.
pub trait ErrorPolicy {
    /// Reports one error.
    fn error(&mut self, code: ErrorCode, message: &str);

    /// The total number of errors reported so far.
    fn total_errors(&self) -> usize;
}

/// Counts errors without recording them.
#[derive(Debug, Default)]
pub struct SilentErrorPolicy {
    errors: usize,
}

impl ErrorPolicy for SilentErrorPolicy {
    fn error(&mut self, _code: ErrorCode, _message: &str) {
        self.errors += 1;
    }

    fn total_errors(&self) -> usize {
        self.errors
    }
}

/// Records every diagnostic; used by tests and the command line driver.
#[derive(Debug, Default)]
pub struct CollectingErrorPolicy {
    diagnostics: Vec<Diagnostic>,
}

impl CollectingErrorPolicy {
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// True if any diagnostic carries the given code.
    #[must_use]
    pub fn contains(&self, code: ErrorCode) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }
}

impl ErrorPolicy for CollectingErrorPolicy {
    fn error(&mut self, code: ErrorCode, message: &str) {
        self.diagnostics.push(Diagnostic {
            code,
            message: message.to_owned(),
        });
    }

    fn total_errors(&self) -> usize {
        self.diagnostics.len()
    }
}

/// Failure returned from the compile boundary.
///
/// Carries the stage-level summary code; the per-diagnostic detail went to
/// the [`ErrorPolicy`] the caller supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileError {
    pub code: ErrorCode,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compilation failed: {}", self.code)
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ErrorCode::OpeningFileFailed as u8, 1);
        assert_eq!(ErrorCode::SemanticError as u8, 6);
        assert_eq!(ErrorCode::InvalidDisplayMode as u8, 12);
        assert_eq!(ErrorCode::from_repr(4), Some(ErrorCode::SyntaxError));
    }

    #[test]
    fn collecting_policy_records_messages() {
        let mut policy = CollectingErrorPolicy::default();
        policy.error(ErrorCode::SemanticError, "(3): unrecognized symbol 'foo'");
        assert_eq!(policy.total_errors(), 1);
        assert!(policy.contains(ErrorCode::SemanticError));
        assert_eq!(
            policy.diagnostics()[0].to_string(),
            "semantic-error: (3): unrecognized symbol 'foo'"
        );
    }
}
