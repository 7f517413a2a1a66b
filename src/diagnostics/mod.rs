//! Diagnostics reporting and printing

mod printer;

use crate::ast::lexer::{Token, TokenKind};
use crate::backend::{BackendError, BackendOp};
use crate::diagnostics::printer::DiagnosticsPrinter;
use crate::symbolic::OperatorKind;
use crate::text::TextSpan;

use std::cell::RefCell;
use std::rc::Rc;

/// Every way turning an expression into a compound can fail. All of them are fatal for the
/// compilation at hand.
#[derive(thiserror::Error, Debug)]
pub enum CompilationError {
    #[error("invalid expression: {message}")]
    Parse {
        message: String,
        span: Option<TextSpan>,
    },

    #[error("no graph node type is registered for `{kind}`")]
    UnmappedOperator { kind: OperatorKind },

    #[error("backend could not {operation} `{target}`: {source}")]
    Backend {
        operation: BackendOp,
        target: String,
        #[source]
        source: BackendError,
    },

    #[error("expression has {count} distinct nodes, the limit is {limit}")]
    ResourceLimitExceeded { count: usize, limit: usize },

    #[error("rollback after \"{cause}\" failed: {source}")]
    RollbackFailed {
        cause: Box<CompilationError>,
        #[source]
        source: BackendError,
    },
}

impl CompilationError {
    pub fn new_localized<S>(message: S, span: TextSpan) -> Self
    where
        S: ToString,
    {
        Self::Parse {
            message: message.to_string(),
            span: Some(span),
        }
    }

    pub fn new_generic<S>(message: S) -> Self
    where
        S: ToString,
    {
        Self::Parse {
            message: message.to_string(),
            span: None,
        }
    }

    pub fn new_unexpected_token(token: Token, expected: TokenKind) -> Self {
        let message = format!("Expected `{}` but found `{}`.", expected, token.kind);
        Self::new_localized(message, token.span)
    }

    pub fn backend<S>(operation: BackendOp, target: S, source: BackendError) -> Self
    where
        S: ToString,
    {
        Self::Backend {
            operation,
            target: target.to_string(),
            source,
        }
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

pub type CompilationResult<T> = Result<T, CompilationError>;

/// Reference to the [DiagnosticsBag] allowing interior mutability.
pub type DiagnosticsBagRef = Rc<RefCell<DiagnosticsBag>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A jotun diagnostic
#[derive(Debug, Clone)]
pub enum Diagnostic {
    General {
        severity: Severity,
        message: String,
    },
    Localized {
        severity: Severity,
        message: String,
        span: TextSpan,
    },
}

impl Diagnostic {
    fn from_compilation_error(e: &CompilationError) -> Self {
        match e {
            CompilationError::Parse {
                message,
                span: Some(span),
            } => Self::Localized {
                severity: Severity::Error,
                message: message.clone(),
                span: span.clone(),
            },
            other => Self::General {
                severity: Severity::Error,
                message: other.to_string(),
            },
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Diagnostic::General { severity, .. } => *severity,
            Diagnostic::Localized { severity, .. } => *severity,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Diagnostic::General { message, .. } => message,
            Diagnostic::Localized { message, .. } => message,
        }
    }
}

/// A bag holding all the diagnostics with utility functions for reporting and printing errors.
#[derive(Debug, Default)]
pub struct DiagnosticsBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticsBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_ref() -> DiagnosticsBagRef {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity() == severity)
            .count()
    }

    /// Checks whether any errors have been reported. Warnings do not count.
    pub fn has_errored(&self) -> bool {
        self.error_count() > 0
    }

    /// Report an error at a location in the source.
    pub fn report_error(&mut self, span: &TextSpan, message: &str) {
        self.diagnostics.push(Diagnostic::Localized {
            severity: Severity::Error,
            message: message.to_string(),
            span: span.clone(),
        })
    }

    pub fn report_warning<S>(&mut self, message: S)
    where
        S: ToString,
    {
        self.diagnostics.push(Diagnostic::General {
            severity: Severity::Warning,
            message: message.to_string(),
        })
    }

    pub fn report_compilation_error(&mut self, error: &CompilationError) {
        self.diagnostics
            .push(Diagnostic::from_compilation_error(error))
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Print the accumulated diagnostics.
    pub fn print(&self) {
        DiagnosticsPrinter::new(&self.diagnostics).print();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::SourceText;

    #[test]
    fn warnings_do_not_count_as_errors() {
        let mut bag = DiagnosticsBag::new();
        bag.report_warning("root mismatch");
        assert!(!bag.has_errored());
        assert_eq!(bag.warning_count(), 1);

        let text = Rc::new(SourceText::from_str("x +"));
        let error = CompilationError::new_localized("Unexpected end.", TextSpan::new(2, 3, text));
        bag.report_compilation_error(&error);
        assert!(bag.has_errored());
        assert!(matches!(bag.diagnostics()[1], Diagnostic::Localized { .. }));
    }

    #[test]
    fn non_parse_errors_become_general_diagnostics() {
        let mut bag = DiagnosticsBag::new();
        bag.report_compilation_error(&CompilationError::ResourceLimitExceeded {
            count: 10,
            limit: 5,
        });
        assert_eq!(
            bag.diagnostics()[0].message(),
            "expression has 10 distinct nodes, the limit is 5"
        );
    }
}
