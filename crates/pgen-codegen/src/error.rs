//! Codegen error types.

use pgen_types::Span;
use thiserror::Error;

/// Errors that abort a generation job.
///
/// Generation is all-or-nothing: the first error stops the job and no
/// partial output is returned.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// A type or node that has no lowering rule in the Rust target.
    #[error("unsupported {construct}: {detail}")]
    Unsupported { construct: String, detail: String },

    /// The resolved input is inconsistent with itself.
    #[error("internal codegen error: {0}")]
    Internal(String),

    /// A declaration reference that is not in the scope.
    #[error("unresolved symbol: {0}")]
    UnresolvedSymbol(String),

    /// A machine whose start state is missing or not unique.
    #[error("machine {0} has no unique start state")]
    MissingStartState(String),

    /// Any of the above, tagged with the declaration being emitted.
    #[error("{source} (in {kind} {decl}{})", located(.span))]
    InDecl {
        kind: &'static str,
        decl: String,
        span: Span,
        #[source]
        source: Box<CodegenError>,
    },
}

impl CodegenError {
    pub fn unsupported(construct: impl Into<String>, detail: impl Into<String>) -> Self {
        CodegenError::Unsupported {
            construct: construct.into(),
            detail: detail.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        CodegenError::Internal(msg.into())
    }

    /// Attach the enclosing declaration. The innermost declaration wins.
    pub fn in_decl(self, kind: &'static str, decl: &str, span: Span) -> Self {
        match self {
            e @ CodegenError::InDecl { .. } => e,
            other => CodegenError::InDecl {
                kind,
                decl: decl.to_string(),
                span,
                source: Box::new(other),
            },
        }
    }

    /// The error with any declaration context stripped.
    pub fn root(&self) -> &CodegenError {
        match self {
            CodegenError::InDecl { source, .. } => source.root(),
            other => other,
        }
    }

    /// The declaration the error was raised in, if known.
    pub fn decl(&self) -> Option<&str> {
        match self {
            CodegenError::InDecl { decl, .. } => Some(decl),
            _ => None,
        }
    }

    /// Where that declaration starts, when upstream recorded it.
    pub fn span(&self) -> Option<Span> {
        match self {
            CodegenError::InDecl { span, .. } if !span.is_unknown() => Some(*span),
            _ => None,
        }
    }
}

fn located(span: &Span) -> String {
    if span.is_unknown() {
        String::new()
    } else {
        format!(" at {span}")
    }
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
