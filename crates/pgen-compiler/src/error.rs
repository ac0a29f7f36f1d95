//! Compiler driver errors.

use pgen_codegen::CodegenError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error("invalid scope input: {0}")]
    Scope(#[source] serde_json::Error),

    #[error("invalid job configuration: {0}")]
    Job(#[source] serde_json::Error),
}
