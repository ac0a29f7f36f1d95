//! P Rust backend driver: orchestrates one compilation job.
//!
//! ```text
//! resolved scope (JSON) + CompilationJob → pgen-codegen → <project_name>.rs
//! ```
//!
//! [`compile`] returns the generated file or the first error. [`compile_to_result`]
//! and [`compile_json`] always return a serializable [`CompileResult`] for
//! callers that report over a process boundary.

mod error;
mod job;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use pgen_codegen::{generate, CodegenError};
use pgen_types::ast::Scope;
use pgen_types::Span;

pub use error::CompileError;
pub use job::CompilationJob;

/// One generated source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledFile {
    pub name: String,
    pub contents: String,
}

/// Why a job failed, in a form that survives serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileDiagnostic {
    /// `unsupported`, `internal`, `unresolved_symbol`, `missing_start_state`,
    /// `invalid_scope` or `invalid_job`.
    pub kind: String,
    pub message: String,
    /// The declaration being emitted when generation failed.
    pub decl: Option<String>,
    #[serde(default)]
    pub span: Option<Span>,
}

impl From<&CompileError> for CompileDiagnostic {
    fn from(err: &CompileError) -> Self {
        let (kind, decl, span) = match err {
            CompileError::Codegen(e) => {
                let kind = match e.root() {
                    CodegenError::Unsupported { .. } => "unsupported",
                    CodegenError::UnresolvedSymbol(_) => "unresolved_symbol",
                    CodegenError::MissingStartState(_) => "missing_start_state",
                    CodegenError::Internal(_) | CodegenError::InDecl { .. } => "internal",
                };
                (kind, e.decl().map(str::to_string), e.span())
            }
            CompileError::Scope(_) => ("invalid_scope", None, None),
            CompileError::Job(_) => ("invalid_job", None, None),
        };
        CompileDiagnostic {
            kind: kind.to_string(),
            message: err.to_string(),
            decl,
            span,
        }
    }
}

/// Outcome of a job. All-or-nothing: `files` is empty whenever `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResult {
    pub success: bool,
    pub files: Vec<CompiledFile>,
    pub error: Option<CompileDiagnostic>,
    /// SHA-256 of the generated file, lowercase hex.
    pub output_hash: Option<String>,
}

impl CompileResult {
    fn failed(err: &CompileError) -> Self {
        CompileResult {
            success: false,
            files: Vec::new(),
            error: Some(err.into()),
            output_hash: None,
        }
    }
}

/// Generate the file for `scope`.
pub fn compile(scope: &Scope, job: &CompilationJob) -> Result<CompiledFile, CompileError> {
    debug!(
        "compiling project {} ({} declarations)",
        job.project_name,
        scope.decls.len()
    );
    let contents = generate(scope, job.clone().into())?;
    let file = CompiledFile {
        name: job.output_file_name(),
        contents,
    };
    info!("generated {} ({} bytes)", file.name, file.contents.len());
    Ok(file)
}

/// [`compile`], packaged as a [`CompileResult`].
pub fn compile_to_result(scope: &Scope, job: &CompilationJob) -> CompileResult {
    match compile(scope, job) {
        Ok(file) => {
            let output_hash = fingerprint(&file.contents);
            CompileResult {
                success: true,
                files: vec![file],
                error: None,
                output_hash: Some(output_hash),
            }
        }
        Err(err) => {
            warn!("compilation of {} failed: {err}", job.project_name);
            CompileResult::failed(&err)
        }
    }
}

/// Run a job from its JSON inputs: a serialized [`Scope`] and a
/// [`CompilationJob`].
pub fn compile_json(scope_json: &str, job_json: &str) -> CompileResult {
    let inputs = load_scope(scope_json).and_then(|scope| {
        let job = CompilationJob::from_json(job_json).map_err(CompileError::Job)?;
        Ok((scope, job))
    });
    match inputs {
        Ok((scope, job)) => compile_to_result(&scope, &job),
        Err(err) => {
            warn!("rejected compilation input: {err}");
            CompileResult::failed(&err)
        }
    }
}

pub fn load_scope(json: &str) -> Result<Scope, CompileError> {
    serde_json::from_str(json).map_err(CompileError::Scope)
}

/// Lowercase hex SHA-256 of `contents`.
pub fn fingerprint(contents: &str) -> String {
    let digest = Sha256::digest(contents.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
