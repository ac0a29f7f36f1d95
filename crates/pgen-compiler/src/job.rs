use serde::{Deserialize, Serialize};

use pgen_codegen::CodegenOptions;

/// Configuration of one compilation job, as handed over by the build tool.
///
/// Only `project_name` is required when loading from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationJob {
    pub project_name: String,
    /// Listed in the generated header. Empty means the project itself.
    #[serde(default)]
    pub project_dependencies: Vec<String>,
    #[serde(default = "default_runtime_crate")]
    pub runtime_crate: String,
    #[serde(default = "default_global_functions_module")]
    pub global_functions_module: String,
}

fn default_runtime_crate() -> String {
    CodegenOptions::default().runtime_crate
}

fn default_global_functions_module() -> String {
    CodegenOptions::default().global_functions_module
}

impl CompilationJob {
    pub fn new(project_name: impl Into<String>) -> Self {
        let options = CodegenOptions::new(project_name);
        Self {
            project_name: options.project_name,
            project_dependencies: options.project_dependencies,
            runtime_crate: options.runtime_crate,
            global_functions_module: options.global_functions_module,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Name of the file the job produces.
    pub fn output_file_name(&self) -> String {
        format!("{}.rs", self.project_name)
    }
}

impl From<CompilationJob> for CodegenOptions {
    fn from(job: CompilationJob) -> Self {
        CodegenOptions {
            project_name: job.project_name,
            project_dependencies: job.project_dependencies,
            runtime_crate: job.runtime_crate,
            global_functions_module: job.global_functions_module,
        }
    }
}
