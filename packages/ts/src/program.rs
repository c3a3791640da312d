use crate::node::{SourceAnalysis, SourceFileMeta};
use crate::type_checker::TypeChecker;
use crate::Diagnostic;

/// The subset of compiler options the driver reads. Everything else passes
/// through to the host untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilerOptions {
    pub out_dir: Option<String>,
    pub root_dir: Option<String>,
    pub base_url: Option<String>,
    /// Path-alias patterns in declaration order (`"@app/*"` → targets).
    pub paths: Option<Vec<(String, Vec<String>)>>,
    pub no_emit_on_error: Option<bool>,
    pub declaration: Option<bool>,
    pub incremental: Option<bool>,
    pub ts_build_info_file: Option<String>,
    pub experimental_decorators: Option<bool>,
    pub exact_optional_property_types: Option<bool>,
    pub strict_null_checks: Option<bool>,
}

/// Result of driving the host's emitter.
#[derive(Debug, Clone, Default)]
pub struct EmitResult {
    /// True when the host refused to emit (errors with `noEmitOnError`).
    pub emit_skipped: bool,
    /// Output paths the host actually wrote this run. Empty on a warm
    /// incremental build with no changed inputs.
    pub emitted_files: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Per-file write interception: receives `(path, proposed_text)` and returns
/// the text that should reach the disk.
pub type WriteFileCallback<'a> = dyn FnMut(&str, &str) -> String + 'a;

/// A type-checked program, as produced by the host compiler.
pub trait Program {
    fn options(&self) -> &CompilerOptions;

    fn root_file_names(&self) -> Vec<String>;

    fn source_files(&self) -> Vec<SourceFileMeta>;

    fn options_diagnostics(&self) -> Vec<Diagnostic>;

    fn global_diagnostics(&self) -> Vec<Diagnostic>;

    fn syntactic_diagnostics(&self) -> Vec<Diagnostic>;

    fn semantic_diagnostics(&self) -> Vec<Diagnostic>;

    fn type_checker(&self) -> &dyn TypeChecker;

    fn analysis(&self) -> &dyn SourceAnalysis;

    /// Whether the host's incremental state says any source file requires
    /// re-emission. A warm rebuild with unchanged inputs reports false.
    fn has_pending_emit(&self) -> bool;

    /// Emit JavaScript, routing every file write through `write_file`.
    fn emit(&self, write_file: &mut WriteFileCallback<'_>) -> EmitResult;
}
