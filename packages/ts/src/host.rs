//! Host-compiler linkage.
//!
//! A platform binding (installed separately) implements [`HostCompiler`] and
//! registers itself at startup. The driver only ever talks to the host
//! through this seam.

use crate::program::{CompilerOptions, Program};
use crate::Diagnostic;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

/// A parsed project: tsconfig plus the root file set, as resolved by the
/// host.
#[derive(Debug, Clone, Default)]
pub struct ParsedProject {
    pub project: PathBuf,
    pub root_names: Vec<String>,
    pub options: CompilerOptions,
    pub errors: Vec<Diagnostic>,
}

/// The host compiler's published entry points.
pub trait HostCompiler {
    /// Parse a tsconfig (file or containing directory) and apply
    /// command-line overrides.
    fn parse_project(&self, project: &Path, overrides: &CompilerOptions) -> ParsedProject;

    /// Create a checked program for a parsed project.
    fn create_program(&self, parsed: &ParsedProject) -> Box<dyn Program>;
}

static REGISTERED: OnceCell<Box<dyn HostCompiler + Send + Sync>> = OnceCell::new();

/// Called once by the host binding's initializer.
pub fn register_host(host: Box<dyn HostCompiler + Send + Sync>) -> Result<(), &'static str> {
    REGISTERED.set(host).map_err(|_| "host compiler already registered")
}

/// The registered host binding, if any.
pub fn registered_host() -> Option<&'static (dyn HostCompiler + Send + Sync)> {
    REGISTERED.get().map(|b| b.as_ref())
}
