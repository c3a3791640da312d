//! tsnest compiler CLI.
//!
//! The build driver around the host TypeScript compiler: controller
//! analysis, marker extraction, companion generation, emit-time rewriting,
//! OpenAPI synthesis and the warm-rebuild cache.

pub use tsnest_compiler as compiler;

pub mod assets;
pub mod cache;
pub mod config;
pub mod controllers;
pub mod diagnostics;
pub mod logging;
pub mod main_entry;
pub mod manifest;
pub mod markers;
pub mod openapi;
pub mod perform_compile;
pub mod perform_watch;
pub mod rewriter;
pub mod sdk;

/// CLI version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
