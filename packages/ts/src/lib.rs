//! TypeScript-compatible interfaces for the tsnest build driver.
//!
//! This crate is the boundary through which the driver consumes the host
//! TypeScript compiler: project parsing, type checking, and JavaScript
//! emission. The driver never parses or checks TypeScript itself; a host
//! binding implements these traits and registers itself via [`host`].

use std::fmt;

pub mod host;
pub mod node;
pub mod program;
pub mod testing;
pub mod type_checker;

pub use host::*;
pub use node::*;
pub use program::*;
pub use type_checker::*;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptTarget {
    ES5,
    ES2015,
    ES2017,
    ES2020,
    ES2022,
    ESNext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    CommonJS,
    ES2015,
    ES2020,
    ES2022,
    ESNext,
    Node16,
    NodeNext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    Warning,
    Error,
    Suggestion,
    Message,
}

// --- Diagnostic structures ---

/// A diagnostic as reported by the host compiler (or produced by the driver
/// itself, using negative codes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub code: i32,
    pub message: String,
    pub file: Option<String>,
    pub start: Option<usize>,
    pub length: Option<usize>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            category: DiagnosticCategory::Error,
            code: -1,
            message: message.into(),
            file: None,
            start: None,
            length: None,
        }
    }

    pub fn error_at(file: impl Into<String>, start: usize, message: impl Into<String>) -> Self {
        Self {
            category: DiagnosticCategory::Error,
            code: -1,
            message: message.into(),
            file: Some(file.into()),
            start: Some(start),
            length: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            category: DiagnosticCategory::Warning,
            code: -1,
            message: message.into(),
            file: None,
            start: None,
            length: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let category = match self.category {
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Suggestion => "suggestion",
            DiagnosticCategory::Message => "message",
        };
        match (&self.file, self.start) {
            (Some(file), Some(start)) => {
                write!(f, "{} TS{}: {} ({}:{})", category, self.code, self.message, file, start)
            }
            (Some(file), None) => {
                write!(f, "{} TS{}: {} ({})", category, self.code, self.message, file)
            }
            _ => write!(f, "{} TS{}: {}", category, self.code, self.message),
        }
    }
}
