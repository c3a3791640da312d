//! Syntactic views over source files.
//!
//! Decorator analysis is purely syntactic: the host binding materializes
//! these owned records from its AST, and the driver never evaluates
//! decorator arguments.

use crate::type_checker::TypeRef;

/// Byte range within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A JSDoc tag (`@minimum 0` → name `minimum`, text `0`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsDocTag {
    pub name: String,
    pub text: String,
}

impl JsDocTag {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// A decorator argument, restricted to the literal forms the analyzer
/// accepts. Anything else is reported as [`DecoratorArg::NonLiteral`] and
/// disqualifies the route or controller.
#[derive(Debug, Clone, PartialEq)]
pub enum DecoratorArg {
    Str(String),
    Num(f64),
    /// Object literal with string-valued properties (`{ path: "users" }`).
    Object(Vec<(String, String)>),
    NonLiteral,
}

#[derive(Debug, Clone)]
pub struct DecoratorNode {
    pub name: String,
    pub args: Vec<DecoratorArg>,
    pub type_args: Vec<TypeRef>,
}

impl DecoratorNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            type_args: Vec::new(),
        }
    }

    pub fn first_string_arg(&self) -> Option<&str> {
        match self.args.first() {
            Some(DecoratorArg::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn first_number_arg(&self) -> Option<f64> {
        match self.args.first() {
            Some(DecoratorArg::Num(n)) => Some(*n),
            _ => None,
        }
    }

    /// Looks up `key` in a first-argument object literal.
    pub fn object_prop(&self, key: &str) -> Option<&str> {
        match self.args.first() {
            Some(DecoratorArg::Object(props)) => props
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn has_non_literal_arg(&self) -> bool {
        self.args.iter().any(|a| matches!(a, DecoratorArg::NonLiteral))
    }
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub optional: bool,
    pub decorators: Vec<DecoratorNode>,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub is_async: bool,
    pub decorators: Vec<DecoratorNode>,
    pub params: Vec<ParamDecl>,
    pub return_type: Option<TypeRef>,
    pub js_doc: Vec<JsDocTag>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub decorators: Vec<DecoratorNode>,
    pub methods: Vec<MethodDecl>,
    /// True when the class is nested inside a function body (a factory),
    /// which makes it invisible to static route analysis.
    pub inside_function: bool,
    pub span: Span,
}

/// A call expression whose callee resolved to an imported identifier.
#[derive(Debug, Clone)]
pub struct CallExpr {
    pub callee: String,
    /// Module specifier the callee was imported from, when resolvable.
    pub callee_module: Option<String>,
    pub type_args: Vec<TypeRef>,
    pub arg_text: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SourceFileMeta {
    pub file_name: String,
    pub is_declaration: bool,
    pub has_syntax_errors: bool,
}

/// Syntactic queries over the program's source files, answered by the host
/// binding from its AST.
pub trait SourceAnalysis {
    /// Top-level class declarations of a file, with decorators, methods and
    /// parameters materialized.
    fn top_level_classes(&self, file_name: &str) -> Vec<ClassDecl>;

    /// Call expressions of a file whose callee is an imported identifier,
    /// in source order.
    fn call_expressions(&self, file_name: &str) -> Vec<CallExpr>;

    /// JSDoc tags on the declaration of a decorator function, looked up by
    /// the decorator's imported name.
    fn decorator_js_doc(&self, decorator_name: &str) -> Vec<JsDocTag>;
}
