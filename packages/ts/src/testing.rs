//! In-memory fixture host used by unit tests across the workspace.
//!
//! Tests build a program programmatically: register types, attach classes
//! and call expressions to files, and queue the texts the "compiler" will
//! emit. Emission replays the queued texts through the write-file callback,
//! exactly like a real host binding would.

use crate::node::{
    CallExpr, ClassDecl, DecoratorNode, JsDocTag, MethodDecl, ParamDecl, SourceAnalysis,
    SourceFileMeta, Span,
};
use crate::program::{CompilerOptions, EmitResult, Program, WriteFileCallback};
use crate::type_checker::{
    AliasInfo, EnumMemberInfo, IndexKeyKind, IndexSignature, LiteralValue, PropertySite, TupleInfo,
    TypeChecker, TypeFlags, TypeRef,
};
use crate::Diagnostic;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

/// Structural description of one fixture type.
#[derive(Debug, Clone)]
pub enum FixtureType {
    Flag(TypeFlags),
    StringLit(String),
    NumberLit(f64),
    BoolLit(bool),
    Object {
        name: Option<String>,
        props: Vec<PropertySite>,
    },
    Array(TypeRef),
    Tuple {
        elements: Vec<TypeRef>,
        rest: Option<TypeRef>,
    },
    Union(Vec<TypeRef>),
    Intersection(Vec<TypeRef>),
    Enum {
        name: String,
        members: Vec<EnumMemberInfo>,
    },
    /// A named generic instantiation: brands (`Minimum<0>`) and wrappers
    /// (`Promise<T>`, `Observable<T>`, `AsyncIterableIterator<T>`).
    Generic {
        name: String,
        args: Vec<TypeRef>,
    },
    Record {
        key: IndexKeyKind,
        value: TypeRef,
    },
}

#[derive(Default)]
pub struct FixtureHost {
    pub options: CompilerOptions,
    root_names: Vec<String>,
    files: Vec<SourceFileMeta>,
    classes: HashMap<String, Vec<ClassDecl>>,
    calls: HashMap<String, Vec<CallExpr>>,
    decorator_docs: HashMap<String, Vec<JsDocTag>>,
    types: Vec<FixtureType>,
    type_files: HashMap<TypeRef, String>,
    prim_cache: HashMap<u32, TypeRef>,
    emit_outputs: Vec<(String, String)>,
    syntactic: Vec<Diagnostic>,
    semantic: Vec<Diagnostic>,
    emit_skipped: bool,
    pending_emit: bool,
    write_to_disk: bool,
    written: RefCell<Vec<(String, String)>>,
}

impl FixtureHost {
    pub fn new() -> Self {
        Self {
            pending_emit: true,
            ..Default::default()
        }
    }

    // --- Type construction ---

    pub fn add_type(&mut self, t: FixtureType) -> TypeRef {
        let r = TypeRef(self.types.len() as u64);
        self.types.push(t);
        r
    }

    fn prim(&mut self, flags: TypeFlags) -> TypeRef {
        if let Some(r) = self.prim_cache.get(&flags.0) {
            return *r;
        }
        let r = self.add_type(FixtureType::Flag(flags));
        self.prim_cache.insert(flags.0, r);
        r
    }

    pub fn string(&mut self) -> TypeRef {
        self.prim(TypeFlags::STRING)
    }

    pub fn number(&mut self) -> TypeRef {
        self.prim(TypeFlags::NUMBER)
    }

    pub fn boolean(&mut self) -> TypeRef {
        self.prim(TypeFlags::BOOLEAN)
    }

    pub fn bigint(&mut self) -> TypeRef {
        self.prim(TypeFlags::BIGINT)
    }

    pub fn any(&mut self) -> TypeRef {
        self.prim(TypeFlags::ANY)
    }

    pub fn unknown(&mut self) -> TypeRef {
        self.prim(TypeFlags::UNKNOWN)
    }

    pub fn undefined_t(&mut self) -> TypeRef {
        self.prim(TypeFlags::UNDEFINED)
    }

    pub fn null_t(&mut self) -> TypeRef {
        self.prim(TypeFlags::NULL)
    }

    pub fn void_t(&mut self) -> TypeRef {
        self.prim(TypeFlags::VOID)
    }

    pub fn never(&mut self) -> TypeRef {
        self.prim(TypeFlags::NEVER)
    }

    pub fn string_lit(&mut self, v: impl Into<String>) -> TypeRef {
        self.add_type(FixtureType::StringLit(v.into()))
    }

    pub fn number_lit(&mut self, v: f64) -> TypeRef {
        self.add_type(FixtureType::NumberLit(v))
    }

    pub fn object(&mut self, name: Option<&str>, props: Vec<PropertySite>) -> TypeRef {
        self.add_type(FixtureType::Object {
            name: name.map(str::to_string),
            props,
        })
    }

    /// Named object declared in `file` (drives the syntactic-error and
    /// transform include/exclude checks).
    pub fn object_in(&mut self, name: &str, file: &str, props: Vec<PropertySite>) -> TypeRef {
        let r = self.object(Some(name), props);
        self.type_files.insert(r, file.to_string());
        r
    }

    /// Swap an object's properties after creation. Lets tests build
    /// self-referential shapes: create the object, reference its handle,
    /// then fill in the real properties.
    pub fn replace_object_props(&mut self, ty: TypeRef, new_props: Vec<PropertySite>) {
        if let FixtureType::Object { props, .. } = &mut self.types[ty.0 as usize] {
            *props = new_props;
        }
    }

    pub fn array(&mut self, element: TypeRef) -> TypeRef {
        self.add_type(FixtureType::Array(element))
    }

    pub fn union(&mut self, members: Vec<TypeRef>) -> TypeRef {
        self.add_type(FixtureType::Union(members))
    }

    pub fn intersection(&mut self, members: Vec<TypeRef>) -> TypeRef {
        self.add_type(FixtureType::Intersection(members))
    }

    pub fn generic(&mut self, name: &str, args: Vec<TypeRef>) -> TypeRef {
        self.add_type(FixtureType::Generic {
            name: name.to_string(),
            args,
        })
    }

    pub fn brand(&mut self, name: &str) -> TypeRef {
        self.generic(name, Vec::new())
    }

    pub fn brand_num(&mut self, name: &str, arg: f64) -> TypeRef {
        let lit = self.number_lit(arg);
        self.generic(name, vec![lit])
    }

    pub fn brand_str(&mut self, name: &str, arg: &str) -> TypeRef {
        let lit = self.string_lit(arg);
        self.generic(name, vec![lit])
    }

    pub fn prop(name: &str, ty: TypeRef) -> PropertySite {
        PropertySite {
            name: name.to_string(),
            ty,
            optional: false,
            readonly: false,
            js_doc: Vec::new(),
        }
    }

    pub fn prop_opt(name: &str, ty: TypeRef) -> PropertySite {
        PropertySite {
            optional: true,
            ..Self::prop(name, ty)
        }
    }

    // --- File and class construction ---

    pub fn add_source_file(&mut self, file_name: &str) {
        self.root_names.push(file_name.to_string());
        self.files.push(SourceFileMeta {
            file_name: file_name.to_string(),
            is_declaration: file_name.ends_with(".d.ts"),
            has_syntax_errors: false,
        });
    }

    pub fn mark_syntax_errors(&mut self, file_name: &str) {
        if let Some(f) = self.files.iter_mut().find(|f| f.file_name == file_name) {
            f.has_syntax_errors = true;
        }
        self.syntactic
            .push(Diagnostic::error_at(file_name, 0, "Unexpected token."));
    }

    pub fn add_class(&mut self, file_name: &str, class: ClassDecl) {
        self.classes
            .entry(file_name.to_string())
            .or_default()
            .push(class);
    }

    pub fn add_call(&mut self, file_name: &str, call: CallExpr) {
        self.calls
            .entry(file_name.to_string())
            .or_default()
            .push(call);
    }

    pub fn set_decorator_doc(&mut self, decorator: &str, tags: Vec<JsDocTag>) {
        self.decorator_docs.insert(decorator.to_string(), tags);
    }

    pub fn add_semantic_error(&mut self, diag: Diagnostic) {
        self.semantic.push(diag);
    }

    // --- Emission control ---

    pub fn queue_emit(&mut self, path: &str, text: &str) {
        self.emit_outputs.push((path.to_string(), text.to_string()));
    }

    pub fn set_emit_skipped(&mut self, skipped: bool) {
        self.emit_skipped = skipped;
    }

    pub fn set_pending_emit(&mut self, pending: bool) {
        self.pending_emit = pending;
    }

    /// Write emitted texts (post-callback) to the real filesystem, for
    /// end-to-end tests running in a temp directory.
    pub fn set_write_to_disk(&mut self, enabled: bool) {
        self.write_to_disk = enabled;
    }

    /// The `(path, text)` pairs that reached "disk" in the last emit.
    pub fn written_files(&self) -> Vec<(String, String)> {
        self.written.borrow().clone()
    }

    pub fn written_text(&self, path: &str) -> Option<String> {
        self.written
            .borrow()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, t)| t.clone())
    }

    fn get(&self, ty: TypeRef) -> &FixtureType {
        &self.types[ty.0 as usize]
    }
}

// Convenience constructors for syntactic fixtures.

pub fn class_decl(name: &str) -> ClassDecl {
    ClassDecl {
        name: name.to_string(),
        decorators: Vec::new(),
        methods: Vec::new(),
        inside_function: false,
        span: Span::default(),
    }
}

pub fn method_decl(name: &str) -> MethodDecl {
    MethodDecl {
        name: name.to_string(),
        is_async: false,
        decorators: Vec::new(),
        params: Vec::new(),
        return_type: None,
        js_doc: Vec::new(),
        span: Span::default(),
    }
}

pub fn param_decl(name: &str, ty: TypeRef) -> ParamDecl {
    ParamDecl {
        name: name.to_string(),
        ty: Some(ty),
        optional: false,
        decorators: Vec::new(),
    }
}

pub fn decorator(name: &str) -> DecoratorNode {
    DecoratorNode::new(name)
}

impl TypeChecker for FixtureHost {
    fn type_flags(&self, ty: TypeRef) -> TypeFlags {
        match self.get(ty) {
            FixtureType::Flag(f) => *f,
            FixtureType::StringLit(_) => TypeFlags::STRING_LITERAL,
            FixtureType::NumberLit(_) => TypeFlags::NUMBER_LITERAL,
            FixtureType::BoolLit(_) => TypeFlags::BOOLEAN_LITERAL,
            FixtureType::Union(_) => TypeFlags::UNION,
            FixtureType::Intersection(_) => TypeFlags::INTERSECTION,
            FixtureType::Enum { .. } => TypeFlags::ENUM,
            _ => TypeFlags::OBJECT,
        }
    }

    fn type_name(&self, ty: TypeRef) -> Option<String> {
        match self.get(ty) {
            FixtureType::Object { name, .. } => name.clone(),
            FixtureType::Enum { name, .. } => Some(name.clone()),
            FixtureType::Generic { name, .. } => Some(name.clone()),
            _ => None,
        }
    }

    fn declaring_file(&self, ty: TypeRef) -> Option<String> {
        self.type_files.get(&ty).cloned()
    }

    fn alias_info(&self, ty: TypeRef) -> Option<AliasInfo> {
        match self.get(ty) {
            FixtureType::Generic { name, args } => Some(AliasInfo {
                name: name.clone(),
                type_args: args.clone(),
            }),
            _ => None,
        }
    }

    fn type_arguments(&self, ty: TypeRef) -> Vec<TypeRef> {
        match self.get(ty) {
            FixtureType::Generic { args, .. } => args.clone(),
            _ => Vec::new(),
        }
    }

    fn literal_value(&self, ty: TypeRef) -> Option<LiteralValue> {
        match self.get(ty) {
            FixtureType::StringLit(s) => Some(LiteralValue::String(s.clone())),
            FixtureType::NumberLit(n) => Some(LiteralValue::Number(*n)),
            FixtureType::BoolLit(b) => Some(LiteralValue::Boolean(*b)),
            _ => None,
        }
    }

    fn union_members(&self, ty: TypeRef) -> Vec<TypeRef> {
        match self.get(ty) {
            FixtureType::Union(members) => members.clone(),
            _ => Vec::new(),
        }
    }

    fn intersection_members(&self, ty: TypeRef) -> Vec<TypeRef> {
        match self.get(ty) {
            FixtureType::Intersection(members) => members.clone(),
            _ => Vec::new(),
        }
    }

    fn properties(&self, ty: TypeRef) -> Vec<PropertySite> {
        match self.get(ty) {
            FixtureType::Object { props, .. } => props.clone(),
            _ => Vec::new(),
        }
    }

    fn element_type(&self, ty: TypeRef) -> Option<TypeRef> {
        match self.get(ty) {
            FixtureType::Array(el) => Some(*el),
            _ => None,
        }
    }

    fn tuple_info(&self, ty: TypeRef) -> Option<TupleInfo> {
        match self.get(ty) {
            FixtureType::Tuple { elements, rest } => Some(TupleInfo {
                elements: elements.clone(),
                rest: *rest,
            }),
            _ => None,
        }
    }

    fn enum_members(&self, ty: TypeRef) -> Vec<EnumMemberInfo> {
        match self.get(ty) {
            FixtureType::Enum { members, .. } => members.clone(),
            _ => Vec::new(),
        }
    }

    fn index_signature(&self, ty: TypeRef) -> Option<IndexSignature> {
        match self.get(ty) {
            FixtureType::Record { key, value } => Some(IndexSignature {
                key: *key,
                value: *value,
            }),
            _ => None,
        }
    }

    fn string_repr(&self, ty: TypeRef) -> String {
        match self.get(ty) {
            FixtureType::Flag(f) => format!("type#{:#x}", f.0),
            FixtureType::StringLit(s) => format!("\"{}\"", s),
            FixtureType::NumberLit(n) => n.to_string(),
            FixtureType::BoolLit(b) => b.to_string(),
            FixtureType::Object { name, .. } => {
                name.clone().unwrap_or_else(|| "(anonymous)".to_string())
            }
            FixtureType::Enum { name, .. } => name.clone(),
            FixtureType::Generic { name, .. } => name.clone(),
            FixtureType::Array(_) => "Array".to_string(),
            FixtureType::Tuple { .. } => "tuple".to_string(),
            FixtureType::Union(_) => "union".to_string(),
            FixtureType::Intersection(_) => "intersection".to_string(),
            FixtureType::Record { .. } => "Record".to_string(),
        }
    }
}

impl SourceAnalysis for FixtureHost {
    fn top_level_classes(&self, file_name: &str) -> Vec<ClassDecl> {
        self.classes.get(file_name).cloned().unwrap_or_default()
    }

    fn call_expressions(&self, file_name: &str) -> Vec<CallExpr> {
        self.calls.get(file_name).cloned().unwrap_or_default()
    }

    fn decorator_js_doc(&self, decorator_name: &str) -> Vec<JsDocTag> {
        self.decorator_docs
            .get(decorator_name)
            .cloned()
            .unwrap_or_default()
    }
}

impl Program for FixtureHost {
    fn options(&self) -> &CompilerOptions {
        &self.options
    }

    fn root_file_names(&self) -> Vec<String> {
        self.root_names.clone()
    }

    fn source_files(&self) -> Vec<SourceFileMeta> {
        self.files.clone()
    }

    fn options_diagnostics(&self) -> Vec<Diagnostic> {
        Vec::new()
    }

    fn global_diagnostics(&self) -> Vec<Diagnostic> {
        Vec::new()
    }

    fn syntactic_diagnostics(&self) -> Vec<Diagnostic> {
        self.syntactic.clone()
    }

    fn semantic_diagnostics(&self) -> Vec<Diagnostic> {
        self.semantic.clone()
    }

    fn type_checker(&self) -> &dyn TypeChecker {
        self
    }

    fn analysis(&self) -> &dyn SourceAnalysis {
        self
    }

    fn has_pending_emit(&self) -> bool {
        self.pending_emit
    }

    fn emit(&self, write_file: &mut WriteFileCallback<'_>) -> EmitResult {
        self.written.borrow_mut().clear();
        if self.emit_skipped {
            return EmitResult {
                emit_skipped: true,
                ..Default::default()
            };
        }
        if !self.pending_emit {
            return EmitResult::default();
        }
        let mut emitted = Vec::new();
        for (path, text) in &self.emit_outputs {
            let transformed = write_file(path, text);
            if self.write_to_disk {
                if let Some(parent) = Path::new(path).parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                let _ = std::fs::write(path, &transformed);
            }
            self.written.borrow_mut().push((path.clone(), transformed));
            emitted.push(path.clone());
        }
        EmitResult {
            emit_skipped: false,
            emitted_files: emitted,
            diagnostics: Vec::new(),
        }
    }
}
