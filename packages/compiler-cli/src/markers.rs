// Marker calls
//
// Generic functions from the runtime package (`validate<T>(x)` and
// friends) exist only to be recognized here and replaced by companion
// calls during rewriting. The runtime never sees a generic call.

use ts::{Program, Span};
use tsnest_compiler::TypeWalker;

/// Module the marker functions are imported from.
pub const RUNTIME_PACKAGE: &str = "@tsnest/runtime";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Validate,
    Assert,
    Is,
    Stringify,
    Schema,
}

impl MarkerKind {
    pub fn from_callee(name: &str) -> Option<Self> {
        Some(match name {
            "validate" => Self::Validate,
            "assert" => Self::Assert,
            "is" => Self::Is,
            "stringify" => Self::Stringify,
            "schema" => Self::Schema,
            _ => return None,
        })
    }

    /// The marker's callee identifier as written in the source.
    pub fn callee(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Assert => "assert",
            Self::Is => "is",
            Self::Stringify => "stringify",
            Self::Schema => "schema",
        }
    }
}

/// One recognized marker call site.
#[derive(Debug, Clone)]
pub struct MarkerCall {
    pub file: String,
    pub kind: MarkerKind,
    pub type_name: String,
    pub span: Span,
}

/// Scans every non-declaration source file for calls to the marker
/// functions and registers their type arguments. Calls whose type argument
/// has no registrable name are skipped; the user simply gets no
/// specialized code at that site.
pub fn extract_markers(program: &dyn Program, walker: &mut TypeWalker<'_>) -> Vec<MarkerCall> {
    let checker = program.type_checker();
    let analysis = program.analysis();
    let mut markers = Vec::new();
    for file in program.source_files() {
        if file.is_declaration || file.has_syntax_errors {
            continue;
        }
        for call in analysis.call_expressions(&file.file_name) {
            let Some(kind) = MarkerKind::from_callee(&call.callee) else {
                continue;
            };
            if call.callee_module.as_deref() != Some(RUNTIME_PACKAGE) {
                continue;
            }
            let Some(&ty) = call.type_args.first() else {
                continue;
            };
            let Some(name) = checker.type_name(ty) else {
                continue;
            };
            if checker.properties(ty).is_empty() {
                continue;
            }
            walker.walk_named(&name, ty);
            markers.push(MarkerCall {
                file: file.file_name.clone(),
                kind,
                type_name: name,
                span: call.span,
            });
        }
    }
    markers
}

#[cfg(test)]
mod test {
    use super::*;
    use ts::testing::FixtureHost;
    use ts::CallExpr;
    use tsnest_compiler::MetadataRegistry;

    fn call(callee: &str, module: Option<&str>, ty: Option<ts::TypeRef>) -> CallExpr {
        CallExpr {
            callee: callee.to_string(),
            callee_module: module.map(str::to_string),
            type_args: ty.into_iter().collect(),
            arg_text: "value".to_string(),
            span: Span::new(0, 0),
        }
    }

    #[test]
    fn recognizes_runtime_markers_and_registers_types() {
        let mut host = FixtureHost::new();
        host.add_source_file("/src/main.ts");
        let string = host.string();
        let dto = host.object_in("Payload", "/src/dto.ts", vec![FixtureHost::prop("s", string)]);
        host.add_call("/src/main.ts", call("validate", Some(RUNTIME_PACKAGE), Some(dto)));
        host.add_call("/src/main.ts", call("stringify", Some(RUNTIME_PACKAGE), Some(dto)));

        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(ts::Program::type_checker(&host), &mut registry);
        let markers = extract_markers(&host, &mut walker);
        drop(walker);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].kind, MarkerKind::Validate);
        assert_eq!(markers[0].type_name, "Payload");
        assert!(registry.contains("Payload"));
    }

    #[test]
    fn foreign_modules_and_unnamed_types_are_skipped() {
        let mut host = FixtureHost::new();
        host.add_source_file("/src/main.ts");
        let string = host.string();
        let named = host.object_in("Named", "/src/dto.ts", vec![FixtureHost::prop("s", string)]);
        let anon = host.object(None, vec![FixtureHost::prop("s", string)]);
        host.add_call("/src/main.ts", call("validate", Some("some-other-lib"), Some(named)));
        host.add_call("/src/main.ts", call("assert", Some(RUNTIME_PACKAGE), Some(anon)));
        host.add_call("/src/main.ts", call("assert", Some(RUNTIME_PACKAGE), None));

        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(ts::Program::type_checker(&host), &mut registry);
        let markers = extract_markers(&host, &mut walker);
        drop(walker);
        assert!(markers.is_empty());
        assert!(registry.is_empty());
    }
}
