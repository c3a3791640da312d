//! The emit-time rewriter.
//!
//! Installed as the host's write-file callback: every emitted file passes
//! through [`Rewriter::process`] before the bytes leave the process. All
//! state it reads is frozen before emission begins; a failure on one file
//! passes the original text through with a warning and never aborts the
//! build.

mod alias;
mod controller_rewrite;
mod marker_rewrite;
mod scan;

pub use alias::{relative_specifier, AliasResolver, ExistsFn};
pub use marker_rewrite::REWRITE_SENTINEL;

use crate::controllers::{Controller, ParamCategory};
use crate::markers::MarkerCall;
use std::collections::HashMap;
use tsnest_compiler::{Metadata, Primitive};

pub(crate) struct RewriteCtx<'a> {
    pub companion_dir: &'a str,
    pub runtime_package: &'a str,
}

#[derive(Debug, Clone)]
pub struct ScalarCoercion {
    pub var: String,
    pub key: String,
    pub boolean: bool,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct MethodRewrite {
    pub name: String,
    pub is_async: bool,
    /// `(parameter identifier, type name)` assertions, in parameter order.
    pub asserts: Vec<(String, String)>,
    pub coercions: Vec<ScalarCoercion>,
    pub return_serialize: Option<(String, bool)>,
    pub sse_events: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ControllerRewrite {
    pub class_name: String,
    pub methods: Vec<MethodRewrite>,
    pub json_routes: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FilePlan {
    pub controllers: Vec<ControllerRewrite>,
}

/// Derives per-source-file rewrite plans from the controller model.
pub fn build_file_plans(controllers: &[Controller]) -> HashMap<String, FilePlan> {
    let mut plans: HashMap<String, FilePlan> = HashMap::new();
    for c in controllers {
        let mut methods = Vec::new();
        let mut json_routes = Vec::new();
        for route in &c.routes {
            let mut asserts = Vec::new();
            let mut coercions = Vec::new();
            for p in &route.params {
                if p.is_whole_object() {
                    if let Some(type_name) = &p.type_name {
                        asserts.push((p.var_name.clone(), type_name.clone()));
                    }
                    continue;
                }
                if p.key.is_empty()
                    || !matches!(p.category, ParamCategory::Param | ParamCategory::Query)
                {
                    continue;
                }
                match &p.meta {
                    Some(Metadata::Primitive { primitive, .. })
                        if matches!(primitive, Primitive::Number | Primitive::Boolean) =>
                    {
                        coercions.push(ScalarCoercion {
                            var: p.var_name.clone(),
                            key: p.key.clone(),
                            boolean: *primitive == Primitive::Boolean,
                            required: p.required,
                        });
                    }
                    _ => {}
                }
            }
            let return_serialize = if route.sse || route.uses_raw_response {
                None
            } else {
                route
                    .return_type_name
                    .clone()
                    .map(|n| (n, route.returns_array))
            };
            if return_serialize.is_some() {
                json_routes.push(route.method_name.clone());
            }
            methods.push(MethodRewrite {
                name: route.method_name.clone(),
                is_async: route.is_async,
                asserts,
                coercions,
                return_serialize,
                sse_events: route.sse_events.clone(),
            });
        }
        plans
            .entry(c.file.clone())
            .or_default()
            .controllers
            .push(ControllerRewrite {
                class_name: c.name.clone(),
                methods,
                json_routes,
            });
    }
    plans
}

/// Expected output path of a source file (`rootDir` → `outDir`, `.ts`/
/// `.tsx` → `.js`).
pub fn output_path_for(source: &str, root_dir: &str, out_dir: &str) -> String {
    let root = root_dir.trim_end_matches('/');
    let rel = source
        .strip_prefix(root)
        .map(|r| r.trim_start_matches('/'))
        .unwrap_or(source);
    let rel = rel
        .strip_suffix(".tsx")
        .or_else(|| rel.strip_suffix(".ts"))
        .map(|stem| format!("{}.js", stem))
        .unwrap_or_else(|| rel.to_string());
    format!("{}/{}", out_dir.trim_end_matches('/'), rel)
}

pub struct Rewriter {
    alias: Option<AliasResolver>,
    /// Keyed by expected output path.
    plans: HashMap<String, FilePlan>,
    markers: HashMap<String, Vec<MarkerCall>>,
    companion_dir: String,
    runtime_package: String,
    warnings: Vec<String>,
}

impl Rewriter {
    pub fn new(
        alias: Option<AliasResolver>,
        plans_by_source: HashMap<String, FilePlan>,
        markers: Vec<MarkerCall>,
        root_dir: &str,
        out_dir: &str,
        companion_dir: String,
        runtime_package: String,
    ) -> Self {
        let mut plans = HashMap::new();
        for (source, plan) in plans_by_source {
            plans.insert(output_path_for(&source, root_dir, out_dir), plan);
        }
        let mut marker_map: HashMap<String, Vec<MarkerCall>> = HashMap::new();
        for m in markers {
            let out = output_path_for(&m.file, root_dir, out_dir);
            marker_map.entry(out).or_default().push(m);
        }
        Self {
            alias,
            plans,
            markers: marker_map,
            companion_dir,
            runtime_package,
            warnings: Vec::new(),
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// The write-file interception point. Non-JavaScript outputs pass
    /// through unchanged; so does any file whose transform fails.
    pub fn process(&mut self, path: &str, text: &str) -> String {
        if !path.ends_with(".js") {
            return text.to_string();
        }
        let mut current = text.to_string();
        if let Some(alias) = &self.alias {
            let (rewritten, _) = alias.rewrite_imports(&current, path);
            current = rewritten;
        }
        let ctx = RewriteCtx {
            companion_dir: &self.companion_dir,
            runtime_package: &self.runtime_package,
        };
        if let Some(plan) = self.plans.get(path) {
            match controller_rewrite::apply_controller_transforms(plan, &current, path, &ctx) {
                Ok((rewritten, _)) => current = rewritten,
                Err(e) => self
                    .warnings
                    .push(format!("rewrite: {}: {}", path, e)),
            }
        }
        if let Some(markers) = self.markers.get(path) {
            match marker_rewrite::apply_marker_rewrites(markers, &current, path, &ctx) {
                Ok((rewritten, _)) => current = rewritten,
                Err(e) => self
                    .warnings
                    .push(format!("rewrite: {}: {}", path, e)),
            }
        }
        current
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::markers::{MarkerKind, RUNTIME_PACKAGE};
    use ts::Span;

    fn user_plan() -> HashMap<String, FilePlan> {
        let mut plans = HashMap::new();
        plans.insert(
            "/project/src/user.controller.ts".to_string(),
            FilePlan {
                controllers: vec![ControllerRewrite {
                    class_name: "UserController".to_string(),
                    methods: vec![
                        MethodRewrite {
                            name: "findAll".to_string(),
                            is_async: true,
                            asserts: vec![],
                            coercions: vec![],
                            return_serialize: Some(("UserResponse".to_string(), true)),
                            sse_events: vec![],
                        },
                        MethodRewrite {
                            name: "create".to_string(),
                            is_async: true,
                            asserts: vec![("body".to_string(), "CreateUserDto".to_string())],
                            coercions: vec![],
                            return_serialize: Some(("UserResponse".to_string(), false)),
                            sse_events: vec![],
                        },
                    ],
                    json_routes: vec!["findAll".to_string(), "create".to_string()],
                }],
            },
        );
        plans
    }

    fn rewriter_for(plans: HashMap<String, FilePlan>, markers: Vec<MarkerCall>) -> Rewriter {
        Rewriter::new(
            None,
            plans,
            markers,
            "/project/src",
            "/project/dist",
            "/project/dist/__tsnest__".to_string(),
            RUNTIME_PACKAGE.to_string(),
        )
    }

    const EMITTED: &str = "import { UserService } from \"./user.service.js\";\nclass UserController {\n  async findAll() {\n    return this.users.all();\n  }\n  async create(body) {\n    return this.users.create(body);\n  }\n}\n";

    #[test]
    fn injects_assert_and_wraps_returns() {
        let mut rw = rewriter_for(user_plan(), vec![]);
        let out = rw.process("/project/dist/user.controller.js", EMITTED);
        assert!(rw.warnings().is_empty(), "{:?}", rw.warnings());
        assert!(out.contains("body = assertCreateUserDto(body);"));
        assert!(out.contains("return serializeUserResponse(await this.users.create(body));"));
        assert!(out.contains(
            "return \"[\" + (await this.users.all()).map(serializeUserResponse).join(\",\") + \"]\";"
        ));
        assert!(out.contains(
            "import { assertCreateUserDto } from \"./__tsnest__/CreateUserDto.js\";"
        ));
        assert!(out.contains("import { serializeUserResponse } from \"./__tsnest__/UserResponse.js\";"));
        assert!(out.contains("__registerJsonRoutes(UserController, [\"findAll\", \"create\"]);"));
        // Assertion precedes the first user statement.
        let assert_at = out.find("body = assertCreateUserDto").unwrap();
        let ret_at = out.find("return serializeUserResponse").unwrap();
        assert!(assert_at < ret_at);
    }

    #[test]
    fn neutral_for_files_without_plans_or_markers() {
        let mut rw = rewriter_for(HashMap::new(), vec![]);
        let text = "const x = 1;\nexport default x;\n";
        let out = rw.process("/project/dist/plain.js", text);
        assert_eq!(out, text);
        let css = rw.process("/project/dist/styles.css", "body {}");
        assert_eq!(css, "body {}");
    }

    #[test]
    fn failed_controller_rewrite_passes_original_through() {
        let mut rw = rewriter_for(user_plan(), vec![]);
        let text = "const totallyDifferent = 1;\n";
        let out = rw.process("/project/dist/user.controller.js", text);
        assert_eq!(out, text);
        assert_eq!(rw.warnings().len(), 1);
        assert!(rw.warnings()[0].contains("UserController"));
    }

    #[test]
    fn marker_calls_are_replaced_by_companions() {
        let markers = vec![
            MarkerCall {
                file: "/project/src/main.ts".to_string(),
                kind: MarkerKind::Validate,
                type_name: "Payload".to_string(),
                span: Span::new(0, 0),
            },
            MarkerCall {
                file: "/project/src/main.ts".to_string(),
                kind: MarkerKind::Is,
                type_name: "Payload".to_string(),
                span: Span::new(0, 0),
            },
        ];
        let mut rw = rewriter_for(HashMap::new(), markers);
        let text = "const a = validate(data);\nif (is(data)) {\n  run();\n}\n";
        let out = rw.process("/project/dist/main.js", text);
        assert!(out.starts_with(REWRITE_SENTINEL));
        assert!(out.contains("const a = validatePayload(data);"));
        assert!(out.contains("if (validatePayload(data).success)"));
        assert!(out.contains("import { validatePayload } from \"./__tsnest__/Payload.js\";"));
    }

    #[test]
    fn marker_count_mismatch_is_isolated_with_warning() {
        let markers = vec![MarkerCall {
            file: "/project/src/main.ts".to_string(),
            kind: MarkerKind::Assert,
            type_name: "Payload".to_string(),
            span: Span::new(0, 0),
        }];
        let mut rw = rewriter_for(HashMap::new(), markers);
        let text = "assert(a);\nassert(b);\n";
        let out = rw.process("/project/dist/main.js", text);
        assert_eq!(out, text);
        assert_eq!(rw.warnings().len(), 1);
    }

    #[test]
    fn scalar_coercion_is_injected_for_params() {
        let mut plans = HashMap::new();
        plans.insert(
            "/project/src/item.controller.ts".to_string(),
            FilePlan {
                controllers: vec![ControllerRewrite {
                    class_name: "ItemController".to_string(),
                    methods: vec![MethodRewrite {
                        name: "byId".to_string(),
                        is_async: false,
                        asserts: vec![],
                        coercions: vec![ScalarCoercion {
                            var: "id".to_string(),
                            key: "id".to_string(),
                            boolean: false,
                            required: true,
                        }],
                        return_serialize: None,
                        sse_events: vec![],
                    }],
                    json_routes: vec![],
                }],
            },
        );
        let mut rw = rewriter_for(plans, vec![]);
        let text = "class ItemController {\n  byId(id) {\n    return this.items.get(id);\n  }\n}\n";
        let out = rw.process("/project/dist/item.controller.js", text);
        assert!(out.contains("id = +id;"));
        assert!(out.contains("Number.isNaN(id)"));
        assert!(out.contains("import { ValidationError } from \"./__tsnest__/__helpers.js\";"));
    }
}
