use super::decorators::{
    classify_param_decorator, verb_for_decorator, CONTROLLER, HTTP_CODE, IGNORE_DIRECTIVE, PUBLIC,
    RETURNS, SECURITY, SSE, TAGS, VERSION,
};
use super::model::{Controller, ParamCategory, ParamLocation, Route, RouteParameter};
use super::paths::compose_path;
use crate::config::{ProjectConfig, VersioningType};
use std::collections::BTreeSet;
use ts::{
    ClassDecl, DecoratorArg, DecoratorNode, MethodDecl, Program, SourceAnalysis, TypeChecker,
    TypeFlags, TypeRef,
};
use tsnest_compiler::{Metadata, MetadataRegistry, TypeWalker};

#[derive(Debug, Default)]
pub struct AnalyzerOutput {
    pub controllers: Vec<Controller>,
    pub warnings: Vec<String>,
    /// Files containing at least one discovered controller, for the
    /// rewriter.
    pub controller_files: BTreeSet<String>,
    /// Controller class names never receive companions.
    pub controller_class_names: BTreeSet<String>,
}

struct CompiledGlobs {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
}

impl CompiledGlobs {
    fn compile(include: &[String], exclude: &[String], warnings: &mut Vec<String>) -> Self {
        let compile_list = |patterns: &[String], warnings: &mut Vec<String>| {
            patterns
                .iter()
                .filter_map(|p| match glob::Pattern::new(p) {
                    Ok(pat) => Some(pat),
                    Err(e) => {
                        warnings.push(format!("controllers: invalid glob `{}`: {}", p, e));
                        None
                    }
                })
                .collect()
        };
        Self {
            include: compile_list(include, warnings),
            exclude: compile_list(exclude, warnings),
        }
    }

    fn matches(&self, path: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| p.matches(path));
        included && !self.exclude.iter().any(|p| p.matches(path))
    }
}

/// Scans the program's top-level classes for decorated controllers and
/// walks every type the routes depend on into the registry.
pub fn analyze_program(
    program: &dyn Program,
    walker: &mut TypeWalker<'_>,
    config: &ProjectConfig,
) -> AnalyzerOutput {
    let mut out = AnalyzerOutput::default();
    let globs = CompiledGlobs::compile(
        &config.controllers.include,
        &config.controllers.exclude,
        &mut out.warnings,
    );
    let checker = program.type_checker();
    let analysis = program.analysis();
    let mut operation_ids = BTreeSet::new();

    for file in program.source_files() {
        if file.is_declaration || !globs.matches(&file.file_name) {
            continue;
        }
        if file.has_syntax_errors {
            continue;
        }
        for class in analysis.top_level_classes(&file.file_name) {
            let Some(ctrl_dec) = class.decorators.iter().find(|d| d.name == CONTROLLER) else {
                continue;
            };
            if class.inside_function {
                out.warnings.push(format!(
                    "controllers: controller {} is declared inside a function and cannot be analyzed statically",
                    class.name
                ));
                continue;
            }
            if ctrl_dec.has_non_literal_arg() {
                out.warnings.push(format!(
                    "controllers: controller {} has a non-literal path argument",
                    class.name
                ));
                continue;
            }
            let controller = analyze_controller(
                &class,
                ctrl_dec,
                &file.file_name,
                checker,
                analysis,
                walker,
                config,
                &mut operation_ids,
                &mut out.warnings,
            );
            out.controller_files.insert(file.file_name.clone());
            out.controller_class_names.insert(class.name.clone());
            out.controllers.push(controller);
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn analyze_controller(
    class: &ClassDecl,
    ctrl_dec: &DecoratorNode,
    file: &str,
    checker: &dyn TypeChecker,
    analysis: &dyn SourceAnalysis,
    walker: &mut TypeWalker<'_>,
    config: &ProjectConfig,
    operation_ids: &mut BTreeSet<String>,
    warnings: &mut Vec<String>,
) -> Controller {
    let base_path = ctrl_dec
        .first_string_arg()
        .or_else(|| ctrl_dec.object_prop("path"))
        .unwrap_or("")
        .to_string();
    let versions: Vec<String> = ctrl_dec
        .object_prop("version")
        .map(|v| vec![v.to_string()])
        .unwrap_or_default();

    let mut routes = Vec::new();
    for method in &class.methods {
        let Some((verb_dec, verb)) = method
            .decorators
            .iter()
            .find_map(|d| verb_for_decorator(&d.name).map(|v| (d, v)))
        else {
            continue;
        };
        if verb_dec.has_non_literal_arg() {
            warnings.push(format!(
                "controllers: route {}.{} has a non-literal path argument",
                class.name, method.name
            ));
            continue;
        }
        match analyze_route(
            class,
            method,
            verb_dec,
            verb,
            &base_path,
            &versions,
            checker,
            analysis,
            walker,
            config,
            warnings,
        ) {
            Some(route) => {
                if !operation_ids.insert(route.operation_id.clone()) {
                    warnings.push(format!(
                        "controllers: duplicate operation id {}",
                        route.operation_id
                    ));
                }
                routes.push(route);
            }
            None => continue,
        }
    }

    Controller {
        name: class.name.clone(),
        file: file.to_string(),
        base_path,
        versions,
        routes,
    }
}

#[allow(clippy::too_many_arguments)]
fn analyze_route(
    class: &ClassDecl,
    method: &MethodDecl,
    verb_dec: &DecoratorNode,
    verb: super::model::HttpVerb,
    base_path: &str,
    versions: &[String],
    checker: &dyn TypeChecker,
    analysis: &dyn SourceAnalysis,
    walker: &mut TypeWalker<'_>,
    config: &ProjectConfig,
    warnings: &mut Vec<String>,
) -> Option<Route> {
    let suffix = verb_dec.first_string_arg().unwrap_or("").to_string();
    let operation_id = format!("{}.{}", class.name, method.name);

    let mut params = Vec::new();
    let mut uses_raw_response = false;
    for p in &method.params {
        let Some(dec) = p.decorators.first() else {
            continue;
        };
        if dec.has_non_literal_arg() {
            warnings.push(format!(
                "controllers: route {} has a non-literal argument on @{}",
                operation_id, dec.name
            ));
            return None;
        }
        let category = match classify_param_decorator(&dec.name) {
            Some(c) => c,
            None => ParamCategory::Custom,
        };
        if category == ParamCategory::RawResponse {
            uses_raw_response = true;
            params.push(RouteParameter {
                category,
                key: String::new(),
                var_name: p.name.clone(),
                ty: p.ty,
                type_name: None,
                meta: None,
                required: false,
                location: None,
            });
            continue;
        }
        let key = dec.first_string_arg().unwrap_or("").to_string();
        let location = if category == ParamCategory::Custom {
            analysis
                .decorator_js_doc(&dec.name)
                .iter()
                .find(|t| t.name == "in")
                .and_then(|t| ParamLocation::from_keyword(t.text.trim()))
        } else {
            None
        };
        let (type_name, meta) = match p.ty {
            Some(ty) => walk_param_type(checker, walker, ty, &operation_id, &p.name, &key, category, warnings),
            None => (None, None),
        };
        params.push(RouteParameter {
            category,
            key,
            var_name: p.name.clone(),
            ty: p.ty,
            type_name,
            meta,
            required: !p.optional,
            location,
        });
    }

    // Method-level decorators.
    let mut status = verb.default_status();
    let mut version = None;
    let mut sse = false;
    let mut tags = Vec::new();
    let mut public = false;
    let mut security = None;
    let mut explicit_return: Option<(Option<TypeRef>, Option<u16>, Option<String>, Option<String>)> =
        None;
    for dec in &method.decorators {
        match dec.name.as_str() {
            HTTP_CODE => {
                if let Some(n) = dec.first_number_arg() {
                    status = n as u16;
                }
            }
            VERSION => version = dec.first_string_arg().map(str::to_string),
            SSE => sse = true,
            TAGS => {
                for arg in &dec.args {
                    if let DecoratorArg::Str(s) = arg {
                        tags.push(s.clone());
                    }
                }
            }
            PUBLIC => public = true,
            SECURITY => {
                let schemes: Vec<String> = dec
                    .args
                    .iter()
                    .filter_map(|a| match a {
                        DecoratorArg::Str(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect();
                security = Some(schemes);
            }
            RETURNS => {
                let ty = dec.type_args.first().copied();
                let st = dec
                    .object_prop("status")
                    .and_then(|s| s.parse::<u16>().ok());
                let ct = dec.object_prop("contentType").map(str::to_string);
                let desc = dec.object_prop("description").map(str::to_string);
                explicit_return = Some((ty, st, ct, desc));
            }
            _ => {}
        }
    }

    let ignore = method.js_doc.iter().any(|t| t.name == IGNORE_DIRECTIVE);
    let deprecated = method.js_doc.iter().any(|t| t.name == "deprecated");

    // Return type: the declared type unless an explicit declaration
    // overrides it.
    let mut content_type = if sse {
        "text/event-stream".to_string()
    } else {
        "application/json".to_string()
    };
    let mut response_description = None;
    let mut ret = ReturnInfo::default();
    if let Some((ty, st, ct, desc)) = &explicit_return {
        if let Some(st) = st {
            status = *st;
        }
        if let Some(ct) = ct {
            content_type = ct.clone();
        }
        response_description = desc.clone();
        if let Some(ty) = ty {
            ret = analyze_return(checker, walker, *ty);
        }
    } else if let Some(ty) = method.return_type {
        if !uses_raw_response || sse {
            ret = analyze_return(checker, walker, ty);
        }
    }

    if uses_raw_response && explicit_return.is_none() && !ignore {
        warnings.push(format!(
            "controllers: uses-raw-response: {} — consider @Returns<T>()",
            method.name
        ));
    }

    let mut sse_events = Vec::new();
    if sse {
        if let Some(meta) = &ret.meta {
            sse_events = collect_sse_events(meta, walker.registry());
        }
        // The stream itself is not a serializable return value.
        ret = ReturnInfo::default();
    }

    let version_segment = uri_version_segment(config, version.as_deref(), versions);
    let global_prefix = config.nestjs.global_prefix.clone().unwrap_or_default();
    let full_path = compose_path(&[
        &global_prefix,
        version_segment.as_deref().unwrap_or(""),
        base_path,
        &suffix,
    ]);

    Some(Route {
        verb,
        suffix,
        full_path,
        method_name: method.name.clone(),
        is_async: method.is_async,
        operation_id,
        params,
        return_meta: ret.meta,
        return_type_name: ret.type_name,
        return_ty: ret.ty,
        returns_array: ret.is_array,
        status,
        content_type,
        response_description,
        tags,
        security,
        public,
        deprecated,
        uses_raw_response,
        sse,
        sse_events,
        version,
    })
}

fn uri_version_segment(
    config: &ProjectConfig,
    route_version: Option<&str>,
    controller_versions: &[String],
) -> Option<String> {
    let versioning = config.nestjs.versioning.as_ref()?;
    if versioning.strategy != VersioningType::Uri {
        return None;
    }
    let version = route_version
        .map(str::to_string)
        .or_else(|| controller_versions.first().cloned())
        .or_else(|| versioning.default_version.clone())?;
    let prefix = versioning.prefix.clone().unwrap_or_else(|| "v".to_string());
    Some(format!("{}{}", prefix, version))
}

#[allow(clippy::too_many_arguments)]
fn walk_param_type(
    checker: &dyn TypeChecker,
    walker: &mut TypeWalker<'_>,
    ty: TypeRef,
    operation_id: &str,
    var_name: &str,
    key: &str,
    category: ParamCategory,
    warnings: &mut Vec<String>,
) -> (Option<String>, Option<Metadata>) {
    let name = checker.type_name(ty);
    let whole_object = key.is_empty()
        && matches!(
            category,
            ParamCategory::Body | ParamCategory::Query | ParamCategory::Param | ParamCategory::Headers
        );
    if whole_object {
        let props = checker.properties(ty);
        match (&name, props.is_empty()) {
            (Some(n), false) => {
                walker.walk_named(n, ty);
                (name.clone(), Some(Metadata::reference(n.clone())))
            }
            _ => {
                warnings.push(format!(
                    "controllers: parameter {} of {} has an anonymous type; generated validation is skipped",
                    var_name, operation_id
                ));
                (None, Some(walker.walk(ty)))
            }
        }
    } else {
        (name, Some(walker.walk(ty)))
    }
}

#[derive(Debug, Default)]
struct ReturnInfo {
    meta: Option<Metadata>,
    type_name: Option<String>,
    is_array: bool,
    ty: Option<TypeRef>,
}

const WRAPPERS: &[&str] = &["Promise", "Observable"];
const ASYNC_ITERATORS: &[&str] = &["AsyncIterableIterator", "AsyncIterator", "AsyncGenerator"];

fn analyze_return(
    checker: &dyn TypeChecker,
    walker: &mut TypeWalker<'_>,
    ty: TypeRef,
) -> ReturnInfo {
    let mut t = ty;
    loop {
        let Some(name) = checker.type_name(t) else {
            break;
        };
        if WRAPPERS.contains(&name.as_str()) || ASYNC_ITERATORS.contains(&name.as_str()) {
            let args = checker.type_arguments(t);
            if let Some(inner) = args.first() {
                t = *inner;
                continue;
            }
        }
        break;
    }

    let flags = checker.type_flags(t);
    if flags.intersects(TypeFlags::VOID) || flags.intersects(TypeFlags::UNDEFINED) {
        return ReturnInfo::default();
    }

    if let Some(el) = checker.element_type(t) {
        let el_props = checker.properties(el);
        if let (Some(n), false) = (checker.type_name(el), el_props.is_empty()) {
            walker.walk_named(&n, el);
            return ReturnInfo {
                meta: Some(Metadata::Array {
                    element: Box::new(Metadata::reference(n.clone())),
                    tags: Default::default(),
                }),
                type_name: Some(n),
                is_array: true,
                ty: Some(el),
            };
        }
        return ReturnInfo {
            meta: Some(walker.walk(t)),
            type_name: None,
            is_array: true,
            ty: Some(t),
        };
    }

    let props = checker.properties(t);
    if let (Some(n), false) = (checker.type_name(t), props.is_empty()) {
        walker.walk_named(&n, t);
        return ReturnInfo {
            meta: Some(Metadata::reference(n.clone())),
            type_name: Some(n),
            is_array: false,
            ty: Some(t),
        };
    }

    ReturnInfo {
        meta: Some(walker.walk(t)),
        type_name: None,
        is_array: false,
        ty: Some(t),
    }
}

/// `(event name, data type name)` pairs from an SSE stream's element union:
/// object variants with a literal `event` and a named `data` type.
fn collect_sse_events(meta: &Metadata, registry: &MetadataRegistry) -> Vec<(String, String)> {
    let resolve = |m: &Metadata| -> Option<Metadata> {
        match m {
            Metadata::Reference { name } => registry.get(name).cloned(),
            other => Some(other.clone()),
        }
    };
    let variants: Vec<Metadata> = match resolve(meta) {
        Some(Metadata::Union(u)) => u.variants.iter().filter_map(&resolve).collect(),
        Some(other) => vec![other],
        None => return Vec::new(),
    };
    let mut events = Vec::new();
    for v in variants {
        let Some(obj) = v.as_object() else { continue };
        let event = obj.properties.iter().find(|p| p.name == "event");
        let data = obj.properties.iter().find(|p| p.name == "data");
        if let (Some(event), Some(data)) = (event, data) {
            if let Metadata::Literal {
                value: ts::LiteralValue::String(name),
            } = &event.meta
            {
                if let Metadata::Reference { name: data_ty } = &data.meta {
                    events.push((name.clone(), data_ty.clone()));
                }
            }
        }
    }
    events
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::ProjectConfig;
    use ts::testing::{class_decl, decorator, method_decl, param_decl, FixtureHost};
    use ts::{DecoratorArg, Program};
    use tsnest_compiler::MetadataRegistry;

    fn user_controller_host() -> FixtureHost {
        let mut host = FixtureHost::new();
        host.add_source_file("/src/user.controller.ts");
        let string = host.string();
        let number = host.number();
        let dto = host.object_in(
            "CreateUserDto",
            "/src/dto.ts",
            vec![
                FixtureHost::prop("name", string),
                FixtureHost::prop("age", number),
            ],
        );
        let response = host.object_in(
            "UserResponse",
            "/src/dto.ts",
            vec![
                FixtureHost::prop("id", number),
                FixtureHost::prop("name", string),
            ],
        );
        let response_array = host.array(response);
        let find_ret = host.generic("Promise", vec![response_array]);
        let create_ret = host.generic("Promise", vec![response]);

        let mut class = class_decl("UserController");
        let mut ctrl = decorator("Controller");
        ctrl.args.push(DecoratorArg::Str("users".to_string()));
        class.decorators.push(ctrl);

        let mut find_all = method_decl("findAll");
        find_all.is_async = true;
        find_all.decorators.push(decorator("Get"));
        find_all.return_type = Some(find_ret);
        class.methods.push(find_all);

        let mut create = method_decl("create");
        create.is_async = true;
        create.decorators.push(decorator("Post"));
        let mut body = param_decl("body", dto);
        body.decorators.push(decorator("Body"));
        create.params.push(body);
        create.return_type = Some(create_ret);
        class.methods.push(create);

        host.add_class("/src/user.controller.ts", class);
        host
    }

    #[test]
    fn discovers_controller_routes_and_walks_types() {
        let host = user_controller_host();
        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(host.type_checker(), &mut registry);
        let config = ProjectConfig::default();
        let out = analyze_program(&host, &mut walker, &config);
        drop(walker);

        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        assert_eq!(out.controllers.len(), 1);
        let c = &out.controllers[0];
        assert_eq!(c.name, "UserController");
        assert_eq!(c.base_path, "users");
        assert_eq!(c.routes.len(), 2);

        let find_all = &c.routes[0];
        assert_eq!(find_all.full_path, "/users");
        assert_eq!(find_all.operation_id, "UserController.findAll");
        assert_eq!(find_all.return_type_name.as_deref(), Some("UserResponse"));
        assert!(find_all.returns_array);
        assert_eq!(find_all.status, 200);

        let create = &c.routes[1];
        assert_eq!(create.status, 201);
        assert_eq!(create.params.len(), 1);
        assert!(create.params[0].is_whole_object());
        assert_eq!(create.params[0].type_name.as_deref(), Some("CreateUserDto"));
        assert!(!create.returns_array);

        assert!(registry.contains("CreateUserDto"));
        assert!(registry.contains("UserResponse"));

        let map = super::super::route_map(&out.controllers);
        assert_eq!(
            map.get("UserController.findAll"),
            Some(&("UserResponse".to_string(), true))
        );
        assert_eq!(
            map.get("UserController.create"),
            Some(&("UserResponse".to_string(), false))
        );
    }

    #[test]
    fn dynamic_controller_is_excluded_with_warning() {
        let mut host = FixtureHost::new();
        host.add_source_file("/src/factory.ts");
        let mut class = class_decl("FactoryController");
        class.inside_function = true;
        class.decorators.push(decorator("Controller"));
        host.add_class("/src/factory.ts", class);

        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(host.type_checker(), &mut registry);
        let out = analyze_program(&host, &mut walker, &ProjectConfig::default());
        assert!(out.controllers.is_empty());
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("inside a function"));
    }

    #[test]
    fn non_literal_route_path_disqualifies_the_route() {
        let mut host = FixtureHost::new();
        host.add_source_file("/src/a.controller.ts");
        let mut class = class_decl("AController");
        let mut ctrl = decorator("Controller");
        ctrl.args.push(DecoratorArg::Str("a".to_string()));
        class.decorators.push(ctrl);
        let mut m = method_decl("dynamic");
        let mut get = decorator("Get");
        get.args.push(DecoratorArg::NonLiteral);
        m.decorators.push(get);
        class.methods.push(m);
        host.add_class("/src/a.controller.ts", class);

        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(host.type_checker(), &mut registry);
        let out = analyze_program(&host, &mut walker, &ProjectConfig::default());
        assert_eq!(out.controllers.len(), 1);
        assert!(out.controllers[0].routes.is_empty());
        assert!(out.warnings.iter().any(|w| w.contains("non-literal")));
    }

    #[test]
    fn raw_response_without_returns_warns() {
        let mut host = FixtureHost::new();
        host.add_source_file("/src/file.controller.ts");
        let any = host.any();
        let mut class = class_decl("FileController");
        let mut ctrl = decorator("Controller");
        ctrl.args.push(DecoratorArg::Str("files".to_string()));
        class.decorators.push(ctrl);
        let mut m = method_decl("getFile");
        let mut get = decorator("Get");
        get.args.push(DecoratorArg::Str(":id".to_string()));
        m.decorators.push(get);
        let mut res = param_decl("res", any);
        res.decorators.push(decorator("Res"));
        m.params.push(res);
        class.methods.push(m);
        host.add_class("/src/file.controller.ts", class);

        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(host.type_checker(), &mut registry);
        let out = analyze_program(&host, &mut walker, &ProjectConfig::default());
        let route = &out.controllers[0].routes[0];
        assert!(route.uses_raw_response);
        assert!(route.return_meta.is_none());
        assert!(out
            .warnings
            .iter()
            .any(|w| w.contains("uses-raw-response: getFile")));
        assert_eq!(route.full_path, "/files/:id");
    }

    #[test]
    fn uri_versioning_prefixes_the_path() {
        let mut host = FixtureHost::new();
        host.add_source_file("/src/v.controller.ts");
        let mut class = class_decl("VController");
        let mut ctrl = decorator("Controller");
        ctrl.args.push(DecoratorArg::Object(vec![
            ("path".to_string(), "things".to_string()),
            ("version".to_string(), "2".to_string()),
        ]));
        class.decorators.push(ctrl);
        let mut m = method_decl("list");
        m.decorators.push(decorator("Get"));
        class.methods.push(m);
        host.add_class("/src/v.controller.ts", class);

        let config: ProjectConfig = serde_json::from_str(
            r#"{"nestjs": {"globalPrefix": "api", "versioning": {"type": "uri"}}}"#,
        )
        .unwrap();
        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(host.type_checker(), &mut registry);
        let out = analyze_program(&host, &mut walker, &config);
        assert_eq!(out.controllers[0].routes[0].full_path, "/api/v2/things");
    }
}
