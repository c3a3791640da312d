// End-to-end pipeline tests over the in-memory fixture host: analysis,
// companion generation, emit-time rewriting, OpenAPI synthesis and the
// warm-rebuild cache, all against a real temp directory.

use std::fs;
use std::path::Path;
use tsnest_compiler_cli::config::{hash_bytes, LoadedConfig, ProjectConfig};
use tsnest_compiler_cli::logging::NullLogger;
use tsnest_compiler_cli::perform_compile::{perform_build_with_program, BuildOptions};

use ts::testing::{class_decl, decorator, method_decl, param_decl, FixtureHost};
use ts::DecoratorArg;

struct Project {
    host: FixtureHost,
    loaded: LoadedConfig,
    opts: BuildOptions,
    out_dir: String,
}

fn user_project(dir: &Path) -> Project {
    let out_dir = dir.join("dist").to_string_lossy().to_string();
    let src_dir = dir.join("src").to_string_lossy().to_string();

    let mut host = FixtureHost::new();
    host.options.out_dir = Some(out_dir.clone());
    host.options.root_dir = Some(src_dir.clone());
    host.set_write_to_disk(true);

    let controller_file = format!("{}/user.controller.ts", src_dir);
    host.add_source_file(&controller_file);

    let string = host.string();
    let number = host.number();
    let boolean = host.boolean();
    let undefined = host.undefined_t();

    let dto = host.object_in(
        "CreateUserDto",
        &format!("{}/user.dto.ts", src_dir),
        vec![
            FixtureHost::prop("name", string),
            FixtureHost::prop("email", string),
        ],
    );
    let response = host.object_in(
        "UserResponse",
        &format!("{}/user.dto.ts", src_dir),
        vec![
            FixtureHost::prop("id", number),
            FixtureHost::prop("name", string),
        ],
    );
    let opt_number = host.union(vec![number, undefined]);
    let opt_boolean = host.union(vec![boolean, undefined]);
    let list_query = host.object_in(
        "ListQuery",
        &format!("{}/user.dto.ts", src_dir),
        vec![
            FixtureHost::prop_opt("page", opt_number),
            FixtureHost::prop_opt("limit", opt_number),
            FixtureHost::prop_opt("ascending", opt_boolean),
        ],
    );
    let response_array = host.array(response);
    let find_ret = host.generic("Promise", vec![response_array]);
    let create_ret = host.generic("Promise", vec![response]);
    let many_ret = host.generic("Promise", vec![response_array]);

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

    let mut find_many = method_decl("findMany");
    find_many.is_async = true;
    let mut get = decorator("Get");
    get.args.push(DecoratorArg::Str("list".to_string()));
    find_many.decorators.push(get);
    let mut q = param_decl("q", list_query);
    q.decorators.push(decorator("Query"));
    find_many.params.push(q);
    find_many.return_type = Some(many_ret);
    class.methods.push(find_many);

    host.add_class(&controller_file, class);

    host.queue_emit(
        &format!("{}/user.controller.js", out_dir),
        concat!(
            "import { UserService } from \"./user.service.js\";\n",
            "class UserController {\n",
            "  async findAll() {\n",
            "    return this.users.all();\n",
            "  }\n",
            "  async create(body) {\n",
            "    return this.users.create(body);\n",
            "  }\n",
            "  async findMany(q) {\n",
            "    return this.users.page(q);\n",
            "  }\n",
            "}\n",
        ),
    );

    let mut config = ProjectConfig::default();
    config.openapi.output = Some(format!("{}/openapi.json", out_dir));
    let loaded = LoadedConfig {
        config,
        path: None,
        hash: hash_bytes(b"fixture-config"),
    };
    let opts = BuildOptions {
        project: dir.join("tsconfig.json"),
        ..Default::default()
    };
    Project {
        host,
        loaded,
        opts,
        out_dir,
    }
}

fn run(project: &Project) -> i32 {
    perform_build_with_program(
        &project.opts,
        &project.loaded,
        &project.host,
        None,
        None,
        &NullLogger::new(),
    )
}

#[test]
fn full_build_rewrites_controllers_and_writes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let project = user_project(dir.path());
    assert_eq!(run(&project), 0);

    let controller =
        fs::read_to_string(format!("{}/user.controller.js", project.out_dir)).unwrap();
    assert!(controller.contains("body = assertCreateUserDto(body);"));
    assert!(controller.contains("q = assertListQuery(q);"));
    assert!(controller
        .contains("return \"[\" + (await this.users.all()).map(serializeUserResponse).join(\",\") + \"]\";"));
    assert!(controller.contains("return serializeUserResponse(await this.users.create(body));"));
    assert!(controller.contains("import { assertCreateUserDto }"));
    assert!(controller.contains("__registerJsonRoutes(UserController"));

    // Companions and the shared helpers module landed on disk.
    for name in ["CreateUserDto", "UserResponse", "ListQuery"] {
        let path = format!("{}/__tsnest__/{}.js", project.out_dir, name);
        assert!(Path::new(&path).exists(), "missing companion {}", path);
    }
    assert!(Path::new(&format!("{}/__tsnest__/__helpers.js", project.out_dir)).exists());
    let manifest: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(format!("{}/tsnest.manifest.json", project.out_dir)).unwrap(),
    )
    .unwrap();
    assert_eq!(manifest["version"], 1);
    assert_eq!(
        manifest["companions"]["CreateUserDto"]["validate"],
        "validateCreateUserDto"
    );

    // The coercive query type parses strings.
    let list_query =
        fs::read_to_string(format!("{}/__tsnest__/ListQuery.js", project.out_dir)).unwrap();
    assert!(list_query.contains("input.page = "));
    assert!(list_query.contains("input.ascending === \"true\" || input.ascending === \"1\""));

    // OpenAPI document.
    let doc: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(format!("{}/openapi.json", project.out_dir)).unwrap(),
    )
    .unwrap();
    assert_eq!(doc["openapi"], "3.1.0");
    assert!(doc["paths"]["/users"]["get"].is_object());
    assert!(doc["paths"]["/users"]["post"].is_object());
    assert!(doc["paths"]["/users/list"]["get"].is_object());
    assert_eq!(
        doc["paths"]["/users"]["post"]["requestBody"]["content"]["application/json"]["schema"]
            ["$ref"],
        "#/components/schemas/CreateUserDto"
    );
    assert_eq!(
        doc["paths"]["/users"]["post"]["operationId"],
        "UserController.create"
    );
    assert!(doc["components"]["schemas"]["UserResponse"].is_object());

    // Cache record exists beside the build info.
    assert!(Path::new(&format!(
        "{}/tsconfig.tsbuildinfo.tsnest",
        project.out_dir
    ))
    .exists());
}

#[test]
fn warm_rebuild_skips_post_processing_until_an_output_disappears() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = user_project(dir.path());
    assert_eq!(run(&project), 0);

    let openapi_path = format!("{}/openapi.json", project.out_dir);

    // Second run: incremental state reports nothing to emit; outputs must
    // be left untouched.
    project.host.set_pending_emit(false);
    let sentinel = "{\"sentinel\":true}";
    fs::write(&openapi_path, sentinel).unwrap();
    assert_eq!(run(&project), 0);
    assert_eq!(fs::read_to_string(&openapi_path).unwrap(), sentinel);

    // Deleting a recorded output invalidates the cache; the next run
    // re-produces the document.
    fs::remove_file(&openapi_path).unwrap();
    assert_eq!(run(&project), 0);
    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&openapi_path).unwrap()).unwrap();
    assert_eq!(doc["openapi"], "3.1.0");
}

#[test]
fn config_hash_change_invalidates_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = user_project(dir.path());
    assert_eq!(run(&project), 0);

    project.host.set_pending_emit(false);
    project.loaded.hash = hash_bytes(b"different-config");
    let openapi_path = format!("{}/openapi.json", project.out_dir);
    let sentinel = "{\"sentinel\":true}";
    fs::write(&openapi_path, sentinel).unwrap();
    assert_eq!(run(&project), 0);
    // Full post-processing ran again and replaced the sentinel.
    assert_ne!(fs::read_to_string(&openapi_path).unwrap(), sentinel);
}

#[test]
fn diagnostic_errors_gate_the_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = user_project(dir.path());
    project
        .host
        .add_semantic_error(ts::Diagnostic::error_at("/src/user.controller.ts", 1, "boom"));
    assert_eq!(run(&project), 1);

    project.host.options.no_emit_on_error = Some(true);
    assert_eq!(run(&project), 2);
}

#[test]
fn raw_response_route_yields_empty_content_and_builds() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("dist").to_string_lossy().to_string();
    let src_dir = dir.path().join("src").to_string_lossy().to_string();

    let mut host = FixtureHost::new();
    host.options.out_dir = Some(out_dir.clone());
    host.options.root_dir = Some(src_dir.clone());
    host.set_write_to_disk(true);

    let file = format!("{}/file.controller.ts", src_dir);
    host.add_source_file(&file);
    let any = host.any();
    let mut class = class_decl("FileController");
    let mut ctrl = decorator("Controller");
    ctrl.args.push(DecoratorArg::Str("files".to_string()));
    class.decorators.push(ctrl);
    let mut get_file = method_decl("getFile");
    let mut get = decorator("Get");
    get.args.push(DecoratorArg::Str(":id".to_string()));
    get_file.decorators.push(get);
    let mut res = param_decl("res", any);
    res.decorators.push(decorator("Res"));
    get_file.params.push(res);
    class.methods.push(get_file);
    host.add_class(&file, class);
    host.queue_emit(
        &format!("{}/file.controller.js", out_dir),
        "class FileController {\n  getFile(res) {\n    res.send();\n  }\n}\n",
    );

    let mut config = ProjectConfig::default();
    config.openapi.output = Some(format!("{}/openapi.json", out_dir));
    let loaded = LoadedConfig {
        config,
        path: None,
        hash: hash_bytes(b"cfg"),
    };
    let opts = BuildOptions {
        project: dir.path().join("tsconfig.json"),
        ..Default::default()
    };
    assert_eq!(
        perform_build_with_program(&opts, &loaded, &host, None, None, &NullLogger::new()),
        0
    );

    let doc: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(format!("{}/openapi.json", out_dir)).unwrap(),
    )
    .unwrap();
    let response = &doc["paths"]["/files/{id}"]["get"]["responses"]["200"];
    assert!(response.is_object());
    assert!(response.get("content").is_none());
}
