//! The build orchestrator.
//!
//! One invocation sequences: load config → parse project (via host) →
//! create program → gather diagnostics → pre-emit analysis (controllers,
//! markers, needed types, coercion marking, in-memory companion
//! generation) → emit with the rewriter write-file callback → batch
//! companion writes → OpenAPI → assets → SDK hand-off → save cache.
//! Exit codes: 0 success, 1 diagnostic errors, 2 emit skipped by the
//! errors gate.

use crate::assets::copy_assets;
use crate::cache::{cache_path, write_atomic, PostProcessCache};
use crate::config::{LoadedConfig, ProjectConfig, TransformsConfig};
use crate::controllers::{self, AnalyzerOutput, ParamCategory};
use crate::diagnostics::{dedupe_diagnostics, error_count, format_diagnostics};
use crate::logging::Logger;
use crate::manifest::{build_manifest, MANIFEST_FILE_NAME};
use crate::markers::{extract_markers, MarkerCall, RUNTIME_PACKAGE};
use crate::openapi;
use crate::rewriter::{build_file_plans, AliasResolver, Rewriter};
use crate::sdk::{spawn_if_stale, SdkGenerator};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use ts::{CompilerOptions, HostCompiler, Program};
use tsnest_compiler::codegen::{generate_companions, CodegenOptions, CompanionFile};
use tsnest_compiler::{MetadataRegistry, TypeWalker};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub project: PathBuf,
    pub config_path: Option<PathBuf>,
    pub clean: bool,
    pub no_check: bool,
    pub dump_metadata: bool,
    pub assets: Vec<String>,
    pub compiler_overrides: CompilerOptions,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            project: PathBuf::from("tsconfig.json"),
            config_path: None,
            clean: false,
            no_check: false,
            dump_metadata: false,
            assets: Vec::new(),
            compiler_overrides: CompilerOptions::default(),
        }
    }
}

/// Full entry point used by the CLI: project parsing through the host,
/// then the core pipeline.
pub fn perform_build(opts: &BuildOptions, host: &dyn HostCompiler, logger: &dyn Logger) -> i32 {
    let project_dir = project_dir_of(&opts.project);
    let loaded = match ProjectConfig::discover(&project_dir, opts.config_path.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            logger.error(&format!("config: {}", e));
            return 1;
        }
    };
    let parsed = host.parse_project(&opts.project, &opts.compiler_overrides);
    if !parsed.errors.is_empty() {
        eprint!("{}", format_diagnostics(&parsed.errors));
        return 1;
    }
    let program = host.create_program(&parsed);
    perform_build_with_program(opts, &loaded, program.as_ref(), None, None, logger)
}

fn project_dir_of(project: &Path) -> PathBuf {
    if project.is_dir() {
        project.to_path_buf()
    } else {
        project.parent().unwrap_or(Path::new(".")).to_path_buf()
    }
}

/// The core pipeline over an already-created program. Tests drive this
/// directly with a fixture host.
pub fn perform_build_with_program(
    opts: &BuildOptions,
    loaded: &LoadedConfig,
    program: &dyn Program,
    sdk_generator: Option<Box<dyn SdkGenerator>>,
    shutdown: Option<&AtomicBool>,
    logger: &dyn Logger,
) -> i32 {
    let interrupted = || shutdown.map(|s| s.load(Ordering::SeqCst)).unwrap_or(false);
    let options = program.options().clone();
    let project_dir = project_dir_of(&opts.project);
    let out_dir = options
        .out_dir
        .clone()
        .unwrap_or_else(|| join_dir(&project_dir, "dist"));
    let root_dir = options
        .root_dir
        .clone()
        .unwrap_or_else(|| project_dir.to_string_lossy().replace('\\', "/"));

    if opts.clean || loaded.config.delete_out_dir {
        if Path::new(&out_dir).exists() {
            if let Err(e) = fs::remove_dir_all(&out_dir) {
                logger.warn(&format!("clean: cannot remove {}: {}", out_dir, e));
            }
        }
    }

    // Diagnostics gate.
    let mut diags = program.options_diagnostics();
    diags.extend(program.global_diagnostics());
    diags.extend(program.syntactic_diagnostics());
    if !opts.no_check {
        diags.extend(program.semantic_diagnostics());
    }
    let diags = dedupe_diagnostics(diags);
    if !diags.is_empty() {
        eprint!("{}", format_diagnostics(&diags));
    }
    let pre_emit_errors = error_count(&diags);
    if pre_emit_errors > 0 && options.no_emit_on_error == Some(true) {
        return 2;
    }

    // Warm rebuild: when the incremental state reports nothing to emit and
    // the cache validates, skip analysis, generation and synthesis.
    let cpath = cache_path(&options, &out_dir);
    let existing_cache = PostProcessCache::load(&cpath);
    if !program.has_pending_emit() {
        if let Some(cache) = &existing_cache {
            if cache.is_valid(&loaded.hash) {
                eprintln!("no changes detected, outputs up to date");
                return if pre_emit_errors > 0 { 1 } else { 0 };
            }
        }
    }

    // Pre-emit analysis.
    let mut registry = MetadataRegistry::new();
    let checker = program.type_checker();
    let (analysis, markers) = {
        let mut walker = TypeWalker::new(checker, &mut registry)
            .with_exact_optional(options.exact_optional_property_types.unwrap_or(false));
        let analysis = controllers::analyze_program(program, &mut walker, &loaded.config);
        let markers = extract_markers(program, &mut walker);
        for w in walker.take_warnings() {
            logger.warn(&format!("types: {}", w));
        }
        (analysis, markers)
    };
    for w in &analysis.warnings {
        logger.warn(w);
    }

    let (needed, type_files) =
        collect_needed_types(&analysis, &markers, &registry, program, logger);

    // Coercion: whole-object query/path/header sources arrive as strings.
    for c in &analysis.controllers {
        for r in &c.routes {
            for p in &r.params {
                if p.is_whole_object()
                    && matches!(
                        p.category,
                        ParamCategory::Query | ParamCategory::Param | ParamCategory::Headers
                    )
                {
                    if let Some(n) = &p.type_name {
                        registry.mark_coercive(n);
                    }
                }
            }
        }
    }

    if let Err(missing) = registry.verify_closure() {
        logger.error(&format!(
            "codegen: unresolved type references: {}",
            missing.join(", ")
        ));
        return 1;
    }
    let frozen = registry.freeze();
    if opts.dump_metadata {
        println!("{}", frozen.to_json_pretty());
    }

    let needed = filter_transform_types(needed, &type_files, &loaded.config.transforms, logger);
    let companion_dir = format!("{}/__tsnest__", out_dir.trim_end_matches('/'));
    let codegen_opts = CodegenOptions {
        validation: loaded.config.transforms.validation,
        serialization: loaded.config.transforms.serialization,
        standard_schema: loaded.config.transforms.standard_schema,
        out_base: companion_dir.clone(),
    };
    let any_transform =
        codegen_opts.validation || codegen_opts.serialization || codegen_opts.standard_schema;
    let companions: Vec<CompanionFile> = if any_transform && !needed.is_empty() {
        match generate_companions(&frozen, &needed, &codegen_opts) {
            Ok(files) => files,
            Err(e) => {
                logger.error(&format!("codegen: {}", e));
                return 1;
            }
        }
    } else {
        Vec::new()
    };

    // Emit through the rewriter.
    let alias = options.paths.as_ref().map(|paths| {
        let base_url = options
            .base_url
            .clone()
            .unwrap_or_else(|| project_dir.to_string_lossy().replace('\\', "/"));
        AliasResolver::new(
            paths,
            &base_url,
            &root_dir,
            &out_dir,
            Box::new(|p: &str| Path::new(p).exists()),
        )
    });
    let plans = build_file_plans(&analysis.controllers);
    let mut rewriter = Rewriter::new(
        alias,
        plans,
        markers,
        &root_dir,
        &out_dir,
        companion_dir,
        RUNTIME_PACKAGE.to_string(),
    );
    let emit_result = program.emit(&mut |path, text| rewriter.process(path, text));
    for w in rewriter.warnings() {
        logger.warn(w);
    }
    let emit_diags = dedupe_diagnostics(emit_result.diagnostics.clone());
    if !emit_diags.is_empty() {
        eprint!("{}", format_diagnostics(&emit_diags));
    }
    if emit_result.emit_skipped {
        return 2;
    }
    if pre_emit_errors + error_count(&emit_diags) > 0 {
        return 1;
    }
    if interrupted() {
        logger.info("interrupted, skipping post-processing");
        return 130;
    }

    // Companions land on disk only after emission succeeded.
    let mut outputs: Vec<String> = Vec::new();
    for file in &companions {
        let path = Path::new(&file.path);
        let write = path
            .parent()
            .map(fs::create_dir_all)
            .unwrap_or(Ok(()))
            .and_then(|_| fs::write(path, &file.text));
        if let Err(e) = write {
            logger.error(&format!("codegen: cannot write {}: {}", file.path, e));
            return 1;
        }
        outputs.push(file.path.clone());
    }
    if !companions.is_empty() {
        let manifest = build_manifest(&companions, &codegen_opts);
        let manifest_path = format!("{}/{}", out_dir.trim_end_matches('/'), MANIFEST_FILE_NAME);
        match serde_json::to_vec_pretty(&manifest) {
            Ok(bytes) => {
                if let Err(e) = write_atomic(Path::new(&manifest_path), &bytes) {
                    logger.error(&format!("codegen: cannot write {}: {}", manifest_path, e));
                    return 1;
                }
                outputs.push(manifest_path);
            }
            Err(e) => {
                logger.error(&format!("codegen: cannot serialize manifest: {}", e));
                return 1;
            }
        }
    }

    // Nothing was emitted and the previous outputs still validate: refresh
    // the cache and stop.
    if emit_result.emitted_files.is_empty() {
        if let Some(cache) = &existing_cache {
            if cache.is_valid(&loaded.hash) {
                if let Err(e) = cache.save(&cpath) {
                    logger.warn(&format!("cache: cannot write {}: {}", cpath.display(), e));
                }
                eprintln!("no changes detected, outputs up to date");
                return 0;
            }
        }
    }

    if let Some(doc_path) = &loaded.config.openapi.output {
        let doc = openapi::synthesize(&analysis.controllers, &frozen, &loaded.config.openapi);
        let write = serde_json::to_vec_pretty(&doc)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                write_atomic(Path::new(doc_path), &bytes).map_err(|e| e.to_string())
            });
        if let Err(e) = write {
            logger.error(&format!("openapi: cannot write {}: {}", doc_path, e));
            return 1;
        }
        outputs.push(doc_path.clone());
        logger.info(&format!("openapi: wrote {}", doc_path));
    }

    if !opts.assets.is_empty() {
        let source_root = loaded
            .config
            .source_root
            .clone()
            .unwrap_or_else(|| root_dir.clone());
        let copied = copy_assets(&opts.assets, &source_root, &out_dir, logger);
        logger.info(&format!("assets: copied {} file(s)", copied));
    }

    if let Some(sdk_out) = &loaded.config.sdk.output {
        match (&loaded.config.openapi.output, sdk_generator) {
            (Some(doc_path), Some(generator)) => {
                if let Some(task) =
                    spawn_if_stale(Path::new(doc_path), Path::new(sdk_out), generator, logger)
                {
                    task.join(logger);
                }
            }
            (None, _) => {
                logger.warn("sdk: openapi.output is required for SDK generation");
            }
            (_, None) => {
                logger.info("sdk: no generator linked, skipping");
            }
        }
    }

    let cache = PostProcessCache::new(loaded.hash.clone(), outputs);
    if let Err(e) = cache.save(&cpath) {
        logger.warn(&format!("cache: cannot write {}: {}", cpath.display(), e));
    }
    0
}

fn join_dir(base: &Path, child: &str) -> String {
    base.join(child).to_string_lossy().replace('\\', "/")
}

/// The needed-types set: body parameters, whole-object query/path/header
/// parameters, named return types (plus array elements), SSE event data
/// and marker-call arguments, closed over transitive references. Types
/// declared in files with syntactic errors are skipped; controller classes
/// never receive companions.
fn collect_needed_types(
    analysis: &AnalyzerOutput,
    markers: &[MarkerCall],
    registry: &MetadataRegistry,
    program: &dyn Program,
    logger: &dyn Logger,
) -> (Vec<String>, BTreeMap<String, String>) {
    let error_files: BTreeSet<String> = program
        .source_files()
        .into_iter()
        .filter(|f| f.has_syntax_errors)
        .map(|f| f.file_name)
        .collect();
    let checker = program.type_checker();
    let mut seeds: BTreeSet<String> = BTreeSet::new();
    let mut type_files: BTreeMap<String, String> = BTreeMap::new();

    let mut consider = |name: &str, ty: Option<ts::TypeRef>,
                        seeds: &mut BTreeSet<String>,
                        type_files: &mut BTreeMap<String, String>| {
        if let Some(file) = ty.and_then(|t| checker.declaring_file(t)) {
            if error_files.contains(&file) {
                logger.warn(&format!(
                    "codegen: skipping {} (declared in a file with syntax errors)",
                    name
                ));
                return;
            }
            type_files.insert(name.to_string(), file);
        }
        seeds.insert(name.to_string());
    };

    for c in &analysis.controllers {
        for r in &c.routes {
            for p in &r.params {
                if p.is_whole_object() {
                    if let Some(n) = &p.type_name {
                        consider(n, p.ty, &mut seeds, &mut type_files);
                    }
                }
            }
            if let Some(n) = &r.return_type_name {
                consider(n, r.return_ty, &mut seeds, &mut type_files);
            }
            for (_, data_ty) in &r.sse_events {
                consider(
                    data_ty,
                    registry.handle_for(data_ty),
                    &mut seeds,
                    &mut type_files,
                );
            }
        }
    }
    for m in markers {
        seeds.insert(m.type_name.clone());
    }
    for class in &analysis.controller_class_names {
        seeds.remove(class);
    }

    let mut queue: Vec<String> = seeds.iter().cloned().collect();
    while let Some(name) = queue.pop() {
        if let Some(meta) = registry.get(&name) {
            let mut refs = Vec::new();
            meta.references(&mut refs);
            for r in refs {
                if analysis.controller_class_names.contains(&r) {
                    continue;
                }
                if seeds.insert(r.clone()) {
                    queue.push(r);
                }
            }
        }
    }
    (seeds.into_iter().collect(), type_files)
}

/// Applies `transforms.include`/`exclude` globs to the needed set, matched
/// against each type's declaring file when known.
fn filter_transform_types(
    names: Vec<String>,
    type_files: &BTreeMap<String, String>,
    transforms: &TransformsConfig,
    logger: &dyn Logger,
) -> Vec<String> {
    if transforms.include.is_empty() && transforms.exclude.is_empty() {
        return names;
    }
    let compile = |patterns: &[String]| -> Vec<glob::Pattern> {
        patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pat) => Some(pat),
                Err(e) => {
                    logger.warn(&format!("transforms: invalid glob `{}`: {}", p, e));
                    None
                }
            })
            .collect()
    };
    let include = compile(&transforms.include);
    let exclude = compile(&transforms.exclude);
    names
        .into_iter()
        .filter(|name| match type_files.get(name) {
            Some(file) => {
                let included = include.is_empty() || include.iter().any(|p| p.matches(file));
                included && !exclude.iter().any(|p| p.matches(file))
            }
            // Transitively-reached types without a known declaration site
            // stay in: their referrers need them to link.
            None => true,
        })
        .collect()
}
