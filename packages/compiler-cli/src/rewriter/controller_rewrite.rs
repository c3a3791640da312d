// Controller-file augmentation
//
// For files that analysis marked as containing controllers: inject the
// companion imports, prepend assertion and coercion statements to route
// method bodies, wrap return expressions in serializer calls, and register
// class-level interceptor metadata after the class definition.

use super::alias::relative_specifier;
use super::scan::{find_class, find_method, insert_after_imports, matching_brace_end, method_returns};
use super::{FilePlan, RewriteCtx};
use std::collections::{BTreeMap, BTreeSet};
use tsnest_compiler::codegen::{
    assert_fn_name, companion_file_name, serialize_fn_name, validate_fn_name, HELPERS_FILE_NAME,
};

struct Edit {
    pos: usize,
    del: usize,
    insert: String,
}

fn apply_edits(text: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.pos.cmp(&a.pos));
    let mut out = text.to_string();
    for e in edits {
        out.replace_range(e.pos..e.pos + e.del, &e.insert);
    }
    out
}

pub(crate) fn apply_controller_transforms(
    plan: &FilePlan,
    text: &str,
    out_path: &str,
    ctx: &RewriteCtx<'_>,
) -> Result<(String, bool), String> {
    let mut edits: Vec<Edit> = Vec::new();
    // module specifier → imported names
    let mut imports: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut companion_import = |imports: &mut BTreeMap<String, BTreeSet<String>>,
                               type_name: &str,
                               func: String| {
        let target = format!("{}/{}", ctx.companion_dir, companion_file_name(type_name));
        imports
            .entry(relative_specifier(out_path, &target))
            .or_default()
            .insert(func);
    };
    let helpers_specifier = {
        let target = format!("{}/{}", ctx.companion_dir, HELPERS_FILE_NAME);
        relative_specifier(out_path, &target)
    };

    for controller in &plan.controllers {
        let (body_start, body_end, class_end) = find_class(text, &controller.class_name)
            .ok_or_else(|| format!("class {} not found in emitted output", controller.class_name))?;

        for method in &controller.methods {
            let (_, after_brace, indent) = find_method(text, (body_start, body_end), &method.name)
                .ok_or_else(|| {
                    format!(
                        "method {}.{} not found in emitted output",
                        controller.class_name, method.name
                    )
                })?;
            let stmt_indent = format!("{}  ", indent);

            // Body prelude: assertions first, then scalar coercions, before
            // the first user statement.
            let mut prelude = String::new();
            for (var, type_name) in &method.asserts {
                let f = assert_fn_name(type_name);
                companion_import(&mut imports, type_name, f.clone());
                prelude.push_str(&format!("\n{}{} = {}({});", stmt_indent, var, f, var));
            }
            for c in &method.coercions {
                imports
                    .entry(helpers_specifier.clone())
                    .or_default()
                    .insert("ValidationError".to_string());
                if c.boolean {
                    prelude.push_str(&format!(
                        "\n{ind}if ({v} === \"true\" || {v} === \"1\") {{ {v} = true; }}\n{ind}else if ({v} === \"false\" || {v} === \"0\") {{ {v} = false; }}",
                        ind = stmt_indent,
                        v = c.var
                    ));
                    if c.required {
                        prelude.push_str(&format!(
                            "\n{ind}else {{ throw new ValidationError({key}, [{{ path: {key}, expected: \"boolean\", received: String({v}) }}]); }}",
                            ind = stmt_indent,
                            key = js_quote(&c.key),
                            v = c.var
                        ));
                    } else {
                        prelude.push_str(&format!(
                            "\n{ind}else if ({v} !== undefined) {{ throw new ValidationError({key}, [{{ path: {key}, expected: \"boolean\", received: String({v}) }}]); }}",
                            ind = stmt_indent,
                            key = js_quote(&c.key),
                            v = c.var
                        ));
                    }
                } else {
                    let guard = if c.required {
                        String::new()
                    } else {
                        format!("if ({} !== undefined) ", c.var)
                    };
                    prelude.push_str(&format!(
                        "\n{ind}{guard}{{ {v} = +{v}; if (Number.isNaN({v})) {{ throw new ValidationError({key}, [{{ path: {key}, expected: \"number\", received: \"NaN\" }}]); }} }}",
                        ind = stmt_indent,
                        guard = guard,
                        v = c.var,
                        key = js_quote(&c.key)
                    ));
                }
            }
            if !prelude.is_empty() {
                edits.push(Edit {
                    pos: after_brace,
                    del: 0,
                    insert: prelude,
                });
            }

            // Return-expression serialization.
            if let Some((type_name, is_array)) = &method.return_serialize {
                let f = serialize_fn_name(type_name);
                companion_import(&mut imports, type_name, f.clone());
                let method_body_end = matching_brace_end(text, after_brace - 1)
                    .ok_or_else(|| format!("unbalanced body in {}", method.name))? - 1;
                for r in method_returns(text, after_brace, method_body_end) {
                    let expr = text[r.expr_start..r.expr_end].trim();
                    let inner = expr.strip_prefix("await ").unwrap_or(expr);
                    let value = if method.is_async {
                        format!("await {}", inner)
                    } else {
                        inner.to_string()
                    };
                    let replacement = if *is_array {
                        format!("\"[\" + ({}).map({}).join(\",\") + \"]\"", value, f)
                    } else {
                        format!("{}({})", f, value)
                    };
                    edits.push(Edit {
                        pos: r.expr_start,
                        del: r.expr_end - r.expr_start,
                        insert: replacement,
                    });
                }
            }

            // SSE streams: per-event validate/serialize pairs are attached
            // as metadata for the runtime interceptor.
            if !method.sse_events.is_empty() {
                let mut pairs = Vec::new();
                for (event, type_name) in &method.sse_events {
                    let vf = validate_fn_name(type_name);
                    let sf = serialize_fn_name(type_name);
                    companion_import(&mut imports, type_name, vf.clone());
                    companion_import(&mut imports, type_name, sf.clone());
                    pairs.push(format!("{}: [{}, {}]", js_quote(event), vf, sf));
                }
                imports
                    .entry(ctx.runtime_package.to_string())
                    .or_default()
                    .insert("__registerSseTransforms".to_string());
                let insert_at = insert_point_after_class(text, class_end);
                edits.push(Edit {
                    pos: insert_at,
                    del: 0,
                    insert: format!(
                        "\n__registerSseTransforms({}.prototype, {}, {{ {} }});",
                        controller.class_name,
                        js_quote(&method.name),
                        pairs.join(", ")
                    ),
                });
            }
        }

        // Responses are pre-serialized strings; the runtime interceptor
        // restores the JSON content type for these routes.
        if !controller.json_routes.is_empty() {
            imports
                .entry(ctx.runtime_package.to_string())
                .or_default()
                .insert("__registerJsonRoutes".to_string());
            let names = controller
                .json_routes
                .iter()
                .map(|m| js_quote(m))
                .collect::<Vec<_>>()
                .join(", ");
            let insert_at = insert_point_after_class(text, class_end);
            edits.push(Edit {
                pos: insert_at,
                del: 0,
                insert: format!(
                    "\n__registerJsonRoutes({}, [{}]);",
                    controller.class_name, names
                ),
            });
        }
    }

    let changed = !edits.is_empty() || !imports.is_empty();
    let mut out = apply_edits(text, edits);
    let import_lines: Vec<String> = imports
        .iter()
        .map(|(module, names)| {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            format!("import {{ {} }} from \"{}\";", names.join(", "), module)
        })
        .collect();
    out = insert_after_imports(&out, &import_lines);
    Ok((out, changed))
}

/// Insertion offset after the class statement, skipping a trailing `;`.
fn insert_point_after_class(text: &str, class_end: usize) -> usize {
    let bytes = text.as_bytes();
    if bytes.get(class_end) == Some(&b';') {
        class_end + 1
    } else {
        class_end
    }
}

fn js_quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}
