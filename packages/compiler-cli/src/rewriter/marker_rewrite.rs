// Marker rewrites
//
// Replaces recognized marker calls with their companion functions in the
// emitted JavaScript. Type arguments were erased during emission, so call
// sites are matched by occurrence order per callee, which emission
// preserves. A sentinel comment marks rewritten files so they can be
// detected without rescanning.

use super::alias::relative_specifier;
use super::scan::{call_site_count, insert_after_imports, matching_paren_end, nth_call_site};
use super::RewriteCtx;
use crate::markers::{MarkerCall, MarkerKind};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};
use tsnest_compiler::codegen::{
    assert_fn_name, companion_file_name, schema_fn_name, serialize_fn_name, validate_fn_name,
};

pub const REWRITE_SENTINEL: &str = "// @tsnest-rewritten";

pub(crate) fn apply_marker_rewrites(
    markers: &[MarkerCall],
    text: &str,
    out_path: &str,
    ctx: &RewriteCtx<'_>,
) -> Result<(String, bool), String> {
    if markers.is_empty() || text.starts_with(REWRITE_SENTINEL) {
        return Ok((text.to_string(), false));
    }

    let mut by_kind: IndexMap<MarkerKind, Vec<&MarkerCall>> = IndexMap::new();
    for m in markers {
        by_kind.entry(m.kind).or_default().push(m);
    }

    struct Edit {
        pos: usize,
        del: usize,
        insert: String,
    }
    let mut edits: Vec<Edit> = Vec::new();
    let mut imports: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for (kind, calls) in &by_kind {
        let callee = kind.callee();
        let sites = call_site_count(text, callee);
        if sites != calls.len() {
            return Err(format!(
                "expected {} `{}` call sites, found {}",
                calls.len(),
                callee,
                sites
            ));
        }
        for (i, marker) in calls.iter().enumerate() {
            let (start, open) = nth_call_site(text, callee, i)
                .ok_or_else(|| format!("lost `{}` call site {}", callee, i))?;
            let companion = match kind {
                MarkerKind::Validate | MarkerKind::Is => validate_fn_name(&marker.type_name),
                MarkerKind::Assert => assert_fn_name(&marker.type_name),
                MarkerKind::Stringify => serialize_fn_name(&marker.type_name),
                MarkerKind::Schema => schema_fn_name(&marker.type_name),
            };
            let target = format!(
                "{}/{}",
                ctx.companion_dir,
                companion_file_name(&marker.type_name)
            );
            imports
                .entry(relative_specifier(out_path, &target))
                .or_default()
                .insert(companion.clone());
            edits.push(Edit {
                pos: start,
                del: callee.len(),
                insert: companion,
            });
            if *kind == MarkerKind::Is {
                let close = matching_paren_end(text, open)
                    .ok_or_else(|| format!("unbalanced `{}` call site {}", callee, i))?;
                edits.push(Edit {
                    pos: close,
                    del: 0,
                    insert: ".success".to_string(),
                });
            }
        }
    }

    edits.sort_by(|a, b| b.pos.cmp(&a.pos));
    let mut out = text.to_string();
    for e in edits {
        out.replace_range(e.pos..e.pos + e.del, &e.insert);
    }
    let import_lines: Vec<String> = imports
        .iter()
        .map(|(module, names)| {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            format!("import {{ {} }} from \"{}\";", names.join(", "), module)
        })
        .collect();
    out = insert_after_imports(&out, &import_lines);
    out = format!("{}\n{}", REWRITE_SENTINEL, out);
    Ok((out, true))
}
