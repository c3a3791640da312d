//! Validator emission.
//!
//! Checks are written in a fixed order: type tag, required/optional,
//! numeric bounds, string bounds, formats, array bounds, per-property
//! recursion. Coercion and transform statements run before the checks so
//! the checks see the converted values.

use super::emit::{js_str, json_text, line, member, EmitCtx};
use super::helpers::format_regex_access;
use crate::metadata::{
    ConstraintTag, Metadata, ObjectMeta, Primitive, RecordKey, TransformKind, UnionMeta,
};

pub(crate) fn emit_validator_fn(ctx: &mut EmitCtx, meta: &Metadata, out: &mut String) {
    out.push_str(&format!(
        "export function _v{}(input, path, errors) {{\n",
        ctx.type_name
    ));
    emit_checks(ctx, meta, &[], "input", "path", "errors", out, 1);
    out.push_str("}\n\n");
}

fn push_err(out: &mut String, depth: usize, errs: &str, path: &str, expected: &str, received: &str) {
    line(
        out,
        depth,
        &format!(
            "{}.push({{ path: {}, expected: {}, received: {} }});",
            errs, path, expected, received
        ),
    );
}

fn recv_type(ctx: &mut EmitCtx, v: &str) -> String {
    format!("{}({})", ctx.helper("__t"), v)
}

fn recv_repr(ctx: &mut EmitCtx, v: &str) -> String {
    format!("{}({})", ctx.helper("__repr"), v)
}

fn prop_path(p: &str, name: &str) -> String {
    format!("{} + {}", p, js_str(&format!(".{}", name)))
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn emit_checks(
    ctx: &mut EmitCtx,
    meta: &Metadata,
    extra_tags: &[ConstraintTag],
    v: &str,
    p: &str,
    errs: &str,
    out: &mut String,
    depth: usize,
) {
    match meta {
        Metadata::Primitive { primitive, tags } => {
            let merged: Vec<&ConstraintTag> = extra_tags.iter().chain(tags.iter()).collect();
            emit_primitive_checks(ctx, *primitive, &merged, v, p, errs, out, depth);
        }
        Metadata::Literal { value } => {
            let expected = js_str(&meta.label());
            let received = recv_repr(ctx, v);
            line(out, depth, &format!("if ({} !== {}) {{", v, json_text(value)));
            push_err(out, depth + 1, errs, p, &expected, &received);
            line(out, depth, "}");
        }
        Metadata::Object(o) => emit_object_checks(ctx, o, v, p, errs, out, depth),
        Metadata::Array { element, tags } => {
            let merged: Vec<&ConstraintTag> = extra_tags.iter().chain(tags.iter()).collect();
            emit_array_checks(ctx, element, &merged, v, p, errs, out, depth);
        }
        Metadata::Tuple { elements, rest } => {
            emit_tuple_checks(ctx, elements, rest.as_deref(), v, p, errs, out, depth);
        }
        Metadata::Union(u) => emit_union_checks(ctx, u, v, p, errs, out, depth),
        Metadata::Intersection { members } => {
            for m in members {
                emit_checks(ctx, m, &[], v, p, errs, out, depth);
            }
        }
        Metadata::Reference { name } => {
            let f = ctx.sibling(name, format!("_v{}", name));
            line(out, depth, &format!("{}({}, {}, {});", f, v, p, errs));
        }
        Metadata::Enum(e) => {
            let cond = e
                .members
                .iter()
                .map(|m| format!("{} === {}", v, json_text(&m.value)))
                .collect::<Vec<_>>()
                .join(" || ");
            let expected = js_str(&meta.label());
            let received = recv_repr(ctx, v);
            line(out, depth, &format!("if (!({})) {{", cond));
            push_err(out, depth + 1, errs, p, &expected, &received);
            line(out, depth, "}");
        }
        Metadata::Record { key, value } => {
            emit_record_checks(ctx, *key, value, v, p, errs, out, depth);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_primitive_checks(
    ctx: &mut EmitCtx,
    primitive: Primitive,
    tags: &[&ConstraintTag],
    v: &str,
    p: &str,
    errs: &str,
    out: &mut String,
    depth: usize,
) {
    match primitive {
        Primitive::String => {
            let received = recv_type(ctx, v);
            line(out, depth, &format!("if (typeof {} !== \"string\") {{", v));
            push_err(out, depth + 1, errs, p, "\"string\"", &received);
            let subs = string_tag_checks(ctx, tags, v);
            if subs.is_empty() {
                line(out, depth, "}");
            } else {
                line(out, depth, "} else {");
                for (cond, label) in subs {
                    let received = recv_repr(ctx, v);
                    line(out, depth + 1, &format!("if ({}) {{", cond));
                    push_err(out, depth + 2, errs, p, &js_str(&label), &received);
                    line(out, depth + 1, "}");
                }
                line(out, depth, "}");
            }
        }
        Primitive::Number => {
            let received = recv_type(ctx, v);
            line(
                out,
                depth,
                &format!("if (typeof {} !== \"number\" || !Number.isFinite({})) {{", v, v),
            );
            push_err(out, depth + 1, errs, p, "\"number\"", &received);
            let subs = number_tag_checks(tags, v);
            if subs.is_empty() {
                line(out, depth, "}");
            } else {
                line(out, depth, "} else {");
                for (cond, label) in subs {
                    line(out, depth + 1, &format!("if ({}) {{", cond));
                    push_err(out, depth + 2, errs, p, &js_str(&label), &format!("String({})", v));
                    line(out, depth + 1, "}");
                }
                line(out, depth, "}");
            }
        }
        Primitive::Boolean => {
            let received = recv_type(ctx, v);
            line(out, depth, &format!("if (typeof {} !== \"boolean\") {{", v));
            push_err(out, depth + 1, errs, p, "\"boolean\"", &received);
            line(out, depth, "}");
        }
        Primitive::BigInt => {
            let received = recv_type(ctx, v);
            line(out, depth, &format!("if (typeof {} !== \"bigint\") {{", v));
            push_err(out, depth + 1, errs, p, "\"bigint\"", &received);
            line(out, depth, "}");
        }
        Primitive::Null => {
            let received = recv_type(ctx, v);
            line(out, depth, &format!("if ({} !== null) {{", v));
            push_err(out, depth + 1, errs, p, "\"null\"", &received);
            line(out, depth, "}");
        }
        Primitive::Undefined => {
            let received = recv_type(ctx, v);
            line(out, depth, &format!("if ({} !== undefined) {{", v));
            push_err(out, depth + 1, errs, p, "\"undefined\"", &received);
            line(out, depth, "}");
        }
        Primitive::Never => {
            let received = recv_type(ctx, v);
            push_err(out, depth, errs, p, "\"never\"", &received);
        }
        Primitive::Any | Primitive::Unknown => {}
    }
}

/// `(condition, expected-label)` pairs for string constraints.
fn string_tag_checks(ctx: &mut EmitCtx, tags: &[&ConstraintTag], v: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for tag in tags {
        match tag {
            ConstraintTag::MinLength(n) => out.push((
                format!("{}.length < {}", v, n),
                format!("string (minLength {})", n),
            )),
            ConstraintTag::MaxLength(n) => out.push((
                format!("{}.length > {}", v, n),
                format!("string (maxLength {})", n),
            )),
            ConstraintTag::Pattern(pat) => {
                let c = ctx.const_regex(pat);
                out.push((format!("!{}.test({})", c, v), format!("string (pattern {})", pat)));
            }
            ConstraintTag::StartsWith(s) => out.push((
                format!("!{}.startsWith({})", v, js_str(s)),
                format!("string (startsWith {})", s),
            )),
            ConstraintTag::EndsWith(s) => out.push((
                format!("!{}.endsWith({})", v, js_str(s)),
                format!("string (endsWith {})", s),
            )),
            ConstraintTag::Includes(s) => out.push((
                format!("!{}.includes({})", v, js_str(s)),
                format!("string (includes {})", s),
            )),
            ConstraintTag::Format(f) => {
                ctx.helper("__re");
                out.push((
                    format!("!{}.test({})", format_regex_access(f.keyword()), v),
                    format!("string ({})", f.keyword()),
                ));
            }
            _ => {}
        }
    }
    out
}

fn number_tag_checks(tags: &[&ConstraintTag], v: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for tag in tags {
        match tag {
            ConstraintTag::Integer => out.push((
                format!("!Number.isInteger({})", v),
                "integer".to_string(),
            )),
            ConstraintTag::Minimum(n) => out.push((
                format!("{} < {}", v, n),
                format!("number (minimum {})", n),
            )),
            ConstraintTag::Maximum(n) => out.push((
                format!("{} > {}", v, n),
                format!("number (maximum {})", n),
            )),
            ConstraintTag::ExclusiveMinimum(n) => out.push((
                format!("{} <= {}", v, n),
                format!("number (exclusiveMinimum {})", n),
            )),
            ConstraintTag::ExclusiveMaximum(n) => out.push((
                format!("{} >= {}", v, n),
                format!("number (exclusiveMaximum {})", n),
            )),
            ConstraintTag::MultipleOf(n) => out.push((
                format!("{} % {} !== 0", v, n),
                format!("number (multipleOf {})", n),
            )),
            _ => {}
        }
    }
    out
}

fn scalar_primitive(meta: &Metadata) -> Option<Primitive> {
    match meta {
        Metadata::Primitive { primitive, .. } => Some(*primitive),
        _ => None,
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_object_checks(
    ctx: &mut EmitCtx,
    o: &ObjectMeta,
    v: &str,
    p: &str,
    errs: &str,
    out: &mut String,
    depth: usize,
) {
    let expected = js_str(&o.name.clone().unwrap_or_else(|| "object".to_string()));
    let received = recv_type(ctx, v);
    line(
        out,
        depth,
        &format!(
            "if (typeof {} !== \"object\" || {} === null || Array.isArray({})) {{",
            v, v, v
        ),
    );
    push_err(out, depth + 1, errs, p, &expected, &received);
    line(out, depth, "} else {");
    let d = depth + 1;
    for prop in &o.properties {
        let pv = member(v, &prop.name);
        let pp = prop_path(p, &prop.name);

        for t in transform_tags(prop) {
            let method = match t {
                TransformKind::Trim => "trim",
                TransformKind::Lowercase => "toLowerCase",
                TransformKind::Uppercase => "toUpperCase",
            };
            line(
                out,
                d,
                &format!(
                    "if (typeof {} === \"string\") {{ {} = {}.{}(); }}",
                    pv, pv, pv, method
                ),
            );
        }

        if o.coerce {
            match scalar_primitive(&prop.meta) {
                Some(Primitive::Number) => {
                    let c = ctx.fresh("c");
                    line(
                        out,
                        d,
                        &format!("if (typeof {} === \"string\" && {} !== \"\") {{", pv, pv),
                    );
                    line(out, d + 1, &format!("const {} = +{};", c, pv));
                    line(
                        out,
                        d + 1,
                        &format!("if (!Number.isNaN({})) {{ {} = {}; }}", c, pv, c),
                    );
                    line(out, d, "}");
                }
                Some(Primitive::Boolean) => {
                    line(
                        out,
                        d,
                        &format!(
                            "if ({} === \"true\" || {} === \"1\") {{ {} = true; }}",
                            pv, pv, pv
                        ),
                    );
                    line(
                        out,
                        d,
                        &format!(
                            "else if ({} === \"false\" || {} === \"0\") {{ {} = false; }}",
                            pv, pv, pv
                        ),
                    );
                }
                _ => {}
            }
        }

        if prop.optional {
            line(out, d, &format!("if ({} !== undefined) {{", pv));
            emit_checks(ctx, &prop.meta, &prop.tags, &pv, &pp, errs, out, d + 1);
            line(out, d, "}");
        } else {
            let expected = js_str(&prop.meta.label());
            line(out, d, &format!("if ({} === undefined) {{", pv));
            push_err(out, d + 1, errs, &pp, &expected, "\"undefined\"");
            line(out, d, "} else {");
            emit_checks(ctx, &prop.meta, &prop.tags, &pv, &pp, errs, out, d + 1);
            line(out, d, "}");
        }
    }
    line(out, depth, "}");
}

fn transform_tags(prop: &crate::metadata::Property) -> Vec<TransformKind> {
    let own = match &prop.meta {
        Metadata::Primitive { tags, .. } => tags.as_slice(),
        _ => &[],
    };
    prop.tags
        .iter()
        .chain(own.iter())
        .filter_map(|t| match t {
            ConstraintTag::Transform(k) => Some(*k),
            _ => None,
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn emit_array_checks(
    ctx: &mut EmitCtx,
    element: &Metadata,
    tags: &[&ConstraintTag],
    v: &str,
    p: &str,
    errs: &str,
    out: &mut String,
    depth: usize,
) {
    let received = recv_type(ctx, v);
    line(out, depth, &format!("if (!Array.isArray({})) {{", v));
    push_err(out, depth + 1, errs, p, "\"array\"", &received);
    line(out, depth, "} else {");
    let d = depth + 1;
    for tag in tags {
        match tag {
            ConstraintTag::MinItems(n) => {
                line(out, d, &format!("if ({}.length < {}) {{", v, n));
                push_err(
                    out,
                    d + 1,
                    errs,
                    p,
                    &js_str(&format!("array (minItems {})", n)),
                    &format!("String({}.length)", v),
                );
                line(out, d, "}");
            }
            ConstraintTag::MaxItems(n) => {
                line(out, d, &format!("if ({}.length > {}) {{", v, n));
                push_err(
                    out,
                    d + 1,
                    errs,
                    p,
                    &js_str(&format!("array (maxItems {})", n)),
                    &format!("String({}.length)", v),
                );
                line(out, d, "}");
            }
            ConstraintTag::UniqueItems => {
                let uniq = ctx.helper("__uniq");
                line(out, d, &format!("if (!{}({})) {{", uniq, v));
                push_err(
                    out,
                    d + 1,
                    errs,
                    p,
                    "\"array (uniqueItems)\"",
                    "\"duplicate items\"",
                );
                line(out, d, "}");
            }
            _ => {}
        }
    }
    let i = ctx.fresh("i");
    let e = ctx.fresh("e");
    line(
        out,
        d,
        &format!("for (let {} = 0; {} < {}.length; {}++) {{", i, i, v, i),
    );
    line(out, d + 1, &format!("const {} = {}[{}];", e, v, i));
    let ep = format!("{} + \"[\" + {} + \"]\"", p, i);
    emit_checks(ctx, element, &[], &e, &ep, errs, out, d + 1);
    line(out, d, "}");
    line(out, depth, "}");
}

#[allow(clippy::too_many_arguments)]
fn emit_tuple_checks(
    ctx: &mut EmitCtx,
    elements: &[Metadata],
    rest: Option<&Metadata>,
    v: &str,
    p: &str,
    errs: &str,
    out: &mut String,
    depth: usize,
) {
    let received = recv_type(ctx, v);
    line(out, depth, &format!("if (!Array.isArray({})) {{", v));
    push_err(out, depth + 1, errs, p, "\"tuple\"", &received);
    line(out, depth, "} else {");
    let d = depth + 1;
    let n = elements.len();
    let label = js_str(&format!("tuple ({} elements)", n));
    if rest.is_none() {
        line(out, d, &format!("if ({}.length !== {}) {{", v, n));
    } else {
        line(out, d, &format!("if ({}.length < {}) {{", v, n));
    }
    push_err(out, d + 1, errs, p, &label, &format!("String({}.length)", v));
    line(out, d, "}");
    for (idx, el) in elements.iter().enumerate() {
        let e = ctx.fresh("e");
        line(out, d, &format!("const {} = {}[{}];", e, v, idx));
        let ep = format!("{} + \"[{}]\"", p, idx);
        emit_checks(ctx, el, &[], &e, &ep, errs, out, d);
    }
    if let Some(r) = rest {
        let i = ctx.fresh("i");
        let e = ctx.fresh("e");
        line(
            out,
            d,
            &format!("for (let {} = {}; {} < {}.length; {}++) {{", i, n, i, v, i),
        );
        line(out, d + 1, &format!("const {} = {}[{}];", e, v, i));
        let ep = format!("{} + \"[\" + {} + \"]\"", p, i);
        emit_checks(ctx, r, &[], &e, &ep, errs, out, d + 1);
        line(out, d, "}");
    }
    line(out, depth, "}");
}

#[allow(clippy::too_many_arguments)]
fn emit_record_checks(
    ctx: &mut EmitCtx,
    key: RecordKey,
    value: &Metadata,
    v: &str,
    p: &str,
    errs: &str,
    out: &mut String,
    depth: usize,
) {
    let received = recv_type(ctx, v);
    line(
        out,
        depth,
        &format!(
            "if (typeof {} !== \"object\" || {} === null || Array.isArray({})) {{",
            v, v, v
        ),
    );
    push_err(out, depth + 1, errs, p, "\"record\"", &received);
    line(out, depth, "} else {");
    let d = depth + 1;
    let k = ctx.fresh("k");
    line(out, d, &format!("for (const {} of Object.keys({})) {{", k, v));
    let kp = format!("{} + \".\" + {}", p, k);
    if key == RecordKey::Number {
        line(out, d + 1, &format!("if (Number.isNaN(+{})) {{", k));
        push_err(
            out,
            d + 2,
            errs,
            &kp,
            "\"numeric key\"",
            &format!("{}", k),
        );
        line(out, d + 1, "}");
    }
    let vv = format!("{}[{}]", v, k);
    emit_checks(ctx, value, &[], &vv, &kp, errs, out, d + 1);
    line(out, d, "}");
    line(out, depth, "}");
}

/// `(case-value JSON, variant)` pairs for a discriminated union, when every
/// variant resolves to an object carrying the discriminant as a literal.
fn discriminated_cases<'m>(
    ctx: &EmitCtx<'m>,
    u: &'m UnionMeta,
    disc: &str,
) -> Option<Vec<(String, &'m Metadata)>> {
    let mut cases = Vec::with_capacity(u.variants.len());
    for variant in &u.variants {
        let resolved = ctx.registry.resolve(variant);
        let obj = resolved.as_object()?;
        let prop = obj.properties.iter().find(|p| p.name == disc)?;
        let Metadata::Literal { value } = &prop.meta else {
            return None;
        };
        cases.push((json_text(value), variant));
    }
    Some(cases)
}

#[allow(clippy::too_many_arguments)]
fn emit_union_checks(
    ctx: &mut EmitCtx,
    u: &UnionMeta,
    v: &str,
    p: &str,
    errs: &str,
    out: &mut String,
    depth: usize,
) {
    let mut depth = depth;
    let nullable = u.nullable;
    if nullable {
        line(out, depth, &format!("if ({} !== null) {{", v));
        depth += 1;
    }

    if let Some(values) = u.as_string_enum() {
        let cond = values
            .iter()
            .map(|s| format!("{} === {}", v, js_str(s)))
            .collect::<Vec<_>>()
            .join(" || ");
        let expected = values
            .iter()
            .map(|s| format!("\"{}\"", s))
            .collect::<Vec<_>>()
            .join(" | ");
        let received = recv_repr(ctx, v);
        line(out, depth, &format!("if (!({})) {{", cond));
        push_err(out, depth + 1, errs, p, &js_str(&expected), &received);
        line(out, depth, "}");
    } else if u.variants.len() == 1 {
        let variant = u.variants[0].clone();
        emit_checks(ctx, &variant, &[], v, p, errs, out, depth);
    } else if let Some(cases) = u
        .discriminant
        .as_ref()
        .and_then(|d| discriminated_cases(ctx, u, d).map(|c| (d.clone(), c)))
    {
        let (disc, cases) = cases;
        let received = recv_type(ctx, v);
        line(
            out,
            depth,
            &format!("if (typeof {} !== \"object\" || {} === null) {{", v, v),
        );
        push_err(out, depth + 1, errs, p, "\"union\"", &received);
        line(out, depth, "} else {");
        let d = depth + 1;
        let dv = member(v, &disc);
        line(out, d, &format!("switch ({}) {{", dv));
        let mut labels = Vec::new();
        let cases: Vec<(String, Metadata)> =
            cases.into_iter().map(|(c, m)| (c, m.clone())).collect();
        for (case_val, variant) in &cases {
            labels.push(case_val.clone());
            line(out, d + 1, &format!("case {}: {{", case_val));
            emit_checks(ctx, variant, &[], v, p, errs, out, d + 2);
            line(out, d + 2, "break;");
            line(out, d + 1, "}");
        }
        let received = recv_repr(ctx, &dv);
        line(out, d + 1, "default: {");
        push_err(
            out,
            d + 2,
            errs,
            &prop_path(p, &disc),
            &js_str(&labels.join(" | ")),
            &received,
        );
        line(out, d + 1, "}");
        line(out, d, "}");
        line(out, depth, "}");
    } else {
        let ok = ctx.fresh("ok");
        line(out, depth, &format!("let {} = false;", ok));
        let variants = u.variants.clone();
        for (idx, variant) in variants.iter().enumerate() {
            if idx == 0 {
                line(out, depth, "{");
            } else {
                line(out, depth, &format!("if (!{}) {{", ok));
            }
            let e = ctx.fresh("e");
            line(out, depth + 1, &format!("const {} = [];", e));
            emit_checks(ctx, variant, &[], v, p, &e, out, depth + 1);
            line(
                out,
                depth + 1,
                &format!("if ({}.length === 0) {{ {} = true; }}", e, ok),
            );
            line(out, depth, "}");
        }
        let received = recv_type(ctx, v);
        line(out, depth, &format!("if (!{}) {{", ok));
        push_err(out, depth + 1, errs, p, "\"union\"", &received);
        line(out, depth, "}");
    }

    if nullable {
        depth -= 1;
        line(out, depth, "}");
    }
}
