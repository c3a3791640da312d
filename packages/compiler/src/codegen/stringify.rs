//! Serializer emission.
//!
//! Output is composed from literal key fragments and direct property
//! access. Optional properties are guarded and the separator token is
//! tracked by the generator: a static comma while every preceding property
//! is unconditionally present, a runtime `sep` variable otherwise.

use super::emit::{js_str, json_text, line, member, EmitCtx};
use crate::metadata::{Metadata, ObjectMeta, Primitive, UnionMeta};

pub(crate) fn emit_serializer_fn(ctx: &mut EmitCtx, meta: &Metadata, out: &mut String) {
    out.push_str(&format!(
        "export function serialize{}(input) {{\n",
        ctx.type_name
    ));
    match meta {
        Metadata::Object(o) => emit_object_statements(ctx, o, "input", out, 1),
        other => {
            let frag = fragment(ctx, other, "input");
            line(out, 1, &format!("return {};", frag));
        }
    }
    out.push_str("}\n\n");
}

/// Builds a JS concatenation expression from literal and computed pieces,
/// merging adjacent literals at generation time.
struct ExprBuilder {
    pieces: Vec<String>,
    lit: String,
}

impl ExprBuilder {
    fn new() -> Self {
        Self {
            pieces: Vec::new(),
            lit: String::new(),
        }
    }

    fn push_lit(&mut self, s: &str) {
        self.lit.push_str(s);
    }

    fn push_expr(&mut self, e: String) {
        if !self.lit.is_empty() {
            let lit = std::mem::take(&mut self.lit);
            self.pieces.push(js_str(&lit));
        }
        self.pieces.push(e);
    }

    fn finish(mut self) -> String {
        if !self.lit.is_empty() {
            let lit = std::mem::take(&mut self.lit);
            self.pieces.push(js_str(&lit));
        }
        match self.pieces.len() {
            0 => "\"\"".to_string(),
            1 => self.pieces.pop().unwrap(),
            _ => format!("({})", self.pieces.join(" + ")),
        }
    }
}

/// JSON text of an object key followed by a colon, e.g. `"name":`.
fn key_fragment(name: &str) -> String {
    let mut s = serde_json::to_string(name).unwrap_or_else(|_| "\"\"".to_string());
    s.push(':');
    s
}

fn emit_object_statements(
    ctx: &mut EmitCtx,
    o: &ObjectMeta,
    v: &str,
    out: &mut String,
    depth: usize,
) {
    line(out, depth, "let out = \"{\";");
    let leading_optional = o.properties.first().map(|p| p.optional).unwrap_or(false);
    if leading_optional {
        line(out, depth, "let sep = \"\";");
        for prop in &o.properties {
            let pv = member(v, &prop.name);
            let frag = fragment(ctx, &prop.meta, &pv);
            let stmt = format!(
                "out += sep + {} + {}; sep = \",\";",
                js_str(&key_fragment(&prop.name)),
                frag
            );
            if prop.optional {
                line(out, depth, &format!("if ({} !== undefined) {{ {} }}", pv, stmt));
            } else {
                line(out, depth, &stmt);
            }
        }
    } else {
        let mut first = true;
        for prop in &o.properties {
            let pv = member(v, &prop.name);
            let frag = fragment(ctx, &prop.meta, &pv);
            let key = if first {
                key_fragment(&prop.name)
            } else {
                format!(",{}", key_fragment(&prop.name))
            };
            let stmt = format!("out += {} + {};", js_str(&key), frag);
            if prop.optional {
                line(out, depth, &format!("if ({} !== undefined) {{ {} }}", pv, stmt));
            } else {
                line(out, depth, &stmt);
            }
            first = false;
        }
    }
    line(out, depth, "out += \"}\";");
    line(out, depth, "return out;");
}

/// A JS expression producing the JSON text of `v` for the given metadata.
pub(crate) fn fragment(ctx: &mut EmitCtx, meta: &Metadata, v: &str) -> String {
    match meta {
        Metadata::Primitive { primitive, .. } => match primitive {
            Primitive::String => format!("{}({})", ctx.helper("__s"), v),
            Primitive::Number => format!("{}({})", ctx.helper("__n"), v),
            Primitive::Boolean => format!("({} ? \"true\" : \"false\")", v),
            Primitive::BigInt => format!("('\"' + {}.toString() + '\"')", v),
            Primitive::Null | Primitive::Undefined | Primitive::Never => "\"null\"".to_string(),
            Primitive::Any | Primitive::Unknown => format!("{}({})", ctx.helper("__j"), v),
        },
        Metadata::Literal { value } => js_str(&json_text(value)),
        Metadata::Enum(_) => format!("{}({})", ctx.helper("__j"), v),
        Metadata::Reference { name } => {
            let f = ctx.sibling(name, format!("serialize{}", name));
            format!("{}({})", f, v)
        }
        Metadata::Array { element, .. } => {
            let x = ctx.fresh("x");
            let inner = fragment(ctx, element, &x);
            format!(
                "(\"[\" + {}.map(({}) => {}).join(\",\") + \"]\")",
                v, x, inner
            )
        }
        Metadata::Tuple { elements, rest } => {
            let mut b = ExprBuilder::new();
            b.push_lit("[");
            for (idx, el) in elements.iter().enumerate() {
                if idx > 0 {
                    b.push_lit(",");
                }
                let ev = format!("{}[{}]", v, idx);
                let frag = fragment(ctx, el, &ev);
                b.push_expr(frag);
            }
            if let Some(r) = rest {
                let x = ctx.fresh("x");
                let inner = fragment(ctx, r, &x);
                b.push_expr(format!(
                    "({}.length > {} ? \",\" + {}.slice({}).map(({}) => {}).join(\",\") : \"\")",
                    v,
                    elements.len(),
                    v,
                    elements.len(),
                    x,
                    inner
                ));
            }
            b.push_lit("]");
            b.finish()
        }
        Metadata::Object(o) => {
            if o.properties.is_empty() {
                return "\"{}\"".to_string();
            }
            if o.properties.iter().all(|p| !p.optional) {
                let mut b = ExprBuilder::new();
                b.push_lit("{");
                for (idx, prop) in o.properties.iter().enumerate() {
                    if idx > 0 {
                        b.push_lit(",");
                    }
                    b.push_lit(&key_fragment(&prop.name));
                    let pv = member(v, &prop.name);
                    let frag = fragment(ctx, &prop.meta, &pv);
                    b.push_expr(frag);
                }
                b.push_lit("}");
                b.finish()
            } else {
                let f = ctx.fresh("_s");
                let mut body = String::new();
                body.push_str(&format!("function {}(v) {{\n", f));
                emit_object_statements(ctx, o, "v", &mut body, 1);
                body.push_str("}\n");
                ctx.locals.push(body);
                format!("{}({})", f, v)
            }
        }
        Metadata::Union(u) => union_fragment(ctx, u, v),
        Metadata::Record { key: _, value } => {
            let f = ctx.fresh("_s");
            let k = ctx.fresh("k");
            let inner = {
                let vv = format!("v[{}]", k);
                fragment(ctx, value, &vv)
            };
            let mut body = String::new();
            body.push_str(&format!("function {}(v) {{\n", f));
            line(&mut body, 1, "let out = \"{\";");
            line(&mut body, 1, "let sep = \"\";");
            line(
                &mut body,
                1,
                &format!("for (const {} of Object.keys(v)) {{", k),
            );
            line(
                &mut body,
                2,
                &format!("out += sep + JSON.stringify({}) + \":\" + {};", k, inner),
            );
            line(&mut body, 2, "sep = \",\";");
            line(&mut body, 1, "}");
            line(&mut body, 1, "return out + \"}\";");
            body.push_str("}\n");
            ctx.locals.push(body);
            format!("{}({})", f, v)
        }
        Metadata::Intersection { .. } => format!("{}({})", ctx.helper("__j"), v),
    }
}

fn union_fragment(ctx: &mut EmitCtx, u: &UnionMeta, v: &str) -> String {
    let inner = if u.as_string_enum().is_some() {
        format!("{}({})", ctx.helper("__s"), v)
    } else if u.variants.len() == 1 {
        let variant = u.variants[0].clone();
        fragment(ctx, &variant, v)
    } else if let Some(disc) = &u.discriminant {
        let disc = disc.clone();
        let cases = discriminant_cases(ctx, u, &disc);
        match cases {
            Some(cases) => {
                let f = ctx.fresh("_s");
                let mut arms = Vec::new();
                for (case_val, variant) in cases {
                    let frag = fragment(ctx, &variant, "v");
                    arms.push((case_val, frag));
                }
                let mut body = String::new();
                body.push_str(&format!("function {}(v) {{\n", f));
                line(&mut body, 1, &format!("switch ({}) {{", member("v", &disc)));
                for (case_val, frag) in arms {
                    line(
                        &mut body,
                        2,
                        &format!("case {}: return {};", case_val, frag),
                    );
                }
                line(&mut body, 1, "}");
                line(
                    &mut body,
                    1,
                    &format!("return {}(v);", ctx.helper("__j")),
                );
                body.push_str("}\n");
                ctx.locals.push(body);
                format!("{}({})", f, v)
            }
            None => format!("{}({})", ctx.helper("__j"), v),
        }
    } else {
        format!("{}({})", ctx.helper("__j"), v)
    };
    if u.nullable {
        format!("({} === null ? \"null\" : {})", v, inner)
    } else {
        inner
    }
}

/// Owned `(case JSON, variant)` pairs, mirroring the validator's dispatch.
fn discriminant_cases(
    ctx: &EmitCtx<'_>,
    u: &UnionMeta,
    disc: &str,
) -> Option<Vec<(String, Metadata)>> {
    let mut cases = Vec::with_capacity(u.variants.len());
    for variant in &u.variants {
        let resolved = ctx.registry.resolve(variant).clone();
        let obj = resolved.as_object()?.clone();
        let prop = obj.properties.iter().find(|p| p.name == disc)?;
        let Metadata::Literal { value } = &prop.meta else {
            return None;
        };
        cases.push((json_text(value), variant.clone()));
    }
    Some(cases)
}
