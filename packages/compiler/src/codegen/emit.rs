//! Assembly of one companion module.

use super::{stringify, validate, CodegenOptions};
use crate::metadata::{FrozenRegistry, Metadata};
use std::collections::{BTreeMap, BTreeSet};
use ts::LiteralValue;

pub(crate) struct EmitCtx<'a> {
    pub registry: &'a FrozenRegistry,
    pub type_name: &'a str,
    /// Sibling companion imports: type name → function names.
    pub sibling_imports: BTreeMap<String, BTreeSet<String>>,
    pub helper_imports: BTreeSet<&'static str>,
    /// Module-level constants (hoisted pattern regexes).
    pub consts: Vec<String>,
    /// Module-level local functions generated on demand by the serializer.
    pub locals: Vec<String>,
    counter: usize,
}

impl<'a> EmitCtx<'a> {
    fn new(registry: &'a FrozenRegistry, type_name: &'a str) -> Self {
        Self {
            registry,
            type_name,
            sibling_imports: BTreeMap::new(),
            helper_imports: BTreeSet::new(),
            consts: Vec::new(),
            locals: Vec::new(),
            counter: 0,
        }
    }

    pub fn fresh(&mut self, prefix: &str) -> String {
        let n = self.counter;
        self.counter += 1;
        format!("{}{}", prefix, n)
    }

    /// Registers a helpers-module import and returns the helper's name.
    pub fn helper(&mut self, name: &'static str) -> &'static str {
        self.helper_imports.insert(name);
        name
    }

    /// Registers an import from a sibling companion, unless the reference is
    /// to the current type (whose functions live in this very module).
    pub fn sibling(&mut self, type_name: &str, func: String) -> String {
        if type_name != self.type_name {
            self.sibling_imports
                .entry(type_name.to_string())
                .or_default()
                .insert(func.clone());
        }
        func
    }

    /// Hoists a user pattern into a module-level `RegExp` constant.
    pub fn const_regex(&mut self, pattern: &str) -> String {
        let name = self.fresh("_p");
        self.consts
            .push(format!("const {} = new RegExp({});", name, js_str(pattern)));
        name
    }
}

/// JS string literal for `s`.
pub(crate) fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// JSON text of a literal value (also a valid JS expression).
pub(crate) fn json_text(v: &LiteralValue) -> String {
    match v {
        LiteralValue::String(s) => js_str(s),
        LiteralValue::Number(n) => {
            if n.is_finite() {
                format!("{}", n)
            } else {
                "null".to_string()
            }
        }
        LiteralValue::Boolean(b) => b.to_string(),
    }
}

fn is_js_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Member access, falling back to bracket syntax for non-identifier keys.
pub(crate) fn member(base: &str, name: &str) -> String {
    if is_js_ident(name) {
        format!("{}.{}", base, name)
    } else {
        format!("{}[{}]", base, js_str(name))
    }
}

pub(crate) fn line(out: &mut String, depth: usize, text: &str) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(text);
    out.push('\n');
}

/// Produces the full source of one companion module.
pub(crate) fn companion_source(
    registry: &FrozenRegistry,
    name: &str,
    opts: &CodegenOptions,
) -> String {
    let Some(meta) = registry.get(name) else {
        return String::new();
    };
    let mut ctx = EmitCtx::new(registry, name);
    let mut body = String::new();

    if opts.validation {
        validate::emit_validator_fn(&mut ctx, meta, &mut body);
        emit_validate_export(&mut ctx, &mut body);
        emit_assert_export(&mut ctx, &mut body);
    }
    if opts.serialization {
        stringify::emit_serializer_fn(&mut ctx, meta, &mut body);
    }
    if opts.standard_schema && opts.validation {
        emit_schema_export(&mut ctx, &mut body);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "// Generated by tsnest for type {}. Do not edit.\n",
        name
    ));
    if !ctx.helper_imports.is_empty() {
        let names: Vec<&str> = ctx.helper_imports.iter().copied().collect();
        out.push_str(&format!(
            "import {{ {} }} from \"./{}\";\n",
            names.join(", "),
            super::HELPERS_FILE_NAME
        ));
    }
    for (ty, funcs) in &ctx.sibling_imports {
        let names: Vec<&str> = funcs.iter().map(String::as_str).collect();
        out.push_str(&format!(
            "import {{ {} }} from \"./{}\";\n",
            names.join(", "),
            super::companion_file_name(ty)
        ));
    }
    out.push('\n');
    for c in &ctx.consts {
        out.push_str(c);
        out.push('\n');
    }
    if !ctx.consts.is_empty() {
        out.push('\n');
    }
    out.push_str(&body);
    for local in &ctx.locals {
        out.push('\n');
        out.push_str(local);
    }
    out
}

fn emit_validate_export(ctx: &mut EmitCtx, out: &mut String) {
    let t = ctx.type_name;
    out.push_str(&format!("export function validate{}(input) {{\n", t));
    out.push_str("  const errors = [];\n");
    out.push_str(&format!("  _v{}(input, \"input\", errors);\n", t));
    out.push_str("  return errors.length === 0\n");
    out.push_str("    ? { success: true, data: input }\n");
    out.push_str("    : { success: false, errors: errors };\n");
    out.push_str("}\n\n");
}

fn emit_assert_export(ctx: &mut EmitCtx, out: &mut String) {
    ctx.helper("ValidationError");
    let t = ctx.type_name;
    out.push_str(&format!("export function assert{}(input) {{\n", t));
    out.push_str(&format!("  const result = validate{}(input);\n", t));
    out.push_str("  if (!result.success) {\n");
    out.push_str(&format!(
        "    throw new ValidationError({}, result.errors);\n",
        js_str(t)
    ));
    out.push_str("  }\n");
    out.push_str("  return result.data;\n");
    out.push_str("}\n\n");
}

fn emit_schema_export(ctx: &mut EmitCtx, out: &mut String) {
    let t = ctx.type_name;
    out.push_str(&format!("export function schema{}() {{\n", t));
    out.push_str("  return {\n");
    out.push_str("    \"~standard\": {\n");
    out.push_str("      version: 1,\n");
    out.push_str("      vendor: \"tsnest\",\n");
    out.push_str("      validate(value) {\n");
    out.push_str(&format!("        const r = validate{}(value);\n", t));
    out.push_str("        if (r.success) {\n");
    out.push_str("          return { value: r.data };\n");
    out.push_str("        }\n");
    out.push_str("        return {\n");
    out.push_str("          issues: r.errors.map((e) => ({\n");
    out.push_str(
        "            message: \"expected \" + e.expected + \", received \" + e.received,\n",
    );
    out.push_str("            path: e.path.split(\".\").slice(1),\n");
    out.push_str("          })),\n");
    out.push_str("        };\n");
    out.push_str("      },\n");
    out.push_str("    },\n");
    out.push_str("  };\n");
    out.push_str("}\n\n");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::metadata::{
        ConstraintTag, MetadataRegistry, ObjectMeta, Primitive, Property, StringFormat, Tags,
    };
    use smallvec::smallvec;

    fn prop(name: &str, meta: Metadata) -> Property {
        Property {
            name: name.to_string(),
            meta,
            optional: false,
            readonly: false,
            tags: Tags::new(),
        }
    }

    fn user_dto_registry() -> FrozenRegistry {
        let mut reg = MetadataRegistry::new();
        let name_meta = Metadata::Primitive {
            primitive: Primitive::String,
            tags: smallvec![ConstraintTag::MinLength(1), ConstraintTag::MaxLength(255)],
        };
        let email_meta = Metadata::Primitive {
            primitive: Primitive::String,
            tags: smallvec![ConstraintTag::Format(StringFormat::Email)],
        };
        let age_meta = Metadata::Primitive {
            primitive: Primitive::Number,
            tags: smallvec![ConstraintTag::Minimum(0.0), ConstraintTag::Maximum(150.0)],
        };
        reg.insert(
            "CreateUserDto",
            Metadata::Object(ObjectMeta {
                name: Some("CreateUserDto".to_string()),
                properties: vec![
                    prop("name", name_meta),
                    prop("email", email_meta),
                    prop("age", age_meta),
                ],
                coerce: false,
            }),
        );
        reg.freeze()
    }

    fn all_transforms() -> CodegenOptions {
        CodegenOptions {
            validation: true,
            serialization: true,
            standard_schema: true,
            out_base: String::new(),
        }
    }

    #[test]
    fn companion_exports_all_families() {
        let registry = user_dto_registry();
        let src = companion_source(&registry, "CreateUserDto", &all_transforms());
        assert!(src.contains("export function validateCreateUserDto(input)"));
        assert!(src.contains("export function assertCreateUserDto(input)"));
        assert!(src.contains("export function serializeCreateUserDto(input)"));
        assert!(src.contains("export function schemaCreateUserDto()"));
        assert!(src.contains("from \"./__helpers.js\""));
    }

    #[test]
    fn validator_checks_bounds_and_formats() {
        let registry = user_dto_registry();
        let src = companion_source(&registry, "CreateUserDto", &all_transforms());
        assert!(src.contains("input.name.length < 1"));
        assert!(src.contains("input.name.length > 255"));
        assert!(src.contains("__re.email.test(input.email)"));
        assert!(src.contains("input.age < 0"));
        assert!(src.contains("input.age > 150"));
        // Error paths are rooted at "input".
        assert!(src.contains("path + \".name\""));
        assert!(src.contains("_vCreateUserDto(input, \"input\", errors)"));
    }

    #[test]
    fn serializer_emits_key_fragments_in_declaration_order() {
        let registry = user_dto_registry();
        let src = companion_source(&registry, "CreateUserDto", &all_transforms());
        let name_at = src.find("\\\"name\\\":").expect("name fragment");
        let email_at = src.find("\\\"email\\\":").expect("email fragment");
        let age_at = src.find("\\\"age\\\":").expect("age fragment");
        assert!(name_at < email_at && email_at < age_at);
    }

    #[test]
    fn recursive_type_serializer_calls_itself_without_import() {
        let mut reg = MetadataRegistry::new();
        reg.insert(
            "Category",
            Metadata::Object(ObjectMeta {
                name: Some("Category".to_string()),
                properties: vec![
                    prop("id", Metadata::primitive(Primitive::Number)),
                    prop(
                        "children",
                        Metadata::Array {
                            element: Box::new(Metadata::reference("Category")),
                            tags: Tags::new(),
                        },
                    ),
                ],
                coerce: false,
            }),
        );
        let registry = reg.freeze();
        let src = companion_source(&registry, "Category", &all_transforms());
        assert!(src.contains("serializeCategory("));
        assert!(src.contains("_vCategory("));
        assert!(!src.contains("from \"./Category.js\""));
    }

    #[test]
    fn cross_type_reference_imports_sibling_companion() {
        let mut reg = MetadataRegistry::new();
        reg.insert(
            "Inner",
            Metadata::Object(ObjectMeta {
                name: Some("Inner".to_string()),
                properties: vec![prop("n", Metadata::primitive(Primitive::Number))],
                coerce: false,
            }),
        );
        reg.insert(
            "Outer",
            Metadata::Object(ObjectMeta {
                name: Some("Outer".to_string()),
                properties: vec![prop("inner", Metadata::reference("Inner"))],
                coerce: false,
            }),
        );
        let registry = reg.freeze();
        let src = companion_source(&registry, "Outer", &all_transforms());
        assert!(src.contains("import { _vInner, serializeInner } from \"./Inner.js\";"));
    }

    #[test]
    fn coercive_object_parses_strings_in_validator() {
        let mut reg = MetadataRegistry::new();
        reg.insert(
            "ListQuery",
            Metadata::Object(ObjectMeta {
                name: Some("ListQuery".to_string()),
                properties: vec![
                    Property {
                        optional: true,
                        ..prop("page", Metadata::primitive(Primitive::Number))
                    },
                    Property {
                        optional: true,
                        ..prop("ascending", Metadata::primitive(Primitive::Boolean))
                    },
                ],
                coerce: true,
            }),
        );
        let registry = reg.freeze();
        let src = companion_source(&registry, "ListQuery", &all_transforms());
        assert!(src.contains("input.page = "));
        assert!(src.contains("input.ascending === \"true\" || input.ascending === \"1\""));
    }

    #[test]
    fn validation_only_omits_serializer() {
        let registry = user_dto_registry();
        let opts = CodegenOptions {
            validation: true,
            serialization: false,
            standard_schema: false,
            out_base: String::new(),
        };
        let src = companion_source(&registry, "CreateUserDto", &opts);
        assert!(src.contains("export function validateCreateUserDto"));
        assert!(!src.contains("serializeCreateUserDto"));
        assert!(!src.contains("schemaCreateUserDto"));
    }
}
