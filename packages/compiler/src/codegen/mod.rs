//! Companion code generation.
//!
//! For each named type in the needed-set this produces one JavaScript
//! module exporting fast `validate`/`assert`/`serialize` functions and an
//! optional Standard Schema wrapper, plus one shared helpers module per
//! output root. Synthesis is per-type independent and fans out across CPU
//! cores; the registry is frozen before any worker starts.

mod emit;
mod helpers;
mod stringify;
mod validate;

use crate::metadata::FrozenRegistry;
use rayon::prelude::*;
use thiserror::Error;

pub use helpers::{HELPERS_FILE_NAME, HELPERS_JS};

#[derive(Debug, Clone, Default)]
pub struct CodegenOptions {
    pub validation: bool,
    pub serialization: bool,
    pub standard_schema: bool,
    /// Directory the companions are written into, e.g. `dist/__tsnest__`.
    pub out_base: String,
}

/// One generated file, held in memory until the batch write after emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionFile {
    pub path: String,
    pub text: String,
    /// The companion's type, `None` for the shared helpers module.
    pub type_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("no metadata registered for type `{0}`")]
    UnknownType(String),
    #[error("type `{0}` references unregistered type `{1}`")]
    UnresolvedReference(String, String),
}

pub fn validate_fn_name(type_name: &str) -> String {
    format!("validate{}", type_name)
}

pub fn assert_fn_name(type_name: &str) -> String {
    format!("assert{}", type_name)
}

pub fn serialize_fn_name(type_name: &str) -> String {
    format!("serialize{}", type_name)
}

pub fn schema_fn_name(type_name: &str) -> String {
    format!("schema{}", type_name)
}

pub fn companion_file_name(type_name: &str) -> String {
    format!("{}.js", type_name)
}

fn join_out(base: &str, file: &str) -> String {
    if base.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), file)
    }
}

/// Generates the helpers module plus one companion per requested type.
///
/// Output is deterministic: types are processed in sorted order and every
/// worker writes into its own position-indexed slot.
pub fn generate_companions(
    registry: &FrozenRegistry,
    names: &[String],
    opts: &CodegenOptions,
) -> Result<Vec<CompanionFile>, CodegenError> {
    let mut sorted: Vec<&str> = names.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    for name in &sorted {
        let meta = registry
            .get(name)
            .ok_or_else(|| CodegenError::UnknownType(name.to_string()))?;
        let mut refs = Vec::new();
        meta.references(&mut refs);
        for r in refs {
            if !registry.contains(&r) {
                return Err(CodegenError::UnresolvedReference(name.to_string(), r));
            }
        }
    }

    let mut files = vec![CompanionFile {
        path: join_out(&opts.out_base, HELPERS_FILE_NAME),
        text: HELPERS_JS.to_string(),
        type_name: None,
    }];

    let companions: Vec<CompanionFile> = sorted
        .par_iter()
        .map(|name| {
            let text = emit::companion_source(registry, name, opts);
            CompanionFile {
                path: join_out(&opts.out_base, &companion_file_name(name)),
                text,
                type_name: Some(name.to_string()),
            }
        })
        .collect();
    files.extend(companions);
    Ok(files)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::metadata::{Metadata, MetadataRegistry, ObjectMeta, Primitive, Property, Tags};

    // Companion-level behavior is covered in emit.rs tests; here we pin the
    // batch-level properties.

    fn simple_object(name: &str, prop_name: &str, reference: Option<&str>) -> Metadata {
        let meta = match reference {
            Some(r) => Metadata::reference(r),
            None => Metadata::primitive(Primitive::String),
        };
        Metadata::Object(ObjectMeta {
            name: Some(name.to_string()),
            properties: vec![Property {
                name: prop_name.to_string(),
                meta,
                optional: false,
                readonly: false,
                tags: Tags::new(),
            }],
            coerce: false,
        })
    }

    #[test]
    fn helpers_file_is_always_first() {
        let registry = MetadataRegistry::new().freeze();
        let opts = CodegenOptions {
            validation: true,
            serialization: true,
            standard_schema: false,
            out_base: "dist/__tsnest__".to_string(),
        };
        let files = generate_companions(&registry, &[], &opts).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "dist/__tsnest__/__helpers.js");
        assert!(files[0].type_name.is_none());
    }

    #[test]
    fn unknown_type_is_an_error() {
        let registry = MetadataRegistry::new().freeze();
        let opts = CodegenOptions::default();
        let err = generate_companions(&registry, &["Nope".to_string()], &opts).unwrap_err();
        assert!(matches!(err, CodegenError::UnknownType(_)));
    }

    #[test]
    fn generation_is_deterministic() {
        let mut reg = MetadataRegistry::new();
        reg.insert("UserResponse", simple_object("UserResponse", "id", None));
        reg.insert(
            "CreateUserDto",
            simple_object("CreateUserDto", "user", Some("UserResponse")),
        );
        let registry = reg.freeze();
        let opts = CodegenOptions {
            validation: true,
            serialization: true,
            standard_schema: true,
            out_base: "out".to_string(),
        };
        let names = vec!["UserResponse".to_string(), "CreateUserDto".to_string()];
        let a = generate_companions(&registry, &names, &opts).unwrap();
        let b = generate_companions(&registry, &names, &opts).unwrap();
        assert_eq!(a, b);
        // Sorted regardless of request order.
        assert_eq!(a[1].type_name.as_deref(), Some("CreateUserDto"));
        assert_eq!(a[2].type_name.as_deref(), Some("UserResponse"));
    }
}
