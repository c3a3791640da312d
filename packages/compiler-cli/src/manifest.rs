// Companion manifest
//
// Consolidated pointers to the generated companions, written into the
// output root alongside them.

use indexmap::IndexMap;
use serde::Serialize;
use tsnest_compiler::codegen::{
    assert_fn_name, serialize_fn_name, validate_fn_name, CodegenOptions, CompanionFile,
};

pub const MANIFEST_FILE_NAME: &str = "tsnest.manifest.json";

#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serialize: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub version: u32,
    pub companions: IndexMap<String, ManifestEntry>,
}

pub fn build_manifest(companions: &[CompanionFile], opts: &CodegenOptions) -> Manifest {
    let mut entries = IndexMap::new();
    for file in companions {
        let Some(type_name) = &file.type_name else {
            continue;
        };
        entries.insert(
            type_name.clone(),
            ManifestEntry {
                file: file.path.clone(),
                validate: opts.validation.then(|| validate_fn_name(type_name)),
                assert: opts.validation.then(|| assert_fn_name(type_name)),
                serialize: opts.serialization.then(|| serialize_fn_name(type_name)),
            },
        );
    }
    Manifest {
        version: 1,
        companions: entries,
    }
}
