// Post-processing cache
//
// A small record beside the host's incremental state file that lets warm
// rebuilds skip analysis, code generation and OpenAPI synthesis. Valid
// only when the schema version and config hash match and every recorded
// output still exists non-empty.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use ts::CompilerOptions;

pub const CACHE_SCHEMA_VERSION: u32 = 1;
pub const CACHE_SUFFIX: &str = ".tsnest";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostProcessCache {
    pub v: u32,
    #[serde(rename = "configHash")]
    pub config_hash: String,
    pub outputs: Vec<String>,
}

impl PostProcessCache {
    pub fn new(config_hash: String, outputs: Vec<String>) -> Self {
        Self {
            v: CACHE_SCHEMA_VERSION,
            config_hash,
            outputs,
        }
    }

    /// Reads the cache; any IO or parse failure counts as no cache.
    pub fn load(path: &Path) -> Option<Self> {
        let bytes = fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn is_valid(&self, config_hash: &str) -> bool {
        self.v == CACHE_SCHEMA_VERSION
            && self.config_hash == config_hash
            && self.outputs.iter().all(|p| {
                fs::metadata(p)
                    .map(|m| m.is_file() && m.len() > 0)
                    .unwrap_or(false)
            })
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let bytes = serde_json::to_vec(self)?;
        write_atomic(path, &bytes)
    }
}

/// Location of the cache: the incremental build-info file with a fixed
/// suffix appended.
pub fn cache_path(options: &CompilerOptions, out_dir: &str) -> PathBuf {
    let build_info = options
        .ts_build_info_file
        .clone()
        .unwrap_or_else(|| format!("{}/tsconfig.tsbuildinfo", out_dir.trim_end_matches('/')));
    PathBuf::from(format!("{}{}", build_info, CACHE_SUFFIX))
}

/// Create-or-truncate under a temporary name, then rename into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip_and_validity() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("openapi.json");
        fs::write(&out, b"{}").unwrap();
        let cache = PostProcessCache::new(
            "abc".to_string(),
            vec![out.to_string_lossy().to_string()],
        );
        let path = dir.path().join("tsconfig.tsbuildinfo.tsnest");
        cache.save(&path).unwrap();

        let loaded = PostProcessCache::load(&path).unwrap();
        assert_eq!(loaded, cache);
        assert!(loaded.is_valid("abc"));
        assert!(!loaded.is_valid("other"));
    }

    #[test]
    fn missing_or_empty_output_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("openapi.json");
        fs::write(&out, b"{}").unwrap();
        let cache = PostProcessCache::new(
            "abc".to_string(),
            vec![out.to_string_lossy().to_string()],
        );
        assert!(cache.is_valid("abc"));

        fs::write(&out, b"").unwrap();
        assert!(!cache.is_valid("abc"));

        fs::remove_file(&out).unwrap();
        assert!(!cache.is_valid("abc"));
    }

    #[test]
    fn empty_output_list_is_vacuously_valid() {
        // A project with nothing to post-process still warm-skips.
        let cache = PostProcessCache::new("abc".to_string(), Vec::new());
        assert!(cache.is_valid("abc"));
        assert!(!cache.is_valid("other"));
    }

    #[test]
    fn schema_version_mismatch_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("o.json");
        fs::write(&out, b"x").unwrap();
        let mut cache = PostProcessCache::new(
            "abc".to_string(),
            vec![out.to_string_lossy().to_string()],
        );
        cache.v = 0;
        assert!(!cache.is_valid("abc"));
    }

    #[test]
    fn cache_path_sits_beside_build_info() {
        let mut options = CompilerOptions::default();
        assert_eq!(
            cache_path(&options, "/p/dist"),
            PathBuf::from("/p/dist/tsconfig.tsbuildinfo.tsnest")
        );
        options.ts_build_info_file = Some("/p/.cache/info".to_string());
        assert_eq!(
            cache_path(&options, "/p/dist"),
            PathBuf::from("/p/.cache/info.tsnest")
        );
    }
}
