use indexmap::IndexMap;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "tsnest.config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("invalid config {0}: {1}")]
    Parse(PathBuf, #[source] serde_json::Error),
}

fn default_true() -> bool {
    true
}

fn default_include() -> Vec<String> {
    vec!["**/*.ts".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllersConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for ControllersConfig {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: vec!["**/node_modules/**".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformsConfig {
    #[serde(default = "default_true")]
    pub validation: bool,
    #[serde(default = "default_true")]
    pub serialization: bool,
    pub standard_schema: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for TransformsConfig {
    fn default() -> Self {
        Self {
            validation: true,
            serialization: true,
            standard_schema: false,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenApiConfig {
    /// Where to write the document; absent means skip synthesis.
    pub output: Option<String>,
    pub title: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub contact: Option<serde_json::Value>,
    pub license: Option<serde_json::Value>,
    pub servers: Vec<serde_json::Value>,
    pub security_schemes: IndexMap<String, serde_json::Value>,
    pub security: Vec<serde_json::Value>,
    pub tags: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SdkConfig {
    pub output: Option<String>,
    pub input: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersioningType {
    #[default]
    Uri,
    Header,
    MediaType,
    Custom,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersioningConfig {
    #[serde(rename = "type")]
    pub strategy: VersioningType,
    pub default_version: Option<String>,
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NestJsConfig {
    pub global_prefix: Option<String>,
    pub versioning: Option<VersioningConfig>,
}

/// The driver's own configuration file, discovered at the project root.
/// Unknown keys are tolerated; relative paths resolve against the config
/// file's directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    pub controllers: ControllersConfig,
    pub transforms: TransformsConfig,
    pub openapi: OpenApiConfig,
    pub sdk: SdkConfig,
    pub nestjs: NestJsConfig,
    pub entry_file: Option<String>,
    pub source_root: Option<String>,
    pub delete_out_dir: bool,
    pub manual_restart: bool,
}

/// A loaded configuration together with the hash that keys the
/// post-processing cache.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: ProjectConfig,
    pub path: Option<PathBuf>,
    pub hash: String,
}

impl ProjectConfig {
    pub fn load(path: &Path) -> Result<LoadedConfig, ConfigError> {
        let bytes =
            fs::read(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let mut config: ProjectConfig = serde_json::from_slice(&bytes)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        let base = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(base);
        Ok(LoadedConfig {
            config,
            path: Some(path.to_path_buf()),
            hash: hash_bytes(&bytes),
        })
    }

    /// Looks for the config file in `project_dir`; an absent file yields the
    /// defaults with the hash of empty input.
    pub fn discover(
        project_dir: &Path,
        explicit: Option<&Path>,
    ) -> Result<LoadedConfig, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = project_dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            Self::load(&candidate)
        } else {
            Ok(LoadedConfig {
                config: ProjectConfig::default(),
                path: None,
                hash: hash_bytes(&[]),
            })
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        if let Some(out) = &self.openapi.output {
            self.openapi.output = Some(resolve_against(base, out));
        }
        if let Some(out) = &self.sdk.output {
            self.sdk.output = Some(resolve_against(base, out));
        }
        if let Some(input) = &self.sdk.input {
            self.sdk.input = Some(resolve_against(base, input));
        }
        if let Some(root) = &self.source_root {
            self.source_root = Some(resolve_against(base, root));
        }
    }
}

fn resolve_against(base: &Path, p: &str) -> String {
    let path = Path::new(p);
    if path.is_absolute() {
        p.to_string()
    } else {
        base.join(path).to_string_lossy().replace('\\', "/")
    }
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
