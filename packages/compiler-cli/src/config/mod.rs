mod project;

pub use project::{
    hash_bytes, ConfigError, ControllersConfig, LoadedConfig, NestJsConfig, OpenApiConfig,
    ProjectConfig, SdkConfig, TransformsConfig, VersioningConfig, VersioningType,
    CONFIG_FILE_NAME,
};
