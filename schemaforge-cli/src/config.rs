//! Configuration file loading for schemaforge.
//!
//! Discovers and loads `schemaforge.toml` from the project root.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use schemaforge_core::FeatureFlags;
use schemaforge_core::adapters::PROJECT_CONFIG_FILE_NAME;
use serde::Deserialize;
use tracing::debug;

/// Top-level configuration from schemaforge.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemaforgeConfig {
    /// Feature flags, grouped by feature.
    pub features: FeaturesConfig,

    /// Defaults for `schemaforge compile`.
    pub compile: CompileConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub graphql_transformer: GraphqlTransformerConfig,
}

/// `[features.graphql_transformer]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphqlTransformerConfig {
    /// Compiler version. Left unset, the version recorded by the project applies.
    pub transformer_version: Option<i64>,

    /// Deprecated; implies `transformer_version = 2`.
    pub use_experimental_pipelined_transformer: bool,

    /// Allow adding and removing an index in the same update.
    pub enable_iterative_gsi_updates: bool,
}

impl Default for GraphqlTransformerConfig {
    fn default() -> Self {
        Self {
            transformer_version: None,
            use_experimental_pipelined_transformer: false,
            enable_iterative_gsi_updates: true,
        }
    }
}

/// `[compile]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Write the template without whitespace.
    pub minify: bool,

    /// Skip the destructive-change checks.
    pub allow_destructive_graphql_schema_updates: bool,

    /// Directory searched for globally installed transformer packages.
    pub global_plugin_root: Option<Utf8PathBuf>,
}

/// Discover the schemaforge.toml config file.
///
/// Returns `None` if the project root has none.
pub fn discover_config(project_root: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = project_root.join(PROJECT_CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

/// Load and parse a schemaforge.toml config file.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<SchemaforgeConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<SchemaforgeConfig> {
    let config: SchemaforgeConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from the project root, or return default if not found.
pub fn load_or_default(project_root: &Utf8Path) -> anyhow::Result<SchemaforgeConfig> {
    match discover_config(project_root) {
        Some(path) => load_config(&path),
        None => Ok(SchemaforgeConfig::default()),
    }
}

/// Configuration for one compile, config file and CLI combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedConfig {
    pub flags: FeatureFlags,
    pub minify: bool,
    pub allow_destructive_updates: bool,
    pub global_plugin_root: Option<Utf8PathBuf>,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: SchemaforgeConfig,
}

impl ConfigMerger {
    pub fn new(config: SchemaforgeConfig) -> Self {
        Self { config }
    }

    /// Merge with compile command CLI arguments.
    ///
    /// Boolean CLI flags can only switch a behavior on. A CLI plugin root
    /// replaces the configured one.
    pub fn merge_compile_args(
        self,
        cli_minify: bool,
        cli_allow_destructive: bool,
        cli_global_plugin_root: Option<Utf8PathBuf>,
    ) -> MergedConfig {
        let transformer = self.config.features.graphql_transformer;
        MergedConfig {
            flags: FeatureFlags {
                transformer_version: transformer.transformer_version,
                use_experimental_pipelined_transformer: transformer
                    .use_experimental_pipelined_transformer,
                enable_iterative_gsi_updates: transformer.enable_iterative_gsi_updates,
            },
            minify: cli_minify || self.config.compile.minify,
            allow_destructive_updates: cli_allow_destructive
                || self.config.compile.allow_destructive_graphql_schema_updates,
            global_plugin_root: cli_global_plugin_root.or(self.config.compile.global_plugin_root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let contents = r#"
[features.graphql_transformer]
transformer_version = 1
use_experimental_pipelined_transformer = false
enable_iterative_gsi_updates = false

[compile]
minify = true
allow_destructive_graphql_schema_updates = false
global_plugin_root = "/opt/schemaforge/plugins"
"#;

        let config = parse_config(contents).unwrap();
        let t = &config.features.graphql_transformer;
        assert_eq!(t.transformer_version, Some(1));
        assert!(!t.use_experimental_pipelined_transformer);
        assert!(!t.enable_iterative_gsi_updates);
        assert!(config.compile.minify);
        assert_eq!(
            config.compile.global_plugin_root.as_deref(),
            Some(Utf8Path::new("/opt/schemaforge/plugins"))
        );
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        let t = &config.features.graphql_transformer;
        assert_eq!(t.transformer_version, None);
        assert!(t.enable_iterative_gsi_updates);
        assert!(!config.compile.minify);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let err = parse_config("[features\nbroken").unwrap_err();
        assert!(format!("{:#}", err).contains("invalid TOML"));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let temp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        let config = load_or_default(root).unwrap();
        assert!(config.features.graphql_transformer.transformer_version.is_none());
    }

    #[test]
    fn test_load_or_default_reads_file() {
        let temp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        fs::write(
            root.join(PROJECT_CONFIG_FILE_NAME),
            "[features.graphql_transformer]\ntransformer_version = 2\n",
        )
        .unwrap();
        let config = load_or_default(root).unwrap();
        assert_eq!(config.features.graphql_transformer.transformer_version, Some(2));
    }

    #[test]
    fn test_merge_cli_switches_on() {
        let merged = ConfigMerger::new(SchemaforgeConfig::default()).merge_compile_args(
            true,
            true,
            Some("/cli/plugins".into()),
        );
        assert!(merged.minify);
        assert!(merged.allow_destructive_updates);
        assert_eq!(merged.global_plugin_root, Some("/cli/plugins".into()));
        assert!(merged.flags.enable_iterative_gsi_updates);
    }

    #[test]
    fn test_merge_config_used_when_cli_false() {
        let config = SchemaforgeConfig {
            compile: CompileConfig {
                minify: true,
                allow_destructive_graphql_schema_updates: true,
                global_plugin_root: Some("/config/plugins".into()),
            },
            ..Default::default()
        };
        let merged = ConfigMerger::new(config).merge_compile_args(false, false, None);
        assert!(merged.minify);
        assert!(merged.allow_destructive_updates);
        assert_eq!(merged.global_plugin_root, Some("/config/plugins".into()));
    }

    #[test]
    fn test_merge_carries_feature_flags() {
        let config = parse_config(
            "[features.graphql_transformer]\ntransformer_version = 2\nuse_experimental_pipelined_transformer = true\n",
        )
        .unwrap();
        let merged = ConfigMerger::new(config).merge_compile_args(false, false, None);
        assert_eq!(merged.flags.transformer_version, Some(2));
        assert!(merged.flags.use_experimental_pipelined_transformer);
    }
}
