//! Clap-free settings for the compile pipeline.

use camino::Utf8PathBuf;
use schemaforge_types::{AuthConfig, BuildParameters};

/// Feature flags, resolved once per compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Explicit compiler version; wins over the version recorded in the project.
    pub transformer_version: Option<i64>,
    /// Deprecated switch that implies version 2.
    pub use_experimental_pipelined_transformer: bool,
    /// When off, adding and removing an index in one update is refused.
    pub enable_iterative_gsi_updates: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            transformer_version: None,
            use_experimental_pipelined_transformer: false,
            enable_iterative_gsi_updates: true,
        }
    }
}

/// Settings for one `run_compile` call.
#[derive(Debug, Clone)]
pub struct CompileSettings {
    pub project_root: Utf8PathBuf,
    /// Restrict the compile to one API resource.
    pub api_name: Option<String>,

    // Selection
    pub force_compile: bool,
    pub no_gql_override: bool,

    // Persistence
    pub dry_run: bool,
    pub minify: bool,

    // Prompts and policy
    pub migrate: bool,
    pub yes: bool,
    pub allow_destructive_updates: bool,

    // Inputs that default to what the project records
    pub parameters: Option<BuildParameters>,
    pub auth_config: Option<AuthConfig>,

    pub global_plugin_root: Option<Utf8PathBuf>,
    pub flags: FeatureFlags,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            project_root: Utf8PathBuf::from("."),
            api_name: None,
            force_compile: false,
            no_gql_override: false,
            dry_run: false,
            minify: false,
            migrate: false,
            yes: false,
            allow_destructive_updates: false,
            parameters: None,
            auth_config: None,
            global_plugin_root: None,
            flags: FeatureFlags::default(),
        }
    }
}
