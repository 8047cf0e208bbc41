//! Shared DTOs (persisted files and caller-visible records) for the schemaforge workspace.
//!
//! # Design constraints
//! - These types are read from and written to project directories.
//! - Be conservative with breaking changes to the persisted field names.
//! - Unknown keys in persisted JSON are carried through untouched.

pub mod auth;
pub mod backend;
pub mod params;
pub mod resource;
pub mod transform_config;
pub mod version;

pub use auth::{AuthConfig, AuthProviderConfig, StorageConfig};
pub use backend::{BackendConfig, BackendEntry, ProjectMeta, ProviderMeta};
pub use params::BuildParameters;
pub use resource::{ApiResource, ResourceOutput, ResourceStatus};
pub use transform_config::{TransformerConfig, VersionRegression};
pub use version::{CompilerVersion, DeploymentKey, UnsupportedVersion};

/// Well-known file and directory names inside an API resource directory.
pub mod files {
    pub const TRANSFORM_CONFIG_FILE_NAME: &str = "transform.conf.json";
    pub const CLOUDFORMATION_FILE_NAME: &str = "cloudformation-template.json";
    pub const PARAMETERS_FILE_NAME: &str = "parameters.json";
    pub const SCHEMA_FILE_NAME: &str = "schema.graphql";
    pub const SCHEMA_DIR_NAME: &str = "schema";
    pub const BUILD_DIR_NAME: &str = "build";
    pub const RESOLVERS_DIR_NAME: &str = "resolvers";
    pub const BACKEND_CONFIG_FILE_NAME: &str = "backend-config.json";
    pub const PROJECT_META_FILE_NAME: &str = "project-meta.json";
}

/// Names of the project's categories, services and provider.
pub mod project {
    pub const API_CATEGORY: &str = "api";
    pub const STORAGE_CATEGORY: &str = "storage";
    pub const API_SERVICE: &str = "AppSync";
    pub const STORAGE_SERVICE: &str = "S3";
    pub const PROVIDER_NAME: &str = "awscloudformation";
}
