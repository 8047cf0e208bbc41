//! Port traits abstracting all I/O and outside collaborators away from the
//! compile pipeline.

use camino::{Utf8Path, Utf8PathBuf};
use schemaforge_types::{CompilerVersion, ResourceStatus, StorageConfig, TransformerConfig};
use std::fmt;

/// Created / updated / all resources of a category.
pub trait ResourceStatusPort {
    fn resource_status(&self, category: &str) -> anyhow::Result<ResourceStatus>;
}

/// Project layout and provider details.
pub trait ProjectPort {
    fn project_root(&self) -> &Utf8Path;
    /// Working copy of the backend: `<backend>/<category>/<resource>`.
    fn backend_dir(&self) -> Utf8PathBuf;
    /// Copy of the backend as last deployed.
    fn cloud_backend_dir(&self) -> Utf8PathBuf;
    fn deployment_bucket(&self) -> anyhow::Result<String>;
    /// Bucket for the predictions capability, if the project has storage.
    fn storage_config(&self) -> anyhow::Result<Option<StorageConfig>>;
    fn is_admin_app(&self) -> anyhow::Result<bool>;
}

/// Reads and writes `transform.conf.json` in a resource directory.
pub trait ConfigStore {
    /// `Ok(None)` when the directory has no configuration file.
    fn read(&self, dir: &Utf8Path) -> anyhow::Result<Option<TransformerConfig>>;
    /// All-or-nothing: a failed write leaves the previous file in place.
    fn write(&self, dir: &Utf8Path, config: &TransformerConfig) -> anyhow::Result<()>;
}

/// Persists feature flag changes to the project configuration.
pub trait FeatureFlagStore {
    fn persist_transformer_version(&self, version: CompilerVersion) -> anyhow::Result<()>;
}

/// Interactive yes/no confirmation.
pub trait Prompt {
    fn confirm(&self, message: &str, default: bool) -> anyhow::Result<bool>;
}

/// Content digest of a directory tree.
pub trait DirectoryHasher {
    fn hash_directory(&self, dir: &Utf8Path) -> anyhow::Result<String>;
}

/// File-system write operations.
pub trait WritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;
    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()>;
}

/// Which remote update a migration is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPhase {
    /// Shrink the deployed stack to the resources that must survive.
    Intermediate,
    /// Deploy the rebuilt project.
    Final,
    /// Undo a successful intermediate update.
    Revert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyRequest {
    pub resource_name: String,
    pub resource_dir: Utf8PathBuf,
    pub phase: ApplyPhase,
    /// Migration was requested with `--migrate` rather than confirmed interactively.
    pub is_cli_migration: bool,
}

/// Result reported by the remote applier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub summary: String,
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)
    }
}

/// Applies a change to the deployed infrastructure.
pub trait RemoteApplier {
    fn apply(&self, request: &ApplyRequest) -> anyhow::Result<ApplyReport>;
}

/// The compiler used for projects on version 2.
pub trait AlternateCompiler {
    fn compile(&self, project_root: &Utf8Path) -> anyhow::Result<()>;
    fn directive_definitions(&self, resource_dir: Option<&Utf8Path>) -> anyhow::Result<String>;
}
