//! Default filesystem-backed port implementations.

use crate::ports::{
    AlternateCompiler, ApplyReport, ApplyRequest, ConfigStore, DirectoryHasher, FeatureFlagStore,
    ProjectPort, Prompt, RemoteApplier, ResourceStatusPort, WritePort,
};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use schemaforge_types::files::{
    BACKEND_CONFIG_FILE_NAME, BUILD_DIR_NAME, PARAMETERS_FILE_NAME, PROJECT_META_FILE_NAME,
    TRANSFORM_CONFIG_FILE_NAME,
};
use schemaforge_types::project::{STORAGE_CATEGORY, STORAGE_SERVICE};
use schemaforge_types::{
    BackendConfig, CompilerVersion, ProjectMeta, ResourceStatus, StorageConfig, TransformerConfig,
};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::Mutex;
use toml_edit::{DocumentMut, value};
use tracing::{debug, info};

/// Project state directory, relative to the project root.
pub const STATE_DIR: &str = ".schemaforge";
/// Project configuration file, relative to the project root.
pub const PROJECT_CONFIG_FILE_NAME: &str = "schemaforge.toml";

/// Stack names generated by the project bootstrapper start with this.
const GENERATED_STACK_PREFIX: &str = "amplify-";

fn read_json_opt<T: DeserializeOwned>(path: &Utf8Path) -> anyhow::Result<Option<T>> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path))?;
    let parsed = serde_json::from_str(&text).with_context(|| format!("parse {}", path))?;
    Ok(Some(parsed))
}

/// Write `contents` next to `path` and rename it into place.
fn write_atomic(path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create parent dir for {}", path))?;
    }
    let tmp = Utf8PathBuf::from(format!("{}.tmp", path));
    fs::write(&tmp, contents).with_context(|| format!("write {}", tmp))?;
    fs::rename(&tmp, path).with_context(|| format!("replace {}", path))
}

/// Project layout under `<root>/.schemaforge/`.
#[derive(Debug, Clone)]
pub struct FsProject {
    root: Utf8PathBuf,
}

impl FsProject {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    fn state_dir(&self) -> Utf8PathBuf {
        self.root.join(STATE_DIR)
    }

    fn meta(&self) -> anyhow::Result<ProjectMeta> {
        Ok(read_json_opt(&self.state_dir().join(PROJECT_META_FILE_NAME))?.unwrap_or_default())
    }
}

impl ProjectPort for FsProject {
    fn project_root(&self) -> &Utf8Path {
        &self.root
    }

    fn backend_dir(&self) -> Utf8PathBuf {
        self.state_dir().join("backend")
    }

    fn cloud_backend_dir(&self) -> Utf8PathBuf {
        self.state_dir().join("current-cloud-backend")
    }

    fn deployment_bucket(&self) -> anyhow::Result<String> {
        Ok(self
            .meta()?
            .provider()
            .map(|p| p.deployment_bucket_name.clone())
            .unwrap_or_default())
    }

    fn storage_config(&self) -> anyhow::Result<Option<StorageConfig>> {
        let backend_dir = self.backend_dir();
        let Some(backend) =
            read_json_opt::<BackendConfig>(&backend_dir.join(BACKEND_CONFIG_FILE_NAME))?
        else {
            return Ok(None);
        };
        let Some(name) = backend
            .category(STORAGE_CATEGORY)
            .filter(|(_, entry)| entry.service == STORAGE_SERVICE)
            .map(|(name, _)| name.clone())
            .last()
        else {
            return Ok(None);
        };

        let params_path = backend_dir
            .join(STORAGE_CATEGORY)
            .join(&name)
            .join(PARAMETERS_FILE_NAME);
        let params: serde_json::Value = read_json_opt(&params_path)?
            .with_context(|| format!("storage resource {} has no {}", name, params_path))?;
        let bucket = params
            .get("bucketName")
            .and_then(|v| v.as_str())
            .with_context(|| format!("bucketName missing from {}", params_path))?;

        let meta = self.meta()?;
        let stack_name = meta.provider().map(|p| p.stack_name.as_str()).unwrap_or("");
        let bucket_name = if stack_name.starts_with(GENERATED_STACK_PREFIX) {
            format!("{}${{hash}}-${{env}}", bucket)
        } else {
            format!("{}{}-${{env}}", bucket, name)
        };
        Ok(Some(StorageConfig { bucket_name }))
    }

    fn is_admin_app(&self) -> anyhow::Result<bool> {
        Ok(self.meta()?.admin_app)
    }
}

/// Derives resource status by comparing the working backend with the
/// last deployed copy.
#[derive(Debug, Clone)]
pub struct FsResourceStatus {
    pub backend_dir: Utf8PathBuf,
    pub cloud_backend_dir: Utf8PathBuf,
}

impl FsResourceStatus {
    pub fn new(backend_dir: Utf8PathBuf, cloud_backend_dir: Utf8PathBuf) -> Self {
        Self {
            backend_dir,
            cloud_backend_dir,
        }
    }

    pub fn for_project(project: &dyn ProjectPort) -> Self {
        Self::new(project.backend_dir(), project.cloud_backend_dir())
    }

    fn changed(&self, category: &str, name: &str) -> anyhow::Result<bool> {
        let local = self.backend_dir.join(category).join(name);
        let deployed = self.cloud_backend_dir.join(category).join(name);
        if !deployed.is_dir() {
            return Ok(true);
        }
        let exclude = [BUILD_DIR_NAME];
        Ok(schemaforge_hash::hash_directory(&local, &exclude)?
            != schemaforge_hash::hash_directory(&deployed, &exclude)?)
    }
}

impl ResourceStatusPort for FsResourceStatus {
    fn resource_status(&self, category: &str) -> anyhow::Result<ResourceStatus> {
        let local: BackendConfig =
            read_json_opt(&self.backend_dir.join(BACKEND_CONFIG_FILE_NAME))?.unwrap_or_default();
        let deployed: BackendConfig =
            read_json_opt(&self.cloud_backend_dir.join(BACKEND_CONFIG_FILE_NAME))?
                .unwrap_or_default();

        let mut status = ResourceStatus::default();
        for resource in local.resources(category) {
            if !deployed.contains(category, &resource.resource_name) {
                status.to_create.push(resource.clone());
            } else if self.changed(category, &resource.resource_name)? {
                status.to_update.push(resource.clone());
            }
            status.all.push(resource);
        }
        debug!(
            category,
            create = status.to_create.len(),
            update = status.to_update.len(),
            all = status.all.len(),
            "resource status"
        );
        Ok(status)
    }
}

/// `transform.conf.json` on disk.
#[derive(Debug, Clone, Default)]
pub struct FsConfigStore;

impl ConfigStore for FsConfigStore {
    fn read(&self, dir: &Utf8Path) -> anyhow::Result<Option<TransformerConfig>> {
        read_json_opt(&dir.join(TRANSFORM_CONFIG_FILE_NAME))
    }

    fn write(&self, dir: &Utf8Path, config: &TransformerConfig) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(config).context("serialize transformer config")?;
        write_atomic(&dir.join(TRANSFORM_CONFIG_FILE_NAME), json.as_bytes())
    }
}

/// Rewrites `transformer_version` in `schemaforge.toml`, leaving the rest of
/// the document (comments included) untouched.
#[derive(Debug, Clone)]
pub struct TomlFeatureFlagStore {
    pub path: Utf8PathBuf,
}

impl TomlFeatureFlagStore {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    pub fn for_project(root: &Utf8Path) -> Self {
        Self::new(root.join(PROJECT_CONFIG_FILE_NAME))
    }
}

impl FeatureFlagStore for TomlFeatureFlagStore {
    fn persist_transformer_version(&self, version: CompilerVersion) -> anyhow::Result<()> {
        let contents = if self.path.is_file() {
            fs::read_to_string(&self.path).with_context(|| format!("read {}", self.path))?
        } else {
            String::new()
        };
        let mut doc = contents
            .parse::<DocumentMut>()
            .with_context(|| format!("parse {}", self.path))?;
        doc["features"]["graphql_transformer"]["transformer_version"] =
            value(version.as_number());
        write_atomic(&self.path, doc.to_string().as_bytes())
    }
}

/// sha256 of a resource directory, ignoring its `build/` output.
#[derive(Debug, Clone, Default)]
pub struct Sha256DirectoryHasher;

impl DirectoryHasher for Sha256DirectoryHasher {
    fn hash_directory(&self, dir: &Utf8Path) -> anyhow::Result<String> {
        schemaforge_hash::hash_directory(dir, &[BUILD_DIR_NAME])
    }
}

/// Filesystem write operations.
#[derive(Debug, Clone, Default)]
pub struct FsWritePort;

impl WritePort for FsWritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create parent dir for {}", path))?;
        }
        fs::write(path, contents).with_context(|| format!("write {}", path))
    }

    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()> {
        fs::create_dir_all(path).with_context(|| format!("create_dir_all {}", path))
    }
}

/// Applier used when no deployment engine is attached.
#[derive(Debug, Clone, Default)]
pub struct NoopApplier;

impl RemoteApplier for NoopApplier {
    fn apply(&self, request: &ApplyRequest) -> anyhow::Result<ApplyReport> {
        info!(resource = %request.resource_name, phase = ?request.phase, "Skipping update");
        Ok(ApplyReport {
            summary: "Skipping update".to_string(),
        })
    }
}

/// Prompt that answers every question with its default.
#[derive(Debug, Clone, Default)]
pub struct DefaultAnswerPrompt;

impl Prompt for DefaultAnswerPrompt {
    fn confirm(&self, message: &str, default: bool) -> anyhow::Result<bool> {
        debug!(message, default, "answering prompt with default");
        Ok(default)
    }
}

/// Prompt with pre-recorded answers, for embedding and testing.
///
/// Questions beyond the recorded answers get their default. Every question
/// asked is kept and can be read back with [`ScriptedPrompt::asked`].
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl Prompt for ScriptedPrompt {
    fn confirm(&self, message: &str, default: bool) -> anyhow::Result<bool> {
        self.asked
            .lock()
            .map_err(|_| anyhow::anyhow!("prompt log poisoned"))?
            .push(message.to_string());
        let answer = self
            .answers
            .lock()
            .map_err(|_| anyhow::anyhow!("prompt answers poisoned"))?
            .pop_front();
        Ok(answer.unwrap_or(default))
    }
}

/// Stand-in for builds that ship without the version 2 compiler.
#[derive(Debug, Clone, Default)]
pub struct UnavailableAlternateCompiler;

impl AlternateCompiler for UnavailableAlternateCompiler {
    fn compile(&self, _project_root: &Utf8Path) -> anyhow::Result<()> {
        anyhow::bail!(
            "transformer version 2 is not available in this build; set features.graphql_transformer.transformer_version = 1 in schemaforge.toml"
        )
    }

    fn directive_definitions(&self, resource_dir: Option<&Utf8Path>) -> anyhow::Result<String> {
        self.compile(resource_dir.unwrap_or(Utf8Path::new(".")))
            .map(|_| String::new())
    }
}
