//! Migration of projects built with the legacy single-template layout.
//!
//! The migration runs in two phases. Shrink rewrites the local template to
//! the resources that must survive and applies it; rebuild compiles the
//! project with the current pipeline and applies the result. Any failure
//! rolls the resource directory back to the snapshot taken before the first
//! write.

use crate::error::MigrationError;
use crate::ports::{ApplyPhase, ApplyReport, ApplyRequest, ConfigStore, RemoteApplier};
use anyhow::{Context, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use schemaforge_types::files::{CLOUDFORMATION_FILE_NAME, TRANSFORM_CONFIG_FILE_NAME};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

const RESOLVER_KIND: &str = "AWS::AppSync::Resolver";

/// Whether the previously deployed copy of a resource predates
/// `transform.conf.json`.
///
/// Never true while an API is being created: there is nothing to migrate.
pub fn is_legacy_project(previous_dir: &Utf8Path, creating_api: bool) -> bool {
    if creating_api {
        return false;
    }
    previous_dir.join(CLOUDFORMATION_FILE_NAME).is_file()
        && !previous_dir.join(TRANSFORM_CONFIG_FILE_NAME).exists()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    Shrink,
    Rebuild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackStep {
    /// Undo the intermediate apply. Best effort.
    Intermediate,
    /// Put the original resource directory back.
    Original,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Idle,
    Migrating(MigrationPhase),
    RollingBack(RollbackStep),
    Done,
    Failed,
}

impl MigrationState {
    pub fn can_transition_to(self, next: MigrationState) -> bool {
        use MigrationPhase::*;
        use MigrationState::*;
        use RollbackStep::*;
        matches!(
            (self, next),
            (Idle, Migrating(Shrink))
                | (Idle, Failed)
                | (Migrating(Shrink), Migrating(Rebuild))
                | (Migrating(Shrink), RollingBack(Original))
                | (Migrating(Rebuild), Done)
                | (Migrating(Rebuild), RollingBack(Intermediate))
                | (RollingBack(Intermediate), RollingBack(Original))
                | (RollingBack(Original), Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MigrationState::Done | MigrationState::Failed)
    }
}

/// File contents of a directory at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirSnapshot {
    files: BTreeMap<Utf8PathBuf, Vec<u8>>,
}

impl DirSnapshot {
    /// Snapshot every regular file under `dir`. A missing directory is empty.
    pub fn capture(dir: &Utf8Path) -> anyhow::Result<Self> {
        let mut files = BTreeMap::new();
        if dir.is_dir() {
            for rel in schemaforge_hash::list_files(dir, &[])? {
                let bytes = fs::read(dir.join(&rel)).with_context(|| format!("snapshot {}", rel))?;
                files.insert(rel, bytes);
            }
        }
        Ok(Self { files })
    }

    pub fn files(&self) -> &BTreeMap<Utf8PathBuf, Vec<u8>> {
        &self.files
    }

    /// Replace everything under `dir` with the snapshot.
    pub fn restore_into(&self, dir: &Utf8Path) -> anyhow::Result<()> {
        if dir.exists() {
            fs::remove_dir_all(dir).with_context(|| format!("clear {}", dir))?;
        }
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir))?;
        for (rel, bytes) in &self.files {
            let path = dir.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, bytes).with_context(|| format!("restore {}", path))?;
        }
        debug!(dir = %dir, files = self.files.len(), "restored snapshot");
        Ok(())
    }
}

/// Pre-migration state, kept until the migration reaches a terminal state.
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub project: DirSnapshot,
    pub cloud_backend: DirSnapshot,
}

/// Successful migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub apply: ApplyReport,
    pub transitions: Vec<MigrationState>,
}

/// Rewrite the resource directory for the shrink phase.
///
/// The template keeps every resource except resolvers, which the rebuild
/// regenerates, and the base version is recorded in `transform.conf.json`.
pub fn shrink_project(
    resource_dir: &Utf8Path,
    cloud_backend_dir: &Utf8Path,
    config_store: &dyn ConfigStore,
) -> anyhow::Result<()> {
    let local = resource_dir.join(CLOUDFORMATION_FILE_NAME);
    let source = if local.is_file() {
        local.clone()
    } else {
        cloud_backend_dir.join(CLOUDFORMATION_FILE_NAME)
    };
    let text = fs::read_to_string(&source).with_context(|| format!("read {}", source))?;
    let mut template: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parse {}", source))?;

    if let Some(resources) = template
        .get_mut("Resources")
        .and_then(serde_json::Value::as_object_mut)
    {
        let before = resources.len();
        resources.retain(|_, r| r.get("Type").and_then(|t| t.as_str()) != Some(RESOLVER_KIND));
        debug!(removed = before - resources.len(), "dropped resolvers from root template");
    }
    let json = serde_json::to_string_pretty(&template).context("serialize shrunk template")?;
    fs::write(&local, json).with_context(|| format!("write {}", local))?;

    let mut config = config_store.read(resource_dir)?.unwrap_or_default();
    config.record_base_version();
    config_store.write(resource_dir, &config)
}

/// Drives one migration attempt.
pub struct MigrationCoordinator<'a> {
    resource_name: String,
    resource_dir: Utf8PathBuf,
    cloud_backend_dir: Utf8PathBuf,
    is_cli_migration: bool,
    applier: &'a dyn RemoteApplier,
    config_store: &'a dyn ConfigStore,
    state: MigrationState,
    transitions: Vec<MigrationState>,
}

impl<'a> MigrationCoordinator<'a> {
    pub fn new(
        resource_name: impl Into<String>,
        resource_dir: &Utf8Path,
        cloud_backend_dir: &Utf8Path,
        is_cli_migration: bool,
        applier: &'a dyn RemoteApplier,
        config_store: &'a dyn ConfigStore,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            resource_dir: resource_dir.to_path_buf(),
            cloud_backend_dir: cloud_backend_dir.to_path_buf(),
            is_cli_migration,
            applier,
            config_store,
            state: MigrationState::Idle,
            transitions: vec![MigrationState::Idle],
        }
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    pub fn transitions(&self) -> &[MigrationState] {
        &self.transitions
    }

    fn transition(&mut self, next: MigrationState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid migration transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "migration transition");
        self.state = next;
        self.transitions.push(next);
    }

    fn apply(&self, phase: ApplyPhase) -> anyhow::Result<ApplyReport> {
        self.applier.apply(&ApplyRequest {
            resource_name: self.resource_name.clone(),
            resource_dir: self.resource_dir.clone(),
            phase,
            is_cli_migration: self.is_cli_migration,
        })
    }

    /// Run the migration. `rebuild` compiles the project, reading the
    /// previous deployment from the directory it is given.
    pub fn run<F>(&mut self, rebuild: F) -> Result<MigrationReport, MigrationError>
    where
        F: FnOnce(&Utf8Path) -> anyhow::Result<()>,
    {
        info!(resource = %self.resource_name, "Migrating your API. This may take a few minutes.");
        let record = match self.capture() {
            Ok(record) => record,
            Err(source) => {
                self.transition(MigrationState::Failed);
                return Err(MigrationError::Shrink { source });
            }
        };

        self.transition(MigrationState::Migrating(MigrationPhase::Shrink));
        let shrunk = shrink_project(&self.resource_dir, &self.cloud_backend_dir, self.config_store)
            .and_then(|_| self.apply(ApplyPhase::Intermediate));
        if let Err(source) = shrunk {
            error!(error = %format!("{:#}", source), "API migration failed while shrinking");
            return Err(self.roll_back_original(&record, source, |source| {
                MigrationError::Shrink { source }
            }));
        }

        self.transition(MigrationState::Migrating(MigrationPhase::Rebuild));
        // The intermediate stack was not copied to the deployed backend, so the
        // rebuild reads its previous state from the resource directory.
        let resource_dir = self.resource_dir.clone();
        let rebuilt = rebuild(&resource_dir).and_then(|_| self.apply(ApplyPhase::Final));
        match rebuilt {
            Ok(apply) => {
                self.transition(MigrationState::Done);
                info!(resource = %self.resource_name, "Finished migrating API.");
                Ok(MigrationReport {
                    apply,
                    transitions: self.transitions.clone(),
                })
            }
            Err(source) => {
                error!(error = %format!("{:#}", source), "Reverting API migration.");
                self.transition(MigrationState::RollingBack(RollbackStep::Intermediate));
                self.revert_intermediate(&record);
                Err(self.roll_back_original(&record, source, |source| {
                    MigrationError::Rebuild { source }
                }))
            }
        }
    }

    fn capture(&self) -> anyhow::Result<MigrationRecord> {
        Ok(MigrationRecord {
            project: DirSnapshot::capture(&self.resource_dir)?,
            cloud_backend: DirSnapshot::capture(&self.cloud_backend_dir)?,
        })
    }

    /// Put the deployed layout back and re-apply it. Failures are logged only.
    fn revert_intermediate(&self, record: &MigrationRecord) {
        if let Err(err) = record.cloud_backend.restore_into(&self.resource_dir) {
            warn!(error = %format!("{:#}", err), "could not stage the deployed layout for revert");
            return;
        }
        if let Err(err) = self.apply(ApplyPhase::Revert) {
            error!(error = %format!("{:#}", err), "Error reverting intermediate migration stack.");
        }
    }

    fn roll_back_original(
        &mut self,
        record: &MigrationRecord,
        cause: anyhow::Error,
        wrap: impl FnOnce(anyhow::Error) -> MigrationError,
    ) -> MigrationError {
        self.transition(MigrationState::RollingBack(RollbackStep::Original));
        let restored = record.project.restore_into(&self.resource_dir);
        self.transition(MigrationState::Failed);
        match restored {
            Ok(()) => {
                info!(resource = %self.resource_name, "API successfully reverted.");
                wrap(cause)
            }
            Err(rollback) => {
                error!(error = %format!("{:#}", rollback), "API rollback failed");
                MigrationError::RollbackFailed {
                    cause,
                    rollback: anyhow!("{:#}", rollback),
                    resource_dir: self.resource_dir.clone(),
                }
            }
        }
    }
}
