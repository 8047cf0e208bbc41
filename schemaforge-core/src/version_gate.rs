//! Chooses the compiler version for a project.

use crate::error::CompileError;
use crate::ports::FeatureFlagStore;
use crate::settings::FeatureFlags;
use schemaforge_types::{CompilerVersion, TransformerConfig};
use tracing::warn;

/// Outcome of [`resolve_version`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDecision {
    pub version: CompilerVersion,
    /// Set when the deprecated pipelined flag moved the project to version 2.
    pub forward_migration_warning: Option<String>,
}

/// Resolve the active version.
///
/// The explicit flag wins, then the version recorded in the project, then 1.
/// With `use_experimental_pipelined_transformer` on and version 1 resolved,
/// version 2 is written through `store` before anything else happens. Without
/// a store (dry runs, read-only commands) the decision is made but not saved.
pub fn resolve_version(
    flags: &FeatureFlags,
    persisted: Option<&TransformerConfig>,
    store: Option<&dyn FeatureFlagStore>,
) -> Result<VersionDecision, CompileError> {
    let mut raw = flags
        .transformer_version
        .or_else(|| persisted.and_then(|c| c.version).map(i64::from))
        .unwrap_or(TransformerConfig::BASE_VERSION as i64);

    let mut forward_migration_warning = None;
    if flags.use_experimental_pipelined_transformer && raw == 1 {
        if let Some(store) = store {
            store.persist_transformer_version(CompilerVersion::V2)?;
        }
        let message = format!(
            "The project is configured with 'transformer_version': {}, but 'use_experimental_pipelined_transformer': true. Setting 'transformer_version': 2. 'use_experimental_pipelined_transformer' is deprecated.",
            raw
        );
        warn!("{}", message);
        forward_migration_warning = Some(message);
        raw = 2;
    }

    let version = CompilerVersion::try_from(raw)?;
    Ok(VersionDecision {
        version,
        forward_migration_warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore(Mutex<Vec<CompilerVersion>>);

    impl FeatureFlagStore for RecordingStore {
        fn persist_transformer_version(&self, version: CompilerVersion) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(version);
            Ok(())
        }
    }

    fn flags(version: Option<i64>, pipelined: bool) -> FeatureFlags {
        FeatureFlags {
            transformer_version: version,
            use_experimental_pipelined_transformer: pipelined,
            ..Default::default()
        }
    }

    #[test]
    fn defaults_to_version_one() {
        let store = RecordingStore::default();
        let d = resolve_version(&flags(None, false), None, Some(&store)).unwrap();
        assert_eq!(d.version, CompilerVersion::V1);
        assert!(d.forward_migration_warning.is_none());
        assert!(store.0.lock().unwrap().is_empty());
    }

    #[test]
    fn recorded_version_used_without_flag() {
        let store = RecordingStore::default();
        let cfg = TransformerConfig {
            version: Some(2),
            ..Default::default()
        };
        let d = resolve_version(&flags(None, false), Some(&cfg), Some(&store)).unwrap();
        assert_eq!(d.version, CompilerVersion::V2);
    }

    #[test]
    fn explicit_flag_wins_over_recorded_version() {
        let store = RecordingStore::default();
        let cfg = TransformerConfig {
            version: Some(2),
            ..Default::default()
        };
        let d = resolve_version(&flags(Some(1), false), Some(&cfg), Some(&store)).unwrap();
        assert_eq!(d.version, CompilerVersion::V1);
    }

    #[test]
    fn pipelined_flag_moves_version_one_forward_and_persists() {
        let store = RecordingStore::default();
        let d = resolve_version(&flags(Some(1), true), None, Some(&store)).unwrap();
        assert_eq!(d.version, CompilerVersion::V2);
        assert!(d.forward_migration_warning.unwrap().contains("deprecated"));
        assert_eq!(*store.0.lock().unwrap(), vec![CompilerVersion::V2]);
    }

    #[test]
    fn pipelined_flag_leaves_version_two_alone() {
        let store = RecordingStore::default();
        let d = resolve_version(&flags(Some(2), true), None, Some(&store)).unwrap();
        assert_eq!(d.version, CompilerVersion::V2);
        assert!(d.forward_migration_warning.is_none());
        assert!(store.0.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_version_is_a_configuration_error() {
        let store = RecordingStore::default();
        let err = resolve_version(&flags(Some(7), false), None, Some(&store)).unwrap_err();
        assert!(matches!(err, CompileError::Configuration(_)));
        assert!(err.to_string().contains("'7'"));
    }

    #[test]
    fn pipelined_flag_without_store_only_decides() {
        let d = resolve_version(&flags(None, true), None, None).unwrap();
        assert_eq!(d.version, CompilerVersion::V2);
        assert!(d.forward_migration_warning.is_some());
    }
}
