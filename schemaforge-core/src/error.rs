use crate::sanity::SanityViolation;
use camino::Utf8PathBuf;
use schemaforge_plugins::PluginError;
use schemaforge_schema::ParseError;
use schemaforge_types::UnsupportedVersion;
use thiserror::Error;

/// Error type for compile results. Exit code 2 = blocked by policy, 1 = tool error.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Schema at {path} is invalid: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(
        "{0}\nSet features.graphql_transformer.transformer_version to 1 or 2 in schemaforge.toml"
    )]
    Configuration(#[from] UnsupportedVersion),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(
        "Compile cancelled: the change in default directive behavior was not accepted. Review the warning above, then rerun with --yes to accept it"
    )]
    ChangeDeclined,

    #[error("{}", render_violations(.0))]
    SanityCheck(Vec<SanityViolation>),

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl CompileError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::SanityCheck(_) => 2,
            CompileError::Migration(MigrationError::Cancelled) => 2,
            CompileError::ChangeDeclined => 2,
            _ => 1,
        }
    }
}

fn render_violations(violations: &[SanityViolation]) -> String {
    let mut out = String::from("Blocked destructive schema change:\n");
    for v in violations {
        out.push_str(&format!("  - [{}] {}\n", v.rule, v.message));
    }
    out.push_str(
        "If this change is intended, rerun with --allow-destructive-graphql-schema-updates (or --force).",
    );
    out
}

/// Failure of a legacy-project migration.
///
/// Unless the variant says otherwise, the resource directory has been
/// restored to its pre-migration content.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(
        "Migration cancelled. Please downgrade to an older version or migrate your API project manually."
    )]
    Cancelled,

    #[error(
        "API migration failed while shrinking the deployed stack; local changes were reverted. Fix the cause and rerun with --migrate"
    )]
    Shrink {
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "API migration failed while rebuilding the project; local changes were reverted. Fix the cause and rerun with --migrate"
    )]
    Rebuild {
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "API migration failed: {cause:#}\nRollback did not complete: {rollback:#}\nRestore {resource_dir} from a backup before retrying"
    )]
    RollbackFailed {
        cause: anyhow::Error,
        rollback: anyhow::Error,
        resource_dir: Utf8PathBuf,
    },
}
