//! Embeddable core library for schemaforge.
//!
//! Provides a clap-free, I/O-abstracted compile pipeline suitable for
//! linking into the CLI or any other host process.
//!
//! # Port traits
//!
//! All I/O is abstracted behind port traits in [`ports`]:
//! - [`ProjectPort`](ports::ProjectPort) - project layout and provider details
//! - [`ResourceStatusPort`](ports::ResourceStatusPort) - which resources changed
//! - [`ConfigStore`](ports::ConfigStore) - read and write `transform.conf.json`
//! - [`FeatureFlagStore`](ports::FeatureFlagStore) - persist feature flag changes
//! - [`Prompt`](ports::Prompt) - yes/no confirmations
//! - [`RemoteApplier`](ports::RemoteApplier) - push a migration step to the deployed stack
//! - [`AlternateCompiler`](ports::AlternateCompiler) - the version 2 compiler
//! - [`WritePort`](ports::WritePort) - write files and create directories
//!
//! The [`adapters`] module provides default filesystem-backed implementations.
//!
//! # Entry points
//!
//! - [`run_compile`](compiler::run_compile) - compile (and if needed migrate) the project's API
//! - [`directive_definitions`](compiler::directive_definitions) - SDL of every available directive

pub mod adapters;
pub mod build_cache;
pub mod compiler;
mod error;
pub mod migration;
pub mod ports;
pub mod sanity;
pub mod settings;
pub mod version_gate;

pub use compiler::{
    CompileOutcome, CompilePorts, CompileStatus, CompiledApi, DRY_RUN_BUCKET, SkipReason,
    directive_definitions, run_compile, write_build_outputs,
};
pub use error::{CompileError, MigrationError};
pub use settings::{CompileSettings, FeatureFlags};

// Re-export plugin loading so embedders don't need schemaforge-plugins directly.
pub use schemaforge_plugins::{InMemoryModuleLoader, ManifestModuleLoader, ModuleLoader};
