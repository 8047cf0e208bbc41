//! Transformers and the machinery that orders and loads them.
//!
//! - [`builtin`]: the transformers that ship with schemaforge.
//! - [`PluginResolver`]: turns `transformers` entries into loaded plugins,
//!   trying a project-local root before a global one.
//! - [`build_pipeline`]: the fixed stage ordering (built-ins, optional
//!   search, customs, authorization last).

pub mod builtin;
pub mod catalog;
mod error;
mod loader;
pub mod manifest;
mod pipeline;
mod reference;
mod resolver;

pub use catalog::{BUILTIN_CATALOG, BuiltinTransformer, SERVICE_DIRECTIVES};
pub use error::PluginError;
pub use loader::{InMemoryModuleLoader, ManifestModuleLoader, ModuleLoader};
pub use manifest::{MANIFEST_FILE_NAME, ManifestTransformer, TransformerManifest};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineEntry, PipelineInputs, Stage, build_pipeline};
pub use reference::{LOCAL_PLUGIN_DIR, LoaderStrategy, PluginReference, PluginRoots};
pub use resolver::PluginResolver;
