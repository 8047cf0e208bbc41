use crate::builtin::{
    AuthTransformer, ConnectionTransformer, FunctionTransformer, HttpTransformer, KeyTransformer,
    ModelTransformer, PredictionsTransformer, SearchableTransformer, VersionedTransformer,
};
use anyhow::Context;
use schemaforge_plugin_api::{FragmentSet, Schema, Transformer};
use schemaforge_types::{AuthConfig, StorageConfig};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Pipeline stages in execution order.
///
/// Entries are sorted by stage (stably), so the order inside a stage is the
/// order of insertion and authorization always comes last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Structural transformers, always present, fixed relative order.
    BuiltIn,
    /// Optional capabilities such as search.
    Capability,
    /// Resolved custom transformers, in configured order.
    Custom,
    /// The authorization transformer.
    Authorization,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::BuiltIn => "built-in",
            Stage::Capability => "capability",
            Stage::Custom => "custom",
            Stage::Authorization => "authorization",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the builder needs for one compile.
pub struct PipelineInputs {
    pub include_search_capability: bool,
    pub storage: Option<StorageConfig>,
    pub custom: Vec<Arc<dyn Transformer>>,
    pub auth_config: AuthConfig,
    /// Elevated-trust mode for the authorization transformer.
    pub admin_mode: bool,
}

#[derive(Clone)]
pub struct PipelineEntry {
    pub stage: Stage,
    pub transformer: Arc<dyn Transformer>,
}

/// Ordered transformers for exactly one compile.
#[derive(Clone, Default)]
pub struct Pipeline {
    entries: Vec<PipelineEntry>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn entries(&self) -> &[PipelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.transformer.name()).collect()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.entries.iter().map(|e| e.stage).collect()
    }

    /// Run every transformer in order, threading the fragments through.
    pub fn run(&self, schema: &Schema) -> anyhow::Result<FragmentSet> {
        let mut fragments = FragmentSet::new();
        for entry in &self.entries {
            let name = entry.transformer.name();
            debug!(transformer = name, stage = %entry.stage, "running transformer");
            fragments = entry
                .transformer
                .transform(schema, fragments)
                .with_context(|| format!("transformer {} failed", name))?;
        }
        Ok(fragments)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.entries
                    .iter()
                    .map(|e| (e.stage, e.transformer.name())),
            )
            .finish()
    }
}

/// Collects stage-tagged transformers and orders them on [`PipelineBuilder::build`].
#[derive(Default)]
pub struct PipelineBuilder {
    entries: Vec<PipelineEntry>,
}

impl PipelineBuilder {
    pub fn push(&mut self, stage: Stage, transformer: Arc<dyn Transformer>) -> &mut Self {
        self.entries.push(PipelineEntry { stage, transformer });
        self
    }

    pub fn build(mut self) -> Pipeline {
        self.entries.sort_by_key(|e| e.stage);
        Pipeline {
            entries: self.entries,
        }
    }
}

/// The standard pipeline: built-ins, optional search, customs, then auth.
pub fn build_pipeline(inputs: PipelineInputs) -> Pipeline {
    let mut builder = Pipeline::builder();
    let builtins: [Arc<dyn Transformer>; 7] = [
        Arc::new(ModelTransformer),
        Arc::new(VersionedTransformer),
        Arc::new(FunctionTransformer),
        Arc::new(HttpTransformer),
        Arc::new(KeyTransformer),
        Arc::new(ConnectionTransformer),
        Arc::new(PredictionsTransformer::new(inputs.storage)),
    ];
    for t in builtins {
        builder.push(Stage::BuiltIn, t);
    }
    if inputs.include_search_capability {
        builder.push(Stage::Capability, Arc::new(SearchableTransformer));
    }
    for t in inputs.custom {
        builder.push(Stage::Custom, t);
    }
    builder.push(
        Stage::Authorization,
        Arc::new(AuthTransformer::new(inputs.auth_config, inputs.admin_mode)),
    );
    builder.build()
}
