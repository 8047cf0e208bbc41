use crate::Transformer;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

type Factory = Box<dyn Fn() -> Box<dyn Transformer> + Send + Sync>;

/// What a module loader hands back before it is checked against the
/// [`Transformer`] contract.
pub enum PluginModule {
    /// A zero-argument constructor.
    Factory(Factory),
    /// A ready-made transformer.
    Instance(Arc<dyn Transformer>),
    /// Anything else a module declared, described by its shape.
    Other { shape: String },
}

/// The module's export is neither a factory nor an instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("module export is '{shape}', expected a transformer factory or instance")]
pub struct ShapeMismatch {
    pub shape: String,
}

impl PluginModule {
    pub fn factory<F, T>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Transformer + 'static,
    {
        PluginModule::Factory(Box::new(move || Box::new(f()) as Box<dyn Transformer>))
    }

    pub fn instance<T: Transformer + 'static>(t: T) -> Self {
        PluginModule::Instance(Arc::new(t))
    }

    pub fn shape(&self) -> &str {
        match self {
            PluginModule::Factory(_) => "factory",
            PluginModule::Instance(_) => "instance",
            PluginModule::Other { shape } => shape,
        }
    }

    /// Construct (or take) the transformer this module exports.
    pub fn into_transformer(self) -> Result<Arc<dyn Transformer>, ShapeMismatch> {
        match self {
            PluginModule::Factory(make) => Ok(Arc::from(make())),
            PluginModule::Instance(t) => Ok(t),
            PluginModule::Other { shape } => Err(ShapeMismatch { shape }),
        }
    }
}

impl fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginModule")
            .field("shape", &self.shape())
            .finish()
    }
}
