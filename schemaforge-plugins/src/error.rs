use camino::Utf8PathBuf;
use thiserror::Error;

/// Failure to turn a configured plugin reference into a transformer.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Nothing loadable was found for the reference.
    #[error(
        "Unable to import custom transformer module({reference}): {cause}\nYou may fix this error by editing transformers at {config_path}"
    )]
    Load {
        reference: String,
        config_path: Utf8PathBuf,
        cause: String,
    },

    /// A module was loaded but does not export a transformer.
    #[error(
        "Custom transformer module({reference}) exports a {shape}; its default export must be a transformer factory or instance (declared in {config_path})"
    )]
    Contract {
        reference: String,
        config_path: Utf8PathBuf,
        shape: String,
    },
}

impl PluginError {
    pub fn reference(&self) -> &str {
        match self {
            PluginError::Load { reference, .. } | PluginError::Contract { reference, .. } => {
                reference
            }
        }
    }
}
