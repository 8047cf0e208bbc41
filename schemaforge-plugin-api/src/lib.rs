//! Contracts shared by every schemaforge transformer.
//!
//! A [`Transformer`] turns directive-annotated parts of a [`Schema`] into
//! infrastructure fragments, accumulated in a [`FragmentSet`] that flows
//! through the pipeline in order. Externally loaded plugins arrive as a
//! [`PluginModule`] and must resolve to a transformer before they can run.

mod fragments;
mod module;

pub use fragments::{FragmentSet, Resource};
pub use module::{PluginModule, ShapeMismatch};

pub use schemaforge_schema::Schema;

/// The capability every plugin provides.
///
/// Implementations hold no state between compiles. The pipeline calls
/// [`Transformer::transform`] once per compile, in stage order.
pub trait Transformer: Send + Sync {
    /// Stable display name, used in logs and `list-plugins`.
    fn name(&self) -> &str;

    /// SDL text of the directive this transformer acts on, if any.
    fn directive(&self) -> Option<String>;

    /// Supporting SDL (inputs, enums) referenced by [`Transformer::directive`].
    fn type_definitions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Return `fragments` extended with whatever this transformer contributes.
    fn transform(&self, schema: &Schema, fragments: FragmentSet) -> anyhow::Result<FragmentSet>;
}
