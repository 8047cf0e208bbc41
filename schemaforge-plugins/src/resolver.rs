use crate::error::PluginError;
use crate::loader::ModuleLoader;
use crate::reference::{LoaderStrategy, PluginReference, PluginRoots};
use camino::{Utf8Path, Utf8PathBuf};
use schemaforge_plugin_api::Transformer;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves configured references to transformers.
///
/// Build one per compile. Results are cached per reference for the lifetime
/// of the resolver only, so edits to plugin code are seen by the next compile.
pub struct PluginResolver<'a> {
    loader: &'a dyn ModuleLoader,
    roots: PluginRoots,
    config_path: Utf8PathBuf,
    cache: BTreeMap<PluginReference, Arc<dyn Transformer>>,
}

impl<'a> PluginResolver<'a> {
    /// `config_path` is the file the references were read from; errors name it.
    pub fn new(loader: &'a dyn ModuleLoader, roots: PluginRoots, config_path: &Utf8Path) -> Self {
        Self {
            loader,
            roots,
            config_path: config_path.to_path_buf(),
            cache: BTreeMap::new(),
        }
    }

    /// Resolve every raw entry, keeping declaration order.
    pub fn resolve_all(
        &mut self,
        raw: &[String],
    ) -> Result<Vec<Arc<dyn Transformer>>, PluginError> {
        raw.iter().map(|r| self.resolve_raw(r)).collect()
    }

    pub fn resolve_raw(&mut self, raw: &str) -> Result<Arc<dyn Transformer>, PluginError> {
        let Some(reference) = PluginReference::parse(raw) else {
            return Err(PluginError::Load {
                reference: raw.to_string(),
                config_path: self.config_path.clone(),
                cause: format!("Invalid value specified for transformer: '{}'", raw),
            });
        };
        self.resolve(&reference)
    }

    pub fn resolve(
        &mut self,
        reference: &PluginReference,
    ) -> Result<Arc<dyn Transformer>, PluginError> {
        if let Some(hit) = self.cache.get(reference) {
            return Ok(Arc::clone(hit));
        }

        let strategies = reference.strategies(&self.roots);
        let mut last_cause = String::from("no loader strategy applies");
        for strategy in &strategies {
            match self.loader.load(strategy) {
                Ok(module) => {
                    let shape = module.shape().to_string();
                    let transformer =
                        module
                            .into_transformer()
                            .map_err(|_| PluginError::Contract {
                                reference: reference.to_string(),
                                config_path: self.config_path.clone(),
                                shape,
                            })?;
                    debug!(
                        reference = %reference,
                        via = strategy.label(),
                        name = transformer.name(),
                        "resolved custom transformer"
                    );
                    self.cache
                        .insert(reference.clone(), Arc::clone(&transformer));
                    return Ok(transformer);
                }
                Err(err) => {
                    last_cause = format!("{:#}", err);
                    if matches!(
                        strategy,
                        LoaderStrategy::ByPath(_) | LoaderStrategy::Embedded(_)
                    ) {
                        break;
                    }
                    debug!(reference = %reference, via = strategy.label(), error = %last_cause, "trying next plugin root");
                }
            }
        }

        warn!(reference = %reference, config = %self.config_path, "unable to load custom transformer");
        Err(PluginError::Load {
            reference: reference.to_string(),
            config_path: self.config_path.clone(),
            cause: last_cause,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::InMemoryModuleLoader;
    use schemaforge_plugin_api::{FragmentSet, PluginModule, Schema};

    struct Named(&'static str);

    impl Transformer for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn directive(&self) -> Option<String> {
            None
        }

        fn transform(&self, _: &Schema, f: FragmentSet) -> anyhow::Result<FragmentSet> {
            Ok(f)
        }
    }

    fn roots() -> PluginRoots {
        PluginRoots {
            local: "/app/.schemaforge/plugins".into(),
            global: Some("/global".into()),
        }
    }

    fn config() -> &'static Utf8Path {
        Utf8Path::new("/app/backend/api/blog/transform.conf.json")
    }

    #[test]
    fn local_root_wins_over_global() {
        let loader = InMemoryModuleLoader::new()
            .with("/app/.schemaforge/plugins/queue", || {
                PluginModule::factory(|| Named("local"))
            })
            .with("/global/queue", || PluginModule::factory(|| Named("global")));
        let mut resolver = PluginResolver::new(&loader, roots(), config());
        assert_eq!(resolver.resolve_raw("queue").unwrap().name(), "local");
    }

    #[test]
    fn falls_back_to_global_root() {
        let loader = InMemoryModuleLoader::new()
            .with("/global/queue", || PluginModule::instance(Named("global")));
        let mut resolver = PluginResolver::new(&loader, roots(), config());
        assert_eq!(resolver.resolve_raw("queue").unwrap().name(), "global");
    }

    #[test]
    fn absolute_path_does_not_fall_back() {
        let loader = InMemoryModuleLoader::new()
            .with("/global/queue", || PluginModule::instance(Named("global")));
        let mut resolver = PluginResolver::new(&loader, roots(), config());
        let err = resolver.resolve_raw("file:///somewhere/queue").err().unwrap();
        assert!(matches!(err, PluginError::Load { .. }));
        assert_eq!(err.reference(), "/somewhere/queue");
    }

    #[test]
    fn unresolvable_names_reference_and_config() {
        let loader = InMemoryModuleLoader::new();
        let mut resolver = PluginResolver::new(&loader, roots(), config());
        let msg = resolver.resolve_raw("ghost").err().unwrap().to_string();
        assert!(msg.contains("module(ghost)"));
        assert!(msg.contains("/app/backend/api/blog/transform.conf.json"));
    }

    #[test]
    fn empty_reference_is_a_load_error() {
        let loader = InMemoryModuleLoader::new();
        let mut resolver = PluginResolver::new(&loader, roots(), config());
        let msg = resolver.resolve_raw("file://").err().unwrap().to_string();
        assert!(msg.contains("Invalid value specified for transformer: 'file://'"));
    }

    #[test]
    fn wrong_shape_is_a_contract_error() {
        let loader = InMemoryModuleLoader::new().with("/app/.schemaforge/plugins/bad", || {
            PluginModule::Other {
                shape: "string".into(),
            }
        });
        let mut resolver = PluginResolver::new(&loader, roots(), config());
        let err = resolver.resolve_raw("bad").err().unwrap();
        assert!(matches!(err, PluginError::Contract { ref shape, .. } if shape == "string"));
    }

    #[test]
    fn cache_returns_same_instance_within_one_resolver() {
        let loader = InMemoryModuleLoader::new()
            .with("/global/queue", || PluginModule::factory(|| Named("global")));
        let mut resolver = PluginResolver::new(&loader, roots(), config());
        let a = resolver.resolve_raw("queue").unwrap();
        let b = resolver.resolve_raw("queue").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let mut next_compile = PluginResolver::new(&loader, roots(), config());
        let c = next_compile.resolve_raw("queue").unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
