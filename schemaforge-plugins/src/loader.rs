use crate::manifest::TransformerManifest;
use crate::reference::LoaderStrategy;
use anyhow::bail;
use schemaforge_plugin_api::PluginModule;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Maps a loader strategy to a loaded module.
///
/// An `Err` means nothing usable was found at that location; the resolver
/// decides whether to fall back.
pub trait ModuleLoader {
    fn load(&self, strategy: &LoaderStrategy) -> anyhow::Result<PluginModule>;
}

type ModuleFactory = Arc<dyn Fn() -> PluginModule + Send + Sync>;

/// Modules registered in-process, keyed by embedded name or location.
#[derive(Clone, Default)]
pub struct InMemoryModuleLoader {
    modules: BTreeMap<String, ModuleFactory>,
}

impl InMemoryModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under `key`: a `builtin:` name or a plugin location.
    pub fn register<F>(&mut self, key: impl Into<String>, make: F)
    where
        F: Fn() -> PluginModule + Send + Sync + 'static,
    {
        self.modules.insert(key.into(), Arc::new(make));
    }

    pub fn with<F>(mut self, key: impl Into<String>, make: F) -> Self
    where
        F: Fn() -> PluginModule + Send + Sync + 'static,
    {
        self.register(key, make);
        self
    }

    fn key(strategy: &LoaderStrategy) -> String {
        match strategy {
            LoaderStrategy::Embedded(name) => name.clone(),
            LoaderStrategy::ByPath(p)
            | LoaderStrategy::ByLocalPackage(p)
            | LoaderStrategy::ByGlobalPackage(p) => p.to_string(),
        }
    }
}

impl std::fmt::Debug for InMemoryModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryModuleLoader")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModuleLoader for InMemoryModuleLoader {
    fn load(&self, strategy: &LoaderStrategy) -> anyhow::Result<PluginModule> {
        let key = Self::key(strategy);
        match self.modules.get(&key) {
            Some(make) => Ok(make()),
            None => bail!("no module registered as {}", key),
        }
    }
}

/// Loads `transformer.toml` manifests from disk; embedded names go to the
/// in-memory registry.
#[derive(Debug, Clone, Default)]
pub struct ManifestModuleLoader {
    embedded: InMemoryModuleLoader,
}

impl ManifestModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedded(embedded: InMemoryModuleLoader) -> Self {
        Self { embedded }
    }
}

impl ModuleLoader for ManifestModuleLoader {
    fn load(&self, strategy: &LoaderStrategy) -> anyhow::Result<PluginModule> {
        let location = match strategy {
            LoaderStrategy::Embedded(_) => return self.embedded.load(strategy),
            LoaderStrategy::ByPath(p)
            | LoaderStrategy::ByLocalPackage(p)
            | LoaderStrategy::ByGlobalPackage(p) => p,
        };
        if !location.exists() {
            bail!("{} does not exist", location);
        }
        debug!(location = %location, via = strategy.label(), "loading transformer manifest");
        TransformerManifest::read(location)?.into_module()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    #[test]
    fn manifest_loader_reads_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().join("queue")).unwrap();
        fs_err::create_dir_all(&dir).unwrap();
        fs_err::write(
            dir.join("transformer.toml"),
            "name = \"Queue\"\nexport = \"instance\"\ndirective = \"directive @queue on OBJECT\"\n",
        )
        .unwrap();

        let module = ManifestModuleLoader::new()
            .load(&LoaderStrategy::ByLocalPackage(dir))
            .unwrap();
        assert_eq!(module.shape(), "instance");
    }

    #[test]
    fn missing_location_is_an_error() {
        let err = ManifestModuleLoader::new()
            .load(&LoaderStrategy::ByPath("/definitely/not/here".into()))
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn embedded_names_use_registry() {
        let registry = InMemoryModuleLoader::new().with("opaque", || PluginModule::Other {
            shape: "number".into(),
        });
        let loader = ManifestModuleLoader::with_embedded(registry);
        let module = loader
            .load(&LoaderStrategy::Embedded("opaque".into()))
            .unwrap();
        assert_eq!(module.shape(), "number");
        assert!(loader.load(&LoaderStrategy::Embedded("missing".into())).is_err());
    }
}
