use proptest::prelude::*;
use schemaforge_plugin_api::{FragmentSet, PluginModule, Schema, Transformer};
use schemaforge_plugins::{
    InMemoryModuleLoader, ManifestModuleLoader, PipelineInputs, PluginResolver, PluginRoots, Stage,
    build_pipeline,
};
use schemaforge_types::AuthConfig;
use std::sync::Arc;
use tempfile::TempDir;

struct Custom(String);

impl Transformer for Custom {
    fn name(&self) -> &str {
        &self.0
    }

    fn directive(&self) -> Option<String> {
        None
    }

    fn transform(&self, _: &Schema, fragments: FragmentSet) -> anyhow::Result<FragmentSet> {
        Ok(fragments)
    }
}

fn inputs(search: bool, customs: usize) -> PipelineInputs {
    PipelineInputs {
        include_search_capability: search,
        storage: None,
        custom: (0..customs)
            .map(|i| Arc::new(Custom(format!("Custom{i}"))) as Arc<dyn Transformer>)
            .collect(),
        auth_config: AuthConfig::from_security_type("AMAZON_COGNITO_USER_POOLS"),
        admin_mode: false,
    }
}

proptest! {
    #[test]
    fn auth_is_always_last(search in any::<bool>(), customs in 0usize..8) {
        let pipeline = build_pipeline(inputs(search, customs));
        let names = pipeline.names();
        prop_assert_eq!(names.last().copied(), Some("AuthTransformer"));
        prop_assert_eq!(pipeline.stages().last().copied(), Some(Stage::Authorization));
        prop_assert_eq!(names.iter().filter(|n| **n == "AuthTransformer").count(), 1);
    }

    #[test]
    fn search_present_only_when_requested(search in any::<bool>(), customs in 0usize..8) {
        let pipeline = build_pipeline(inputs(search, customs));
        let count = pipeline
            .names()
            .iter()
            .filter(|n| **n == "SearchableTransformer")
            .count();
        prop_assert_eq!(count, usize::from(search));
    }

    #[test]
    fn customs_keep_declared_order_before_auth(customs in 1usize..8) {
        let pipeline = build_pipeline(inputs(true, customs));
        let names = pipeline.names();
        let first = names.iter().position(|n| *n == "Custom0").unwrap();
        let expected: Vec<String> = (0..customs).map(|i| format!("Custom{i}")).collect();
        let actual: Vec<String> = names[first..first + customs].iter().map(|s| s.to_string()).collect();
        prop_assert_eq!(actual, expected);
        prop_assert_eq!(first + customs, names.len() - 1);
    }
}

#[test]
fn resolution_is_deterministic_across_compiles() {
    let temp = TempDir::new().unwrap();
    let root = camino::Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let plugin_dir = root.join(".schemaforge/plugins/queue");
    fs_err::create_dir_all(&plugin_dir).unwrap();
    fs_err::write(
        plugin_dir.join("transformer.toml"),
        "name = \"QueueTransformer\"\ndirective = \"directive @queue on OBJECT\"\n",
    )
    .unwrap();

    let embedded = InMemoryModuleLoader::new()
        .with("audit", || PluginModule::factory(|| Custom("AuditTransformer".into())));
    let loader = ManifestModuleLoader::with_embedded(embedded);
    let config = root.join("backend/api/blog/transform.conf.json");
    let refs = vec!["queue".to_string(), "builtin:audit".to_string()];

    let first: Vec<String> = PluginResolver::new(&loader, PluginRoots::for_project(&root, None), &config)
        .resolve_all(&refs)
        .unwrap()
        .iter()
        .map(|t| t.name().to_string())
        .collect();
    let second: Vec<String> = PluginResolver::new(&loader, PluginRoots::for_project(&root, None), &config)
        .resolve_all(&refs)
        .unwrap()
        .iter()
        .map(|t| t.name().to_string())
        .collect();

    assert_eq!(first, vec!["QueueTransformer", "AuditTransformer"]);
    assert_eq!(first, second);
}
