use crate::project::PROVIDER_NAME;
use crate::resource::{ApiResource, ResourceOutput};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `backend-config.json`: resources keyed by category, then by resource name.
///
/// Both the working backend directory and the previously deployed copy carry
/// one of these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendConfig(pub BTreeMap<String, BTreeMap<String, BackendEntry>>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendEntry {
    pub service: String,
    #[serde(default = "default_provider")]
    pub provider_plugin: String,
    #[serde(default)]
    pub output: ResourceOutput,
}

fn default_provider() -> String {
    PROVIDER_NAME.to_string()
}

impl BackendConfig {
    pub fn category(&self, category: &str) -> impl Iterator<Item = (&String, &BackendEntry)> {
        self.0.get(category).into_iter().flat_map(|m| m.iter())
    }

    pub fn contains(&self, category: &str, name: &str) -> bool {
        self.0.get(category).is_some_and(|m| m.contains_key(name))
    }

    /// Resources of `category` in name order.
    pub fn resources(&self, category: &str) -> Vec<ApiResource> {
        self.category(category)
            .map(|(name, entry)| ApiResource {
                category: category.to_string(),
                resource_name: name.clone(),
                service: entry.service.clone(),
                provider_plugin: entry.provider_plugin.clone(),
                output: entry.output.clone(),
            })
            .collect()
    }
}

/// `project-meta.json`: provider details for the current environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMeta {
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default)]
    pub admin_app: bool,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProviderMeta {
    #[serde(default)]
    pub stack_name: String,
    #[serde(default)]
    pub deployment_bucket_name: String,
}

impl ProjectMeta {
    pub fn provider(&self) -> Option<&ProviderMeta> {
        self.providers.get(PROVIDER_NAME)
    }
}
