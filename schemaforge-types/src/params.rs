use crate::version::DeploymentKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Build parameters map (`parameters.json` / `build/parameters.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildParameters(pub BTreeMap<String, serde_json::Value>);

impl BuildParameters {
    pub const DEPLOYMENT_BUCKET: &'static str = "deploymentBucket";
    pub const DEPLOYMENT_ROOT_KEY: &'static str = "deploymentRootKey";
    pub const API_NAME: &'static str = "AppSyncApiName";
    pub const SEARCH_INSTANCE_TYPE: &'static str = "ElasticsearchInstanceType";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    pub fn deployment_root_key(&self) -> Option<&str> {
        self.get_str(Self::DEPLOYMENT_ROOT_KEY)
    }

    /// Caller parameters plus the deployment bucket and root key.
    pub fn with_deployment(&self, bucket: &str, key: &DeploymentKey) -> Self {
        let mut merged = self.clone();
        merged.insert(
            Self::DEPLOYMENT_BUCKET,
            serde_json::Value::String(bucket.to_string()),
        );
        merged.insert(
            Self::DEPLOYMENT_ROOT_KEY,
            serde_json::Value::String(key.as_str().to_string()),
        );
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_deployment_overrides_stale_values() {
        let mut params = BuildParameters::new();
        params.insert("AppSyncApiName", serde_json::json!("blog"));
        params.insert(BuildParameters::DEPLOYMENT_ROOT_KEY, serde_json::json!("old"));

        let merged = params.with_deployment("bucket-1", &DeploymentKey::reused("new"));
        assert_eq!(merged.get_str("AppSyncApiName"), Some("blog"));
        assert_eq!(merged.deployment_root_key(), Some("new"));
        assert_eq!(merged.get_str(BuildParameters::DEPLOYMENT_BUCKET), Some("bucket-1"));
        assert_eq!(params.deployment_root_key(), Some("old"));
    }
}
