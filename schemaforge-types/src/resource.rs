use crate::auth::AuthConfig;
use crate::project::{API_SERVICE, PROVIDER_NAME};
use serde::{Deserialize, Serialize};

/// A project resource as reported by the resource status source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResource {
    pub category: String,
    pub resource_name: String,
    pub service: String,

    #[serde(default = "default_provider")]
    pub provider_plugin: String,

    #[serde(default)]
    pub output: ResourceOutput,
}

fn default_provider() -> String {
    PROVIDER_NAME.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_config: Option<AuthConfig>,
}

impl ApiResource {
    pub fn is_api(&self) -> bool {
        self.service == API_SERVICE
    }

    /// The auth configuration recorded on the resource, converting a legacy
    /// `securityType` into the multi-provider form.
    pub fn recorded_auth_config(&self) -> Option<AuthConfig> {
        match &self.output.security_type {
            Some(security_type) => Some(AuthConfig::from_security_type(security_type.clone())),
            None => self.output.auth_config.clone(),
        }
    }
}

/// Created / updated / all resources of one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    #[serde(default)]
    pub to_create: Vec<ApiResource>,

    #[serde(default)]
    pub to_update: Vec<ApiResource>,

    #[serde(default)]
    pub all: Vec<ApiResource>,
}

impl ResourceStatus {
    pub fn has_new_api(&self) -> bool {
        self.to_create.iter().any(ApiResource::is_api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(service: &str) -> ApiResource {
        ApiResource {
            category: "api".into(),
            resource_name: "blog".into(),
            service: service.into(),
            provider_plugin: PROVIDER_NAME.into(),
            output: ResourceOutput::default(),
        }
    }

    #[test]
    fn security_type_wins_over_recorded_config() {
        let mut r = resource(API_SERVICE);
        r.output.auth_config = Some(AuthConfig::from_security_type("AWS_IAM"));
        r.output.security_type = Some("API_KEY".into());
        let cfg = r.recorded_auth_config().unwrap();
        assert_eq!(cfg.default_authentication.authentication_type, "API_KEY");
        assert!(cfg.additional_authentication_providers.is_empty());
    }

    #[test]
    fn new_api_only_counts_api_service() {
        let status = ResourceStatus {
            to_create: vec![resource("Lambda")],
            ..Default::default()
        };
        assert!(!status.has_new_api());
    }
}
