use serde::{Deserialize, Serialize};

/// Multi-provider API authorization configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    pub default_authentication: AuthProviderConfig,

    #[serde(default)]
    pub additional_authentication_providers: Vec<AuthProviderConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthProviderConfig {
    pub authentication_type: String,
}

impl AuthConfig {
    /// Single-provider configuration from a legacy `securityType` value.
    pub fn from_security_type(security_type: impl Into<String>) -> Self {
        Self {
            default_authentication: AuthProviderConfig {
                authentication_type: security_type.into(),
            },
            additional_authentication_providers: vec![],
        }
    }

    pub fn provider_types(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.default_authentication.authentication_type.as_str()).chain(
            self.additional_authentication_providers
                .iter()
                .map(|p| p.authentication_type.as_str()),
        )
    }
}

/// Storage bucket used by the predictions capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    pub bucket_name: String,
}
