//! Static metadata for the built-in transformers, used by `list-plugins`.

use crate::pipeline::Stage;
use serde::Serialize;

/// Information about a built-in transformer.
#[derive(Debug, Clone, Serialize)]
pub struct BuiltinTransformer {
    /// Short key (user-facing, e.g. "model").
    pub key: &'static str,
    /// Name reported by the transformer itself.
    pub name: &'static str,
    /// Directive the transformer acts on.
    pub directive: &'static str,
    /// Stage the transformer runs in.
    #[serde(serialize_with = "serialize_stage")]
    pub stage: Stage,
    /// Whether the transformer is always part of the pipeline.
    pub always_present: bool,
    /// One-line description.
    pub description: &'static str,
}

fn serialize_stage<S: serde::Serializer>(stage: &Stage, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(stage.as_str())
}

/// Registry of built-in transformers in pipeline order.
pub static BUILTIN_CATALOG: &[BuiltinTransformer] = &[
    BuiltinTransformer {
        key: "model",
        name: "ModelTransformer",
        directive: "model",
        stage: Stage::BuiltIn,
        always_present: true,
        description: "Creates a table per type plus get/list queries and create/update/delete mutations.",
    },
    BuiltinTransformer {
        key: "versioned",
        name: "VersionedTransformer",
        directive: "versioned",
        stage: Stage::BuiltIn,
        always_present: true,
        description: "Adds optimistic concurrency checks to a model's mutations.",
    },
    BuiltinTransformer {
        key: "function",
        name: "FunctionTransformer",
        directive: "function",
        stage: Stage::BuiltIn,
        always_present: true,
        description: "Resolves a field by invoking a named function.",
    },
    BuiltinTransformer {
        key: "http",
        name: "HttpTransformer",
        directive: "http",
        stage: Stage::BuiltIn,
        always_present: true,
        description: "Resolves a field with an HTTP request.",
    },
    BuiltinTransformer {
        key: "key",
        name: "KeyTransformer",
        directive: "key",
        stage: Stage::BuiltIn,
        always_present: true,
        description: "Configures primary keys and secondary indexes on model tables.",
    },
    BuiltinTransformer {
        key: "connection",
        name: "ConnectionTransformer",
        directive: "connection",
        stage: Stage::BuiltIn,
        always_present: true,
        description: "Resolves relationships between model types.",
    },
    BuiltinTransformer {
        key: "predictions",
        name: "PredictionsTransformer",
        directive: "predictions",
        stage: Stage::BuiltIn,
        always_present: true,
        description: "Chains AI actions over files in the project's storage bucket.",
    },
    BuiltinTransformer {
        key: "searchable",
        name: "SearchableTransformer",
        directive: "searchable",
        stage: Stage::Capability,
        always_present: false,
        description: "Streams model tables into a search domain; included only when @searchable is used.",
    },
    BuiltinTransformer {
        key: "auth",
        name: "AuthTransformer",
        directive: "auth",
        stage: Stage::Authorization,
        always_present: true,
        description: "Validates access rules and guards generated resolvers; always runs last.",
    },
];

/// Directives provided by the API service itself rather than by a transformer.
pub const SERVICE_DIRECTIVES: &str = r#"directive @aws_subscribe(mutations: [String]) on FIELD_DEFINITION
directive @aws_auth(cognito_groups: [String]) on FIELD_DEFINITION
directive @aws_api_key on FIELD_DEFINITION | OBJECT
directive @aws_iam on FIELD_DEFINITION | OBJECT
directive @aws_oidc on FIELD_DEFINITION | OBJECT
directive @aws_cognito_user_pools(cognito_groups: [String]) on FIELD_DEFINITION | OBJECT
directive @aws_lambda on FIELD_DEFINITION | OBJECT
directive @deprecated(reason: String) on FIELD_DEFINITION | INPUT_FIELD_DEFINITION | ENUM | ENUM_VALUE
scalar AWSDate
scalar AWSTime
scalar AWSDateTime
scalar AWSTimestamp
scalar AWSEmail
scalar AWSJSON
scalar AWSURL
scalar AWSPhone
scalar AWSIPAddress"#;

pub fn lookup(key: &str) -> Option<&'static BuiltinTransformer> {
    BUILTIN_CATALOG.iter().find(|t| t.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PipelineInputs, build_pipeline};
    use schemaforge_types::AuthConfig;

    #[test]
    fn catalog_matches_full_pipeline_order() {
        let pipeline = build_pipeline(PipelineInputs {
            include_search_capability: true,
            storage: None,
            custom: vec![],
            auth_config: AuthConfig::from_security_type("API_KEY"),
            admin_mode: false,
        });
        let names: Vec<_> = BUILTIN_CATALOG.iter().map(|t| t.name).collect();
        assert_eq!(pipeline.names(), names);
    }

    #[test]
    fn service_directives_parse() {
        schemaforge_schema::parse_schema(SERVICE_DIRECTIVES).unwrap();
    }

    #[test]
    fn lookup_by_key() {
        assert_eq!(lookup("auth").unwrap().stage, Stage::Authorization);
        assert!(lookup("nope").is_none());
    }
}
