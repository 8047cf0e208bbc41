use super::{DATA_SOURCE_KIND, PASSTHROUGH_RESPONSE, add_resolver, upper_first};
use schemaforge_plugin_api::{FragmentSet, Resource, Schema, Transformer};
use schemaforge_schema::Value;
use schemaforge_types::StorageConfig;
use serde_json::json;

const ROLE_KIND: &str = "AWS::IAM::Role";

/// `@predictions`: chain AI actions over files in the project's storage bucket.
#[derive(Debug, Default)]
pub struct PredictionsTransformer {
    storage: Option<StorageConfig>,
}

impl PredictionsTransformer {
    pub fn new(storage: Option<StorageConfig>) -> Self {
        Self { storage }
    }
}

impl Transformer for PredictionsTransformer {
    fn name(&self) -> &str {
        "PredictionsTransformer"
    }

    fn directive(&self) -> Option<String> {
        Some("directive @predictions(actions: [PredictionsActions!]!) on FIELD_DEFINITION".to_string())
    }

    fn type_definitions(&self) -> Vec<String> {
        vec![
            "enum PredictionsActions {\n  identifyText\n  identifyLabels\n  convertTextToSpeech\n  translateText\n}"
                .to_string(),
        ]
    }

    fn transform(&self, schema: &Schema, mut fragments: FragmentSet) -> anyhow::Result<FragmentSet> {
        for t in schema.types() {
            for field in &t.fields {
                let Some(directive) = field.directive("predictions") else {
                    continue;
                };
                let Some(storage) = &self.storage else {
                    anyhow::bail!(
                        "@predictions on {}.{} needs a storage bucket; add an S3 storage resource to the project",
                        t.name,
                        field.name
                    );
                };
                let actions = directive
                    .argument("actions")
                    .map(Value::string_items)
                    .unwrap_or_default();
                if actions.is_empty() {
                    anyhow::bail!("@predictions on {}.{} lists no actions", t.name, field.name);
                }

                let role = "PredictionsIAMRole";
                fragments.add_resource(
                    role,
                    Resource::new(
                        ROLE_KIND,
                        json!({
                            "RoleName": "predictionsLambdaRole-${env}",
                            "Policies": [{
                                "PolicyName": "PredictionsStorageAccess",
                                "Resource": format!("arn:aws:s3:::{}/public/*", storage.bucket_name),
                            }],
                        }),
                    ),
                );
                let ds = "PredictionsDataSource";
                fragments.add_resource(
                    ds,
                    Resource::new(
                        DATA_SOURCE_KIND,
                        json!({ "Name": ds, "Type": "HTTP", "ServiceRoleArn": role, "Actions": &actions }),
                    )
                    .depends_on(role),
                );
                let chain: String = actions.iter().map(|a| upper_first(a)).collect();
                add_resolver(
                    &mut fragments,
                    &t.name,
                    &field.name,
                    ds,
                    format!(
                        r#"{{ "version": "2018-05-29", "method": "POST", "resourcePath": "/{}", "params": {{ "body": $util.toJson($ctx.args.input) }} }}"#,
                        chain
                    ),
                    PASSTHROUGH_RESPONSE.to_string(),
                );
            }
        }
        Ok(fragments)
    }
}
