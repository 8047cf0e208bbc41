use super::{DATA_SOURCE_KIND, PASSTHROUGH_RESPONSE, add_resolver, upper_first};
use schemaforge_plugin_api::{FragmentSet, Resource, Schema, Transformer};
use schemaforge_schema::normalize_directive_name;
use serde_json::json;

/// `@function`: bind a field to a named function.
#[derive(Debug, Default)]
pub struct FunctionTransformer;

fn data_source_id(function_name: &str) -> String {
    let cleaned: String = function_name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty() && *s != "env")
        .map(upper_first)
        .collect();
    format!("{}LambdaDataSource", cleaned)
}

impl Transformer for FunctionTransformer {
    fn name(&self) -> &str {
        "FunctionTransformer"
    }

    fn directive(&self) -> Option<String> {
        Some("directive @function(name: String!, region: String) repeatable on FIELD_DEFINITION".to_string())
    }

    fn transform(&self, schema: &Schema, mut fragments: FragmentSet) -> anyhow::Result<FragmentSet> {
        for t in schema.types() {
            for field in &t.fields {
                for directive in field.directives.iter().filter(|d| normalize_directive_name(&d.name) == "function") {
                    let Some(function) = directive.argument("name").and_then(|v| v.as_str())
                    else {
                        anyhow::bail!(
                            "@function on {}.{} is missing the 'name' argument",
                            t.name,
                            field.name
                        );
                    };
                    let ds = data_source_id(function);
                    fragments.add_resource(
                        &ds,
                        Resource::new(
                            DATA_SOURCE_KIND,
                            json!({
                                "Name": &ds,
                                "Type": "AWS_LAMBDA",
                                "FunctionName": function,
                                "Region": directive.argument("region").and_then(|v| v.as_str()),
                            }),
                        ),
                    );
                    add_resolver(
                        &mut fragments,
                        &t.name,
                        &field.name,
                        &ds,
                        r#"{ "version": "2018-05-29", "operation": "Invoke", "payload": { "typeName": $util.toJson($ctx.info.parentTypeName), "fieldName": $util.toJson($ctx.info.fieldName), "arguments": $util.toJson($ctx.arguments), "identity": $util.toJson($ctx.identity), "source": $util.toJson($ctx.source) } }"#.to_string(),
                        PASSTHROUGH_RESPONSE.to_string(),
                    );
                }
            }
        }
        Ok(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaforge_schema::parse_schema;

    #[test]
    fn one_data_source_per_function() {
        let schema = parse_schema(
            r#"type Query {
                echo(msg: String): String @function(name: "echo-${env}")
                shout(msg: String): String @function(name: "echo-${env}")
            }"#,
        )
        .unwrap();
        let out = FunctionTransformer.transform(&schema, FragmentSet::new()).unwrap();
        assert_eq!(out.ids_of_kind(DATA_SOURCE_KIND).count(), 1);
        assert!(out.resource("EchoLambdaDataSource").is_some());
        assert!(out.resource("QueryShoutResolver").is_some());
    }
}
