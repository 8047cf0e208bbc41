use super::{PASSTHROUGH_RESPONSE, add_resolver, lower_first, table_id, upper_first};
use schemaforge_plugin_api::{FragmentSet, Schema, Transformer};
use schemaforge_schema::Value;
use serde_json::{Value as Json, json};

/// `@connection`: relationships between model types.
#[derive(Debug, Default)]
pub struct ConnectionTransformer;

impl Transformer for ConnectionTransformer {
    fn name(&self) -> &str {
        "ConnectionTransformer"
    }

    fn directive(&self) -> Option<String> {
        Some(
            "directive @connection(name: String, keyField: String, sortField: String, keyName: String, limit: Int, fields: [String!]) on FIELD_DEFINITION"
                .to_string(),
        )
    }

    fn transform(&self, schema: &Schema, mut fragments: FragmentSet) -> anyhow::Result<FragmentSet> {
        for parent in schema.object_types_with("model") {
            for field in &parent.fields {
                let Some(directive) = field.directive("connection") else {
                    continue;
                };
                let target = field.ty.base_name();
                let target_table = table_id(target);
                if !schema.type_named(target).is_some_and(|t| t.has_directive("model"))
                    || fragments.resource(&target_table).is_none()
                {
                    anyhow::bail!(
                        "@connection on {}.{} points at {}, which is not an @model type",
                        parent.name,
                        field.name,
                        target
                    );
                }
                let data_source = format!("{}DataSource", target);
                let limit = match directive.argument("limit") {
                    Some(Value::Int(n)) => *n,
                    _ => 100,
                };

                let request = if field.ty.is_list() {
                    let index = match (
                        directive.argument("keyName").and_then(Value::as_str),
                        directive.argument("name").and_then(Value::as_str),
                    ) {
                        (Some(key), _) => key.to_string(),
                        (None, name) => {
                            let index = format!("gsi-{}", name.unwrap_or(&format!("{}{}", parent.name, upper_first(&field.name))));
                            let key_attr = directive
                                .argument("keyField")
                                .and_then(Value::as_str)
                                .map(str::to_string)
                                .unwrap_or_else(|| {
                                    format!("{}{}Id", lower_first(&parent.name), upper_first(&field.name))
                                });
                            add_index(&mut fragments, &target_table, &index, &key_attr);
                            index
                        }
                    };
                    format!(
                        r##"{{ "version": "2018-05-29", "operation": "Query", "index": "{}", "limit": {}, "query": {{ "expression": "#k = :v", "expressionValues": {{ ":v": $util.dynamodb.toDynamoDBJson($ctx.source.id) }} }} }}"##,
                        index, limit
                    )
                } else {
                    let source_key = directive
                        .argument("fields")
                        .map(Value::string_items)
                        .and_then(|f| f.into_iter().next())
                        .unwrap_or_else(|| {
                            format!("{}{}Id", lower_first(&parent.name), upper_first(&field.name))
                        });
                    format!(
                        r#"{{ "version": "2018-05-29", "operation": "GetItem", "key": {{ "id": $util.dynamodb.toDynamoDBJson($ctx.source.{}) }} }}"#,
                        source_key
                    )
                };
                add_resolver(
                    &mut fragments,
                    &parent.name,
                    &field.name,
                    &data_source,
                    request,
                    PASSTHROUGH_RESPONSE.to_string(),
                );
            }
        }
        Ok(fragments)
    }
}

fn add_index(fragments: &mut FragmentSet, table: &str, index: &str, key_attr: &str) {
    let Some(resource) = fragments.resource_mut(table) else {
        return;
    };
    let Some(props) = resource.properties.as_object_mut() else {
        return;
    };
    let gsi = json!({
        "IndexName": index,
        "KeySchema": [{ "AttributeName": key_attr, "KeyType": "HASH" }],
        "Projection": { "ProjectionType": "ALL" },
    });
    match props.get_mut("GlobalSecondaryIndexes") {
        Some(Json::Array(list)) => {
            if !list.iter().any(|g| g["IndexName"] == index) {
                list.push(gsi);
            }
        }
        _ => {
            props.insert("GlobalSecondaryIndexes".to_string(), json!([gsi]));
        }
    }
    if let Some(Json::Array(defs)) = props.get_mut("AttributeDefinitions")
        && !defs.iter().any(|d| d["AttributeName"] == key_attr)
    {
        defs.push(json!({ "AttributeName": key_attr, "AttributeType": "S" }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::ModelTransformer;
    use schemaforge_schema::parse_schema;

    #[test]
    fn has_many_adds_index_on_child_table() {
        let schema = parse_schema(
            r#"
            type Post @model { id: ID! comments: [Comment] @connection(name: "PostComments") }
            type Comment @model { id: ID! post: Post @connection(name: "PostComments") }
            "#,
        )
        .unwrap();
        let out = ModelTransformer.transform(&schema, FragmentSet::new()).unwrap();
        let out = ConnectionTransformer.transform(&schema, out).unwrap();

        let comment_table = &out.resource("CommentTable").unwrap().properties;
        assert_eq!(
            comment_table["GlobalSecondaryIndexes"][0]["IndexName"],
            "gsi-PostComments"
        );
        assert!(out.resolvers["Post.comments.req.vtl"].contains(r##""expression": "#k = :v""##));
        assert!(out.resolvers["Comment.post.req.vtl"].contains("GetItem"));
    }

    #[test]
    fn target_must_be_a_model() {
        let schema = parse_schema(
            "type Post @model { id: ID! meta: Meta @connection }\ntype Meta { id: ID! }",
        )
        .unwrap();
        let out = ModelTransformer.transform(&schema, FragmentSet::new()).unwrap();
        let err = ConnectionTransformer.transform(&schema, out).unwrap_err();
        assert!(err.to_string().contains("not an @model type"));
    }
}
