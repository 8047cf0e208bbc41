use super::{PASSTHROUGH_RESPONSE, add_resolver, require_model};
use schemaforge_plugin_api::{FragmentSet, Schema, Transformer};
use schemaforge_schema::{TypeDefinition, Value};
use serde_json::{Value as Json, json};

/// `@key`: custom primary keys and secondary indexes on a model table.
#[derive(Debug, Default)]
pub struct KeyTransformer;

fn attribute_type(t: &TypeDefinition, field: &str) -> &'static str {
    match t.field(field).map(|f| f.ty.base_name()) {
        Some("Int" | "Float" | "AWSTimestamp") => "N",
        _ => "S",
    }
}

fn key_schema(fields: &[String]) -> Json {
    let mut schema = vec![json!({ "AttributeName": fields[0], "KeyType": "HASH" })];
    if fields.len() > 1 {
        schema.push(json!({ "AttributeName": fields[1..].join("#"), "KeyType": "RANGE" }));
    }
    Json::Array(schema)
}

fn add_attribute(properties: &mut Json, name: &str, kind: &str) {
    let defs = properties
        .as_object_mut()
        .map(|o| o.entry("AttributeDefinitions").or_insert_with(|| json!([])));
    if let Some(Json::Array(defs)) = defs
        && !defs.iter().any(|d| d["AttributeName"] == name)
    {
        defs.push(json!({ "AttributeName": name, "AttributeType": kind }));
    }
}

impl Transformer for KeyTransformer {
    fn name(&self) -> &str {
        "KeyTransformer"
    }

    fn directive(&self) -> Option<String> {
        Some(
            "directive @key(name: String, fields: [String!]!, queryField: String) repeatable on OBJECT"
                .to_string(),
        )
    }

    fn transform(&self, schema: &Schema, mut fragments: FragmentSet) -> anyhow::Result<FragmentSet> {
        for t in schema.object_types_with("key") {
            let table = require_model(t, "key", &fragments)?;
            for directive in t.directives.iter().filter(|d| d.name.eq_ignore_ascii_case("key")) {
                let fields = directive
                    .argument("fields")
                    .map(Value::string_items)
                    .unwrap_or_default();
                if fields.is_empty() {
                    anyhow::bail!("@key on {} needs at least one entry in 'fields'", t.name);
                }
                for f in &fields {
                    if t.field(f).is_none() {
                        anyhow::bail!("@key on {} references unknown field '{}'", t.name, f);
                    }
                }

                let Some(resource) = fragments.resource_mut(&table) else {
                    continue;
                };
                let props = &mut resource.properties;
                add_attribute(props, &fields[0], attribute_type(t, &fields[0]));
                if fields.len() > 1 {
                    add_attribute(props, &fields[1..].join("#"), "S");
                }

                match directive.argument("name").and_then(Value::as_str) {
                    None => {
                        props["KeySchema"] = key_schema(&fields);
                    }
                    Some(index) => {
                        let gsi = json!({
                            "IndexName": index,
                            "KeySchema": key_schema(&fields),
                            "Projection": { "ProjectionType": "ALL" },
                        });
                        match props.get_mut("GlobalSecondaryIndexes") {
                            Some(Json::Array(list)) => list.push(gsi),
                            _ => props["GlobalSecondaryIndexes"] = json!([gsi]),
                        }

                        if let Some(query) = directive.argument("queryField").and_then(Value::as_str) {
                            add_resolver(
                                &mut fragments,
                                "Query",
                                query,
                                &format!("{}DataSource", t.name),
                                format!(
                                    r#"{{ "version": "2018-05-29", "operation": "Query", "index": "{}", "query": $util.toJson($ctx.args) }}"#,
                                    index
                                ),
                                PASSTHROUGH_RESPONSE.to_string(),
                            );
                            fragments.add_schema(format!(
                                "extend type Query {{\n  {}({}: String!, limit: Int, nextToken: String): Model{}Connection\n}}",
                                query, fields[0], t.name
                            ));
                        }
                    }
                }
            }
        }
        Ok(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::ModelTransformer;
    use schemaforge_schema::parse_schema;

    fn run(sdl: &str) -> anyhow::Result<FragmentSet> {
        let schema = parse_schema(sdl).unwrap();
        let out = ModelTransformer.transform(&schema, FragmentSet::new())?;
        KeyTransformer.transform(&schema, out)
    }

    #[test]
    fn primary_key_replaces_key_schema() {
        let out = run(
            r#"type Order @model @key(fields: ["customer", "createdAt", "status"]) {
                customer: String! createdAt: String! status: String!
            }"#,
        )
        .unwrap();
        let props = &out.resource("OrderTable").unwrap().properties;
        assert_eq!(props["KeySchema"][0]["AttributeName"], "customer");
        assert_eq!(props["KeySchema"][1]["AttributeName"], "createdAt#status");
    }

    #[test]
    fn named_key_adds_index_and_query() {
        let out = run(
            r#"type Order @model @key(name: "byStatus", fields: ["status"], queryField: "ordersByStatus") {
                id: ID! status: String!
            }"#,
        )
        .unwrap();
        let props = &out.resource("OrderTable").unwrap().properties;
        assert_eq!(props["GlobalSecondaryIndexes"][0]["IndexName"], "byStatus");
        assert_eq!(props["KeySchema"][0]["AttributeName"], "id");
        assert!(out.resource("QueryOrdersByStatusResolver").is_some());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = run(r#"type Order @model @key(fields: ["nope"]) { id: ID! }"#).unwrap_err();
        assert!(err.to_string().contains("unknown field 'nope'"));
    }
}
