use super::{
    DATA_SOURCE_KIND, PASSTHROUGH_RESPONSE, TABLE_KIND, add_resolver, plural, table_id,
};
use schemaforge_plugin_api::{FragmentSet, Resource, Schema, Transformer};
use schemaforge_schema::{TypeDefinition, TypeKind, TypeRef, Value};
use serde_json::json;
use tracing::debug;

const BUILTIN_SCALARS: &[&str] = &[
    "ID",
    "String",
    "Int",
    "Float",
    "Boolean",
    "AWSDate",
    "AWSTime",
    "AWSDateTime",
    "AWSTimestamp",
    "AWSEmail",
    "AWSJSON",
    "AWSURL",
    "AWSPhone",
    "AWSIPAddress",
];

/// `@model`: one table per type plus CRUD queries and mutations.
#[derive(Debug, Default)]
pub struct ModelTransformer;

/// Operation name to generate, `None` when switched off with `null`.
fn operation_name(
    map: Option<&Value>,
    key: &str,
    default: impl FnOnce() -> String,
) -> Option<String> {
    match map {
        Some(Value::Null) => None,
        Some(obj) => match obj.field(key) {
            Some(Value::Null) => None,
            Some(v) => v.as_str().map(str::to_string),
            None => Some(default()),
        },
        None => Some(default()),
    }
}

fn is_leaf(schema: &Schema, ty: &TypeRef) -> bool {
    let base = ty.base_name();
    BUILTIN_SCALARS.contains(&base)
        || schema
            .type_named(base)
            .is_some_and(|t| matches!(t.kind, TypeKind::Enum | TypeKind::Scalar))
}

fn strip_non_null(ty: &TypeRef) -> &TypeRef {
    match ty {
        TypeRef::NonNull(inner) => inner,
        other => other,
    }
}

impl ModelTransformer {
    fn model(&self, schema: &Schema, t: &TypeDefinition, fragments: &mut FragmentSet) {
        let name = &t.name;
        let table = table_id(name);
        let data_source = format!("{}DataSource", name);

        fragments.add_resource(
            &table,
            Resource::new(
                TABLE_KIND,
                json!({
                    "TableName": format!("{}-${{env}}", name),
                    "KeySchema": [{ "AttributeName": "id", "KeyType": "HASH" }],
                    "AttributeDefinitions": [{ "AttributeName": "id", "AttributeType": "S" }],
                    "BillingMode": "PAY_PER_REQUEST",
                    "StreamSpecification": { "StreamViewType": "NEW_AND_OLD_IMAGES" },
                }),
            ),
        );
        fragments.add_resource(
            &data_source,
            Resource::new(
                DATA_SOURCE_KIND,
                json!({ "Name": &data_source, "Type": "AMAZON_DYNAMODB", "TableName": &table }),
            )
            .depends_on(&table),
        );

        let directive = t.directive("model");
        let queries = directive.and_then(|d| d.argument("queries"));
        let mutations = directive.and_then(|d| d.argument("mutations"));

        let mut query_fields = Vec::new();
        if let Some(get) = operation_name(queries, "get", || format!("get{}", name)) {
            add_resolver(
                fragments,
                "Query",
                &get,
                &data_source,
                r#"{ "version": "2018-05-29", "operation": "GetItem", "key": { "id": $util.dynamodb.toDynamoDBJson($ctx.args.id) } }"#.to_string(),
                PASSTHROUGH_RESPONSE.to_string(),
            );
            query_fields.push(format!("  {}(id: ID!): {}", get, name));
        }
        if let Some(list) = operation_name(queries, "list", || format!("list{}", plural(name))) {
            add_resolver(
                fragments,
                "Query",
                &list,
                &data_source,
                r#"{ "version": "2018-05-29", "operation": "Scan", "limit": $util.defaultIfNull($ctx.args.limit, 100), "nextToken": $util.toJson($ctx.args.nextToken) }"#.to_string(),
                PASSTHROUGH_RESPONSE.to_string(),
            );
            query_fields.push(format!(
                "  {}(limit: Int, nextToken: String): Model{}Connection",
                list, name
            ));
        }

        let mut mutation_fields = Vec::new();
        for (op, verb) in [
            ("create", "PutItem"),
            ("update", "UpdateItem"),
            ("delete", "DeleteItem"),
        ] {
            let Some(field) = operation_name(mutations, op, || {
                format!("{}{}", op, name)
            }) else {
                continue;
            };
            add_resolver(
                fragments,
                "Mutation",
                &field,
                &data_source,
                format!(
                    r#"{{ "version": "2018-05-29", "operation": "{}", "key": {{ "id": $util.dynamodb.toDynamoDBJson($ctx.args.input.id) }}, "attributeValues": $util.dynamodb.toMapValuesJson($ctx.args.input) }}"#,
                    verb
                ),
                PASSTHROUGH_RESPONSE.to_string(),
            );
            let input = format!("{}{}Input", super::upper_first(op), name);
            mutation_fields.push(format!("  {}(input: {}!): {}", field, input, name));
        }

        fragments.add_schema(format!(
            "type Model{0}Connection {{\n  items: [{0}]\n  nextToken: String\n}}",
            name
        ));
        if !query_fields.is_empty() {
            fragments.add_schema(format!("extend type Query {{\n{}\n}}", query_fields.join("\n")));
        }
        if !mutation_fields.is_empty() {
            let leaves: Vec<_> = t.fields.iter().filter(|f| is_leaf(schema, &f.ty)).collect();
            let create: Vec<String> = leaves
                .iter()
                .map(|f| {
                    let ty = if f.name == "id" { strip_non_null(&f.ty) } else { &f.ty };
                    format!("  {}: {}", f.name, ty)
                })
                .collect();
            let update: Vec<String> = leaves
                .iter()
                .map(|f| {
                    let ty = if f.name == "id" { f.ty.clone() } else { strip_non_null(&f.ty).clone() };
                    format!("  {}: {}", f.name, ty)
                })
                .collect();
            fragments.add_schema(format!(
                "input Create{}Input {{\n{}\n}}",
                name,
                create.join("\n")
            ));
            fragments.add_schema(format!(
                "input Update{}Input {{\n{}\n}}",
                name,
                update.join("\n")
            ));
            fragments.add_schema(format!("input Delete{}Input {{\n  id: ID!\n}}", name));
            fragments.add_schema(format!(
                "extend type Mutation {{\n{}\n}}",
                mutation_fields.join("\n")
            ));
        }
        debug!(model = %name, "model table and resolvers");
    }
}

impl Transformer for ModelTransformer {
    fn name(&self) -> &str {
        "ModelTransformer"
    }

    fn directive(&self) -> Option<String> {
        Some(
            "directive @model(queries: ModelQueryMap, mutations: ModelMutationMap, subscriptions: ModelSubscriptionMap) on OBJECT"
                .to_string(),
        )
    }

    fn type_definitions(&self) -> Vec<String> {
        vec![
            "input ModelQueryMap {\n  get: String\n  list: String\n}".to_string(),
            "input ModelMutationMap {\n  create: String\n  update: String\n  delete: String\n}"
                .to_string(),
            "input ModelSubscriptionMap {\n  onCreate: [String]\n  onUpdate: [String]\n  onDelete: [String]\n  level: ModelSubscriptionLevel\n}"
                .to_string(),
            "enum ModelSubscriptionLevel {\n  off\n  public\n  on\n}".to_string(),
        ]
    }

    fn transform(&self, schema: &Schema, mut fragments: FragmentSet) -> anyhow::Result<FragmentSet> {
        for t in schema.object_types_with("model") {
            if t.extension {
                continue;
            }
            self.model(schema, t, &mut fragments);
        }
        Ok(fragments)
    }
}
