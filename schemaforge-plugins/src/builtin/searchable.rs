use super::{DATA_SOURCE_KIND, add_resolver, plural, require_model};
use schemaforge_plugin_api::{FragmentSet, Resource, Schema, Transformer};
use schemaforge_schema::Value;
use schemaforge_types::BuildParameters;
use serde_json::json;

const DOMAIN_ID: &str = "ElasticsearchDomain";
const DOMAIN_DATA_SOURCE: &str = "ElasticsearchDomainDataSource";
const STREAMING_FUNCTION: &str = "ElasticsearchStreamingLambdaFunction";

/// `@searchable`: stream model tables into a search domain and expose search queries.
#[derive(Debug, Default)]
pub struct SearchableTransformer;

impl Transformer for SearchableTransformer {
    fn name(&self) -> &str {
        "SearchableTransformer"
    }

    fn directive(&self) -> Option<String> {
        Some("directive @searchable(queries: SearchableQueryMap) on OBJECT".to_string())
    }

    fn type_definitions(&self) -> Vec<String> {
        vec!["input SearchableQueryMap {\n  search: String\n}".to_string()]
    }

    fn transform(&self, schema: &Schema, mut fragments: FragmentSet) -> anyhow::Result<FragmentSet> {
        let mut any = false;
        for t in schema.object_types_with("searchable") {
            let table = require_model(t, "searchable", &fragments)?;
            if !any {
                add_domain(&mut fragments);
                any = true;
            }

            fragments.add_resource(
                format!("Searchable{}LambdaMapping", t.name),
                Resource::new(
                    "AWS::Lambda::EventSourceMapping",
                    json!({
                        "EventSourceArn": { "Fn::GetAtt": [&table, "StreamArn"] },
                        "FunctionName": STREAMING_FUNCTION,
                        "StartingPosition": "LATEST",
                    }),
                )
                .depends_on(STREAMING_FUNCTION)
                .depends_on(&table),
            );

            let query = t
                .directive("searchable")
                .and_then(|d| d.argument("queries"))
                .and_then(|q| q.field("search"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("search{}", plural(&t.name)));
            add_resolver(
                &mut fragments,
                "Query",
                &query,
                DOMAIN_DATA_SOURCE,
                format!(
                    r#"{{ "version": "2017-02-28", "operation": "GET", "path": "/{}/doc/_search", "params": {{ "body": {{ "size": $util.defaultIfNull($ctx.args.limit, 100), "query": $util.toJson($ctx.args.filter) }} }} }}"#,
                    t.name.to_lowercase()
                ),
                "$util.toJson({ \"items\": $ctx.result.hits.hits, \"total\": $ctx.result.hits.total })"
                    .to_string(),
            );
            fragments.add_schema(format!(
                "type Searchable{0}Connection {{\n  items: [{0}]\n  nextToken: String\n  total: Int\n}}",
                t.name
            ));
            fragments.add_schema(format!(
                "extend type Query {{\n  {}(filter: AWSJSON, limit: Int, nextToken: String): Searchable{}Connection\n}}",
                query, t.name
            ));
        }
        Ok(fragments)
    }
}

fn add_domain(fragments: &mut FragmentSet) {
    fragments.add_resource(
        DOMAIN_ID,
        Resource::new(
            "AWS::Elasticsearch::Domain",
            json!({
                "ElasticsearchClusterConfig": {
                    "InstanceType": { "Ref": BuildParameters::SEARCH_INSTANCE_TYPE },
                    "InstanceCount": 1,
                },
                "EBSOptions": { "EBSEnabled": true, "VolumeSize": 10 },
            }),
        ),
    );
    fragments.add_resource(
        DOMAIN_DATA_SOURCE,
        Resource::new(
            DATA_SOURCE_KIND,
            json!({ "Name": DOMAIN_DATA_SOURCE, "Type": "AMAZON_ELASTICSEARCH", "Domain": DOMAIN_ID }),
        )
        .depends_on(DOMAIN_ID),
    );
    fragments.add_resource(
        STREAMING_FUNCTION,
        Resource::new(
            "AWS::Lambda::Function",
            json!({ "Handler": "streaming.handler", "Environment": { "ES_DOMAIN": DOMAIN_ID } }),
        )
        .depends_on(DOMAIN_ID),
    );
    fragments.outputs.insert(
        "ElasticsearchDomainArn".to_string(),
        json!({ "Value": { "Fn::GetAtt": [DOMAIN_ID, "DomainArn"] } }),
    );
}
