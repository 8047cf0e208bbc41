use super::{DATA_SOURCE_KIND, add_resolver, upper_first};
use schemaforge_plugin_api::{FragmentSet, Resource, Schema, Transformer};
use schemaforge_schema::Value;
use serde_json::json;

/// `@http`: resolve a field with an HTTP request.
#[derive(Debug, Default)]
pub struct HttpTransformer;

/// Split `https://host/path` into `("https://host", "/path")`.
fn split_url(url: &str) -> Option<(&str, &str)> {
    let scheme_end = url.find("://")? + 3;
    match url[scheme_end..].find('/') {
        Some(i) => Some((&url[..scheme_end + i], &url[scheme_end + i..])),
        None => Some((url, "/")),
    }
}

fn data_source_id(origin: &str) -> String {
    let host = origin.split("://").nth(1).unwrap_or(origin);
    let name: String = host
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(upper_first)
        .collect();
    format!("{}HttpDataSource", name)
}

impl Transformer for HttpTransformer {
    fn name(&self) -> &str {
        "HttpTransformer"
    }

    fn directive(&self) -> Option<String> {
        Some(
            "directive @http(method: HttpMethod = GET, url: String!, headers: [HttpHeader] = []) on FIELD_DEFINITION"
                .to_string(),
        )
    }

    fn type_definitions(&self) -> Vec<String> {
        vec![
            "enum HttpMethod {\n  GET\n  POST\n  PUT\n  DELETE\n  PATCH\n}".to_string(),
            "input HttpHeader {\n  key: String\n  value: String\n}".to_string(),
        ]
    }

    fn transform(&self, schema: &Schema, mut fragments: FragmentSet) -> anyhow::Result<FragmentSet> {
        for t in schema.types() {
            for field in &t.fields {
                let Some(directive) = field.directive("http") else {
                    continue;
                };
                let url = directive
                    .argument("url")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let Some((origin, path)) = split_url(url) else {
                    anyhow::bail!(
                        "@http on {}.{} needs an absolute url, got '{}'",
                        t.name,
                        field.name,
                        url
                    );
                };
                let method = directive
                    .argument("method")
                    .and_then(Value::as_str)
                    .unwrap_or("GET");
                let headers: Vec<_> = directive
                    .argument("headers")
                    .and_then(Value::as_list)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|h| {
                        Some(json!({
                            "key": h.field("key")?.as_str()?,
                            "value": h.field("value")?.as_str()?,
                        }))
                    })
                    .collect();

                let ds = data_source_id(origin);
                fragments.add_resource(
                    &ds,
                    Resource::new(
                        DATA_SOURCE_KIND,
                        json!({ "Name": &ds, "Type": "HTTP", "HttpConfig": { "Endpoint": origin } }),
                    ),
                );
                let request = json!({
                    "version": "2018-05-29",
                    "method": method,
                    "resourcePath": path,
                    "params": { "headers": headers },
                });
                add_resolver(
                    &mut fragments,
                    &t.name,
                    &field.name,
                    &ds,
                    request.to_string(),
                    "#if($ctx.result.statusCode == 200)\n$ctx.result.body\n#else\n$util.error($ctx.result.body)\n#end"
                        .to_string(),
                );
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
    fn splits_origin_from_path() {
        assert_eq!(
            split_url("https://api.example.com/v1/items"),
            Some(("https://api.example.com", "/v1/items"))
        );
        assert_eq!(
            split_url("http://localhost"),
            Some(("http://localhost", "/"))
        );
        assert_eq!(split_url("not a url"), None);
    }

    #[test]
    fn binds_field_to_endpoint() {
        let schema = parse_schema(
            r#"type Query { items: String @http(url: "https://api.example.com/items", method: POST) }"#,
        )
        .unwrap();
        let out = HttpTransformer.transform(&schema, FragmentSet::new()).unwrap();
        assert!(out.resource("ApiExampleComHttpDataSource").is_some());
        assert!(out.resolvers["Query.items.req.vtl"].contains("\"POST\""));
    }
}
