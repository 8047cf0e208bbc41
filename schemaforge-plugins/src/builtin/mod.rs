//! Transformers that ship with schemaforge.
//!
//! Each one reacts to a single directive. The model transformer creates the
//! tables and CRUD resolvers that the later ones (`key`, `versioned`,
//! `connection`, `searchable`, `auth`) extend, which is why their relative
//! order in the pipeline is fixed.

mod auth;
mod connection;
mod function;
mod http;
mod key;
mod model;
mod predictions;
mod searchable;
mod versioned;

pub use auth::{AUTH_DIRECTIVE_DEFINITION, AuthTransformer};
pub use connection::ConnectionTransformer;
pub use function::FunctionTransformer;
pub use http::HttpTransformer;
pub use key::KeyTransformer;
pub use model::ModelTransformer;
pub use predictions::PredictionsTransformer;
pub use searchable::SearchableTransformer;
pub use versioned::VersionedTransformer;

use schemaforge_plugin_api::{FragmentSet, Resource};
use schemaforge_schema::{Directive, TypeDefinition};
use serde_json::json;

pub(crate) const TABLE_KIND: &str = "AWS::DynamoDB::Table";
pub(crate) const DATA_SOURCE_KIND: &str = "AWS::AppSync::DataSource";
pub(crate) const RESOLVER_KIND: &str = "AWS::AppSync::Resolver";

pub(crate) fn table_id(type_name: &str) -> String {
    format!("{}Table", type_name)
}

pub(crate) fn plural(name: &str) -> String {
    if name.ends_with('s') {
        format!("{}es", name)
    } else if let Some(stem) = name.strip_suffix('y')
        && !stem.ends_with(['a', 'e', 'i', 'o', 'u'])
    {
        format!("{}ies", stem)
    } else {
        format!("{}s", name)
    }
}

pub(crate) fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn resolver_file(type_name: &str, field: &str, phase: &str) -> String {
    format!("{}.{}.{}.vtl", type_name, field, phase)
}

pub(crate) fn resolver_id(type_name: &str, field: &str) -> String {
    format!("{}{}Resolver", type_name, upper_first(field))
}

/// Register a unit resolver for `type_name.field` and its two templates.
pub(crate) fn add_resolver(
    fragments: &mut FragmentSet,
    type_name: &str,
    field: &str,
    data_source: &str,
    request: String,
    response: String,
) {
    let req_file = resolver_file(type_name, field, "req");
    let res_file = resolver_file(type_name, field, "res");
    fragments.add_resource(
        resolver_id(type_name, field),
        Resource::new(
            RESOLVER_KIND,
            json!({
                "TypeName": type_name,
                "FieldName": field,
                "DataSourceName": data_source,
                "RequestMappingTemplateS3Location": req_file,
                "ResponseMappingTemplateS3Location": res_file,
            }),
        )
        .depends_on(data_source),
    );
    fragments.add_resolver(req_file, request);
    fragments.add_resolver(res_file, response);
}

pub(crate) const PASSTHROUGH_RESPONSE: &str = "$util.toJson($ctx.result)";

/// Look up a string argument, falling back to `default`.
pub(crate) fn str_arg(directive: &Directive, name: &str, default: &str) -> String {
    directive
        .argument(name)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_string()
}

/// Fail unless `t` is an `@model` type; directives like `@key` need its table.
pub(crate) fn require_model(
    t: &TypeDefinition,
    directive: &str,
    fragments: &FragmentSet,
) -> anyhow::Result<String> {
    let id = table_id(&t.name);
    if !t.has_directive("model") || fragments.resource(&id).is_none() {
        anyhow::bail!(
            "@{} on type {} requires @model on the same type",
            directive,
            t.name
        );
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plural_follows_english_suffixes() {
        assert_eq!(plural("Post"), "Posts");
        assert_eq!(plural("Address"), "Addresses");
        assert_eq!(plural("Category"), "Categories");
        assert_eq!(plural("Day"), "Days");
    }

    #[test]
    fn case_helpers() {
        assert_eq!(lower_first("PostTable"), "postTable");
        assert_eq!(upper_first("comments"), "Comments");
        assert_eq!(lower_first(""), "");
    }
}
