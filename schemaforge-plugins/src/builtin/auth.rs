use super::{RESOLVER_KIND, resolver_file};
use anyhow::bail;
use schemaforge_plugin_api::{FragmentSet, Schema, Transformer};
use schemaforge_schema::{Directive, Value};
use schemaforge_types::AuthConfig;
use serde_json::{Value as Json, json};
use std::collections::BTreeSet;

/// Full `@auth` grammar: the directive plus the types its arguments use.
pub const AUTH_DIRECTIVE_DEFINITION: &str = r#"directive @auth(rules: [AuthRule!]!) on OBJECT | FIELD_DEFINITION

input AuthRule {
  allow: AuthStrategy!
  provider: AuthProvider
  identityClaim: String
  groupClaim: String
  ownerField: String
  groupsField: String
  groups: [String]
  operations: [ModelOperation]
}

enum AuthStrategy {
  owner
  groups
  private
  public
  custom
}

enum AuthProvider {
  apiKey
  iam
  oidc
  userPools
  function
}

enum ModelOperation {
  create
  update
  delete
  read
}"#;

const OPERATIONS: &[&str] = &["create", "update", "delete", "read"];

/// Provider name used in rules for an `authenticationType` value.
fn provider_for(authentication_type: &str) -> Option<&'static str> {
    match authentication_type {
        "API_KEY" => Some("apiKey"),
        "AWS_IAM" => Some("iam"),
        "OPENID_CONNECT" => Some("oidc"),
        "AMAZON_COGNITO_USER_POOLS" => Some("userPools"),
        "AWS_LAMBDA" => Some("function"),
        _ => None,
    }
}

fn output_directive(provider: &str) -> &'static str {
    match provider {
        "apiKey" => "aws_api_key",
        "iam" => "aws_iam",
        "oidc" => "aws_oidc",
        "function" => "aws_lambda",
        _ => "aws_cognito_user_pools",
    }
}

/// Providers each strategy may use; the first is the default.
fn allowed_providers(strategy: &str) -> Option<&'static [&'static str]> {
    match strategy {
        "owner" | "groups" => Some(&["userPools", "oidc"]),
        "public" => Some(&["apiKey", "iam"]),
        "private" => Some(&["userPools", "oidc", "iam"]),
        "custom" => Some(&["function"]),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
struct AuthRule {
    allow: String,
    provider: String,
    operations: Vec<String>,
    groups: Vec<String>,
    owner_field: Option<String>,
}

/// `@auth`: validate access rules against the configured providers and
/// guard every resolver generated for a protected type.
///
/// Must run after every other transformer so the resolvers it guards exist.
#[derive(Debug)]
pub struct AuthTransformer {
    auth_config: AuthConfig,
    add_iam_auth_in_output_schema: bool,
}

impl AuthTransformer {
    pub fn new(auth_config: AuthConfig, add_iam_auth_in_output_schema: bool) -> Self {
        Self {
            auth_config,
            add_iam_auth_in_output_schema,
        }
    }

    pub fn admin_mode(&self) -> bool {
        self.add_iam_auth_in_output_schema
    }

    fn configured(&self) -> BTreeSet<&'static str> {
        let mut out: BTreeSet<_> = self
            .auth_config
            .provider_types()
            .filter_map(provider_for)
            .collect();
        if self.add_iam_auth_in_output_schema {
            out.insert("iam");
        }
        out
    }

    fn default_provider(&self) -> Option<&'static str> {
        provider_for(&self.auth_config.default_authentication.authentication_type)
    }

    fn rules(&self, owner: &str, directive: &Directive) -> anyhow::Result<Vec<AuthRule>> {
        let configured = self.configured();
        let Some(items) = directive.argument("rules").and_then(Value::as_list) else {
            bail!("@auth on {} needs a 'rules' list", owner);
        };
        let mut rules = Vec::new();
        for item in items {
            let Some(allow) = item.field("allow").and_then(Value::as_str) else {
                bail!("@auth rule on {} is missing 'allow'", owner);
            };
            let Some(allowed) = allowed_providers(allow) else {
                bail!("@auth rule on {} has unknown strategy '{}'", owner, allow);
            };
            let provider = match item.field("provider").and_then(Value::as_str) {
                Some(p) => p,
                None => allowed[0],
            };
            if !allowed.contains(&provider) {
                bail!(
                    "@auth rule on {} uses provider '{}' with strategy '{}'; allowed providers are {}",
                    owner,
                    provider,
                    allow,
                    allowed.join(", ")
                );
            }
            if !configured.contains(provider) {
                bail!(
                    "@auth directive with '{}' provider found on {}, but the project has no '{}' authentication provider configured; add it to the API's auth settings",
                    provider,
                    owner,
                    provider
                );
            }
            let operations = match item.field("operations") {
                Some(v) => v.string_items(),
                None => OPERATIONS.iter().map(|s| s.to_string()).collect(),
            };
            if let Some(bad) = operations.iter().find(|o| !OPERATIONS.contains(&o.as_str())) {
                bail!("@auth rule on {} has unknown operation '{}'", owner, bad);
            }
            rules.push(AuthRule {
                allow: allow.to_string(),
                provider: provider.to_string(),
                operations,
                groups: item.field("groups").map(Value::string_items).unwrap_or_default(),
                owner_field: item
                    .field("ownerField")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
        Ok(rules)
    }
}

fn rules_json(rules: &[AuthRule]) -> Json {
    Json::Array(
        rules
            .iter()
            .map(|r| {
                json!({
                    "allow": r.allow,
                    "provider": r.provider,
                    "operations": r.operations,
                    "groups": r.groups,
                    "ownerField": r.owner_field.as_deref().unwrap_or("owner"),
                })
            })
            .collect(),
    )
}

fn guard(template: &mut String, rules: &[AuthRule], operation: &str) {
    let applicable: Vec<_> = rules
        .iter()
        .filter(|r| r.operations.iter().any(|o| o == operation))
        .cloned()
        .collect();
    template.insert_str(
        0,
        &format!(
            "## [Start] Authorization ({})\n#set($authRules = {})\n$util.qr($ctx.stash.put(\"authRules\", $authRules))\n#if(!$util.authorize($ctx.identity, $authRules))\n  $util.unauthorized()\n#end\n## [End] Authorization\n",
            operation,
            rules_json(&applicable)
        ),
    );
}

fn operation_of(field: &str) -> &'static str {
    if field.starts_with("create") {
        "create"
    } else if field.starts_with("update") {
        "update"
    } else if field.starts_with("delete") {
        "delete"
    } else {
        "read"
    }
}

impl Transformer for AuthTransformer {
    fn name(&self) -> &str {
        "AuthTransformer"
    }

    fn directive(&self) -> Option<String> {
        AUTH_DIRECTIVE_DEFINITION
            .split("\n\n")
            .next()
            .map(str::to_string)
    }

    fn type_definitions(&self) -> Vec<String> {
        AUTH_DIRECTIVE_DEFINITION
            .split("\n\n")
            .skip(1)
            .map(str::to_string)
            .collect()
    }

    fn transform(&self, schema: &Schema, mut fragments: FragmentSet) -> anyhow::Result<FragmentSet> {
        let default = self.default_provider();
        for t in schema.types() {
            let mut output_directives = BTreeSet::new();

            if let Some(directive) = t.directive("auth") {
                let rules = self.rules(&t.name, directive)?;
                let data_source = format!("{}DataSource", t.name);
                let guarded: Vec<(String, String)> = fragments
                    .resources
                    .values()
                    .filter(|r| r.kind == RESOLVER_KIND)
                    .filter(|r| r.property("DataSourceName").and_then(Json::as_str) == Some(data_source.as_str()))
                    .filter_map(|r| {
                        let parent = r.property("TypeName")?.as_str()?;
                        let field = r.property("FieldName")?.as_str()?;
                        matches!(parent, "Query" | "Mutation")
                            .then(|| (parent.to_string(), field.to_string()))
                    })
                    .collect();
                for (parent, field) in guarded {
                    if let Some(template) =
                        fragments.resolvers.get_mut(&resolver_file(&parent, &field, "req"))
                    {
                        guard(template, &rules, operation_of(&field));
                    }
                }
                output_directives.extend(rules.iter().map(|r| r.provider.clone()));
            }

            for field in &t.fields {
                let Some(directive) = field.directive("auth") else {
                    continue;
                };
                let owner = format!("{}.{}", t.name, field.name);
                let rules = self.rules(&owner, directive)?;
                if let Some(template) = fragments
                    .resolvers
                    .get_mut(&resolver_file(&t.name, &field.name, "req"))
                {
                    guard(template, &rules, "read");
                }
            }

            if self.add_iam_auth_in_output_schema && t.has_directive("model") {
                output_directives.insert("iam".to_string());
            }
            // Naming any non-default provider replaces the implicit default.
            if output_directives.iter().any(|p| Some(p.as_str()) != default) {
                let names: Vec<_> = output_directives
                    .iter()
                    .map(|p| format!("@{}", output_directive(p)))
                    .collect();
                fragments.add_schema(format!("extend type {} {}", t.name, names.join(" ")));
            }
        }
        Ok(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::ModelTransformer;
    use schemaforge_schema::{parse_directive_definition, parse_schema};
    use schemaforge_types::AuthProviderConfig;

    fn user_pools() -> AuthConfig {
        AuthConfig::from_security_type("AMAZON_COGNITO_USER_POOLS")
    }

    fn run(sdl: &str, auth: AuthTransformer) -> anyhow::Result<FragmentSet> {
        let schema = parse_schema(sdl).unwrap();
        let out = ModelTransformer.transform(&schema, FragmentSet::new())?;
        auth.transform(&schema, out)
    }

    #[test]
    fn grammar_parses() {
        let t = AuthTransformer::new(user_pools(), false);
        let def = parse_directive_definition(&t.directive().unwrap()).unwrap();
        assert_eq!(def.name, "auth");
        assert_eq!(t.type_definitions().len(), 4);
        for sdl in t.type_definitions() {
            parse_schema(&sdl).unwrap();
        }
    }

    #[test]
    fn guards_model_resolvers_per_operation() {
        let out = run(
            "type Post @model @auth(rules: [{ allow: owner, operations: [create, delete] }]) { id: ID! }",
            AuthTransformer::new(user_pools(), false),
        )
        .unwrap();

        let create = &out.resolvers["Mutation.createPost.req.vtl"];
        assert!(create.starts_with("## [Start] Authorization (create)"));
        assert!(create.contains("\"allow\":\"owner\""));
        let get = &out.resolvers["Query.getPost.req.vtl"];
        assert!(get.contains("#set($authRules = [])"));
        assert!(!out.schema_additions.iter().any(|s| s.starts_with("extend type Post @")));
    }

    #[test]
    fn unconfigured_provider_is_rejected() {
        let err = run(
            "type Post @model @auth(rules: [{ allow: public }]) { id: ID! }",
            AuthTransformer::new(user_pools(), false),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'apiKey' provider"));
    }

    #[test]
    fn additional_providers_are_named_in_output_schema() {
        let mut cfg = user_pools();
        cfg.additional_authentication_providers.push(AuthProviderConfig {
            authentication_type: "API_KEY".into(),
        });
        let out = run(
            "type Post @model @auth(rules: [{ allow: owner }, { allow: public, operations: [read] }]) { id: ID! }",
            AuthTransformer::new(cfg, false),
        )
        .unwrap();
        assert!(out.schema_additions.contains(
            &"extend type Post @aws_api_key @aws_cognito_user_pools".to_string()
        ));
    }

    #[test]
    fn admin_mode_adds_iam() {
        let out = run(
            "type Post @model { id: ID! }",
            AuthTransformer::new(user_pools(), true),
        )
        .unwrap();
        assert!(out.schema_additions.contains(&"extend type Post @aws_iam".to_string()));
    }
}
