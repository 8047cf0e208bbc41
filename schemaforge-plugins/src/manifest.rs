//! Declarative plugins described by a `transformer.toml` manifest.
//!
//! ```toml
//! name = "QueueTransformer"
//! export = "factory"
//! directive = "directive @queue(name: String = \"jobs\") on OBJECT"
//!
//! [[resources]]
//! id = "{type}Queue"
//! type = "AWS::SQS::Queue"
//! properties = { QueueName = "{type}-{arg.name}" }
//! ```
//!
//! Every object type carrying the directive gets one copy of each resource
//! and resolver template, with `{type}`, `{type_lower}` and `{arg.<name>}`
//! substituted.

use anyhow::Context;
use camino::Utf8Path;
use schemaforge_plugin_api::{FragmentSet, PluginModule, Resource, Schema, Transformer};
use schemaforge_schema::{
    Directive, DirectiveDefinition, Value, parse_directive_definition, parse_schema,
};
use serde::Deserialize;
use serde_json::Value as Json;

pub const MANIFEST_FILE_NAME: &str = "transformer.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformerManifest {
    pub name: String,
    /// `factory` or `instance`; anything else fails the plugin contract.
    #[serde(default = "default_export")]
    pub export: String,
    pub directive: String,
    #[serde(default)]
    pub type_definitions: Vec<String>,
    #[serde(default)]
    pub resources: Vec<ResourceTemplate>,
    #[serde(default)]
    pub resolvers: Vec<ResolverTemplate>,
}

fn default_export() -> String {
    "factory".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceTemplate {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: toml::Table,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverTemplate {
    pub file: String,
    pub template: String,
}

impl TransformerManifest {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let manifest: Self = toml::from_str(text).context("parse transformer manifest")?;
        parse_directive_definition(&manifest.directive)
            .with_context(|| format!("directive of transformer {}", manifest.name))?;
        for sdl in &manifest.type_definitions {
            parse_schema(sdl)
                .with_context(|| format!("type definition of transformer {}", manifest.name))?;
        }
        Ok(manifest)
    }

    /// Read a manifest from a plugin directory or directly from a `.toml` file.
    pub fn read(location: &Utf8Path) -> anyhow::Result<Self> {
        let file = if location.is_dir() {
            location.join(MANIFEST_FILE_NAME)
        } else {
            location.to_path_buf()
        };
        let text = fs_err::read_to_string(&file).with_context(|| format!("read {}", file))?;
        Self::parse(&text).with_context(|| format!("in {}", file))
    }

    /// Wrap the manifest in the module shape it declares.
    pub fn into_module(self) -> anyhow::Result<PluginModule> {
        match self.export.as_str() {
            "factory" => {
                let transformer = ManifestTransformer::new(self)?;
                Ok(PluginModule::factory(move || transformer.clone()))
            }
            "instance" => Ok(PluginModule::instance(ManifestTransformer::new(self)?)),
            other => Ok(PluginModule::Other {
                shape: other.to_string(),
            }),
        }
    }
}

/// Transformer generated from a [`TransformerManifest`].
#[derive(Debug, Clone)]
pub struct ManifestTransformer {
    manifest: TransformerManifest,
    definition: DirectiveDefinition,
}

impl ManifestTransformer {
    pub fn new(manifest: TransformerManifest) -> anyhow::Result<Self> {
        let definition = parse_directive_definition(&manifest.directive)
            .with_context(|| format!("directive of transformer {}", manifest.name))?;
        Ok(Self {
            manifest,
            definition,
        })
    }

    fn argument(&self, directive: &Directive, name: &str) -> String {
        let value = directive.argument(name).or_else(|| {
            self.definition
                .arguments
                .iter()
                .find(|a| a.name == name)
                .and_then(|a| a.default_value.as_ref())
        });
        match value {
            Some(Value::Int(i)) => i.to_string(),
            Some(Value::Float(f)) => f.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(v) => v.as_str().unwrap_or_default().to_string(),
            None => String::new(),
        }
    }

    fn substitute(&self, text: &str, type_name: &str, directive: &Directive) -> String {
        let mut out = text
            .replace("{type}", type_name)
            .replace("{type_lower}", &type_name.to_lowercase());
        let mut from = 0;
        while let Some(offset) = out[from..].find("{arg.") {
            let start = from + offset;
            let Some(len) = out[start..].find('}') else {
                break;
            };
            let name = out[start + 5..start + len].to_string();
            let value = self.argument(directive, &name);
            out.replace_range(start..start + len + 1, &value);
            from = start + value.len();
        }
        out
    }

    fn substitute_json(&self, value: Json, type_name: &str, directive: &Directive) -> Json {
        match value {
            Json::String(s) => Json::String(self.substitute(&s, type_name, directive)),
            Json::Array(items) => Json::Array(
                items
                    .into_iter()
                    .map(|v| self.substitute_json(v, type_name, directive))
                    .collect(),
            ),
            Json::Object(map) => Json::Object(
                map.into_iter()
                    .map(|(k, v)| (k, self.substitute_json(v, type_name, directive)))
                    .collect(),
            ),
            other => other,
        }
    }
}

impl Transformer for ManifestTransformer {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn directive(&self) -> Option<String> {
        Some(self.manifest.directive.clone())
    }

    fn type_definitions(&self) -> Vec<String> {
        self.manifest.type_definitions.clone()
    }

    fn transform(&self, schema: &Schema, mut fragments: FragmentSet) -> anyhow::Result<FragmentSet> {
        for t in schema.object_types_with(&self.definition.name) {
            let Some(directive) = t.directive(&self.definition.name) else {
                continue;
            };
            for template in &self.manifest.resources {
                let properties = serde_json::to_value(&template.properties)
                    .with_context(|| format!("properties of {}", template.id))?;
                fragments.add_resource(
                    self.substitute(&template.id, &t.name, directive),
                    Resource::new(
                        template.kind.clone(),
                        self.substitute_json(properties, &t.name, directive),
                    ),
                );
            }
            for resolver in &self.manifest.resolvers {
                fragments.add_resolver(
                    self.substitute(&resolver.file, &t.name, directive),
                    self.substitute(&resolver.template, &t.name, directive),
                );
            }
        }
        Ok(fragments)
    }
}
