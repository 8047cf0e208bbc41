use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// One infrastructure resource keyed by its logical id in a [`FragmentSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub kind: String,

    #[serde(rename = "Properties", default, skip_serializing_if = "Value::is_null")]
    pub properties: Value,

    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new(kind: impl Into<String>, properties: Value) -> Self {
        Self {
            kind: kind.into(),
            properties,
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// Infrastructure accumulated by the pipeline.
///
/// Maps are ordered so the rendered template is stable across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentSet {
    pub resources: BTreeMap<String, Resource>,
    pub outputs: BTreeMap<String, Value>,
    /// Resolver template file name to template text.
    pub resolvers: BTreeMap<String, String>,
    /// SDL appended to the printed input schema to form the output schema.
    pub schema_additions: Vec<String>,
}

impl FragmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_resource(&mut self, id: impl Into<String>, resource: Resource) {
        self.resources.insert(id.into(), resource);
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn resource_mut(&mut self, id: &str) -> Option<&mut Resource> {
        self.resources.get_mut(id)
    }

    pub fn add_resolver(&mut self, file_name: impl Into<String>, template: impl Into<String>) {
        self.resolvers.insert(file_name.into(), template.into());
    }

    pub fn add_schema(&mut self, sdl: impl Into<String>) {
        self.schema_additions.push(sdl.into());
    }

    /// Resource ids whose kind equals `kind`, in id order.
    pub fn ids_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.kind == kind)
            .map(|(id, _)| id.as_str())
    }

    /// Render the root template document.
    pub fn to_template(&self) -> Value {
        let mut doc = json!({ "Resources": self.resources });
        if !self.outputs.is_empty() {
            doc["Outputs"] = json!(self.outputs);
        }
        doc
    }

    /// Read resources and outputs back from a rendered template.
    pub fn from_template(doc: &Value) -> serde_json::Result<Self> {
        let resources = match doc.get("Resources") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => BTreeMap::new(),
        };
        let outputs = match doc.get("Outputs") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => BTreeMap::new(),
        };
        Ok(Self {
            resources,
            outputs,
            ..Self::default()
        })
    }
}
