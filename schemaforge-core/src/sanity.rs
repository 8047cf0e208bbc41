//! Pre-apply checks that refuse destructive changes.
//!
//! Diff rules compare the previous build with the new one; project rules
//! only look at the new build.

use anyhow::Context;
use camino::Utf8Path;
use schemaforge_schema::{Schema, TypeKind, parse_schema};
use schemaforge_types::files::{BUILD_DIR_NAME, CLOUDFORMATION_FILE_NAME, SCHEMA_FILE_NAME};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

const TABLE_KIND: &str = "AWS::DynamoDB::Table";
const MAX_RESOURCES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Blocks the compile.
    Error,
    /// Reported, never blocks.
    Warning,
}

/// One rule finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanityViolation {
    pub rule: &'static str,
    pub message: String,
}

/// Template and output schema of one build.
#[derive(Debug, Clone, Default)]
pub struct BuildArtifacts {
    pub template: Value,
    pub schema: Option<Schema>,
}

impl BuildArtifacts {
    pub fn new(template: Value, schema: Option<Schema>) -> Self {
        Self { template, schema }
    }

    /// Artifacts under `<dir>/build/`, or `None` when nothing was built there.
    ///
    /// An output schema that no longer parses is treated as absent.
    pub fn read(dir: &Utf8Path) -> anyhow::Result<Option<Self>> {
        let build = dir.join(BUILD_DIR_NAME);
        let template_path = build.join(CLOUDFORMATION_FILE_NAME);
        if !template_path.is_file() {
            return Ok(None);
        }
        let text = fs_err::read_to_string(&template_path)
            .with_context(|| format!("read {}", template_path))?;
        let template: Value =
            serde_json::from_str(&text).with_context(|| format!("parse {}", template_path))?;

        let schema_path = build.join(SCHEMA_FILE_NAME);
        let schema = match fs_err::read_to_string(&schema_path) {
            Ok(sdl) => match parse_schema(&sdl) {
                Ok(schema) => Some(schema),
                Err(err) => {
                    debug!(path = %schema_path, error = %err, "ignoring unparsable previous schema");
                    None
                }
            },
            Err(_) => None,
        };
        Ok(Some(Self { template, schema }))
    }

    fn resources(&self) -> Option<&serde_json::Map<String, Value>> {
        self.template.get("Resources").and_then(Value::as_object)
    }

    fn tables(&self) -> BTreeMap<&str, &Value> {
        self.resources()
            .into_iter()
            .flat_map(|r| r.iter())
            .filter(|(_, res)| res.get("Type").and_then(Value::as_str) == Some(TABLE_KIND))
            .map(|(id, res)| (id.as_str(), res.get("Properties").unwrap_or(&Value::Null)))
            .collect()
    }

    /// Field names per object type, extensions merged into their base type.
    fn object_fields(&self) -> BTreeMap<&str, BTreeSet<&str>> {
        let mut out: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for t in self.schema.iter().flat_map(|s| s.types()) {
            if t.kind == TypeKind::Object {
                out.entry(t.name.as_str())
                    .or_default()
                    .extend(t.fields.iter().map(|f| f.name.as_str()));
            }
        }
        out
    }
}

fn index_names(props: &Value) -> BTreeSet<&str> {
    props
        .get("GlobalSecondaryIndexes")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|g| g.get("IndexName").and_then(Value::as_str))
        .collect()
}

type DiffCheck = fn(&BuildArtifacts, &BuildArtifacts) -> Vec<String>;
type ProjectCheck = fn(&BuildArtifacts) -> Vec<String>;

#[derive(Clone, Copy)]
enum Check {
    Diff(DiffCheck),
    Project(ProjectCheck),
}

/// A named predicate over a proposed change.
#[derive(Clone, Copy)]
pub struct SanityCheckRule {
    pub name: &'static str,
    pub severity: Severity,
    check: Check,
}

impl std::fmt::Debug for SanityCheckRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SanityCheckRule")
            .field("name", &self.name)
            .field("severity", &self.severity)
            .finish()
    }
}

impl SanityCheckRule {
    pub const fn diff(name: &'static str, severity: Severity, check: DiffCheck) -> Self {
        Self {
            name,
            severity,
            check: Check::Diff(check),
        }
    }

    pub const fn project(name: &'static str, severity: Severity, check: ProjectCheck) -> Self {
        Self {
            name,
            severity,
            check: Check::Project(check),
        }
    }

    fn evaluate(&self, previous: Option<&BuildArtifacts>, current: &BuildArtifacts) -> Vec<String> {
        match (self.check, previous) {
            (Check::Diff(check), Some(previous)) => check(previous, current),
            (Check::Diff(_), None) => Vec::new(),
            (Check::Project(check), _) => check(current),
        }
    }
}

pub const CANT_EDIT_KEY_SCHEMA: SanityCheckRule =
    SanityCheckRule::diff("cant_edit_key_schema", Severity::Error, cant_edit_key_schema);
pub const CANT_REMOVE_TABLE: SanityCheckRule =
    SanityCheckRule::diff("cant_remove_table", Severity::Error, cant_remove_table);
pub const CANT_REMOVE_FIELD: SanityCheckRule =
    SanityCheckRule::diff("cant_remove_field", Severity::Error, cant_remove_field);
pub const CANT_ADD_AND_REMOVE_INDEX_AT_SAME_TIME: SanityCheckRule = SanityCheckRule::diff(
    "cant_add_and_remove_index_at_same_time",
    Severity::Error,
    cant_add_and_remove_index_at_same_time,
);
pub const CANT_HAVE_MORE_THAN_500_RESOURCES: SanityCheckRule = SanityCheckRule::project(
    "cant_have_more_than_500_resources",
    Severity::Error,
    cant_have_more_than_500_resources,
);

fn cant_edit_key_schema(previous: &BuildArtifacts, current: &BuildArtifacts) -> Vec<String> {
    let before = previous.tables();
    current
        .tables()
        .into_iter()
        .filter_map(|(id, props)| {
            let old = before.get(id)?;
            (old.get("KeySchema") != props.get("KeySchema")).then(|| {
                format!("the key schema of table {} cannot be changed after creation", id)
            })
        })
        .collect()
}

fn cant_remove_table(previous: &BuildArtifacts, current: &BuildArtifacts) -> Vec<String> {
    let after = current.tables();
    previous
        .tables()
        .into_keys()
        .filter(|id| !after.contains_key(id))
        .map(|id| format!("table {} would be removed, deleting its data", id))
        .collect()
}

fn cant_remove_field(previous: &BuildArtifacts, current: &BuildArtifacts) -> Vec<String> {
    let after = current.object_fields();
    let mut out = Vec::new();
    for (type_name, fields) in previous.object_fields() {
        let Some(now) = after.get(type_name) else {
            continue;
        };
        for field in fields.difference(now) {
            out.push(format!("field {}.{} would be removed", type_name, field));
        }
    }
    out
}

fn cant_add_and_remove_index_at_same_time(
    previous: &BuildArtifacts,
    current: &BuildArtifacts,
) -> Vec<String> {
    let before = previous.tables();
    current
        .tables()
        .into_iter()
        .filter_map(|(id, props)| {
            let old = index_names(before.get(id)?);
            let new = index_names(props);
            let added = new.difference(&old).count();
            let removed = old.difference(&new).count();
            (added > 0 && removed > 0).then(|| {
                format!(
                    "table {} adds and removes global secondary indexes in one update; split it into two deployments",
                    id
                )
            })
        })
        .collect()
}

fn cant_have_more_than_500_resources(current: &BuildArtifacts) -> Vec<String> {
    let count = current.resources().map(|r| r.len()).unwrap_or(0);
    if count > MAX_RESOURCES {
        vec![format!(
            "the compiled template has {} resources; at most {} are allowed",
            count, MAX_RESOURCES
        )]
    } else {
        Vec::new()
    }
}

/// Rules active for one compile.
#[derive(Debug, Clone, Default)]
pub struct SanityRules {
    pub diff: Vec<SanityCheckRule>,
    pub project: Vec<SanityCheckRule>,
}

impl SanityRules {
    pub fn is_empty(&self) -> bool {
        self.diff.is_empty() && self.project.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.diff
            .iter()
            .chain(self.project.iter())
            .map(|r| r.name)
            .collect()
    }

    /// Run every rule. Error-severity findings come back as `Err`; warnings
    /// are logged and returned in `Ok`.
    pub fn check(
        &self,
        previous: Option<&BuildArtifacts>,
        current: &BuildArtifacts,
    ) -> Result<Vec<SanityViolation>, Vec<SanityViolation>> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for rule in self.diff.iter().chain(self.project.iter()) {
            for message in rule.evaluate(previous, current) {
                let violation = SanityViolation {
                    rule: rule.name,
                    message,
                };
                match rule.severity {
                    Severity::Error => errors.push(violation),
                    Severity::Warning => {
                        warn!(rule = rule.name, "{}", violation.message);
                        warnings.push(violation);
                    }
                }
            }
        }
        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(errors)
        }
    }
}

/// Rules for a compile.
///
/// A new API has nothing to destroy, so no rule applies. For an existing API
/// the project rules always apply and the diff rules apply unless destructive
/// updates were explicitly allowed.
pub fn select_rules(
    is_new_api: bool,
    iterative_gsi_updates: bool,
    allow_destructive_updates: bool,
) -> SanityRules {
    let mut rules = SanityRules::default();
    if is_new_api {
        return rules;
    }
    rules.project.push(CANT_HAVE_MORE_THAN_500_RESOURCES);
    if !allow_destructive_updates {
        rules.diff.extend([CANT_EDIT_KEY_SCHEMA, CANT_REMOVE_TABLE, CANT_REMOVE_FIELD]);
        if !iterative_gsi_updates {
            rules.diff.push(CANT_ADD_AND_REMOVE_INDEX_AT_SAME_TIME);
        }
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn table(key: &str, indexes: &[&str]) -> Value {
        json!({
            "Type": TABLE_KIND,
            "Properties": {
                "KeySchema": [{ "AttributeName": key, "KeyType": "HASH" }],
                "GlobalSecondaryIndexes": indexes
                    .iter()
                    .map(|i| json!({ "IndexName": i }))
                    .collect::<Vec<_>>(),
            }
        })
    }

    fn artifacts(resources: Value, sdl: Option<&str>) -> BuildArtifacts {
        BuildArtifacts::new(
            json!({ "Resources": resources }),
            sdl.map(|s| parse_schema(s).unwrap()),
        )
    }

    #[test]
    fn new_api_has_no_rules() {
        assert!(select_rules(true, false, false).is_empty());
    }

    #[test]
    fn allow_destructive_keeps_only_project_rules() {
        let rules = select_rules(false, true, true);
        assert_eq!(rules.names(), vec!["cant_have_more_than_500_resources"]);
    }

    #[test]
    fn index_rule_only_without_iterative_updates() {
        assert!(
            !select_rules(false, true, false)
                .names()
                .contains(&"cant_add_and_remove_index_at_same_time")
        );
        assert!(
            select_rules(false, false, false)
                .names()
                .contains(&"cant_add_and_remove_index_at_same_time")
        );
    }

    #[test]
    fn removed_table_and_edited_key_are_blocked() {
        let before = artifacts(
            json!({ "PostTable": table("id", &[]), "TagTable": table("id", &[]) }),
            None,
        );
        let after = artifacts(json!({ "PostTable": table("slug", &[]) }), None);

        let errors = select_rules(false, true, false)
            .check(Some(&before), &after)
            .unwrap_err();
        let rules: Vec<_> = errors.iter().map(|v| v.rule).collect();
        assert_eq!(rules, vec!["cant_edit_key_schema", "cant_remove_table"]);
    }

    #[test]
    fn removed_field_is_blocked_but_added_field_is_not() {
        let before = artifacts(json!({}), Some("type Post { id: ID title: String }"));
        let grown = artifacts(json!({}), Some("type Post { id: ID title: String body: String }"));
        let shrunk = artifacts(json!({}), Some("type Post { id: ID }\nextend type Post { body: String }"));

        let rules = select_rules(false, true, false);
        assert!(rules.check(Some(&before), &grown).is_ok());
        let errors = rules.check(Some(&before), &shrunk).unwrap_err();
        assert_eq!(errors[0].message, "field Post.title would be removed");
    }

    #[test]
    fn swapping_indexes_needs_two_deployments() {
        let before = artifacts(json!({ "PostTable": table("id", &["byAuthor"]) }), None);
        let after = artifacts(json!({ "PostTable": table("id", &["byTag"]) }), None);
        let errors = select_rules(false, false, false)
            .check(Some(&before), &after)
            .unwrap_err();
        assert_eq!(errors[0].rule, "cant_add_and_remove_index_at_same_time");

        assert!(
            select_rules(false, true, false)
                .check(Some(&before), &after)
                .is_ok()
        );
    }

    #[test]
    fn diff_rules_skip_without_previous_build() {
        let after = artifacts(json!({ "PostTable": table("id", &[]) }), None);
        assert!(select_rules(false, false, false).check(None, &after).is_ok());
    }

    #[test]
    fn resource_cap_applies_even_when_destructive_allowed() {
        let mut resources = serde_json::Map::new();
        for i in 0..501 {
            resources.insert(format!("R{i}"), json!({ "Type": "AWS::SNS::Topic" }));
        }
        let after = BuildArtifacts::new(json!({ "Resources": resources }), None);
        let errors = select_rules(false, true, true).check(None, &after).unwrap_err();
        assert_eq!(errors[0].rule, "cant_have_more_than_500_resources");
    }

    #[test]
    fn warning_rules_never_block() {
        let rules = SanityRules {
            diff: vec![],
            project: vec![SanityCheckRule::project("always", Severity::Warning, |_| {
                vec!["heads up".into()]
            })],
        };
        let warnings = rules.check(None, &BuildArtifacts::default()).unwrap();
        assert_eq!(warnings.len(), 1);
    }
}
