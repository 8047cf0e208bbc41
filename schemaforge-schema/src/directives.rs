use std::collections::{BTreeMap, BTreeSet};

use crate::ast::Schema;

/// Canonical directive key: lowercase, without a leading `@`.
pub fn normalize_directive_name(name: &str) -> String {
    name.trim_start_matches('@').to_ascii_lowercase()
}

/// Directive usage per type name, plus the union across the whole schema.
///
/// Keys are normalized with [`normalize_directive_name`]. Every type definition
/// in the schema appears in `types`, even when it carries no directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveUsageMap {
    pub types: BTreeMap<String, BTreeSet<String>>,
    pub directives: BTreeSet<String>,
}

impl DirectiveUsageMap {
    /// Whether `directive` appears anywhere in the schema.
    pub fn uses(&self, directive: &str) -> bool {
        self.directives.contains(&normalize_directive_name(directive))
    }

    pub fn type_uses(&self, type_name: &str, directive: &str) -> bool {
        self.types
            .get(type_name)
            .is_some_and(|set| set.contains(&normalize_directive_name(directive)))
    }

    /// Type names that use `directive`, in name order.
    pub fn types_with(&self, directive: &str) -> Vec<&str> {
        let key = normalize_directive_name(directive);
        self.types
            .iter()
            .filter(|(_, set)| set.contains(&key))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Model types without any authorization rules.
    pub fn unauthenticated_models(&self) -> Vec<&str> {
        self.types_with("model")
            .into_iter()
            .filter(|name| !self.type_uses(name, "auth"))
            .collect()
    }

    /// Model types that also request search indexing.
    pub fn searchable_models(&self) -> Vec<&str> {
        self.types_with("searchable")
            .into_iter()
            .filter(|name| self.type_uses(name, "model"))
            .collect()
    }
}

/// Collect type-level and field-level directive names for every type.
///
/// Extensions merge into the entry of the type they extend.
pub fn collect_directives_by_type(schema: &Schema) -> DirectiveUsageMap {
    let mut map = DirectiveUsageMap::default();
    for t in schema.types() {
        let entry = map.types.entry(t.name.clone()).or_default();
        let field_directives = t
            .fields
            .iter()
            .flat_map(|f| f.directives.iter())
            .chain(t.input_fields.iter().flat_map(|f| f.directives.iter()));
        for d in t.directives.iter().chain(field_directives) {
            let key = normalize_directive_name(&d.name);
            map.directives.insert(key.clone());
            entry.insert(key);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_schema;

    #[test]
    fn normalizes_prefix_and_case() {
        assert_eq!(normalize_directive_name("@Model"), "model");
        assert_eq!(normalize_directive_name("auth"), "auth");
    }

    #[test]
    fn merges_extension_into_base_type() {
        let schema = parse_schema(
            "type Query { a: String }\nextend type Query { b: String @function(name: \"f\") }",
        )
        .unwrap();
        let map = collect_directives_by_type(&schema);
        assert_eq!(map.types.len(), 1);
        assert!(map.type_uses("Query", "@function"));
    }

    #[test]
    fn model_helpers() {
        let schema = parse_schema(
            "type A @model { id: ID }\ntype B @model @auth(rules: []) @searchable { id: ID }",
        )
        .unwrap();
        let map = collect_directives_by_type(&schema);
        assert_eq!(map.unauthenticated_models(), vec!["A"]);
        assert_eq!(map.searchable_models(), vec!["B"]);
        assert_eq!(map.types_with("model"), vec!["A", "B"]);
    }

    #[test]
    fn field_level_searchable_is_not_a_searchable_model() {
        let schema = parse_schema(
            "type Query { search: String @searchable }\ntype Post @model { id: ID! }",
        )
        .unwrap();
        let map = collect_directives_by_type(&schema);
        assert!(map.uses("searchable"));
        assert!(map.type_uses("Query", "searchable"));
        assert!(map.searchable_models().is_empty());
    }
}
