use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use schemaforge_schema::{collect_directives_by_type, parse_schema};

const BLOG: &str = r#"
type Post @model @auth(rules: [{ allow: owner }]) {
  id: ID!
  title: String!
}

type Comment @MODEL {
  id: ID!
  content: String @searchable
}

type Plain {
  id: ID!
}
"#;

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn every_type_appears_including_those_without_directives() {
    let schema = parse_schema(BLOG).unwrap();
    let map = collect_directives_by_type(&schema);

    assert_eq!(map.types["Post"], set(&["auth", "model"]));
    assert_eq!(map.types["Comment"], set(&["model", "searchable"]));
    assert_eq!(map.types["Plain"], BTreeSet::new());
}

#[test]
fn global_set_is_union_of_type_sets() {
    let schema = parse_schema(BLOG).unwrap();
    let map = collect_directives_by_type(&schema);

    let union: BTreeSet<String> = map.types.values().flatten().cloned().collect();
    assert_eq!(map.directives, union);
    assert!(map.uses("@Auth"));
    assert!(!map.uses("connection"));
}

#[test]
fn malformed_schema_is_a_parse_error() {
    let err = parse_schema("type Post @model { id ID! }").unwrap_err();
    assert_eq!(err.line, 1);
    assert!(err.to_string().starts_with("schema parse error at 1:"));
}

proptest! {
    #[test]
    fn directive_order_does_not_change_usage(perm in Just(vec!["model", "auth", "key", "searchable"]).prop_shuffle()) {
        let directives: String = perm.iter().map(|d| format!(" @{}", d)).collect();
        let schema = parse_schema(&format!("type T{} {{ id: ID }}", directives)).unwrap();
        let map = collect_directives_by_type(&schema);
        prop_assert_eq!(&map.types["T"], &set(&["auth", "key", "model", "searchable"]));
    }
}
