//! CLI argument parsing and end-to-end command tests.

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const BACKEND_CONFIG: &str =
    r#"{ "api": { "blog": { "service": "AppSync", "output": { "securityType": "API_KEY" } } } }"#;

fn schemaforge() -> Command {
    Command::cargo_bin("schemaforge").expect("schemaforge binary")
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn create_temp_project() -> TempDir {
    let td = tempfile::tempdir().expect("tempdir");
    let state = td.path().join(".schemaforge");
    write(
        &state.join("project-meta.json"),
        r#"{ "providers": { "awscloudformation": { "StackName": "blog-dev", "DeploymentBucketName": "deploy-bucket" } } }"#,
    );
    write(&state.join("backend/backend-config.json"), BACKEND_CONFIG);
    write(
        &state.join("backend/api/blog/schema.graphql"),
        "type Post @model {\n  id: ID!\n  title: String\n}\n",
    );
    td
}

fn build_dir(root: &Path) -> std::path::PathBuf {
    root.join(".schemaforge/backend/api/blog/build")
}

/// Deploy a two-table build so that compiling the one-table schema removes a table.
fn deploy_two_tables(root: &Path) {
    let cloud = root.join(".schemaforge/current-cloud-backend");
    write(&cloud.join("backend-config.json"), BACKEND_CONFIG);
    write(
        &cloud.join("api/blog/schema.graphql"),
        "type Post @model { id: ID! }\ntype Tag @model { id: ID! }\n",
    );
    write(&cloud.join("api/blog/transform.conf.json"), r#"{ "Version": 1 }"#);
    write(
        &cloud.join("api/blog/build/cloudformation-template.json"),
        r#"{ "Resources": {
            "PostTable": { "Type": "AWS::DynamoDB::Table", "Properties": {} },
            "TagTable": { "Type": "AWS::DynamoDB::Table", "Properties": {} } } }"#,
    );
}

#[test]
fn test_help_lists_commands() {
    schemaforge()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("compile")
                .and(predicate::str::contains("directives"))
                .and(predicate::str::contains("list-plugins")),
        );
}

#[test]
fn test_compile_without_api_is_noop() {
    let temp = tempfile::tempdir().unwrap();

    schemaforge()
        .current_dir(temp.path())
        .arg("compile")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to compile"));
}

#[test]
fn test_compile_writes_build_outputs() {
    let temp = create_temp_project();

    schemaforge()
        .current_dir(temp.path())
        .arg("compile")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Compiled API blog")
                .and(predicate::str::contains("Deployment key: appsync-files/")),
        );

    let build = build_dir(temp.path());
    assert!(build.join("cloudformation-template.json").is_file());
    assert!(build.join("schema.graphql").is_file());
    assert!(build.join("parameters.json").is_file());
}

#[test]
fn test_project_root_flag() {
    let temp = create_temp_project();
    let elsewhere = tempfile::tempdir().unwrap();

    schemaforge()
        .current_dir(elsewhere.path())
        .arg("compile")
        .arg("--project-root")
        .arg(temp.path())
        .assert()
        .success();

    assert!(build_dir(temp.path()).is_dir());
}

#[test]
fn test_minify_writes_compact_template() {
    let temp = create_temp_project();

    schemaforge()
        .current_dir(temp.path())
        .args(["compile", "--minify"])
        .assert()
        .success();

    let template =
        fs::read_to_string(build_dir(temp.path()).join("cloudformation-template.json")).unwrap();
    assert!(!template.contains('\n'));
}

#[test]
fn test_dry_run_writes_nothing() {
    let temp = create_temp_project();

    schemaforge()
        .current_dir(temp.path())
        .args(["compile", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"));

    assert!(!build_dir(temp.path()).exists());
    assert!(
        !temp
            .path()
            .join(".schemaforge/backend/api/blog/transform.conf.json")
            .exists()
    );
}

#[test]
fn test_no_gql_override_skips() {
    let temp = create_temp_project();

    schemaforge()
        .current_dir(temp.path())
        .args(["compile", "--no-gql-override"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-gql-override"));

    assert!(!build_dir(temp.path()).exists());
}

#[test]
fn test_unknown_api_name_is_noop() {
    let temp = create_temp_project();

    schemaforge()
        .current_dir(temp.path())
        .args(["compile", "--api", "shop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to compile"));
}

#[test]
fn test_destructive_change_exits_two() {
    let temp = create_temp_project();
    deploy_two_tables(temp.path());

    schemaforge()
        .current_dir(temp.path())
        .arg("compile")
        .assert()
        .code(2)
        .stderr(
            predicate::str::contains("cant_remove_table")
                .and(predicate::str::contains("--allow-destructive-graphql-schema-updates")),
        );
}

#[test]
fn test_force_alias_allows_destructive_change() {
    let temp = create_temp_project();
    deploy_two_tables(temp.path());

    schemaforge()
        .current_dir(temp.path())
        .args(["compile", "--force"])
        .assert()
        .success();

    schemaforge()
        .current_dir(temp.path())
        .args(["compile", "--force-compile", "--allow-destructive-graphql-schema-updates"])
        .assert()
        .success();
}

#[test]
fn test_config_file_can_allow_destructive_updates() {
    let temp = create_temp_project();
    deploy_two_tables(temp.path());
    write(
        &temp.path().join("schemaforge.toml"),
        "[compile]\nallow_destructive_graphql_schema_updates = true\n",
    );

    schemaforge()
        .current_dir(temp.path())
        .arg("compile")
        .assert()
        .success();
}

#[test]
fn test_invalid_transformer_version_exits_one() {
    let temp = create_temp_project();
    write(
        &temp.path().join("schemaforge.toml"),
        "[features.graphql_transformer]\ntransformer_version = 7\n",
    );

    schemaforge()
        .current_dir(temp.path())
        .arg("compile")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("transformerVersion: '7'"));
}

#[test]
fn test_invalid_config_file_fails() {
    let temp = create_temp_project();
    write(&temp.path().join("schemaforge.toml"), "[compile\nminify = ");

    schemaforge()
        .current_dir(temp.path())
        .arg("compile")
        .assert()
        .failure()
        .stderr(predicate::str::contains("schemaforge.toml"));
}

#[test]
fn test_legacy_project_migrates_with_flag() {
    let temp = create_temp_project();
    let template = r#"{ "Resources": {
        "PostTable": { "Type": "AWS::DynamoDB::Table", "Properties": {} },
        "QueryGetPostResolver": { "Type": "AWS::AppSync::Resolver", "Properties": {} } } }"#;
    let cloud = temp.path().join(".schemaforge/current-cloud-backend");
    write(&cloud.join("backend-config.json"), BACKEND_CONFIG);
    write(
        &cloud.join("api/blog/schema.graphql"),
        "type Post @model {\n  id: ID!\n  title: String\n}\n",
    );
    write(&cloud.join("api/blog/cloudformation-template.json"), template);
    write(
        &temp
            .path()
            .join(".schemaforge/backend/api/blog/cloudformation-template.json"),
        template,
    );

    schemaforge()
        .current_dir(temp.path())
        .args(["compile", "--migrate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Migrated API blog"));
}

#[test]
fn test_directives_prints_definitions() {
    let temp = create_temp_project();

    schemaforge()
        .current_dir(temp.path())
        .args(["directives", "--api", "blog"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("directive @model")
                .and(predicate::str::contains("directive @aws_subscribe"))
                .and(predicate::str::contains("directive @searchable")),
        );
}

#[test]
fn test_list_plugins_text() {
    let temp = create_temp_project();

    schemaforge()
        .current_dir(temp.path())
        .arg("list-plugins")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("ModelTransformer")
                .and(predicate::str::contains("AuthTransformer"))
                .and(predicate::str::contains("(none configured)")),
        );
}

#[test]
fn test_list_plugins_json() {
    let temp = create_temp_project();
    write(
        &temp
            .path()
            .join(".schemaforge/backend/api/blog/transform.conf.json"),
        r#"{ "transformers": ["queue"] }"#,
    );

    let output = schemaforge()
        .current_dir(temp.path())
        .args(["list-plugins", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["builtin"].as_array().unwrap().len(), 9);
    assert_eq!(parsed["builtin"][8]["stage"], "authorization");
    assert_eq!(parsed["custom"][0]["reference"], "queue");
}

#[test]
fn test_list_plugins_invalid_format() {
    schemaforge()
        .args(["list-plugins", "--format", "yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_explain_known_transformer() {
    schemaforge()
        .args(["explain", "searchable"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("SearchableTransformer")
                .and(predicate::str::contains("only when the schema uses its directive")),
        );
}

#[test]
fn test_explain_unknown_transformer() {
    schemaforge()
        .args(["explain", "nope"])
        .assert()
        .code(1)
        .stderr(
            predicate::str::contains("Unknown transformer key: 'nope'")
                .and(predicate::str::contains("model, versioned")),
        );
}

#[test]
fn test_declined_change_exits_two_with_remedy() {
    let temp = create_temp_project();
    let cloud = temp.path().join(".schemaforge/current-cloud-backend");
    write(&cloud.join("backend-config.json"), BACKEND_CONFIG);
    write(&cloud.join("api/blog/schema.graphql"), "type Post @model { id: ID! }\n");
    write(
        &temp.path().join(".schemaforge/backend/api/blog/schema.graphql"),
        "type Post @model @auth(rules: [{ allow: public }]) { id: ID! }\n",
    );

    schemaforge()
        .current_dir(temp.path())
        .arg("compile")
        .write_stdin("n\n")
        .assert()
        .code(2)
        .stderr(
            predicate::str::contains("Do you wish to continue?")
                .and(predicate::str::contains("--yes")),
        );
}
