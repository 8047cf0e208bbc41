//! Deployment key derivation.
//!
//! A project keeps staging its artifacts under the key recorded by its last
//! deployed build. Only when that record is missing or unreadable is a new
//! key minted from the resource directory contents.

use crate::ports::DirectoryHasher;
use camino::Utf8Path;
use schemaforge_types::files::{BUILD_DIR_NAME, PARAMETERS_FILE_NAME};
use schemaforge_types::{BuildParameters, DeploymentKey};
use tracing::debug;

/// Key recorded in `<previous>/build/parameters.json`, if any.
///
/// Any failure to read or parse the file counts as "no previous key".
pub fn previous_deployment_key(previous_dir: &Utf8Path) -> Option<DeploymentKey> {
    let path = previous_dir.join(BUILD_DIR_NAME).join(PARAMETERS_FILE_NAME);
    let text = fs_err::read_to_string(&path).ok()?;
    match serde_json::from_str::<BuildParameters>(&text) {
        Ok(params) => params.deployment_root_key().map(DeploymentKey::reused),
        Err(err) => {
            debug!(path = %path, error = %err, "ignoring unreadable previous parameters");
            None
        }
    }
}

/// The deployment key for a build of `resource_dir`.
pub fn deployment_key(
    resource_dir: &Utf8Path,
    previous_dir: Option<&Utf8Path>,
    hasher: &dyn DirectoryHasher,
) -> anyhow::Result<DeploymentKey> {
    if let Some(key) = previous_dir.and_then(previous_deployment_key) {
        debug!(key = %key, "reusing deployment key");
        return Ok(key);
    }
    let digest = hasher.hash_directory(resource_dir)?;
    let key = DeploymentKey::minted(&digest);
    debug!(key = %key, "minted deployment key");
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Sha256DirectoryHasher;
    use camino::Utf8PathBuf;
    use fs_err as fs;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        (temp, root)
    }

    #[test]
    fn reuses_recorded_key_verbatim() {
        let (_temp, root) = temp_root();
        let previous = root.join("previous");
        fs::create_dir_all(previous.join("build")).unwrap();
        fs::write(
            previous.join("build/parameters.json"),
            r#"{ "deploymentRootKey": "X", "deploymentBucket": "b" }"#,
        )
        .unwrap();

        let key = deployment_key(&root, Some(&previous), &Sha256DirectoryHasher).unwrap();
        assert_eq!(key.as_str(), "X");
    }

    #[test]
    fn corrupt_previous_parameters_fall_back_to_minting() {
        let (_temp, root) = temp_root();
        let resource = root.join("resource");
        let previous = root.join("previous");
        fs::create_dir_all(&resource).unwrap();
        fs::write(resource.join("schema.graphql"), "type A { id: ID }").unwrap();
        fs::create_dir_all(previous.join("build")).unwrap();
        fs::write(previous.join("build/parameters.json"), "not json").unwrap();

        let key = deployment_key(&resource, Some(&previous), &Sha256DirectoryHasher).unwrap();
        assert!(key.as_str().starts_with("appsync-files/"));
    }

    #[test]
    fn minted_key_is_stable_until_content_changes() {
        let (_temp, root) = temp_root();
        fs::write(root.join("schema.graphql"), "type A { id: ID }").unwrap();

        let a = deployment_key(&root, None, &Sha256DirectoryHasher).unwrap();
        let b = deployment_key(&root, None, &Sha256DirectoryHasher).unwrap();
        assert_eq!(a, b);
        let digest = a.as_str().strip_prefix("appsync-files/").unwrap();
        assert_eq!(digest.len(), 64);

        fs::write(root.join("schema.graphql"), "type B { id: ID }").unwrap();
        let c = deployment_key(&root, None, &Sha256DirectoryHasher).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn build_output_does_not_change_minted_key() {
        let (_temp, root) = temp_root();
        fs::write(root.join("schema.graphql"), "type A { id: ID }").unwrap();
        let before = deployment_key(&root, None, &Sha256DirectoryHasher).unwrap();

        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join("build/cloudformation-template.json"), "{}").unwrap();
        let after = deployment_key(&root, None, &Sha256DirectoryHasher).unwrap();
        assert_eq!(before, after);
    }

    proptest! {
        #[test]
        fn any_recorded_key_is_reused(key in "[A-Za-z0-9/_-]{1,40}") {
            let (_temp, root) = temp_root();
            let previous = root.join("previous");
            fs::create_dir_all(previous.join("build")).unwrap();
            let params = serde_json::json!({ "deploymentRootKey": key, "deploymentBucket": "b" });
            fs::write(previous.join("build/parameters.json"), params.to_string()).unwrap();

            let reused = deployment_key(&root, Some(&previous), &Sha256DirectoryHasher).unwrap();
            prop_assert_eq!(reused.as_str(), key.as_str());
        }
    }
}
