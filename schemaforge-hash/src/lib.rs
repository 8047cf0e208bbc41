//! Small hashing primitives: sha256 hex digests of byte slices and of whole
//! directory trees.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use glob::{Pattern, glob};
use sha2::{Digest, Sha256};
use tracing::debug;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Digest of every regular file under `dir`.
///
/// Files are visited in sorted relative-path order and both the relative path
/// and the file contents feed the digest, so renames count as changes.
/// `exclude` lists top-level entries (directory or file names) to skip.
pub fn hash_directory(dir: &Utf8Path, exclude: &[&str]) -> anyhow::Result<String> {
    let files = list_files(dir, exclude)?;

    let mut hasher = Sha256::new();
    for rel in &files {
        let abs = dir.join(rel);
        let bytes = fs::read(&abs).with_context(|| format!("read {}", abs))?;
        hasher.update(rel.as_str().replace('\\', "/").as_bytes());
        hasher.update([0u8]);
        hasher.update(sha256_hex(&bytes).as_bytes());
        hasher.update([0u8]);
    }

    let digest = hex::encode(hasher.finalize());
    debug!(dir = %dir, files = files.len(), %digest, "hashed directory");
    Ok(digest)
}

/// Relative paths of regular files under `dir`, sorted.
pub fn list_files(dir: &Utf8Path, exclude: &[&str]) -> anyhow::Result<Vec<Utf8PathBuf>> {
    let pattern = format!("{}/**/*", Pattern::escape(dir.as_str()));
    let mut out = Vec::new();

    for entry in glob(&pattern).with_context(|| format!("glob {}", pattern))? {
        let path = entry.map_err(|e| anyhow::anyhow!("glob error: {e}"))?;
        if !path.is_file() {
            continue;
        }
        let path = Utf8PathBuf::from_path_buf(path)
            .map_err(|p| anyhow::anyhow!("non utf-8 path: {}", p.display()))?;
        let Ok(rel) = path.strip_prefix(dir) else {
            continue;
        };
        let top = rel.components().next().map(|c| c.as_str()).unwrap_or("");
        if exclude.contains(&top) {
            continue;
        }
        out.push(rel.to_path_buf());
    }

    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        (temp, root)
    }

    #[test]
    fn sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn directory_hash_is_stable() {
        let (_temp, root) = temp_root();
        fs::write(root.join("schema.graphql"), "type Post @model { id: ID! }").unwrap();
        fs::create_dir_all(root.join("resolvers")).unwrap();
        fs::write(root.join("resolvers/Query.getPost.req.vtl"), "{}").unwrap();

        let a = hash_directory(&root, &[]).unwrap();
        let b = hash_directory(&root, &[]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn directory_hash_changes_with_content() {
        let (_temp, root) = temp_root();
        fs::write(root.join("schema.graphql"), "type A @model { id: ID! }").unwrap();
        let before = hash_directory(&root, &[]).unwrap();

        fs::write(root.join("schema.graphql"), "type B @model { id: ID! }").unwrap();
        let after = hash_directory(&root, &[]).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn directory_hash_sees_renames() {
        let (_temp, root) = temp_root();
        fs::write(root.join("a.graphql"), "x").unwrap();
        let before = hash_directory(&root, &[]).unwrap();

        fs::rename(root.join("a.graphql"), root.join("b.graphql")).unwrap();
        let after = hash_directory(&root, &[]).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn excluded_top_level_entries_do_not_count() {
        let (_temp, root) = temp_root();
        fs::write(root.join("schema.graphql"), "x").unwrap();
        let before = hash_directory(&root, &["build"]).unwrap();

        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join("build/parameters.json"), "{}").unwrap();
        let after = hash_directory(&root, &["build"]).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn glob_characters_in_the_directory_are_literal() {
        let (_temp, root) = temp_root();
        let dir = root.join("my[app]*");
        fs::create_dir_all(dir.join("resolvers")).unwrap();
        fs::write(dir.join("schema.graphql"), "type A @model { id: ID! }").unwrap();
        fs::write(dir.join("resolvers/Query.getA.req.vtl"), "{}").unwrap();

        let files = list_files(&dir, &[]).unwrap();
        assert_eq!(
            files,
            vec![
                Utf8PathBuf::from("resolvers/Query.getA.req.vtl"),
                Utf8PathBuf::from("schema.graphql"),
            ]
        );

        let before = hash_directory(&dir, &[]).unwrap();
        fs::write(dir.join("schema.graphql"), "type B @model { id: ID! }").unwrap();
        assert_ne!(before, hash_directory(&dir, &[]).unwrap());
    }
}
