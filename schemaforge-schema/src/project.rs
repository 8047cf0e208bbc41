use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use schemaforge_types::files::{SCHEMA_DIR_NAME, SCHEMA_FILE_NAME};
use tracing::debug;

/// Schema source files of an API resource directory.
///
/// A single `schema.graphql` wins; otherwise every `.graphql` file under
/// `schema/` is used, sorted by path.
pub fn schema_sources(resource_dir: &Utf8Path) -> anyhow::Result<Vec<Utf8PathBuf>> {
    let single = resource_dir.join(SCHEMA_FILE_NAME);
    if single.is_file() {
        return Ok(vec![single]);
    }

    let dir = resource_dir.join(SCHEMA_DIR_NAME);
    if !dir.is_dir() {
        bail!(
            "no schema found in {}: add {} or a {}/ directory of .graphql files",
            resource_dir,
            SCHEMA_FILE_NAME,
            SCHEMA_DIR_NAME
        );
    }

    let pattern = format!("{}/**/*.graphql", glob::Pattern::escape(dir.as_str()));
    let mut out = Vec::new();
    for entry in glob::glob(&pattern).with_context(|| format!("bad glob pattern {}", pattern))? {
        let path = entry.context("reading schema directory")?;
        let path = Utf8PathBuf::from_path_buf(path)
            .map_err(|p| anyhow::anyhow!("non-utf8 schema path {}", p.display()))?;
        if path.is_file() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// Concatenated SDL text of all schema sources.
pub fn read_project_schema(resource_dir: &Utf8Path) -> anyhow::Result<String> {
    let sources = schema_sources(resource_dir)?;
    let mut text = String::new();
    for path in &sources {
        let content =
            fs_err::read_to_string(path).with_context(|| format!("read schema {}", path))?;
        text.push_str(&content);
        text.push('\n');
    }
    debug!(files = sources.len(), dir = %resource_dir, "read project schema");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn single_file_wins_over_directory() {
        let tmp = TempDir::new().unwrap();
        let root = utf8(&tmp);
        fs_err::write(root.join("schema.graphql"), "type A { id: ID }").unwrap();
        fs_err::create_dir_all(root.join("schema")).unwrap();
        fs_err::write(root.join("schema/b.graphql"), "type B { id: ID }").unwrap();

        let text = read_project_schema(&root).unwrap();
        assert!(text.contains("type A"));
        assert!(!text.contains("type B"));
    }

    #[test]
    fn directory_sources_are_sorted() {
        let tmp = TempDir::new().unwrap();
        let root = utf8(&tmp);
        fs_err::create_dir_all(root.join("schema/nested")).unwrap();
        fs_err::write(root.join("schema/z.graphql"), "type Z { id: ID }").unwrap();
        fs_err::write(root.join("schema/nested/a.graphql"), "type A { id: ID }").unwrap();
        fs_err::write(root.join("schema/notes.txt"), "ignored").unwrap();

        let sources = schema_sources(&root).unwrap();
        let names: Vec<_> = sources.iter().map(|p| p.file_name().unwrap()).collect();
        assert_eq!(names, vec!["a.graphql", "z.graphql"]);
    }

    #[test]
    fn missing_schema_names_the_expected_files() {
        let tmp = TempDir::new().unwrap();
        let err = read_project_schema(&utf8(&tmp)).unwrap_err();
        assert!(err.to_string().contains("schema.graphql"));
    }

    #[test]
    fn glob_characters_in_the_resource_path_are_literal() {
        let tmp = TempDir::new().unwrap();
        let root = utf8(&tmp).join("my[app]");
        fs_err::create_dir_all(root.join("schema")).unwrap();
        fs_err::write(root.join("schema/post.graphql"), "type Post { id: ID }").unwrap();

        let text = read_project_schema(&root).unwrap();
        assert!(text.contains("type Post"));
    }
}
