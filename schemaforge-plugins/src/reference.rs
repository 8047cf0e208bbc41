use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

/// Directory under the project root where project-local plugins are installed.
pub const LOCAL_PLUGIN_DIR: &str = ".schemaforge/plugins";

/// Prefix that marks a reference to a module registered in-process.
pub const BUILTIN_PREFIX: &str = "builtin:";

/// A configured plugin reference, as written in `transformers`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PluginReference {
    /// `builtin:<name>`: a module registered with the embedded loader.
    BuiltIn(String),
    /// An absolute location; loaded directly with no fallback.
    Path(Utf8PathBuf),
    /// A package name resolved against the local then the global root.
    Package(String),
}

impl PluginReference {
    /// Parse a raw `transformers` entry. A leading `file://` is stripped.
    ///
    /// Returns `None` for an entry that names nothing.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let value = trimmed.strip_prefix("file://").unwrap_or(trimmed).trim();
        if value.is_empty() {
            return None;
        }
        if let Some(name) = value.strip_prefix(BUILTIN_PREFIX) {
            let name = name.trim();
            return (!name.is_empty()).then(|| PluginReference::BuiltIn(name.to_string()));
        }
        let path = Utf8Path::new(value);
        if path.is_absolute() {
            Some(PluginReference::Path(path.to_path_buf()))
        } else {
            Some(PluginReference::Package(value.to_string()))
        }
    }

    /// Ordered loader strategies to try for this reference.
    pub fn strategies(&self, roots: &PluginRoots) -> Vec<LoaderStrategy> {
        match self {
            PluginReference::BuiltIn(name) => vec![LoaderStrategy::Embedded(name.clone())],
            PluginReference::Path(path) => vec![LoaderStrategy::ByPath(path.clone())],
            PluginReference::Package(name) => {
                let mut out = vec![LoaderStrategy::ByLocalPackage(roots.local.join(name))];
                if let Some(global) = &roots.global {
                    out.push(LoaderStrategy::ByGlobalPackage(global.join(name)));
                }
                out
            }
        }
    }
}

impl fmt::Display for PluginReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginReference::BuiltIn(name) => write!(f, "{}{}", BUILTIN_PREFIX, name),
            PluginReference::Path(path) => write!(f, "{}", path),
            PluginReference::Package(name) => f.write_str(name),
        }
    }
}

/// Where package-style references are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRoots {
    pub local: Utf8PathBuf,
    pub global: Option<Utf8PathBuf>,
}

impl PluginRoots {
    pub fn for_project(project_root: &Utf8Path, global: Option<Utf8PathBuf>) -> Self {
        Self {
            local: project_root.join(LOCAL_PLUGIN_DIR),
            global,
        }
    }
}

/// The closed set of ways a module can be located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderStrategy {
    Embedded(String),
    ByPath(Utf8PathBuf),
    ByLocalPackage(Utf8PathBuf),
    ByGlobalPackage(Utf8PathBuf),
}

impl LoaderStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            LoaderStrategy::Embedded(_) => "embedded",
            LoaderStrategy::ByPath(_) => "path",
            LoaderStrategy::ByLocalPackage(_) => "local package",
            LoaderStrategy::ByGlobalPackage(_) => "global package",
        }
    }
}
