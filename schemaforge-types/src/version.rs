use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Compiler generation a project is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum CompilerVersion {
    V1,
    V2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid value specified for transformerVersion: '{0}'")]
pub struct UnsupportedVersion(pub i64);

impl CompilerVersion {
    pub fn as_number(self) -> i64 {
        match self {
            CompilerVersion::V1 => 1,
            CompilerVersion::V2 => 2,
        }
    }
}

impl TryFrom<i64> for CompilerVersion {
    type Error = UnsupportedVersion;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CompilerVersion::V1),
            2 => Ok(CompilerVersion::V2),
            other => Err(UnsupportedVersion(other)),
        }
    }
}

impl From<CompilerVersion> for i64 {
    fn from(v: CompilerVersion) -> Self {
        v.as_number()
    }
}

impl fmt::Display for CompilerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_number())
    }
}

/// Remote location where a project's build artifacts are staged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentKey(String);

impl DeploymentKey {
    pub const ROOT_PREFIX: &'static str = "appsync-files";

    /// A key carried over verbatim from a previous build.
    pub fn reused(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// A fresh key derived from the resource directory digest.
    pub fn minted(digest: &str) -> Self {
        Self(format!("{}/{}", Self::ROOT_PREFIX, digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_and_two_are_versions() {
        assert_eq!(CompilerVersion::try_from(1), Ok(CompilerVersion::V1));
        assert_eq!(CompilerVersion::try_from(2), Ok(CompilerVersion::V2));
        let err = CompilerVersion::try_from(3).unwrap_err();
        assert!(err.to_string().contains("'3'"));
        assert!(CompilerVersion::try_from(0).is_err());
    }

    #[test]
    fn minted_key_has_prefix() {
        let key = DeploymentKey::minted("abc123");
        assert_eq!(key.as_str(), "appsync-files/abc123");
    }
}
