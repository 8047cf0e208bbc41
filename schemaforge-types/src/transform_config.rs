use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Per-project transformer configuration (`transform.conf.json`).
///
/// Fields only ever move forward: a recorded version is never lowered and a
/// one-shot warning flag is never cleared. Keys this crate does not know about
/// are kept in `extra` so a read/write cycle does not drop them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformerConfig {
    #[serde(rename = "Version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,

    #[serde(
        rename = "ElasticsearchWarning",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub elasticsearch_warning: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformers: Vec<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transformer config version cannot move from {current} back to {requested}")]
pub struct VersionRegression {
    pub current: u32,
    pub requested: u32,
}

impl TransformerConfig {
    /// The version every project starts from when none was ever recorded.
    pub const BASE_VERSION: u32 = 1;

    /// Record `version` when it is absent or greater than the stored one.
    ///
    /// Returns whether the record changed.
    pub fn advance_version(&mut self, version: u32) -> Result<bool, VersionRegression> {
        match self.version {
            None => {
                self.version = Some(version);
                Ok(true)
            }
            Some(current) if version > current => {
                self.version = Some(version);
                Ok(true)
            }
            Some(current) if version == current => Ok(false),
            Some(current) => Err(VersionRegression {
                current,
                requested: version,
            }),
        }
    }

    /// Record the base version if no version was ever recorded.
    pub fn record_base_version(&mut self) -> bool {
        if self.version.is_some() {
            return false;
        }
        self.version = Some(Self::BASE_VERSION);
        true
    }

    /// Mark the searchable warning as shown. Returns whether the flag flipped.
    pub fn record_elasticsearch_warning(&mut self) -> bool {
        if self.elasticsearch_warning {
            return false;
        }
        self.elasticsearch_warning = true;
        true
    }

    pub fn has_version(&self) -> bool {
        self.version.is_some()
    }
}
