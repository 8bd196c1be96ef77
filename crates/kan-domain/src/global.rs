use std::collections::BTreeMap;

use kan_core::schema::{format_tag, GLOBAL_SCHEMA_VERSION};
use kan_core::SchemaKind;
use serde::{Deserialize, Serialize};

/// Per-repository overrides keyed by absolute project path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_board: Option<String>,
}

/// Machine-level config: editor preference plus the registry of known
/// projects and repo overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub kan_schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
    /// Display name -> absolute project path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub projects: BTreeMap<String, String>,
    /// Absolute project path -> overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub repos: BTreeMap<String, RepoConfig>,
}

impl GlobalConfig {
    pub fn data_location_for(&self, path: &str) -> Option<&str> {
        self.repos
            .get(path)
            .and_then(|r| r.data_location.as_deref())
    }

    pub fn register_project(&mut self, name: String, path: String) {
        self.projects.insert(name, path);
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            kan_schema: format_tag(SchemaKind::Global, GLOBAL_SCHEMA_VERSION),
            editor: None,
            projects: BTreeMap::new(),
            repos: BTreeMap::new(),
        }
    }
}
