use std::path::Path;

use kan_core::id::{generate_id, Entity};
use kan_core::schema::{self, format_tag, PROJECT_SCHEMA_VERSION};
use kan_core::{KanError, KanPaths, KanResult, SchemaKind};
use kan_domain::ProjectConfig;

use crate::atomic::AtomicWriter;

#[derive(Clone, Debug)]
pub struct ProjectStore {
    paths: KanPaths,
}

impl ProjectStore {
    pub fn new(paths: KanPaths) -> Self {
        Self { paths }
    }

    pub async fn load(&self) -> KanResult<ProjectConfig> {
        let path = self.paths.project_config();
        if !tokio::fs::try_exists(&path).await? {
            return Err(KanError::NotInitialized(
                self.paths.root().display().to_string(),
            ));
        }
        let text = tokio::fs::read_to_string(&path).await?;
        parse_project(&path, &text)
    }

    pub async fn save(&self, config: &mut ProjectConfig) -> KanResult<()> {
        config.kan_schema = format_tag(SchemaKind::Project, PROJECT_SCHEMA_VERSION);
        let text = toml::to_string_pretty(&config)
            .map_err(|e| KanError::Serialization(e.to_string()))?;
        AtomicWriter::write_atomic(&self.paths.project_config(), text.as_bytes()).await
    }

    /// The sole lenient read path: a missing config, or one without an ID,
    /// is silently created/completed with a fresh project ID and a derived
    /// favicon. Pre-existing projects upgrade through here on first touch.
    pub async fn ensure_initialized(&self, default_name: &str) -> KanResult<ProjectConfig> {
        let path = self.paths.project_config();

        if tokio::fs::try_exists(&path).await? {
            let text = tokio::fs::read_to_string(&path).await?;
            let value: toml::Value = toml::from_str(&text)
                .map_err(|e| KanError::Serialization(format!("{}: {e}", path.display())))?;
            let has_id = value
                .get("id")
                .and_then(|v| v.as_str())
                .is_some_and(|s| !s.is_empty());
            if has_id {
                return parse_project(&path, &text);
            }
            let name = value
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or(default_name)
                .to_string();
            let mut config = ProjectConfig::new(generate_id(Entity::Project), name);
            self.save(&mut config).await?;
            tracing::info!("Completed project config at {}", path.display());
            return Ok(config);
        }

        let mut config =
            ProjectConfig::new(generate_id(Entity::Project), default_name.to_string());
        self.save(&mut config).await?;
        tracing::info!("Created project config at {}", path.display());
        Ok(config)
    }
}

fn parse_project(path: &Path, text: &str) -> KanResult<ProjectConfig> {
    let value: toml::Value = toml::from_str(text)
        .map_err(|e| KanError::Serialization(format!("{}: {e}", path.display())))?;
    let tag = value
        .get("kan_schema")
        .and_then(|v| v.as_str())
        .ok_or_else(|| KanError::MissingSchema {
            kind: SchemaKind::Project,
            path: path.display().to_string(),
        })?;
    let version = schema::parse_tag(SchemaKind::Project, path, tag)?;
    schema::check_version(SchemaKind::Project, path, version)?;

    value
        .try_into()
        .map_err(|e| KanError::Serialization(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_uninitialized_fails() {
        let dir = tempdir().unwrap();
        let store = ProjectStore::new(KanPaths::new(dir.path(), None));
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, KanError::NotInitialized(_)));
    }

    #[tokio::test]
    async fn test_ensure_initialized_creates_config() {
        let dir = tempdir().unwrap();
        let store = ProjectStore::new(KanPaths::new(dir.path(), None));

        let config = store.ensure_initialized("demo").await.unwrap();
        assert!(config.id.starts_with("p_"));
        assert_eq!(config.name, "demo");
        assert_eq!(config.favicon.letter, "D");

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.id, config.id);
    }

    #[tokio::test]
    async fn test_ensure_initialized_completes_id_less_config() {
        let dir = tempdir().unwrap();
        let paths = KanPaths::new(dir.path(), None);
        let store = ProjectStore::new(paths.clone());

        tokio::fs::create_dir_all(paths.data_dir()).await.unwrap();
        tokio::fs::write(paths.project_config(), "name = \"legacy\"\n")
            .await
            .unwrap();

        let config = store.ensure_initialized("fallback").await.unwrap();
        assert!(config.id.starts_with("p_"));
        assert_eq!(config.name, "legacy");
    }

    #[tokio::test]
    async fn test_ensure_initialized_keeps_existing() {
        let dir = tempdir().unwrap();
        let store = ProjectStore::new(KanPaths::new(dir.path(), None));

        let first = store.ensure_initialized("demo").await.unwrap();
        let second = store.ensure_initialized("other").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "demo");
    }
}
