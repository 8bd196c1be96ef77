use std::path::{Path, PathBuf};

use kan_core::paths::global_config_path;
use kan_core::schema::{self, format_tag, GLOBAL_SCHEMA_VERSION};
use kan_core::{KanError, KanResult, SchemaKind};
use kan_domain::GlobalConfig;

use crate::atomic::AtomicWriter;

#[derive(Clone)]
pub struct GlobalStore {
    path: PathBuf,
}

impl GlobalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn at_default_location() -> KanResult<Self> {
        let path = global_config_path()
            .ok_or_else(|| KanError::Internal("cannot determine config directory".into()))?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> KanResult<GlobalConfig> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Err(KanError::NotFound(format!(
                "global config at {}",
                self.path.display()
            )));
        }
        let text = tokio::fs::read_to_string(&self.path).await?;
        parse_global(&self.path, &text)
    }

    /// Empty default when the file does not exist yet; a malformed file
    /// still fails.
    pub async fn load_or_default(&self) -> KanResult<GlobalConfig> {
        match self.load().await {
            Ok(config) => Ok(config),
            Err(KanError::NotFound(_)) => Ok(GlobalConfig::default()),
            Err(e) => Err(e),
        }
    }

    pub async fn save(&self, config: &mut GlobalConfig) -> KanResult<()> {
        config.kan_schema = format_tag(SchemaKind::Global, GLOBAL_SCHEMA_VERSION);
        let text = toml::to_string_pretty(&config)
            .map_err(|e| KanError::Serialization(e.to_string()))?;
        AtomicWriter::write_atomic(&self.path, text.as_bytes()).await
    }
}

fn parse_global(path: &Path, text: &str) -> KanResult<GlobalConfig> {
    let value: toml::Value = toml::from_str(text)
        .map_err(|e| KanError::Serialization(format!("{}: {e}", path.display())))?;
    let tag = value
        .get("kan_schema")
        .and_then(|v| v.as_str())
        .ok_or_else(|| KanError::MissingSchema {
            kind: SchemaKind::Global,
            path: path.display().to_string(),
        })?;
    let version = schema::parse_tag(SchemaKind::Global, path, tag)?;
    schema::check_version(SchemaKind::Global, path, version)?;

    value
        .try_into()
        .map_err(|e| KanError::Serialization(format!("{}: {e}", path.display())))
}
