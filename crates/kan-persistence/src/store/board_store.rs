use std::path::Path;

use kan_core::schema::{self, format_tag, BOARD_SCHEMA_VERSION};
use kan_core::{KanError, KanPaths, KanResult, SchemaKind};
use kan_domain::BoardConfig;

use crate::atomic::AtomicWriter;

#[derive(Clone, Debug)]
pub struct BoardStore {
    paths: KanPaths,
}

impl BoardStore {
    pub fn new(paths: KanPaths) -> Self {
        Self { paths }
    }

    pub async fn create(&self, config: &mut BoardConfig) -> KanResult<()> {
        let path = self.paths.board_config(&config.name);
        if tokio::fs::try_exists(&path).await? {
            return Err(KanError::AlreadyExists(format!("board '{}'", config.name)));
        }
        tokio::fs::create_dir_all(self.paths.cards_dir(&config.name)).await?;
        self.write(config).await
    }

    pub async fn get(&self, name: &str) -> KanResult<BoardConfig> {
        let path = self.paths.board_config(name);
        if !tokio::fs::try_exists(&path).await? {
            return Err(KanError::NotFound(format!("board '{name}'")));
        }
        let text = tokio::fs::read_to_string(&path).await?;
        parse_board(&path, &text)
    }

    /// Writes a fresh full config, stamping the current schema tag.
    pub async fn update(&self, config: &mut BoardConfig) -> KanResult<()> {
        self.write(config).await
    }

    /// Board directory names, sorted.
    pub async fn list(&self) -> KanResult<Vec<String>> {
        let dir = self.paths.boards_dir();
        if !tokio::fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn exists(&self, name: &str) -> bool {
        tokio::fs::try_exists(self.paths.board_config(name))
            .await
            .unwrap_or(false)
    }

    async fn write(&self, config: &mut BoardConfig) -> KanResult<()> {
        config.kan_schema = format_tag(SchemaKind::Board, BOARD_SCHEMA_VERSION);
        let text = toml::to_string_pretty(&config)
            .map_err(|e| KanError::Serialization(e.to_string()))?;
        let path = self.paths.board_config(&config.name);
        AtomicWriter::write_atomic(&path, text.as_bytes()).await
    }
}

fn parse_board(path: &Path, text: &str) -> KanResult<BoardConfig> {
    let value: toml::Value = toml::from_str(text)
        .map_err(|e| KanError::Serialization(format!("{}: {e}", path.display())))?;

    let tag = value
        .get("kan_schema")
        .and_then(|v| v.as_str())
        .ok_or_else(|| KanError::MissingSchema {
            kind: SchemaKind::Board,
            path: path.display().to_string(),
        })?;
    let version = schema::parse_tag(SchemaKind::Board, path, tag)?;
    schema::check_version(SchemaKind::Board, path, version)?;

    let config: BoardConfig = value
        .try_into()
        .map_err(|e| KanError::Serialization(format!("{}: {e}", path.display())))?;
    Ok(config)
}
