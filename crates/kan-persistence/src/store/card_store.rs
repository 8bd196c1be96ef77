use std::path::Path;

use kan_core::schema::{self, CARD_SCHEMA_VERSION};
use kan_core::{KanError, KanPaths, KanResult, SchemaKind};
use kan_domain::Card;

use crate::atomic::AtomicWriter;

/// Typed card file I/O for one project. Strict schema validation on read,
/// schema stamping on write.
#[derive(Clone, Debug)]
pub struct CardStore {
    paths: KanPaths,
}

impl CardStore {
    pub fn new(paths: KanPaths) -> Self {
        Self { paths }
    }

    /// Write a fresh card file; fails if one already exists for this ID.
    pub async fn create(&self, board: &str, card: &Card) -> KanResult<()> {
        let path = self.paths.card_file(board, &card.id);
        if tokio::fs::try_exists(&path).await? {
            return Err(KanError::AlreadyExists(format!(
                "card '{}' in board '{board}'",
                card.id
            )));
        }
        self.write(board, card).await
    }

    pub async fn get(&self, board: &str, card_id: &str) -> KanResult<Card> {
        let path = self.paths.card_file(board, card_id);
        if !tokio::fs::try_exists(&path).await? {
            return Err(KanError::NotFound(format!(
                "card '{card_id}' in board '{board}'"
            )));
        }
        let bytes = AtomicWriter::read_all(&path).await?;
        parse_card(&path, &bytes)
    }

    /// Atomic replace; bumps `updated_at_millis`.
    pub async fn update(&self, board: &str, card: &mut Card) -> KanResult<()> {
        card.touch();
        self.write(board, card).await
    }

    pub async fn delete(&self, board: &str, card_id: &str) -> KanResult<()> {
        let path = self.paths.card_file(board, card_id);
        if !tokio::fs::try_exists(&path).await? {
            return Err(KanError::NotFound(format!(
                "card '{card_id}' in board '{board}'"
            )));
        }
        tokio::fs::remove_file(&path).await?;
        tracing::debug!("Deleted card file {}", path.display());
        Ok(())
    }

    /// Parse every card file in the board. Unknown or missing versions fail
    /// loudly; this is the strict read path.
    pub async fn list(&self, board: &str) -> KanResult<Vec<Card>> {
        let dir = self.paths.cards_dir(board);
        if !tokio::fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }
        let mut cards = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = AtomicWriter::read_all(&path).await?;
            cards.push(parse_card(&path, &bytes)?);
        }
        Ok(cards)
    }

    /// Linear scan, exact alias match.
    pub async fn find_by_alias(&self, board: &str, alias: &str) -> KanResult<Option<Card>> {
        Ok(self
            .list(board)
            .await?
            .into_iter()
            .find(|c| c.alias == alias))
    }

    async fn write(&self, board: &str, card: &Card) -> KanResult<()> {
        let path = self.paths.card_file(board, &card.id);
        let bytes = serialize_card(card)?;
        AtomicWriter::write_atomic(&path, &bytes).await
    }
}

fn serialize_card(card: &Card) -> KanResult<Vec<u8>> {
    let mut on_disk = card.clone();
    on_disk.schema_version = CARD_SCHEMA_VERSION;
    // The board config is the only source of truth for column membership.
    on_disk.column = None;
    serde_json::to_vec_pretty(&on_disk).map_err(|e| KanError::Serialization(e.to_string()))
}

fn parse_card(path: &Path, bytes: &[u8]) -> KanResult<Card> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| KanError::Serialization(format!("{}: {e}", path.display())))?;

    let version = match value.get("_v") {
        None => {
            return Err(KanError::MissingSchema {
                kind: SchemaKind::Card,
                path: path.display().to_string(),
            })
        }
        Some(v) => v.as_u64().filter(|v| *v > 0).ok_or_else(|| {
            KanError::InvalidSchema {
                kind: SchemaKind::Card,
                path: path.display().to_string(),
                found: v.to_string(),
                expected: CARD_SCHEMA_VERSION.to_string(),
            }
        })? as u32,
    };
    schema::check_version(SchemaKind::Card, path, version)?;

    let card: Card = serde_json::from_value(value)
        .map_err(|e| KanError::Serialization(format!("{}: {e}", path.display())))?;

    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        if stem != card.id {
            return Err(KanError::Serialization(format!(
                "{}: card id '{}' does not match filename",
                path.display(),
                card.id
            )));
        }
    }
    Ok(card)
}
