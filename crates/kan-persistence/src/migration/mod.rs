mod steps;

use std::path::PathBuf;

use kan_core::schema::{
    format_tag, BOARD_SCHEMA_VERSION, CARD_SCHEMA_VERSION, PROJECT_SCHEMA_VERSION,
};
use kan_core::{KanError, KanPaths, KanResult, SchemaKind};

use crate::atomic::AtomicWriter;

/// One schema transition. `from == None` means the file carries no tag at
/// all (pre-versioning).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaTransition {
    pub from: Option<u32>,
    pub to: u32,
}

impl SchemaTransition {
    pub fn is_identity(&self) -> bool {
        self.from == Some(self.to)
    }
}

#[derive(Debug, Clone)]
pub struct CardPlan {
    pub id: String,
    pub path: PathBuf,
    pub transition: SchemaTransition,
    /// Pre-v1 cards carry a deprecated `column` attribute that migration
    /// strips (and folds into board config membership).
    pub strip_column: bool,
}

#[derive(Debug, Clone)]
pub struct BoardPlan {
    pub board: String,
    pub transition: SchemaTransition,
    pub cards: Vec<CardPlan>,
}

impl BoardPlan {
    pub fn has_changes(&self) -> bool {
        !self.transition.is_identity()
            || self
                .cards
                .iter()
                .any(|c| !c.transition.is_identity() || c.strip_column)
    }
}

#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub project: Option<SchemaTransition>,
    pub boards: Vec<BoardPlan>,
}

impl MigrationPlan {
    pub fn has_changes(&self) -> bool {
        self.project.map(|t| !t.is_identity()).unwrap_or(false)
            || self.boards.iter().any(BoardPlan::has_changes)
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MigrationSummary {
    pub boards_migrated: usize,
    pub cards_migrated: usize,
    pub project_migrated: bool,
}

/// Plans and applies upward schema migrations for one project. This is the
/// only component that rewrites files en masse; reads here are lenient by
/// design since the whole point is handling files the strict stores refuse.
pub struct Migrator {
    paths: KanPaths,
}

impl Migrator {
    pub fn new(paths: KanPaths) -> Self {
        Self { paths }
    }

    /// Diff every on-disk schema version against current. Pure read.
    pub async fn plan(&self) -> KanResult<MigrationPlan> {
        let project = self.plan_project().await?;

        let mut boards = Vec::new();
        let boards_dir = self.paths.boards_dir();
        if tokio::fs::try_exists(&boards_dir).await? {
            let mut entries = tokio::fs::read_dir(&boards_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if !entry.file_type().await?.is_dir() {
                    continue;
                }
                let Some(name) = entry.file_name().to_str().map(String::from) else {
                    continue;
                };
                boards.push(self.plan_board(&name).await?);
            }
        }
        boards.sort_by(|a, b| a.board.cmp(&b.board));

        Ok(MigrationPlan { project, boards })
    }

    async fn plan_project(&self) -> KanResult<Option<SchemaTransition>> {
        let path = self.paths.project_config();
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let text = tokio::fs::read_to_string(&path).await?;
        let value: toml::Value = toml::from_str(&text)
            .map_err(|e| KanError::Serialization(format!("{}: {e}", path.display())))?;
        let from = value
            .get("kan_schema")
            .and_then(|v| v.as_str())
            .and_then(|tag| tag.strip_prefix("project/"))
            .and_then(|rest| rest.parse::<u32>().ok());
        Ok(Some(SchemaTransition {
            from,
            to: PROJECT_SCHEMA_VERSION,
        }))
    }

    async fn plan_board(&self, board: &str) -> KanResult<BoardPlan> {
        let config_path = self.paths.board_config(board);
        let from = if tokio::fs::try_exists(&config_path).await? {
            let text = tokio::fs::read_to_string(&config_path).await?;
            let value: toml::Value = toml::from_str(&text)
                .map_err(|e| KanError::Serialization(format!("{}: {e}", config_path.display())))?;
            value
                .get("kan_schema")
                .and_then(|v| v.as_str())
                .and_then(|tag| tag.strip_prefix("board/"))
                .and_then(|rest| rest.parse::<u32>().ok())
                // Untagged board configs predate versioning: treat as v1.
                .or(Some(1))
        } else {
            None
        };

        let mut cards = Vec::new();
        let cards_dir = self.paths.cards_dir(board);
        if tokio::fs::try_exists(&cards_dir).await? {
            let mut entries = tokio::fs::read_dir(&cards_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(String::from)
                else {
                    continue;
                };
                let bytes = AtomicWriter::read_all(&path).await?;
                let value: serde_json::Value = serde_json::from_slice(&bytes)
                    .map_err(|e| KanError::Serialization(format!("{}: {e}", path.display())))?;
                let from = value.get("_v").and_then(|v| v.as_u64()).map(|v| v as u32);
                let strip_column = value.get("column").is_some();
                cards.push(CardPlan {
                    id,
                    path,
                    transition: SchemaTransition {
                        from,
                        to: CARD_SCHEMA_VERSION,
                    },
                    strip_column,
                });
            }
        }
        cards.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(BoardPlan {
            board: board.to_string(),
            transition: SchemaTransition {
                from,
                to: BOARD_SCHEMA_VERSION,
            },
            cards,
        })
    }

    /// Apply the plan: per-version upward transforms, each file rewritten
    /// atomically. Refuses future schemas.
    pub async fn execute(&self, plan: &MigrationPlan) -> KanResult<MigrationSummary> {
        let mut summary = MigrationSummary::default();

        if let Some(transition) = plan.project {
            if !transition.is_identity() {
                self.migrate_project(transition).await?;
                summary.project_migrated = true;
            }
        }

        for board_plan in &plan.boards {
            if !board_plan.has_changes() {
                continue;
            }
            self.migrate_board(board_plan, &mut summary).await?;
        }

        Ok(summary)
    }

    async fn migrate_project(&self, transition: SchemaTransition) -> KanResult<()> {
        let path = self.paths.project_config();
        check_not_future(SchemaKind::Project, transition)?;
        let text = tokio::fs::read_to_string(&path).await?;
        let mut value: toml::Value = toml::from_str(&text)
            .map_err(|e| KanError::Serialization(format!("{}: {e}", path.display())))?;
        if let Some(table) = value.as_table_mut() {
            table.insert(
                "kan_schema".into(),
                toml::Value::String(format_tag(SchemaKind::Project, PROJECT_SCHEMA_VERSION)),
            );
        }
        let out =
            toml::to_string_pretty(&value).map_err(|e| KanError::Serialization(e.to_string()))?;
        AtomicWriter::write_atomic(&path, out.as_bytes()).await?;
        tracing::info!("Migrated project config to project/{PROJECT_SCHEMA_VERSION}");
        Ok(())
    }

    async fn migrate_board(
        &self,
        plan: &BoardPlan,
        summary: &mut MigrationSummary,
    ) -> KanResult<()> {
        let config_path = self.paths.board_config(&plan.board);
        let mut board_value: Option<toml::Value> =
            if tokio::fs::try_exists(&config_path).await? {
                let text = tokio::fs::read_to_string(&config_path).await?;
                Some(toml::from_str(&text).map_err(|e| {
                    KanError::Serialization(format!("{}: {e}", config_path.display()))
                })?)
            } else {
                None
            };
        let mut board_dirty = false;

        // Cards first: a v0 card's stripped column feeds board membership.
        for card_plan in &plan.cards {
            if card_plan.transition.is_identity() && !card_plan.strip_column {
                continue;
            }
            check_not_future(SchemaKind::Card, card_plan.transition)?;

            let bytes = AtomicWriter::read_all(&card_plan.path).await?;
            let mut value: serde_json::Value = serde_json::from_slice(&bytes)
                .map_err(|e| KanError::Serialization(format!("{}: {e}", card_plan.path.display())))?;

            let legacy_column = steps::card_v0_to_v1(&mut value);

            let out = serde_json::to_vec_pretty(&value)
                .map_err(|e| KanError::Serialization(e.to_string()))?;
            AtomicWriter::write_atomic(&card_plan.path, &out).await?;
            summary.cards_migrated += 1;

            // Registration is additive-safe: skip when the id is already
            // listed anywhere.
            if let Some(board) = board_value.as_mut() {
                if steps::register_card(board, &card_plan.id, legacy_column.as_deref()) {
                    board_dirty = true;
                }
            }
        }

        if let Some(mut value) = board_value {
            if !plan.transition.is_identity() {
                check_not_future(SchemaKind::Board, plan.transition)?;
                let mut version = plan.transition.from.unwrap_or(1);
                while version < BOARD_SCHEMA_VERSION {
                    steps::board_step(&mut value, version)?;
                    version += 1;
                }
                board_dirty = true;
                summary.boards_migrated += 1;
            }
            if board_dirty {
                let out = toml::to_string_pretty(&value)
                    .map_err(|e| KanError::Serialization(e.to_string()))?;
                AtomicWriter::write_atomic(&config_path, out.as_bytes()).await?;
                tracing::info!(board = %plan.board, "Migrated board config");
            }
        }

        Ok(())
    }
}

fn check_not_future(kind: SchemaKind, transition: SchemaTransition) -> KanResult<()> {
    if let Some(from) = transition.from {
        if from > transition.to {
            return Err(KanError::FutureSchema {
                kind,
                path: String::new(),
                found: format_tag(kind, from),
                min_engine: kan_core::schema::min_engine_for(kind, from).to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kan_domain::BoardConfig;
    use tempfile::tempdir;

    async fn write(path: &std::path::Path, content: &str) {
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(path, content).await.unwrap();
    }

    #[tokio::test]
    async fn test_plan_is_empty_for_current_project() {
        let dir = tempdir().unwrap();
        let paths = KanPaths::new(dir.path(), None);

        let store = crate::store::ProjectStore::new(paths.clone());
        store.ensure_initialized("demo").await.unwrap();
        let board_store = crate::store::BoardStore::new(paths.clone());
        let mut cfg = BoardConfig::new("b_1".into(), "main".into(), &["backlog", "done"]);
        board_store.create(&mut cfg).await.unwrap();

        let plan = Migrator::new(paths).plan().await.unwrap();
        assert!(!plan.has_changes());
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let dir = tempdir().unwrap();
        let paths = KanPaths::new(dir.path(), None);
        crate::store::ProjectStore::new(paths.clone())
            .ensure_initialized("demo")
            .await
            .unwrap();

        let migrator = Migrator::new(paths.clone());
        let plan = migrator.plan().await.unwrap();
        assert!(!plan.has_changes());
        let summary = migrator.execute(&plan).await.unwrap();
        assert_eq!(summary.cards_migrated, 0);
        assert_eq!(summary.boards_migrated, 0);
        assert!(!summary.project_migrated);
    }

    #[tokio::test]
    async fn test_card_v0_plan_and_execute() {
        let dir = tempdir().unwrap();
        let paths = KanPaths::new(dir.path(), None);

        write(
            &paths.board_config("main"),
            concat!(
                "kan_schema = \"board/4\"\n",
                "id = \"b_1\"\n",
                "name = \"main\"\n",
                "default_column = \"backlog\"\n\n",
                "[[columns]]\n",
                "name = \"backlog\"\n",
                "color = \"#fff\"\n",
                "card_ids = []\n",
            ),
        )
        .await;
        write(
            &paths.card_file("main", "a_legacy"),
            r#"{"id":"a_legacy","alias":"x","title":"X","creator":"t","created_at_millis":1,"updated_at_millis":1,"column":"backlog"}"#,
        )
        .await;

        let migrator = Migrator::new(paths.clone());
        let plan = migrator.plan().await.unwrap();
        assert!(plan.has_changes());
        let board = &plan.boards[0];
        assert_eq!(board.cards.len(), 1);
        assert_eq!(board.cards[0].transition.from, None);
        assert!(board.cards[0].strip_column);

        let summary = migrator.execute(&plan).await.unwrap();
        assert_eq!(summary.cards_migrated, 1);

        // Card now carries _v and no column key.
        let raw = tokio::fs::read_to_string(paths.card_file("main", "a_legacy"))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["_v"], 1);
        assert!(value.get("column").is_none());

        // Board config gained the membership entry.
        let cfg = crate::store::BoardStore::new(paths.clone())
            .get("main")
            .await
            .unwrap();
        assert_eq!(cfg.card_column("a_legacy"), Some("backlog"));

        // Second run is a no-op.
        let plan2 = migrator.plan().await.unwrap();
        assert!(!plan2.has_changes());
    }

    #[tokio::test]
    async fn test_board_v1_labels_become_custom_field() {
        let dir = tempdir().unwrap();
        let paths = KanPaths::new(dir.path(), None);

        write(
            &paths.board_config("main"),
            concat!(
                "kan_schema = \"board/1\"\n",
                "id = \"b_1\"\n",
                "name = \"main\"\n",
                "default_column = \"backlog\"\n\n",
                "[[columns]]\n",
                "name = \"backlog\"\n",
                "color = \"#fff\"\n",
                "card_ids = []\n\n",
                "[[labels]]\n",
                "value = \"ui\"\n",
                "color = \"#f00\"\n\n",
                "[[labels]]\n",
                "value = \"auth\"\n",
            ),
        )
        .await;

        let migrator = Migrator::new(paths.clone());
        let plan = migrator.plan().await.unwrap();
        assert_eq!(plan.boards[0].transition.from, Some(1));
        migrator.execute(&plan).await.unwrap();

        let cfg = crate::store::BoardStore::new(paths.clone())
            .get("main")
            .await
            .unwrap();
        let labels = cfg.custom_fields.get("labels").expect("labels field");
        assert_eq!(labels.field_type, kan_domain::FieldType::EnumSet);
        assert_eq!(labels.options.len(), 2);
        assert_eq!(labels.options[0].value, "ui");
        assert_eq!(
            cfg.card_display.as_ref().unwrap().badges,
            vec!["labels".to_string()]
        );
    }

    #[tokio::test]
    async fn test_untagged_board_treated_as_v1() {
        let dir = tempdir().unwrap();
        let paths = KanPaths::new(dir.path(), None);

        write(
            &paths.board_config("main"),
            concat!(
                "id = \"b_1\"\n",
                "name = \"main\"\n",
                "default_column = \"backlog\"\n\n",
                "[[columns]]\n",
                "name = \"backlog\"\n",
                "color = \"#fff\"\n",
                "card_ids = []\n",
            ),
        )
        .await;

        let migrator = Migrator::new(paths.clone());
        let plan = migrator.plan().await.unwrap();
        assert_eq!(plan.boards[0].transition.from, Some(1));
        migrator.execute(&plan).await.unwrap();

        assert!(crate::store::BoardStore::new(paths).get("main").await.is_ok());
    }
}
