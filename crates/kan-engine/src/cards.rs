use std::collections::BTreeMap;

use kan_core::id::{generate_id, Entity};
use kan_core::{KanError, KanResult};
use kan_domain::{is_valid_slug, validate_field_name, BoardConfig, Card, Comment, FieldUpdate};
use kan_persistence::{BoardStore, CardStore};

use crate::alias::AliasService;
use crate::hooks::{run_hooks_for_card, HookResult};

#[derive(Debug, Clone, Default)]
pub struct AddCardInput {
    pub title: String,
    pub description: Option<String>,
    pub column: Option<String>,
    pub parent: Option<String>,
    pub creator: String,
    pub fields: BTreeMap<String, String>,
    /// In strict mode, missing wanted fields fail instead of warn.
    pub strict: bool,
}

#[derive(Debug)]
pub struct AddCardOutput {
    pub card: Card,
    pub hook_results: Vec<HookResult>,
    pub missing_wanted: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EditCardInput {
    pub title: Option<String>,
    pub description: FieldUpdate<String>,
    pub column: Option<String>,
    pub parent: FieldUpdate<String>,
    pub alias: Option<String>,
    /// Merged into the card's fields; an empty value clears the key.
    pub fields: BTreeMap<String, String>,
    pub strict: bool,
}

#[derive(Debug)]
pub struct EditCardOutput {
    pub card: Card,
    pub missing_wanted: Vec<String>,
}

/// Card CRUD against one project. Every mutating operation re-reads the
/// board config immediately before writing it; the config's `card_ids`
/// lists stay the single source of truth for column membership.
pub struct CardService {
    cards: CardStore,
    boards: BoardStore,
}

impl CardService {
    pub fn new(cards: CardStore, boards: BoardStore) -> Self {
        Self { cards, boards }
    }

    pub async fn add(&self, board: &str, input: AddCardInput) -> KanResult<AddCardOutput> {
        let mut config = self.boards.get(board).await?;

        let title = input.title.trim();
        if title.is_empty() {
            return Err(KanError::Validation("card title cannot be empty".into()));
        }

        let column = match &input.column {
            Some(name) => {
                if !config.has_column(name) {
                    return Err(KanError::NotFound(format!(
                        "column '{name}' in board '{board}'"
                    )));
                }
                name.clone()
            }
            None => config
                .effective_default_column()
                .ok_or_else(|| {
                    KanError::Validation(format!("board '{board}' has no columns"))
                })?
                .to_string(),
        };

        if config.column(&column).is_some_and(|c| c.is_full()) {
            return Err(KanError::Validation(format!(
                "column '{column}' is at its limit"
            )));
        }

        if let Some(parent) = &input.parent {
            self.resolve(board, parent).await.map_err(|_| {
                KanError::NotFound(format!("parent card '{parent}' in board '{board}'"))
            })?;
        }

        let fields = validate_fields(&config, &input.fields)?;
        let missing_wanted = missing_wanted_fields(&config, &fields);
        if input.strict && !missing_wanted.is_empty() {
            return Err(KanError::Validation(format!(
                "missing wanted fields: {}",
                missing_wanted.join(", ")
            )));
        }

        let id = generate_id(Entity::Card);
        let alias = AliasService::generate(&self.cards, board, title, None).await?;
        let mut card = Card::new(id, alias, title.to_string(), input.creator);
        card.description = input.description.filter(|d| !d.is_empty());
        card.parent = input.parent;
        card.fields = fields;

        self.cards.create(board, &card).await?;
        config.add_card_to_column(&card.id, &column)?;
        self.boards.update(&mut config).await?;
        tracing::debug!(card = %card.id, %column, "Created card");

        // The card is fully persisted before hooks run; a hook may itself
        // invoke the engine to modify it.
        let hook_results = run_hooks_for_card(&config.pattern_hooks, &card, board).await;

        card.column = Some(column);
        Ok(AddCardOutput {
            card,
            hook_results,
            missing_wanted,
        })
    }

    /// Look a card up by ID or alias, with its derived column populated.
    pub async fn get(&self, board: &str, id_or_alias: &str) -> KanResult<Card> {
        let config = self.boards.get(board).await?;
        let mut card = self.resolve(board, id_or_alias).await?;
        card.column = config.card_column(&card.id).map(String::from);
        Ok(card)
    }

    pub async fn edit(
        &self,
        board: &str,
        id_or_alias: &str,
        input: EditCardInput,
    ) -> KanResult<EditCardOutput> {
        let config = self.boards.get(board).await?;
        let mut card = self.resolve(board, id_or_alias).await?;

        if let Some(title) = &input.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(KanError::Validation("card title cannot be empty".into()));
            }
            if title != card.title {
                card.title = title.to_string();
                if !card.alias_explicit && input.alias.is_none() {
                    // The card's own on-disk alias must not count as taken.
                    card.alias =
                        AliasService::generate(&self.cards, board, title, Some(&card.id))
                            .await?;
                }
            }
        }

        if let Some(alias) = &input.alias {
            if !is_valid_slug(alias) {
                return Err(KanError::Validation(format!(
                    "invalid alias '{alias}': use lowercase letters, digits, and hyphens"
                )));
            }
            if AliasService::is_taken(&self.cards, board, alias, Some(&card.id)).await? {
                return Err(KanError::AlreadyExists(format!(
                    "alias '{alias}' in board '{board}'"
                )));
            }
            card.alias = alias.clone();
            card.alias_explicit = true;
        }

        input.description.apply_to(&mut card.description);

        match &input.parent {
            FieldUpdate::NoChange => {}
            FieldUpdate::Clear => card.parent = None,
            FieldUpdate::Set(parent) => {
                self.resolve(board, parent).await.map_err(|_| {
                    KanError::NotFound(format!("parent card '{parent}' in board '{board}'"))
                })?;
                card.parent = Some(parent.clone());
            }
        }

        for (name, value) in &input.fields {
            validate_field_name(name)?;
            if value.is_empty() {
                card.fields.remove(name);
                continue;
            }
            let schema = config.custom_fields.get(name).ok_or_else(|| {
                KanError::Validation(format!("unknown custom field '{name}'"))
            })?;
            schema.validate_value(name, value)?;
            card.fields.insert(name.clone(), value.clone());
        }

        let missing_wanted = missing_wanted_fields(&config, &card.fields);
        if input.strict && !missing_wanted.is_empty() {
            return Err(KanError::Validation(format!(
                "missing wanted fields: {}",
                missing_wanted.join(", ")
            )));
        }

        // Column changes go through the move path so board config stays
        // authoritative; it also rewrites the card file.
        if let Some(column) = &input.column {
            self.cards.update(board, &mut card).await?;
            let card = self.move_card_at(board, &card.id, column, -1).await?;
            return Ok(EditCardOutput {
                card,
                missing_wanted,
            });
        }

        self.cards.update(board, &mut card).await?;
        card.column = config.card_column(&card.id).map(String::from);
        Ok(EditCardOutput {
            card,
            missing_wanted,
        })
    }

    /// Append-semantics variant of `move_card_at`.
    pub async fn move_card(
        &self,
        board: &str,
        id_or_alias: &str,
        target_column: &str,
    ) -> KanResult<Card> {
        self.move_card_at(board, id_or_alias, target_column, -1).await
    }

    /// Place a card at `position` in `target_column` (-1 or past the end
    /// appends). Respects the column limit unless the card is already in
    /// the target column.
    pub async fn move_card_at(
        &self,
        board: &str,
        id_or_alias: &str,
        target_column: &str,
        position: i64,
    ) -> KanResult<Card> {
        let mut config = self.boards.get(board).await?;
        let mut card = self.resolve(board, id_or_alias).await?;

        if !config.has_column(target_column) {
            return Err(KanError::NotFound(format!(
                "column '{target_column}' in board '{board}'"
            )));
        }
        let already_there = config.card_column(&card.id) == Some(target_column);
        if !already_there
            && config
                .column(target_column)
                .is_some_and(|c| c.is_full())
        {
            return Err(KanError::Validation(format!(
                "column '{target_column}' is at its limit"
            )));
        }

        config.move_card_to_column_at(&card.id, target_column, position)?;
        self.cards.update(board, &mut card).await?;
        self.boards.update(&mut config).await?;

        card.column = Some(target_column.to_string());
        Ok(card)
    }

    /// Cards in board-config order, orphans appended. The `column`
    /// attribute on each card is joined in from the config.
    pub async fn list(&self, board: &str, column_filter: Option<&str>) -> KanResult<Vec<Card>> {
        let config = self.boards.get(board).await?;
        if let Some(filter) = column_filter {
            if !config.has_column(filter) {
                return Err(KanError::NotFound(format!(
                    "column '{filter}' in board '{board}'"
                )));
            }
        }

        let mut by_id: BTreeMap<String, Card> = self
            .cards
            .list(board)
            .await?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        let mut out = Vec::new();
        for column in &config.columns {
            if column_filter.is_some_and(|f| f != column.name) {
                continue;
            }
            for id in &column.card_ids {
                // IDs without a file are doctor findings, not read errors.
                if let Some(mut card) = by_id.remove(id) {
                    card.column = Some(column.name.clone());
                    out.push(card);
                }
            }
        }

        // Orphans: files on disk not listed in any column.
        if column_filter.is_none() {
            out.extend(by_id.into_values());
        }
        Ok(out)
    }

    pub async fn delete(&self, board: &str, id_or_alias: &str) -> KanResult<()> {
        let mut config = self.boards.get(board).await?;
        let card = self.resolve(board, id_or_alias).await?;

        self.cards.delete(board, &card.id).await?;
        if config.remove_card(&card.id) {
            self.boards.update(&mut config).await?;
        }
        tracing::debug!(card = %card.id, "Deleted card");
        Ok(())
    }

    pub async fn add_comment(
        &self,
        board: &str,
        id_or_alias: &str,
        body: String,
        author: String,
    ) -> KanResult<Comment> {
        if body.trim().is_empty() {
            return Err(KanError::Validation("comment body cannot be empty".into()));
        }
        let mut card = self.resolve(board, id_or_alias).await?;
        let comment = Comment::new(generate_id(Entity::Comment), body, author);
        card.comments.push(comment.clone());
        self.cards.update(board, &mut card).await?;
        Ok(comment)
    }

    pub async fn edit_comment(
        &self,
        board: &str,
        comment_id: &str,
        body: String,
    ) -> KanResult<Comment> {
        let mut card = self.find_comment_card(board, comment_id).await?;
        let comment = card
            .comment_mut(comment_id)
            .expect("containing card was just located");
        comment.body = body;
        comment.updated_at_millis = chrono::Utc::now().timestamp_millis();
        let updated = comment.clone();
        self.cards.update(board, &mut card).await?;
        Ok(updated)
    }

    pub async fn delete_comment(&self, board: &str, comment_id: &str) -> KanResult<()> {
        let mut card = self.find_comment_card(board, comment_id).await?;
        card.comments.retain(|c| c.id != comment_id);
        self.cards.update(board, &mut card).await?;
        Ok(())
    }

    /// ID first, alias second; either way the caller just sees NotFound.
    async fn resolve(&self, board: &str, id_or_alias: &str) -> KanResult<Card> {
        match self.cards.get(board, id_or_alias).await {
            Ok(card) => Ok(card),
            Err(KanError::NotFound(_)) => self
                .cards
                .find_by_alias(board, id_or_alias)
                .await?
                .ok_or_else(|| {
                    KanError::NotFound(format!("card '{id_or_alias}' in board '{board}'"))
                }),
            Err(e) => Err(e),
        }
    }

    async fn find_comment_card(&self, board: &str, comment_id: &str) -> KanResult<Card> {
        Ok(self
            .cards
            .list(board)
            .await?
            .into_iter()
            .find(|c| c.comment(comment_id).is_some())
            .ok_or_else(|| {
                KanError::NotFound(format!("comment '{comment_id}' in board '{board}'"))
            })?)
    }
}

fn validate_fields(
    config: &BoardConfig,
    fields: &BTreeMap<String, String>,
) -> KanResult<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for (name, value) in fields {
        validate_field_name(name)?;
        if value.is_empty() {
            continue;
        }
        let schema = config
            .custom_fields
            .get(name)
            .ok_or_else(|| KanError::Validation(format!("unknown custom field '{name}'")))?;
        schema.validate_value(name, value)?;
        out.insert(name.clone(), value.clone());
    }
    Ok(out)
}

/// A card lacks wanted field F iff F's schema is wanted and the card's
/// value for F is absent or empty.
fn missing_wanted_fields(config: &BoardConfig, fields: &BTreeMap<String, String>) -> Vec<String> {
    config
        .custom_fields
        .iter()
        .filter(|(name, schema)| {
            schema.wanted && fields.get(*name).map_or(true, |v| v.is_empty())
        })
        .map(|(name, _)| name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kan_core::KanPaths;
    use kan_domain::{CustomFieldSchema, FieldOption, FieldType};
    use tempfile::tempdir;

    async fn setup(root: &std::path::Path) -> CardService {
        let paths = KanPaths::new(root, None);
        let boards = BoardStore::new(paths.clone());
        let mut config = BoardConfig::new(
            "b_1".into(),
            "main".into(),
            &["backlog", "next", "in-progress", "done"],
        );
        boards.create(&mut config).await.unwrap();
        CardService::new(CardStore::new(paths), boards)
    }

    fn add_input(title: &str) -> AddCardInput {
        AddCardInput {
            title: title.into(),
            creator: "test".into(),
            ..Default::default()
        }
    }

    async fn with_type_field(service: &CardService, wanted: bool) {
        let mut config = service.boards.get("main").await.unwrap();
        config.custom_fields.insert(
            "type".into(),
            CustomFieldSchema {
                field_type: FieldType::Enum,
                wanted,
                description: None,
                options: ["feature", "bug", "task"]
                    .iter()
                    .map(|v| FieldOption {
                        value: (*v).into(),
                        color: None,
                        description: None,
                    })
                    .collect(),
            },
        );
        service.boards.update(&mut config).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_then_move() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;

        let out = service.add("main", add_input("Fix login bug")).await.unwrap();
        assert!(out.card.id.starts_with("a_"));
        assert_eq!(out.card.alias, "fix-login-bug");
        assert_eq!(out.card.column.as_deref(), Some("backlog"));

        service
            .move_card_at("main", &out.card.id, "done", -1)
            .await
            .unwrap();

        let done = service.list("main", Some("done")).await.unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, out.card.id);
        let backlog = service.list("main", Some("backlog")).await.unwrap();
        assert!(backlog.is_empty());

        // The card file never contains a column key.
        let raw = tokio::fs::read_to_string(
            KanPaths::new(dir.path(), None).card_file("main", &out.card.id),
        )
        .await
        .unwrap();
        assert!(!raw.contains("\"column\""));
    }

    #[tokio::test]
    async fn test_alias_collision_and_explicit_conflict() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;

        let first = service.add("main", add_input("Fix bug")).await.unwrap();
        assert_eq!(first.card.alias, "fix-bug");
        let second = service.add("main", add_input("Fix bug")).await.unwrap();
        assert_eq!(second.card.alias, "fix-bug-2");

        let err = service
            .edit(
                "main",
                &second.card.id,
                EditCardInput {
                    alias: Some("fix-bug".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, KanError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_explicit_alias_suppresses_regeneration() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        let out = service.add("main", add_input("Original")).await.unwrap();

        service
            .edit(
                "main",
                &out.card.id,
                EditCardInput {
                    alias: Some("my-alias".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let edited = service
            .edit(
                "main",
                "my-alias",
                EditCardInput {
                    title: Some("Totally new title".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.card.alias, "my-alias");
        assert!(edited.card.alias_explicit);
    }

    #[tokio::test]
    async fn test_title_change_regenerates_alias() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        let out = service.add("main", add_input("Old title")).await.unwrap();

        let edited = service
            .edit(
                "main",
                &out.card.id,
                EditCardInput {
                    title: Some("New title".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.card.alias, "new-title");
    }

    #[tokio::test]
    async fn test_slug_stable_title_edit_keeps_alias() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        let out = service.add("main", add_input("Fix bug")).await.unwrap();
        assert_eq!(out.card.alias, "fix-bug");

        // Punctuation-only change: same slug, no spurious -2 bump.
        let edited = service
            .edit(
                "main",
                &out.card.id,
                EditCardInput {
                    title: Some("Fix bug.".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.card.alias, "fix-bug");
    }

    #[tokio::test]
    async fn test_custom_field_validation() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        with_type_field(&service, false).await;

        let mut bad = add_input("X");
        bad.fields.insert("type".into(), "chore".into());
        let err = service.add("main", bad).await.unwrap_err();
        assert!(matches!(err, KanError::Validation(_)));

        let mut good = add_input("X");
        good.fields.insert("type".into(), "bug".into());
        let out = service.add("main", good).await.unwrap();

        let raw = tokio::fs::read_to_string(
            KanPaths::new(dir.path(), None).card_file("main", &out.card.id),
        )
        .await
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["type"], "bug");
        assert!(json.get("custom_fields").is_none());
    }

    #[tokio::test]
    async fn test_unknown_and_reserved_fields_rejected() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;

        let mut unknown = add_input("X");
        unknown.fields.insert("nope".into(), "v".into());
        assert!(service.add("main", unknown).await.is_err());

        let mut reserved = add_input("X");
        reserved.fields.insert("kan_thing".into(), "v".into());
        assert!(service.add("main", reserved).await.is_err());
    }

    #[tokio::test]
    async fn test_wanted_field_warns_then_fails_strict() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        with_type_field(&service, true).await;

        let out = service.add("main", add_input("X")).await.unwrap();
        assert_eq!(out.missing_wanted, vec!["type".to_string()]);

        let mut strict = add_input("Y");
        strict.strict = true;
        let err = service.add("main", strict).await.unwrap_err();
        assert!(matches!(err, KanError::Validation(_)));

        let mut filled = add_input("Z");
        filled.strict = true;
        filled.fields.insert("type".into(), "bug".into());
        let out = service.add("main", filled).await.unwrap();
        assert!(out.missing_wanted.is_empty());
    }

    #[tokio::test]
    async fn test_field_clear_with_empty_string() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        with_type_field(&service, false).await;

        let mut input = add_input("X");
        input.fields.insert("type".into(), "bug".into());
        let out = service.add("main", input).await.unwrap();

        let mut edit = EditCardInput::default();
        edit.fields.insert("type".into(), String::new());
        let edited = service.edit("main", &out.card.id, edit).await.unwrap();
        assert!(!edited.card.fields.contains_key("type"));
    }

    #[tokio::test]
    async fn test_column_limit_enforced() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        let mut config = service.boards.get("main").await.unwrap();
        config.column_mut("next").unwrap().limit = Some(1);
        service.boards.update(&mut config).await.unwrap();

        let mut a = add_input("A");
        a.column = Some("next".into());
        service.add("main", a).await.unwrap();

        let mut b = add_input("B");
        b.column = Some("next".into());
        let err = service.add("main", b).await.unwrap_err();
        assert!(matches!(err, KanError::Validation(_)));

        // Moving within the full column is still allowed.
        let cards = service.list("main", Some("next")).await.unwrap();
        service
            .move_card_at("main", &cards[0].id, "next", 0)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_move_position_semantics() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        let a = service.add("main", add_input("A")).await.unwrap().card;
        let b = service.add("main", add_input("B")).await.unwrap().card;
        let c = service.add("main", add_input("C")).await.unwrap().card;

        service.move_card_at("main", &c.id, "backlog", 0).await.unwrap();
        let order: Vec<String> = service
            .list("main", Some("backlog"))
            .await
            .unwrap()
            .into_iter()
            .map(|card| card.id)
            .collect();
        assert_eq!(order, vec![c.id.clone(), a.id.clone(), b.id.clone()]);
    }

    #[tokio::test]
    async fn test_parent_must_resolve() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;

        let mut orphan = add_input("X");
        orphan.parent = Some("a_missing".into());
        let err = service.add("main", orphan).await.unwrap_err();
        assert!(matches!(err, KanError::NotFound(_)));

        let parent = service.add("main", add_input("Parent")).await.unwrap().card;
        let mut child = add_input("Child");
        child.parent = Some(parent.id.clone());
        let out = service.add("main", child).await.unwrap();
        assert_eq!(out.card.parent.as_deref(), Some(parent.id.as_str()));
    }

    #[tokio::test]
    async fn test_orphan_listed_without_column() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        let out = service.add("main", add_input("X")).await.unwrap();

        // Simulate drift from an external edit.
        let mut config = service.boards.get("main").await.unwrap();
        config.remove_card(&out.card.id);
        service.boards.update(&mut config).await.unwrap();

        let all = service.list("main", None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].column, None);
    }

    #[tokio::test]
    async fn test_comment_lifecycle() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        let card = service.add("main", add_input("X")).await.unwrap().card;

        let comment = service
            .add_comment("main", "x", "First!".into(), "alice".into())
            .await
            .unwrap();
        assert!(comment.id.starts_with("c_"));

        let edited = service
            .edit_comment("main", &comment.id, "Edited".into())
            .await
            .unwrap();
        assert_eq!(edited.body, "Edited");

        service.delete_comment("main", &comment.id).await.unwrap();
        let loaded = service.get("main", &card.id).await.unwrap();
        assert!(loaded.comments.is_empty());

        let err = service
            .edit_comment("main", &comment.id, "gone".into())
            .await
            .unwrap_err();
        assert!(matches!(err, KanError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_deregisters_card() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        let card = service.add("main", add_input("X")).await.unwrap().card;

        service.delete("main", "x").await.unwrap();
        assert!(service.list("main", None).await.unwrap().is_empty());
        let config = service.boards.get("main").await.unwrap();
        assert_eq!(config.card_column(&card.id), None);
    }
}
