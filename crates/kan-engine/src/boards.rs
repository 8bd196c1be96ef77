use kan_core::id::{generate_id, Entity};
use kan_core::{KanError, KanResult};
use kan_domain::{palette_color, validate_column_name, BoardConfig, Column};
use kan_persistence::{BoardStore, CardStore};

/// Columns a new board starts with when none are supplied.
pub const DEFAULT_COLUMNS: [&str; 4] = ["backlog", "next", "in-progress", "done"];

/// Board and column operations. Column renames only touch board config;
/// cards carry no column attribute to propagate into.
pub struct BoardService {
    cards: CardStore,
    boards: BoardStore,
}

impl BoardService {
    pub fn new(cards: CardStore, boards: BoardStore) -> Self {
        Self { cards, boards }
    }

    pub async fn create(
        &self,
        name: &str,
        columns: Option<Vec<String>>,
    ) -> KanResult<BoardConfig> {
        validate_column_name(name).map_err(|_| {
            KanError::Validation(format!(
                "invalid board name '{name}': use lowercase letters, digits, and hyphens"
            ))
        })?;

        let names: Vec<String> = match columns {
            Some(list) if !list.is_empty() => {
                for column in &list {
                    validate_column_name(column)?;
                }
                let mut deduped = list.clone();
                deduped.sort();
                deduped.dedup();
                if deduped.len() != list.len() {
                    return Err(KanError::Validation(
                        "column names must be unique".into(),
                    ));
                }
                list
            }
            _ => DEFAULT_COLUMNS.iter().map(|s| s.to_string()).collect(),
        };
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let mut config =
            BoardConfig::new(generate_id(Entity::Board), name.to_string(), &name_refs);
        self.boards.create(&mut config).await?;
        tracing::info!(board = %name, "Created board");
        Ok(config)
    }

    pub async fn get(&self, name: &str) -> KanResult<BoardConfig> {
        self.boards.get(name).await
    }

    pub async fn list(&self) -> KanResult<Vec<String>> {
        self.boards.list().await
    }

    pub async fn add_column(
        &self,
        board: &str,
        name: &str,
        color: Option<String>,
        description: Option<String>,
        position: i64,
    ) -> KanResult<Column> {
        validate_column_name(name)?;
        let mut config = self.boards.get(board).await?;
        if config.has_column(name) {
            return Err(KanError::AlreadyExists(format!(
                "column '{name}' in board '{board}'"
            )));
        }

        let mut column = Column::new(
            name,
            color.unwrap_or_else(|| palette_color(config.columns.len()).to_string()),
        );
        column.description = description.filter(|d| !d.is_empty());

        let len = config.columns.len() as i64;
        let index = if position < 0 || position >= len {
            len
        } else {
            position
        } as usize;
        config.columns.insert(index, column.clone());
        self.boards.update(&mut config).await?;
        Ok(column)
    }

    /// Cascade delete: every card listed in the column goes with it.
    /// Returns the number of cards deleted.
    pub async fn delete_column(&self, board: &str, name: &str) -> KanResult<usize> {
        let mut config = self.boards.get(board).await?;
        let index = config
            .column_index(name)
            .ok_or_else(|| KanError::NotFound(format!("column '{name}' in board '{board}'")))?;

        let card_ids = config.columns[index].card_ids.clone();
        let mut deleted = 0;
        for id in &card_ids {
            match self.cards.delete(board, id).await {
                Ok(()) => deleted += 1,
                // A listed card without a file is a doctor finding, not a
                // reason to abort the cascade.
                Err(KanError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        config.columns.remove(index);
        if config.default_column == name {
            config.default_column = config
                .columns
                .first()
                .map(|c| c.name.clone())
                .unwrap_or_default();
        }
        self.boards.update(&mut config).await?;
        tracing::info!(board, column = name, deleted, "Deleted column");
        Ok(deleted)
    }

    pub async fn rename_column(&self, board: &str, old: &str, new: &str) -> KanResult<Column> {
        validate_column_name(new)?;
        let mut config = self.boards.get(board).await?;
        if !config.has_column(old) {
            return Err(KanError::NotFound(format!(
                "column '{old}' in board '{board}'"
            )));
        }
        if old != new && config.has_column(new) {
            return Err(KanError::AlreadyExists(format!(
                "column '{new}' in board '{board}'"
            )));
        }
        let column = config.column_mut(old).expect("checked above");
        column.name = new.to_string();
        let renamed = column.clone();
        if config.default_column == old {
            config.default_column = new.to_string();
        }
        self.boards.update(&mut config).await?;
        Ok(renamed)
    }

    pub async fn update_column_color(
        &self,
        board: &str,
        name: &str,
        color: &str,
    ) -> KanResult<Column> {
        self.edit_column(board, name, |c| c.color = color.to_string())
            .await
    }

    pub async fn update_column_description(
        &self,
        board: &str,
        name: &str,
        description: Option<String>,
    ) -> KanResult<Column> {
        self.edit_column(board, name, |c| {
            c.description = description.filter(|d| !d.is_empty())
        })
        .await
    }

    /// `limit = 0` clears.
    pub async fn update_column_limit(
        &self,
        board: &str,
        name: &str,
        limit: u32,
    ) -> KanResult<Column> {
        self.edit_column(board, name, |c| {
            c.limit = if limit == 0 { None } else { Some(limit) }
        })
        .await
    }

    pub async fn reorder_column(
        &self,
        board: &str,
        name: &str,
        target_position: i64,
    ) -> KanResult<()> {
        let mut config = self.boards.get(board).await?;
        let index = config
            .column_index(name)
            .ok_or_else(|| KanError::NotFound(format!("column '{name}' in board '{board}'")))?;
        let column = config.columns.remove(index);
        let len = config.columns.len() as i64;
        let target = if target_position < 0 || target_position > len {
            len
        } else {
            target_position
        } as usize;
        config.columns.insert(target, column);
        self.boards.update(&mut config).await?;
        Ok(())
    }

    /// Set the full column order. The supplied list must be an exact
    /// permutation of the existing names.
    pub async fn reorder_columns(&self, board: &str, names: &[String]) -> KanResult<BoardConfig> {
        let mut config = self.boards.get(board).await?;

        let mut existing: Vec<&str> = config.columns.iter().map(|c| c.name.as_str()).collect();
        let mut supplied: Vec<&str> = names.iter().map(String::as_str).collect();
        existing.sort_unstable();
        supplied.sort_unstable();
        if existing != supplied {
            return Err(KanError::Validation(format!(
                "column order must be a permutation of: {}",
                existing.join(", ")
            )));
        }

        config.columns.sort_by_key(|c| {
            names
                .iter()
                .position(|n| *n == c.name)
                .expect("permutation verified above")
        });
        self.boards.update(&mut config).await?;
        Ok(config)
    }

    async fn edit_column(
        &self,
        board: &str,
        name: &str,
        apply: impl FnOnce(&mut Column),
    ) -> KanResult<Column> {
        let mut config = self.boards.get(board).await?;
        let column = config
            .column_mut(name)
            .ok_or_else(|| KanError::NotFound(format!("column '{name}' in board '{board}'")))?;
        apply(column);
        let updated = column.clone();
        self.boards.update(&mut config).await?;
        Ok(updated)
    }
}
