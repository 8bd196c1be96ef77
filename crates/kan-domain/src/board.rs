use std::collections::BTreeMap;

use kan_core::schema::{format_tag, BOARD_SCHEMA_VERSION};
use kan_core::{KanError, KanResult, SchemaKind};
use serde::{Deserialize, Serialize};

use crate::column::{palette_color, Column};
use crate::fields::CustomFieldSchema;

/// Default hook timeout in seconds.
pub const DEFAULT_HOOK_TIMEOUT_SECS: u64 = 30;

fn default_hook_timeout() -> u64 {
    DEFAULT_HOOK_TIMEOUT_SECS
}

/// Board configuration, one TOML file per board directory. The `card_ids`
/// lists inside `columns` are the single source of truth for column
/// membership; cards carry no column attribute of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    pub kan_schema: String,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub default_column: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_fields: BTreeMap<String, CustomFieldSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_display: Option<CardDisplay>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link_rules: Vec<LinkRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pattern_hooks: Vec<PatternHookConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardDisplay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_indicator: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub badges: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<String>,
}

/// Presentational URL rule: `{0}` is the full match, `{N}` capture group N,
/// `{N!raw}` the same without URL encoding. Applied by presenters only; the
/// engine just checks that the pattern compiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRule {
    pub name: String,
    pub pattern: String,
    pub template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternHookConfig {
    pub name: String,
    pub pattern_title: String,
    pub command: String,
    #[serde(default = "default_hook_timeout")]
    pub timeout_secs: u64,
}

impl BoardConfig {
    pub fn new(id: String, name: String, column_names: &[&str]) -> Self {
        let columns: Vec<Column> = column_names
            .iter()
            .enumerate()
            .map(|(i, n)| Column::new(*n, palette_color(i)))
            .collect();
        let default_column = columns.first().map(|c| c.name.clone()).unwrap_or_default();
        Self {
            kan_schema: format_tag(SchemaKind::Board, BOARD_SCHEMA_VERSION),
            id,
            name,
            default_column,
            columns,
            custom_fields: BTreeMap::new(),
            card_display: None,
            link_rules: Vec::new(),
            pattern_hooks: Vec::new(),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// The column new cards land in: `default_column` when it names an
    /// existing column, otherwise the first column.
    pub fn effective_default_column(&self) -> Option<&str> {
        if !self.default_column.is_empty() && self.has_column(&self.default_column) {
            return Some(self.default_column.as_str());
        }
        self.columns.first().map(|c| c.name.as_str())
    }

    /// The column currently listing this card, if any.
    pub fn card_column(&self, card_id: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.contains_card(card_id))
            .map(|c| c.name.as_str())
    }

    /// Append a card to a column's list.
    pub fn add_card_to_column(&mut self, card_id: &str, column: &str) -> KanResult<()> {
        self.move_card_to_column_at(card_id, column, -1)
    }

    /// Place a card in a column at `position`; -1 or past the end appends.
    /// Removes the ID from every other column first. Idempotent when the
    /// card is already at the requested slot.
    pub fn move_card_to_column_at(
        &mut self,
        card_id: &str,
        column: &str,
        position: i64,
    ) -> KanResult<()> {
        if !self.has_column(column) {
            return Err(KanError::NotFound(format!(
                "column '{column}' in board '{}'",
                self.name
            )));
        }
        for col in &mut self.columns {
            col.card_ids.retain(|id| id != card_id);
        }
        let col = self
            .column_mut(column)
            .expect("column existence checked above");
        let len = col.card_ids.len() as i64;
        let index = if position < 0 || position >= len {
            len
        } else {
            position
        } as usize;
        col.card_ids.insert(index, card_id.to_string());
        Ok(())
    }

    /// Drop a card ID from whatever column lists it. Returns whether
    /// anything was removed.
    pub fn remove_card(&mut self, card_id: &str) -> bool {
        let mut removed = false;
        for col in &mut self.columns {
            let before = col.card_ids.len();
            col.card_ids.retain(|id| id != card_id);
            removed |= col.card_ids.len() != before;
        }
        removed
    }

    /// All card IDs in column order.
    pub fn all_card_ids(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .flat_map(|c| c.card_ids.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> BoardConfig {
        BoardConfig::new(
            "b_00000001abc".into(),
            "main".into(),
            &["backlog", "next", "in-progress", "done"],
        )
    }

    #[test]
    fn test_new_board_defaults() {
        let b = board();
        assert_eq!(b.kan_schema, "board/4");
        assert_eq!(b.default_column, "backlog");
        assert_eq!(b.columns.len(), 4);
        assert!(b.columns.iter().all(|c| c.card_ids.is_empty()));
    }

    #[test]
    fn test_move_card_removes_from_previous_column() {
        let mut b = board();
        b.add_card_to_column("a_1", "backlog").unwrap();
        b.add_card_to_column("a_2", "backlog").unwrap();
        b.move_card_to_column_at("a_1", "done", -1).unwrap();

        assert_eq!(b.card_column("a_1"), Some("done"));
        assert_eq!(b.column("backlog").unwrap().card_ids, vec!["a_2"]);
    }

    #[test]
    fn test_move_card_position_clamped() {
        let mut b = board();
        b.add_card_to_column("a_1", "next").unwrap();
        b.add_card_to_column("a_2", "next").unwrap();
        b.move_card_to_column_at("a_3", "next", 99).unwrap();
        assert_eq!(b.column("next").unwrap().card_ids, vec!["a_1", "a_2", "a_3"]);

        b.move_card_to_column_at("a_3", "next", 0).unwrap();
        assert_eq!(b.column("next").unwrap().card_ids, vec!["a_3", "a_1", "a_2"]);
    }

    #[test]
    fn test_move_to_missing_column_fails() {
        let mut b = board();
        assert!(b.move_card_to_column_at("a_1", "nope", -1).is_err());
    }

    #[test]
    fn test_effective_default_column_falls_back_to_first() {
        let mut b = board();
        b.default_column = "gone".into();
        assert_eq!(b.effective_default_column(), Some("backlog"));
        b.default_column = String::new();
        assert_eq!(b.effective_default_column(), Some("backlog"));
        b.default_column = "done".into();
        assert_eq!(b.effective_default_column(), Some("done"));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut b = board();
        b.add_card_to_column("a_00000001abc", "backlog").unwrap();
        b.custom_fields.insert(
            "type".into(),
            crate::fields::CustomFieldSchema::new(crate::fields::FieldType::Enum),
        );
        b.pattern_hooks.push(PatternHookConfig {
            name: "jira".into(),
            pattern_title: r"^[A-Z]+-\d+$".into(),
            command: "~/hooks/jira.sh".into(),
            timeout_secs: 30,
        });

        let text = toml::to_string_pretty(&b).unwrap();
        let parsed: BoardConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.name, "main");
        assert_eq!(parsed.column("backlog").unwrap().card_ids, vec!["a_00000001abc"]);
        assert_eq!(parsed.pattern_hooks[0].timeout_secs, 30);
    }

    #[test]
    fn test_hook_timeout_defaults_to_30() {
        let text = r#"
            kan_schema = "board/4"
            id = "b_x"
            name = "main"
            default_column = ""

            [[pattern_hooks]]
            name = "jira"
            pattern_title = "^JIRA"
            command = "/tmp/h.sh"
        "#;
        let parsed: BoardConfig = toml::from_str(text).unwrap();
        assert_eq!(parsed.pattern_hooks[0].timeout_secs, 30);
    }
}
