use kan_core::schema::{format_tag, CARD_SCHEMA_VERSION};
use kan_core::{KanError, KanResult, SchemaKind};
use toml::Value;

/// v0 -> v1: stamp `_v`, drop the deprecated `column` attribute. Returns
/// the stripped column name so the caller can fold it into board
/// membership.
pub fn card_v0_to_v1(card: &mut serde_json::Value) -> Option<String> {
    let Some(obj) = card.as_object_mut() else {
        return None;
    };
    obj.insert("_v".into(), serde_json::json!(CARD_SCHEMA_VERSION));
    obj.remove("column")
        .and_then(|v| v.as_str().map(String::from))
}

/// Ensure `card_id` is listed in some column of the raw board config.
/// Prefers the legacy column, falls back to `default_column`, then the
/// first column. Returns whether the config changed.
pub fn register_card(board: &mut Value, card_id: &str, legacy_column: Option<&str>) -> bool {
    let Some(columns) = board.get_mut("columns").and_then(Value::as_array_mut) else {
        return false;
    };

    let already_listed = columns.iter().any(|col| {
        col.get("card_ids")
            .and_then(Value::as_array)
            .is_some_and(|ids| ids.iter().any(|id| id.as_str() == Some(card_id)))
    });
    if already_listed {
        return false;
    }

    let default_column = board
        .get("default_column")
        .and_then(Value::as_str)
        .map(String::from);
    let columns = board
        .get_mut("columns")
        .and_then(Value::as_array_mut)
        .expect("columns checked above");

    let target = columns
        .iter()
        .position(|col| col.get("name").and_then(Value::as_str) == legacy_column)
        .or_else(|| {
            columns.iter().position(|col| {
                col.get("name").and_then(Value::as_str) == default_column.as_deref()
            })
        })
        .unwrap_or(0);

    let Some(col) = columns.get_mut(target).and_then(Value::as_table_mut) else {
        return false;
    };
    let ids = col
        .entry("card_ids")
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Some(ids) = ids.as_array_mut() {
        ids.push(Value::String(card_id.to_string()));
        return true;
    }
    false
}

/// One upward board step, `version` -> `version + 1`.
pub fn board_step(board: &mut Value, version: u32) -> KanResult<()> {
    match version {
        1 => board_v1_to_v2(board),
        // board/2 -> board/3 introduced [[pattern_hooks]]; board/3 -> board/4
        // introduced `wanted` on custom-field schemas. Both are additive:
        // only the tag moves.
        2 | 3 => {
            stamp(board, version + 1);
            Ok(())
        }
        other => Err(KanError::Internal(format!(
            "no board migration from version {other}"
        ))),
    }
}

/// board/1 -> board/2: the legacy first-class `[[labels]]` list becomes a
/// `labels` custom field of type enum-set, shown as a badge.
fn board_v1_to_v2(board: &mut Value) -> KanResult<()> {
    let labels = board
        .as_table_mut()
        .and_then(|t| t.remove("labels"))
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();

    if !labels.is_empty() {
        let options: Vec<Value> = labels
            .into_iter()
            .filter_map(|label| {
                let table = label.as_table()?;
                let mut option = toml::map::Map::new();
                let value = table
                    .get("value")
                    .or_else(|| table.get("name"))
                    .and_then(Value::as_str)?;
                option.insert("value".into(), Value::String(value.to_string()));
                if let Some(color) = table.get("color").and_then(Value::as_str) {
                    option.insert("color".into(), Value::String(color.to_string()));
                }
                Some(Value::Table(option))
            })
            .collect();

        let mut field = toml::map::Map::new();
        field.insert("type".into(), Value::String("enum-set".into()));
        field.insert("options".into(), Value::Array(options));

        let table = board
            .as_table_mut()
            .ok_or_else(|| KanError::Internal("board config is not a table".into()))?;
        let custom_fields = table
            .entry("custom_fields")
            .or_insert_with(|| Value::Table(toml::map::Map::new()));
        if let Some(custom_fields) = custom_fields.as_table_mut() {
            custom_fields
                .entry("labels")
                .or_insert(Value::Table(field));
        }

        let card_display = table
            .entry("card_display")
            .or_insert_with(|| Value::Table(toml::map::Map::new()));
        if let Some(card_display) = card_display.as_table_mut() {
            card_display
                .entry("badges")
                .or_insert_with(|| Value::Array(vec![Value::String("labels".into())]));
        }
    }

    stamp(board, 2);
    Ok(())
}

fn stamp(board: &mut Value, version: u32) {
    if let Some(table) = board.as_table_mut() {
        table.insert(
            "kan_schema".into(),
            Value::String(format_tag(SchemaKind::Board, version)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_v0_to_v1_strips_column() {
        let mut card = serde_json::json!({
            "id": "a_x",
            "title": "X",
            "column": "backlog"
        });
        let column = card_v0_to_v1(&mut card);
        assert_eq!(column.as_deref(), Some("backlog"));
        assert_eq!(card["_v"], CARD_SCHEMA_VERSION);
        assert!(card.get("column").is_none());
    }

    #[test]
    fn test_register_card_additive_safe() {
        let mut board: Value = toml::from_str(concat!(
            "default_column = \"backlog\"\n",
            "[[columns]]\n",
            "name = \"backlog\"\n",
            "card_ids = [\"a_existing\"]\n",
        ))
        .unwrap();

        assert!(!register_card(&mut board, "a_existing", Some("backlog")));
        assert!(register_card(&mut board, "a_new", Some("backlog")));
        let ids = board["columns"][0]["card_ids"].as_array().unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_register_card_falls_back_to_default_column() {
        let mut board: Value = toml::from_str(concat!(
            "default_column = \"next\"\n",
            "[[columns]]\n",
            "name = \"backlog\"\n",
            "card_ids = []\n",
            "[[columns]]\n",
            "name = \"next\"\n",
            "card_ids = []\n",
        ))
        .unwrap();

        assert!(register_card(&mut board, "a_x", Some("gone")));
        let ids = board["columns"][1]["card_ids"].as_array().unwrap();
        assert_eq!(ids[0].as_str(), Some("a_x"));
    }

    #[test]
    fn test_additive_steps_only_move_the_tag() {
        let mut board: Value = toml::from_str("kan_schema = \"board/2\"\nname = \"m\"\n").unwrap();
        board_step(&mut board, 2).unwrap();
        assert_eq!(board["kan_schema"].as_str(), Some("board/3"));
        board_step(&mut board, 3).unwrap();
        assert_eq!(board["kan_schema"].as_str(), Some("board/4"));
    }
}
