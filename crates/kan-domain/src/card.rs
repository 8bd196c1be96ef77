use std::collections::BTreeMap;

use chrono::Utc;
use kan_core::schema::CARD_SCHEMA_VERSION;
use serde::{Deserialize, Serialize};

/// One card, one JSON file on disk. Custom-field values are flattened into
/// the top-level object; the authoritative column is the board config and
/// is never serialized here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    #[serde(rename = "_v")]
    pub schema_version: u32,
    pub id: String,
    pub alias: String,
    #[serde(default)]
    pub alias_explicit: bool,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub creator: String,
    pub created_at_millis: i64,
    pub updated_at_millis: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
    /// Derived view joined in from board config at read time; never part
    /// of the card file.
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl Card {
    pub fn new(id: String, alias: String, title: String, creator: String) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            schema_version: CARD_SCHEMA_VERSION,
            id,
            alias,
            alias_explicit: false,
            title,
            description: None,
            parent: None,
            creator,
            created_at_millis: now,
            updated_at_millis: now,
            comments: Vec::new(),
            fields: BTreeMap::new(),
            column: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at_millis = Utc::now().timestamp_millis();
    }

    pub fn comment(&self, comment_id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == comment_id)
    }

    pub fn comment_mut(&mut self, comment_id: &str) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == comment_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub body: String,
    pub author: String,
    pub created_at_millis: i64,
    pub updated_at_millis: i64,
}

impl Comment {
    pub fn new(id: String, body: String, author: String) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id,
            body,
            author,
            created_at_millis: now,
            updated_at_millis: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_fields_flatten_to_top_level() {
        let mut card = Card::new(
            "a_00000001abc".into(),
            "fix-login-bug".into(),
            "Fix login bug".into(),
            "alice".into(),
        );
        card.fields.insert("type".into(), "bug".into());

        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["type"], "bug");
        assert!(json.get("fields").is_none());
        assert_eq!(json["_v"], CARD_SCHEMA_VERSION);
    }

    #[test]
    fn test_column_dropped_on_round_trip() {
        let mut card = Card::new("a_x".into(), "x".into(), "X".into(), "bob".into());
        card.column = Some("done".into());
        // The derived column attribute still shows up for API consumers...
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["column"], "done");
        // ...but a file round-trip never resurrects it.
        let parsed: Card = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.column, None);
    }

    #[test]
    fn test_flattened_fields_round_trip() {
        let raw = r#"{
            "_v": 1,
            "id": "a_00000001abc",
            "alias": "x",
            "alias_explicit": false,
            "title": "X",
            "creator": "alice",
            "created_at_millis": 1,
            "updated_at_millis": 1,
            "type": "bug",
            "labels": "ui,auth"
        }"#;
        let card: Card = serde_json::from_str(raw).unwrap();
        assert_eq!(card.fields.get("type").map(String::as_str), Some("bug"));
        assert_eq!(card.fields.get("labels").map(String::as_str), Some("ui,auth"));
        assert!(card.comments.is_empty());
    }
}
