use kan_core::{KanError, KanResult};
use serde::{Deserialize, Serialize};

/// Palette cycled by column index when no color is supplied.
pub const COLUMN_PALETTE: [&str; 8] = [
    "#6e56cf", "#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6", "#14b8a6", "#64748b",
];

pub fn palette_color(index: usize) -> &'static str {
    COLUMN_PALETTE[index % COLUMN_PALETTE.len()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default)]
    pub card_ids: Vec<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            description: None,
            limit: None,
            card_ids: Vec::new(),
        }
    }

    /// A limit of 0 or absent means unlimited.
    pub fn is_full(&self) -> bool {
        match self.limit {
            Some(limit) if limit > 0 => self.card_ids.len() >= limit as usize,
            _ => false,
        }
    }

    pub fn contains_card(&self, card_id: &str) -> bool {
        self.card_ids.iter().any(|id| id == card_id)
    }
}

/// Column names are lowercase alphanumeric with hyphens, non-empty.
pub fn validate_column_name(name: &str) -> KanResult<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(KanError::Validation(format!(
            "invalid column name '{name}': use lowercase letters, digits, and hyphens"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_column_name() {
        assert!(validate_column_name("in-progress").is_ok());
        assert!(validate_column_name("backlog2").is_ok());
        assert!(validate_column_name("").is_err());
        assert!(validate_column_name("In Progress").is_err());
        assert!(validate_column_name("done!").is_err());
    }

    #[test]
    fn test_limit_semantics() {
        let mut col = Column::new("next", "#fff");
        assert!(!col.is_full());
        col.limit = Some(0);
        assert!(!col.is_full());
        col.limit = Some(1);
        col.card_ids.push("a_x".into());
        assert!(col.is_full());
    }

    #[test]
    fn test_palette_cycles() {
        assert_eq!(palette_color(0), COLUMN_PALETTE[0]);
        assert_eq!(palette_color(8), COLUMN_PALETTE[0]);
        assert_eq!(palette_color(9), COLUMN_PALETTE[1]);
    }
}
