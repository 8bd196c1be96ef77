use chrono::NaiveDate;
use kan_core::{KanError, KanResult};
use serde::{Deserialize, Serialize};

/// Field-name prefixes reserved for the engine.
pub const RESERVED_FIELD_PREFIXES: [&str; 2] = ["_", "kan_"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    String,
    Enum,
    EnumSet,
    FreeSet,
    Date,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFieldSchema {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub wanted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
}

impl CustomFieldSchema {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            wanted: false,
            description: None,
            options: Vec::new(),
        }
    }

    fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }

    /// Validate a raw string value against this schema. Empty strings are
    /// accepted everywhere: they mean "clear".
    pub fn validate_value(&self, field: &str, value: &str) -> KanResult<()> {
        if value.is_empty() {
            return Ok(());
        }
        match self.field_type {
            FieldType::String | FieldType::FreeSet => Ok(()),
            FieldType::Enum => {
                if self.has_option(value) {
                    Ok(())
                } else {
                    Err(KanError::Validation(format!(
                        "'{value}' is not an option for field '{field}' (options: {})",
                        self.option_list()
                    )))
                }
            }
            FieldType::EnumSet => {
                for element in value.split(',').map(str::trim) {
                    if !self.has_option(element) {
                        return Err(KanError::Validation(format!(
                            "'{element}' is not an option for field '{field}' (options: {})",
                            self.option_list()
                        )));
                    }
                }
                Ok(())
            }
            FieldType::Date => {
                NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                    KanError::Validation(format!(
                        "field '{field}' expects an ISO-8601 date (YYYY-MM-DD), got '{value}'"
                    ))
                })?;
                Ok(())
            }
        }
    }

    fn option_list(&self) -> String {
        self.options
            .iter()
            .map(|o| o.value.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Reserved prefixes are rejected at write time.
pub fn validate_field_name(name: &str) -> KanResult<()> {
    if name.is_empty() {
        return Err(KanError::Validation("field name cannot be empty".into()));
    }
    for prefix in RESERVED_FIELD_PREFIXES {
        if name.starts_with(prefix) {
            return Err(KanError::Validation(format!(
                "field name '{name}' uses the reserved prefix '{prefix}'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enum_schema() -> CustomFieldSchema {
        CustomFieldSchema {
            field_type: FieldType::Enum,
            wanted: false,
            description: None,
            options: vec![
                FieldOption {
                    value: "feature".into(),
                    color: None,
                    description: None,
                },
                FieldOption {
                    value: "bug".into(),
                    color: None,
                    description: None,
                },
                FieldOption {
                    value: "task".into(),
                    color: None,
                    description: None,
                },
            ],
        }
    }

    #[test]
    fn test_kebab_case_tags() {
        assert_eq!(
            serde_json::to_string(&FieldType::EnumSet).unwrap(),
            "\"enum-set\""
        );
        assert_eq!(
            serde_json::to_string(&FieldType::FreeSet).unwrap(),
            "\"free-set\""
        );
        let parsed: FieldType = serde_json::from_str("\"date\"").unwrap();
        assert_eq!(parsed, FieldType::Date);
    }

    #[test]
    fn test_enum_rejects_unknown_value() {
        let schema = enum_schema();
        assert!(schema.validate_value("type", "bug").is_ok());
        assert!(schema.validate_value("type", "chore").is_err());
        assert!(schema.validate_value("type", "").is_ok());
    }

    #[test]
    fn test_enum_set_validates_each_element() {
        let mut schema = enum_schema();
        schema.field_type = FieldType::EnumSet;
        assert!(schema.validate_value("type", "bug,task").is_ok());
        assert!(schema.validate_value("type", "bug, task").is_ok());
        assert!(schema.validate_value("type", "bug,chore").is_err());
    }

    #[test]
    fn test_free_set_accepts_anything() {
        let schema = CustomFieldSchema::new(FieldType::FreeSet);
        assert!(schema.validate_value("tags", "anything,goes here").is_ok());
    }

    #[test]
    fn test_date_validation() {
        let schema = CustomFieldSchema::new(FieldType::Date);
        assert!(schema.validate_value("due", "2026-03-01").is_ok());
        assert!(schema.validate_value("due", "2026-13-01").is_err());
        assert!(schema.validate_value("due", "yesterday").is_err());
    }

    #[test]
    fn test_reserved_prefixes() {
        assert!(validate_field_name("type").is_ok());
        assert!(validate_field_name("_v").is_err());
        assert!(validate_field_name("kan_internal").is_err());
        assert!(validate_field_name("").is_err());
    }
}
