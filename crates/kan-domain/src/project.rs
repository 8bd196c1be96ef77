use kan_core::schema::{format_tag, PROJECT_SCHEMA_VERSION};
use kan_core::SchemaKind;
use serde::{Deserialize, Serialize};

const FAVICON_PALETTE: [&str; 6] = [
    "#6e56cf", "#0ea5e9", "#10b981", "#f59e0b", "#ef4444", "#ec4899",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconType {
    Letter,
    Emoji,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favicon {
    pub background_color: String,
    pub icon_type: IconType,
    #[serde(default)]
    pub letter: String,
    #[serde(default)]
    pub emoji: String,
}

impl Favicon {
    /// Default favicon: first alphanumeric character of the project name on
    /// a palette color picked by a stable hash of the name.
    pub fn derived_from(name: &str) -> Self {
        let letter = name
            .chars()
            .find(|c| c.is_alphanumeric())
            .map(|c| c.to_uppercase().to_string())
            .unwrap_or_else(|| "K".to_string());
        let hash: usize = name.bytes().map(|b| b as usize).sum();
        Self {
            background_color: FAVICON_PALETTE[hash % FAVICON_PALETTE.len()].to_string(),
            icon_type: IconType::Letter,
            letter,
            emoji: String::new(),
        }
    }

    pub fn to_svg(&self) -> String {
        let glyph = match self.icon_type {
            IconType::Letter => &self.letter,
            IconType::Emoji => &self.emoji,
        };
        format!(
            concat!(
                r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 32 32">"##,
                r##"<rect width="32" height="32" rx="6" fill="{bg}"/>"##,
                r##"<text x="16" y="22" font-family="sans-serif" font-size="18" "##,
                r##"text-anchor="middle" fill="#ffffff">{glyph}</text></svg>"##
            ),
            bg = self.background_color,
            glyph = glyph,
        )
    }
}

impl Default for Favicon {
    fn default() -> Self {
        Self::derived_from("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub kan_schema: String,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub favicon: Favicon,
}

impl ProjectConfig {
    pub fn new(id: String, name: String) -> Self {
        let favicon = Favicon::derived_from(&name);
        Self {
            kan_schema: format_tag(SchemaKind::Project, PROJECT_SCHEMA_VERSION),
            id,
            name,
            favicon,
        }
    }
}
