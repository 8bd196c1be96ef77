pub mod alias;
pub mod board;
pub mod card;
pub mod column;
pub mod field_update;
pub mod fields;
pub mod global;
pub mod project;

pub use alias::{is_valid_slug, slugify};
pub use board::{BoardConfig, CardDisplay, LinkRule, PatternHookConfig};
pub use card::{Card, Comment};
pub use column::{palette_color, validate_column_name, Column};
pub use field_update::FieldUpdate;
pub use fields::{validate_field_name, CustomFieldSchema, FieldOption, FieldType};
pub use global::{GlobalConfig, RepoConfig};
pub use project::{Favicon, IconType, ProjectConfig};
