pub mod error;
pub mod id;
pub mod paths;
pub mod result;
pub mod schema;

pub use error::KanError;
pub use id::{generate_id, Entity};
pub use paths::KanPaths;
pub use result::KanResult;
pub use schema::SchemaKind;
