use std::path::Path;

use kan_engine::ProjectContext;
use kan_persistence::GlobalStore;

/// Open the project at `dir`, honoring any data-location override the
/// global config records for that path.
pub async fn open(dir: &Path) -> anyhow::Result<ProjectContext> {
    let root = dir
        .canonicalize()
        .unwrap_or_else(|_| dir.to_path_buf());
    let data_location = match global_store() {
        Ok(store) => store
            .load_or_default()
            .await
            .ok()
            .and_then(|g| {
                g.data_location_for(&root.display().to_string())
                    .map(String::from)
            }),
        Err(_) => None,
    };
    Ok(ProjectContext::open(root, data_location).await?)
}

pub fn global_store() -> anyhow::Result<GlobalStore> {
    Ok(GlobalStore::at_default_location()?)
}

pub fn creator() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
