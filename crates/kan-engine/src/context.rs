use std::path::PathBuf;

use kan_core::{KanError, KanPaths, KanResult};
use kan_domain::ProjectConfig;
use kan_persistence::{BoardStore, CardStore, ProjectStore};

use crate::boards::BoardService;
use crate::cards::CardService;
use crate::doctor::Doctor;

/// Everything the engine needs to operate on one project: resolved paths
/// and the typed stores. Cheap to construct; services borrow it.
#[derive(Clone, Debug)]
pub struct ProjectContext {
    pub paths: KanPaths,
    pub project: ProjectConfig,
    pub cards: CardStore,
    pub boards: BoardStore,
    pub project_store: ProjectStore,
}

impl ProjectContext {
    /// Open an existing project. Fails with `NotInitialized` when the data
    /// directory is absent; otherwise runs the lenient project-config
    /// upgrade path.
    pub async fn open(root: PathBuf, data_location: Option<String>) -> KanResult<Self> {
        let paths = KanPaths::new(root, data_location);
        if !paths.is_initialized() {
            return Err(KanError::NotInitialized(
                paths.root().display().to_string(),
            ));
        }

        let project_store = ProjectStore::new(paths.clone());
        let default_name = paths
            .root()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("kan")
            .to_string();
        let project = project_store.ensure_initialized(&default_name).await?;

        Ok(Self {
            cards: CardStore::new(paths.clone()),
            boards: BoardStore::new(paths.clone()),
            project_store,
            project,
            paths,
        })
    }

    pub fn card_service(&self) -> CardService {
        CardService::new(self.cards.clone(), self.boards.clone())
    }

    pub fn board_service(&self) -> BoardService {
        BoardService::new(self.cards.clone(), self.boards.clone())
    }

    pub fn doctor(&self) -> Doctor {
        Doctor::new(self.paths.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_uninitialized_fails() {
        let dir = tempdir().unwrap();
        let err = ProjectContext::open(dir.path().to_path_buf(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, KanError::NotInitialized(_)));
    }

    #[tokio::test]
    async fn test_open_initialized_completes_project() {
        let dir = tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join(".kan"))
            .await
            .unwrap();

        let ctx = ProjectContext::open(dir.path().to_path_buf(), None)
            .await
            .unwrap();
        assert!(ctx.project.id.starts_with("p_"));
    }
}
