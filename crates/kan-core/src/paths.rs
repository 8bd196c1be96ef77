use std::path::{Path, PathBuf};

/// Default data directory relative to the project root.
pub const DEFAULT_DATA_LOCATION: &str = ".kan";

/// Resolves every on-disk path for one project. The data location is
/// always treated as relative to the project root.
#[derive(Debug, Clone)]
pub struct KanPaths {
    root: PathBuf,
    data_location: String,
}

impl KanPaths {
    pub fn new(root: impl Into<PathBuf>, data_location: Option<String>) -> Self {
        Self {
            root: root.into(),
            data_location: data_location.unwrap_or_else(|| DEFAULT_DATA_LOCATION.to_string()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(&self.data_location)
    }

    pub fn project_config(&self) -> PathBuf {
        self.data_dir().join("config.toml")
    }

    pub fn boards_dir(&self) -> PathBuf {
        self.data_dir().join("boards")
    }

    pub fn board_dir(&self, board: &str) -> PathBuf {
        self.boards_dir().join(board)
    }

    pub fn board_config(&self, board: &str) -> PathBuf {
        self.board_dir(board).join("config.toml")
    }

    pub fn cards_dir(&self, board: &str) -> PathBuf {
        self.board_dir(board).join("cards")
    }

    pub fn card_file(&self, board: &str, card_id: &str) -> PathBuf {
        self.cards_dir(board).join(format!("{card_id}.json"))
    }

    pub fn hooks_dir(&self) -> PathBuf {
        self.data_dir().join("hooks")
    }

    pub fn custom_favicon(&self) -> PathBuf {
        self.data_dir().join("custom-favicon.svg")
    }

    pub fn is_initialized(&self) -> bool {
        self.data_dir().is_dir()
    }
}

/// Global config lives under the platform config directory.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir().map(|home| home.join(".config/kan/config.toml"))
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::config_dir().map(|config| config.join("kan").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let paths = KanPaths::new("/repo", None);
        assert_eq!(paths.project_config(), PathBuf::from("/repo/.kan/config.toml"));
        assert_eq!(
            paths.board_config("main"),
            PathBuf::from("/repo/.kan/boards/main/config.toml")
        );
        assert_eq!(
            paths.card_file("main", "a_00000001abc"),
            PathBuf::from("/repo/.kan/boards/main/cards/a_00000001abc.json")
        );
        assert_eq!(paths.hooks_dir(), PathBuf::from("/repo/.kan/hooks"));
    }

    #[test]
    fn test_data_location_override() {
        let paths = KanPaths::new("/repo", Some("data/kan".to_string()));
        assert_eq!(
            paths.project_config(),
            PathBuf::from("/repo/data/kan/config.toml")
        );
    }
}
