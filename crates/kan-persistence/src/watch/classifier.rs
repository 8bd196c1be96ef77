use std::path::Path;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Card,
    Board,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
}

/// A classified filesystem change, ready for fan-out.
#[derive(Debug, Clone, Serialize)]
pub struct FileChange {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    pub path: String,
}

/// Classify a path relative to the data root. Depends only on path
/// components, so it is separator-independent. Returns None for paths the
/// engine does not care about.
pub fn classify(
    relative: &Path,
    change_type: ChangeType,
) -> Option<FileChange> {
    let components: Vec<&str> = relative
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();

    let path = components.join("/");
    match components.as_slice() {
        ["config.toml"] => Some(FileChange {
            change_type,
            kind: ChangeKind::Project,
            board_name: None,
            card_id: None,
            path,
        }),
        ["boards", board, "config.toml"] => Some(FileChange {
            change_type,
            kind: ChangeKind::Board,
            board_name: Some((*board).to_string()),
            card_id: None,
            path,
        }),
        ["boards", board, "cards", file] => {
            let card_id = file.strip_suffix(".json")?;
            Some(FileChange {
                change_type,
                kind: ChangeKind::Card,
                board_name: Some((*board).to_string()),
                card_id: Some(card_id.to_string()),
                path,
            })
        }
        _ => None,
    }
}

/// Temp files never reach the debouncer: hidden names and editor backups.
pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| name.starts_with('.') || name.ends_with('~'))
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_classify_card() {
        let change = classify(
            &PathBuf::from("boards/main/cards/a_00000001abc.json"),
            ChangeType::Modified,
        )
        .unwrap();
        assert_eq!(change.kind, ChangeKind::Card);
        assert_eq!(change.board_name.as_deref(), Some("main"));
        assert_eq!(change.card_id.as_deref(), Some("a_00000001abc"));
    }

    #[test]
    fn test_classify_board_and_project() {
        let change = classify(
            &PathBuf::from("boards/main/config.toml"),
            ChangeType::Created,
        )
        .unwrap();
        assert_eq!(change.kind, ChangeKind::Board);
        assert_eq!(change.board_name.as_deref(), Some("main"));

        let change = classify(&PathBuf::from("config.toml"), ChangeType::Modified).unwrap();
        assert_eq!(change.kind, ChangeKind::Project);
        assert!(change.board_name.is_none());
    }

    #[test]
    fn test_classify_unknown_dropped() {
        assert!(classify(&PathBuf::from("hooks/my-hook.sh"), ChangeType::Created).is_none());
        assert!(classify(
            &PathBuf::from("boards/main/cards/notes.txt"),
            ChangeType::Created
        )
        .is_none());
        assert!(classify(&PathBuf::from("custom-favicon.svg"), ChangeType::Created).is_none());
    }

    #[test]
    fn test_temp_files_filtered() {
        assert!(is_temp_file(&PathBuf::from("boards/main/cards/.a_x.json.swp")));
        assert!(is_temp_file(&PathBuf::from("boards/main/config.toml~")));
        assert!(!is_temp_file(&PathBuf::from("boards/main/config.toml")));
    }

    #[test]
    fn test_serialized_shape() {
        let change = classify(
            &PathBuf::from("boards/main/cards/a_x.json"),
            ChangeType::Deleted,
        )
        .unwrap();
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["type"], "deleted");
        assert_eq!(json["kind"], "card");
        assert_eq!(json["board_name"], "main");
        assert_eq!(json["card_id"], "a_x");
        assert_eq!(json["path"], "boards/main/cards/a_x.json");
    }
}
