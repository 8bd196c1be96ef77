use std::fmt;
use std::path::Path;

use crate::error::KanError;
use crate::result::KanResult;

/// Current card file version, stored as the bare integer `_v`.
pub const CARD_SCHEMA_VERSION: u32 = 1;
/// Current board config version, stored as `kan_schema = "board/N"`.
pub const BOARD_SCHEMA_VERSION: u32 = 4;
/// Current project config version, stored as `kan_schema = "project/N"`.
pub const PROJECT_SCHEMA_VERSION: u32 = 1;
/// Current global config version, stored as `kan_schema = "global/N"`.
pub const GLOBAL_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Card,
    Board,
    Project,
    Global,
}

impl SchemaKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Board => "board",
            Self::Project => "project",
            Self::Global => "global",
        }
    }

    pub fn current_version(self) -> u32 {
        match self {
            Self::Card => CARD_SCHEMA_VERSION,
            Self::Board => BOARD_SCHEMA_VERSION,
            Self::Project => PROJECT_SCHEMA_VERSION,
            Self::Global => GLOBAL_SCHEMA_VERSION,
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Format a schema tag such as `board/4`. Cards use the bare integer `_v`
/// and never go through this.
pub fn format_tag(kind: SchemaKind, version: u32) -> String {
    format!("{}/{}", kind.prefix(), version)
}

/// Parse a `type/N` schema tag, rejecting wrong prefixes, non-numeric
/// tails, and non-positive versions.
pub fn parse_tag(kind: SchemaKind, path: &Path, tag: &str) -> KanResult<u32> {
    let invalid = || KanError::InvalidSchema {
        kind,
        path: path.display().to_string(),
        found: tag.to_string(),
        expected: format_tag(kind, kind.current_version()),
    };

    let (prefix, rest) = tag.split_once('/').ok_or_else(invalid)?;
    if prefix != kind.prefix() {
        return Err(invalid());
    }
    let version: u32 = rest.parse().map_err(|_| invalid())?;
    if version == 0 {
        return Err(invalid());
    }
    Ok(version)
}

/// Minimum engine release able to read a given schema version. Used only
/// to build helpful error messages.
pub fn min_engine_for(kind: SchemaKind, version: u32) -> &'static str {
    match (kind, version) {
        (SchemaKind::Card, 1) => "0.1.0",
        (SchemaKind::Board, 1) => "0.1.0",
        (SchemaKind::Board, 2) => "0.2.0",
        (SchemaKind::Board, 3) => "0.2.5",
        (SchemaKind::Board, 4) => "0.3.0",
        (SchemaKind::Project, 1) => "0.1.0",
        (SchemaKind::Global, 1) => "0.1.0",
        _ => "a newer kan release",
    }
}

/// Check a parsed version against the current one, producing the typed
/// outdated/future errors.
pub fn check_version(kind: SchemaKind, path: &Path, found: u32) -> KanResult<()> {
    let current = kind.current_version();
    if found == current {
        return Ok(());
    }
    let found_tag = match kind {
        SchemaKind::Card => found.to_string(),
        _ => format_tag(kind, found),
    };
    if found > current {
        Err(KanError::FutureSchema {
            kind,
            path: path.display().to_string(),
            found: found_tag,
            min_engine: min_engine_for(kind, found).to_string(),
        })
    } else {
        Err(KanError::InvalidSchema {
            kind,
            path: path.display().to_string(),
            found: found_tag,
            expected: match kind {
                SchemaKind::Card => current.to_string(),
                _ => format_tag(kind, current),
            },
        })
    }
}
