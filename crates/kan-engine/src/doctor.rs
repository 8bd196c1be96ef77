use std::collections::{BTreeMap, HashSet};

use kan_core::schema::{format_tag, BOARD_SCHEMA_VERSION, CARD_SCHEMA_VERSION};
use kan_core::{KanPaths, KanResult, SchemaKind};
use kan_domain::{BoardConfig, Card};
use kan_persistence::{BoardStore, CardStore, GlobalStore};
use serde::Serialize;

use crate::hooks::expand_tilde;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Issue {
    MalformedBoardConfig,
    MalformedCard,
    MissingCardFile,
    OrphanedCard,
    DuplicateCardId,
    SchemaOutdated,
    InvalidDefaultColumn,
    InvalidCardDisplay,
    InvalidLinkRule,
    InvalidPatternHook,
    MissingHookFile,
    InvalidParentRef,
    MissingWantedFields,
    MalformedGlobalConfig,
    GlobalSchemaOutdated,
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::MalformedBoardConfig => "MALFORMED_BOARD_CONFIG",
            Self::MalformedCard => "MALFORMED_CARD",
            Self::MissingCardFile => "MISSING_CARD_FILE",
            Self::OrphanedCard => "ORPHANED_CARD",
            Self::DuplicateCardId => "DUPLICATE_CARD_ID",
            Self::SchemaOutdated => "SCHEMA_OUTDATED",
            Self::InvalidDefaultColumn => "INVALID_DEFAULT_COLUMN",
            Self::InvalidCardDisplay => "INVALID_CARD_DISPLAY",
            Self::InvalidLinkRule => "INVALID_LINK_RULE",
            Self::InvalidPatternHook => "INVALID_PATTERN_HOOK",
            Self::MissingHookFile => "MISSING_HOOK_FILE",
            Self::InvalidParentRef => "INVALID_PARENT_REF",
            Self::MissingWantedFields => "MISSING_WANTED_FIELDS",
            Self::MalformedGlobalConfig => "MALFORMED_GLOBAL_CONFIG",
            Self::GlobalSchemaOutdated => "GLOBAL_SCHEMA_OUTDATED",
        };
        f.write_str(name)
    }
}

impl Issue {
    /// Errors drive exit code 1; warnings leave it at 0.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::MalformedBoardConfig
                | Self::MalformedCard
                | Self::MissingCardFile
                | Self::OrphanedCard
                | Self::DuplicateCardId
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub issue: Issue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct DoctorReport {
    pub findings: Vec<Finding>,
}

impl DoctorReport {
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.issue.is_error())
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.issue.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.issue.is_error())
    }

    fn push(&mut self, issue: Issue, board: Option<&str>, subject: Option<&str>, message: String) {
        self.findings.push(Finding {
            issue,
            board: board.map(String::from),
            subject: subject.map(String::from),
            message,
        });
    }
}

#[derive(Debug, Default, Serialize)]
pub struct FixSummary {
    pub orphans_placed: usize,
    pub dangling_removed: usize,
    pub duplicates_removed: usize,
    pub default_columns_reset: usize,
    pub card_display_refs_cleared: usize,
    pub parent_refs_cleared: usize,
}

impl FixSummary {
    pub fn total(&self) -> usize {
        self.orphans_placed
            + self.dangling_removed
            + self.duplicates_removed
            + self.default_columns_reset
            + self.card_display_refs_cleared
            + self.parent_refs_cleared
    }
}

/// Read-only consistency audit over one project, with an optional
/// deterministic fixer. Never fails the process for scanned content:
/// malformed files become findings.
pub struct Doctor {
    paths: KanPaths,
    global: Option<GlobalStore>,
}

impl Doctor {
    pub fn new(paths: KanPaths) -> Self {
        Self {
            paths,
            global: None,
        }
    }

    pub fn with_global(mut self, global: GlobalStore) -> Self {
        self.global = Some(global);
        self
    }

    pub async fn audit(&self) -> KanResult<DoctorReport> {
        let mut report = DoctorReport::default();

        if let Some(global) = &self.global {
            self.audit_global(global, &mut report).await;
        }

        let boards_dir = self.paths.boards_dir();
        if !tokio::fs::try_exists(&boards_dir).await? {
            return Ok(report);
        }
        let mut boards = Vec::new();
        let mut entries = tokio::fs::read_dir(&boards_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    boards.push(name.to_string());
                }
            }
        }
        boards.sort();

        for board in &boards {
            self.audit_board(board, &mut report).await?;
        }
        Ok(report)
    }

    async fn audit_global(&self, global: &GlobalStore, report: &mut DoctorReport) {
        let path = global.path().to_path_buf();
        if !path.exists() {
            return;
        }
        let Ok(text) = tokio::fs::read_to_string(&path).await else {
            report.push(
                Issue::MalformedGlobalConfig,
                None,
                None,
                format!("cannot read {}", path.display()),
            );
            return;
        };
        let value: toml::Value = match toml::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                report.push(
                    Issue::MalformedGlobalConfig,
                    None,
                    None,
                    format!("{}: {e}", path.display()),
                );
                return;
            }
        };
        let current = format_tag(SchemaKind::Global, SchemaKind::Global.current_version());
        match value.get("kan_schema").and_then(|v| v.as_str()) {
            Some(tag) if tag == current => {}
            Some(tag) => report.push(
                Issue::GlobalSchemaOutdated,
                None,
                None,
                format!("global config has schema {tag}, current is {current}"),
            ),
            None => report.push(
                Issue::GlobalSchemaOutdated,
                None,
                None,
                "global config has no schema tag".into(),
            ),
        }
    }

    async fn audit_board(&self, board: &str, report: &mut DoctorReport) -> KanResult<()> {
        let config_path = self.paths.board_config(board);
        let text = match tokio::fs::read_to_string(&config_path).await {
            Ok(t) => t,
            Err(e) => {
                report.push(
                    Issue::MalformedBoardConfig,
                    Some(board),
                    None,
                    format!("cannot read {}: {e}", config_path.display()),
                );
                return Ok(());
            }
        };
        let value: toml::Value = match toml::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                report.push(
                    Issue::MalformedBoardConfig,
                    Some(board),
                    None,
                    format!("invalid TOML: {e}"),
                );
                return Ok(());
            }
        };

        let current = format_tag(SchemaKind::Board, BOARD_SCHEMA_VERSION);
        let schema_current = match value.get("kan_schema").and_then(|v| v.as_str()) {
            Some(tag) if tag == current => true,
            Some(tag) => {
                report.push(
                    Issue::SchemaOutdated,
                    Some(board),
                    None,
                    format!("board config has schema {tag}, current is {current}"),
                );
                false
            }
            None => {
                report.push(
                    Issue::SchemaOutdated,
                    Some(board),
                    None,
                    "board config has no schema tag".into(),
                );
                false
            }
        };

        let config: BoardConfig = match value.try_into() {
            Ok(c) => c,
            Err(e) => {
                if schema_current {
                    report.push(
                        Issue::MalformedBoardConfig,
                        Some(board),
                        None,
                        format!("config does not parse: {e}"),
                    );
                }
                return Ok(());
            }
        };

        let (cards, present) = self.scan_cards(board, report).await?;
        self.check_membership(board, &config, &present, report);
        self.check_config_refs(board, &config, report);
        self.check_cards(board, &config, &cards, report);
        Ok(())
    }

    /// Lenient card scan: malformed and outdated files become findings.
    /// Returns the parseable current-version cards plus the full set of
    /// IDs that have a file at all (membership checks must not confuse an
    /// outdated file with a missing one).
    async fn scan_cards(
        &self,
        board: &str,
        report: &mut DoctorReport,
    ) -> KanResult<(BTreeMap<String, Card>, HashSet<String>)> {
        let mut cards = BTreeMap::new();
        let mut present = HashSet::new();
        let dir = self.paths.cards_dir(board);
        if !tokio::fs::try_exists(&dir).await? {
            return Ok((cards, present));
        }
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
                continue;
            };
            present.insert(id.clone());
            let bytes = match tokio::fs::read(&path).await {
                Ok(b) => b,
                Err(e) => {
                    report.push(
                        Issue::MalformedCard,
                        Some(board),
                        Some(&id),
                        format!("cannot read card file: {e}"),
                    );
                    continue;
                }
            };
            let value: serde_json::Value = match serde_json::from_slice(&bytes) {
                Ok(v) => v,
                Err(e) => {
                    report.push(
                        Issue::MalformedCard,
                        Some(board),
                        Some(&id),
                        format!("invalid JSON: {e}"),
                    );
                    continue;
                }
            };
            match value.get("_v").and_then(|v| v.as_u64()) {
                Some(v) if v as u32 == CARD_SCHEMA_VERSION => {}
                Some(v) => {
                    report.push(
                        Issue::SchemaOutdated,
                        Some(board),
                        Some(&id),
                        format!("card has _v {v}, current is {CARD_SCHEMA_VERSION}"),
                    );
                    continue;
                }
                None => {
                    report.push(
                        Issue::SchemaOutdated,
                        Some(board),
                        Some(&id),
                        "card has no _v tag".into(),
                    );
                    continue;
                }
            }
            match serde_json::from_value::<Card>(value) {
                Ok(card) => {
                    cards.insert(id, card);
                }
                Err(e) => {
                    report.push(
                        Issue::MalformedCard,
                        Some(board),
                        Some(&id),
                        format!("card does not parse: {e}"),
                    );
                }
            }
        }
        Ok((cards, present))
    }

    fn check_membership(
        &self,
        board: &str,
        config: &BoardConfig,
        present: &HashSet<String>,
        report: &mut DoctorReport,
    ) {
        let mut seen: HashSet<&str> = HashSet::new();
        for column in &config.columns {
            for id in &column.card_ids {
                if !seen.insert(id.as_str()) {
                    report.push(
                        Issue::DuplicateCardId,
                        Some(board),
                        Some(id),
                        format!("card listed more than once (again in column '{}')", column.name),
                    );
                    continue;
                }
                if !present.contains(id) {
                    report.push(
                        Issue::MissingCardFile,
                        Some(board),
                        Some(id),
                        format!("column '{}' lists a card with no file", column.name),
                    );
                }
            }
        }
        for id in present {
            if !seen.contains(id.as_str()) {
                report.push(
                    Issue::OrphanedCard,
                    Some(board),
                    Some(id),
                    "card file exists but no column lists it".into(),
                );
            }
        }
    }

    fn check_config_refs(&self, board: &str, config: &BoardConfig, report: &mut DoctorReport) {
        if !config.default_column.is_empty() && !config.has_column(&config.default_column) {
            report.push(
                Issue::InvalidDefaultColumn,
                Some(board),
                Some(&config.default_column),
                format!("default column '{}' does not exist", config.default_column),
            );
        }

        if let Some(display) = &config.card_display {
            let mut refs: Vec<&String> = display.badges.iter().collect();
            refs.extend(display.metadata.iter());
            if let Some(indicator) = &display.type_indicator {
                refs.push(indicator);
            }
            for field in refs {
                if !config.custom_fields.contains_key(field) {
                    report.push(
                        Issue::InvalidCardDisplay,
                        Some(board),
                        Some(field),
                        format!("card_display references undefined field '{field}'"),
                    );
                }
            }
        }

        for rule in &config.link_rules {
            if let Err(e) = regex::Regex::new(&rule.pattern) {
                report.push(
                    Issue::InvalidLinkRule,
                    Some(board),
                    Some(&rule.name),
                    format!("pattern does not compile: {e}"),
                );
            }
        }

        for hook in &config.pattern_hooks {
            if let Err(e) = regex::Regex::new(&hook.pattern_title) {
                report.push(
                    Issue::InvalidPatternHook,
                    Some(board),
                    Some(&hook.name),
                    format!("pattern_title does not compile: {e}"),
                );
            }
            let command = expand_tilde(&hook.command);
            if !std::path::Path::new(&command).exists() {
                report.push(
                    Issue::MissingHookFile,
                    Some(board),
                    Some(&hook.name),
                    format!("command '{}' does not exist", hook.command),
                );
            }
        }
    }

    fn check_cards(
        &self,
        board: &str,
        config: &BoardConfig,
        cards: &BTreeMap<String, Card>,
        report: &mut DoctorReport,
    ) {
        for (id, card) in cards {
            if let Some(parent) = &card.parent {
                // Cross-board parents are opaque; only same-board refs are
                // validated.
                if !cards.contains_key(parent) {
                    report.push(
                        Issue::InvalidParentRef,
                        Some(board),
                        Some(id),
                        format!("parent '{parent}' not found in this board"),
                    );
                }
            }
            let missing: Vec<&str> = config
                .custom_fields
                .iter()
                .filter(|(name, schema)| {
                    schema.wanted && card.fields.get(*name).map_or(true, |v| v.is_empty())
                })
                .map(|(name, _)| name.as_str())
                .collect();
            if !missing.is_empty() {
                report.push(
                    Issue::MissingWantedFields,
                    Some(board),
                    Some(id),
                    format!("missing wanted fields: {}", missing.join(", ")),
                );
            }
        }
    }

    /// Resolve the deterministic subset of findings. Returns what changed.
    pub async fn fix(&self) -> KanResult<FixSummary> {
        let mut summary = FixSummary::default();
        let boards = BoardStore::new(self.paths.clone());
        let cards_store = CardStore::new(self.paths.clone());

        for board in boards.list().await? {
            let Ok(mut config) = boards.get(&board).await else {
                // Malformed or outdated configs are migrate/by-hand work.
                continue;
            };
            let mut dirty = false;

            let card_ids: HashSet<String> = {
                let mut ids = HashSet::new();
                let dir = self.paths.cards_dir(&board);
                if tokio::fs::try_exists(&dir).await? {
                    let mut entries = tokio::fs::read_dir(&dir).await?;
                    while let Some(entry) = entries.next_entry().await? {
                        let path = entry.path();
                        if path.extension().and_then(|e| e.to_str()) == Some("json") {
                            if let Some(id) = path.file_stem().and_then(|s| s.to_str()) {
                                ids.insert(id.to_string());
                            }
                        }
                    }
                }
                ids
            };

            // Dedupe (keep first occurrence) and drop dangling IDs.
            let mut seen: HashSet<String> = HashSet::new();
            for column in &mut config.columns {
                let before = column.card_ids.len();
                column.card_ids.retain(|id| {
                    if !card_ids.contains(id) {
                        summary.dangling_removed += 1;
                        return false;
                    }
                    if !seen.insert(id.clone()) {
                        summary.duplicates_removed += 1;
                        return false;
                    }
                    true
                });
                dirty |= column.card_ids.len() != before;
            }

            // Orphans land at the end of the default column.
            let orphans: Vec<String> = card_ids
                .iter()
                .filter(|id| !seen.contains(*id))
                .cloned()
                .collect();
            if !orphans.is_empty() {
                if let Some(default) = config.effective_default_column().map(String::from) {
                    let mut sorted = orphans;
                    sorted.sort();
                    for id in sorted {
                        config.add_card_to_column(&id, &default)?;
                        summary.orphans_placed += 1;
                    }
                    dirty = true;
                }
            }

            if !config.default_column.is_empty() && !config.has_column(&config.default_column) {
                config.default_column = config
                    .columns
                    .first()
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                summary.default_columns_reset += 1;
                dirty = true;
            }

            if let Some(display) = &mut config.card_display {
                let fields = &config.custom_fields;
                let before = display.badges.len() + display.metadata.len();
                display.badges.retain(|f| fields.contains_key(f));
                display.metadata.retain(|f| fields.contains_key(f));
                let mut cleared = before - (display.badges.len() + display.metadata.len());
                if display
                    .type_indicator
                    .as_ref()
                    .is_some_and(|f| !fields.contains_key(f))
                {
                    display.type_indicator = None;
                    cleared += 1;
                }
                if cleared > 0 {
                    summary.card_display_refs_cleared += cleared;
                    dirty = true;
                }
            }

            if dirty {
                boards.update(&mut config).await?;
            }

            // Clear parent refs that do not resolve within the board.
            // Boards with unreadable cards keep theirs until migration.
            let Ok(card_list) = cards_store.list(&board).await else {
                continue;
            };
            for card in card_list {
                if let Some(parent) = card.parent.clone() {
                    if !card_ids.contains(&parent) {
                        let mut card = card;
                        card.parent = None;
                        cards_store.update(&board, &mut card).await?;
                        summary.parent_refs_cleared += 1;
                    }
                }
            }
        }

        Ok(summary)
    }
}
