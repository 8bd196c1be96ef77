use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kan")]
#[command(about = "A local, file-based kanban system", long_about = None)]
#[command(version, arg_required_else_help = true)]
pub struct Cli {
    /// Project root (defaults to the current directory)
    #[arg(long, global = true, default_value = ".", env = "KAN_DIR")]
    pub dir: PathBuf,

    /// Emit machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a .kan project in the current directory
    Init(InitArgs),
    /// Board operations
    Board(BoardCommand),
    /// Column operations
    Column(ColumnCommand),
    /// Card operations
    Card(CardCommand),
    /// Comment operations
    Comment(CommentCommand),
    /// Upgrade on-disk files to the current schema versions
    Migrate(MigrateArgs),
    /// Audit project consistency (exit 1 on errors)
    Doctor(DoctorArgs),
    /// Serve the HTTP/WebSocket API
    Serve(ServeArgs),
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args)]
pub struct InitArgs {
    /// Project display name (defaults to the directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Name of the initial board
    #[arg(long, default_value = "main")]
    pub board: String,
}

#[derive(Args)]
pub struct BoardCommand {
    #[command(subcommand)]
    pub action: BoardAction,
}

#[derive(Subcommand)]
pub enum BoardAction {
    /// Create a new board
    Create {
        name: String,
        /// Comma-separated column names (defaults to backlog,next,in-progress,done)
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,
    },
    /// List boards
    List,
    /// Show a board's configuration
    Get { name: String },
}

#[derive(Args)]
pub struct ColumnCommand {
    #[command(subcommand)]
    pub action: ColumnAction,
}

#[derive(Subcommand)]
pub enum ColumnAction {
    /// Add a column to a board
    Add {
        board: String,
        name: String,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Insert position (appends when omitted)
        #[arg(long, default_value_t = -1)]
        position: i64,
    },
    /// Delete a column and every card in it
    Delete { board: String, name: String },
    /// Rename a column
    Rename {
        board: String,
        old: String,
        new: String,
    },
    /// Change a column's color
    Color {
        board: String,
        name: String,
        color: String,
    },
    /// Set a column's card limit (0 clears)
    Limit {
        board: String,
        name: String,
        limit: u32,
    },
    /// Move a column to a position
    Reorder {
        board: String,
        name: String,
        position: i64,
    },
    /// Set the full column order (must be a permutation)
    Order {
        board: String,
        #[arg(value_delimiter = ',')]
        names: Vec<String>,
    },
}

#[derive(Args)]
pub struct CardCommand {
    #[command(subcommand)]
    pub action: CardAction,
}

#[derive(Subcommand)]
pub enum CardAction {
    /// Create a card
    Add {
        board: String,
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        column: Option<String>,
        #[arg(long)]
        parent: Option<String>,
        /// Custom field values as name=value (repeatable)
        #[arg(long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
        /// Fail on missing wanted fields instead of warning
        #[arg(long)]
        strict: bool,
    },
    /// Show a card by ID or alias
    Get { board: String, id: String },
    /// List cards in board order
    List {
        board: String,
        #[arg(long)]
        column: Option<String>,
    },
    /// Edit a card (partial)
    Edit {
        board: String,
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// New description (empty string clears)
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        column: Option<String>,
        /// New parent card ID (empty string clears)
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        alias: Option<String>,
        #[arg(long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
        #[arg(long)]
        strict: bool,
    },
    /// Move a card to a column
    Move {
        board: String,
        id: String,
        column: String,
        /// Target position (appends when omitted)
        #[arg(long, default_value_t = -1)]
        position: i64,
    },
    /// Delete a card
    Delete { board: String, id: String },
}

#[derive(Args)]
pub struct CommentCommand {
    #[command(subcommand)]
    pub action: CommentAction,
}

#[derive(Subcommand)]
pub enum CommentAction {
    /// Add a comment to a card
    Add {
        board: String,
        card: String,
        body: String,
        #[arg(long)]
        author: Option<String>,
    },
    /// Edit a comment
    Edit {
        board: String,
        comment_id: String,
        body: String,
    },
    /// Delete a comment
    Delete { board: String, comment_id: String },
}

#[derive(Args)]
pub struct MigrateArgs {
    /// Print the plan without writing anything
    #[arg(long)]
    pub dry_run: bool,
    /// Migrate every project registered in global config
    #[arg(long)]
    pub all: bool,
    /// Skip per-project confirmation prompts
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct DoctorArgs {
    /// Apply the deterministic fixes
    #[arg(long)]
    pub fix: bool,
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long, default_value_t = 7325)]
    pub port: u16,
}

/// Parse repeatable `name=value` field arguments.
pub fn parse_fields(raw: &[String]) -> anyhow::Result<std::collections::BTreeMap<String, String>> {
    let mut fields = std::collections::BTreeMap::new();
    for item in raw {
        let (name, value) = item
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("invalid --field '{item}': expected NAME=VALUE"))?;
        fields.insert(name.to_string(), value.to_string());
    }
    Ok(fields)
}
