use std::path::Path;

use kan_core::KanPaths;
use kan_engine::ProjectContext;
use kan_persistence::ProjectStore;

use crate::cli::InitArgs;
use crate::context;
use crate::output;

pub async fn init(dir: &Path, args: InitArgs, json: bool) -> anyhow::Result<()> {
    let root = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    let paths = KanPaths::new(root.clone(), None);
    tokio::fs::create_dir_all(paths.boards_dir()).await?;
    tokio::fs::create_dir_all(paths.hooks_dir()).await?;

    let default_name = args.name.clone().unwrap_or_else(|| {
        root.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("kan")
            .to_string()
    });
    let project = ProjectStore::new(paths.clone())
        .ensure_initialized(&default_name)
        .await?;

    let ctx = ProjectContext::open(root.clone(), None).await?;
    let board = if ctx.boards.exists(&args.board).await {
        ctx.boards.get(&args.board).await?
    } else {
        ctx.board_service().create(&args.board, None).await?
    };

    // Registration in global config is best-effort: a missing config
    // directory must not fail init.
    if let Ok(store) = context::global_store() {
        if let Ok(mut global) = store.load_or_default().await {
            global.register_project(project.name.clone(), root.display().to_string());
            if let Err(e) = store.save(&mut global).await {
                output::warn(json, &format!("could not register project globally: {e}"));
            }
        }
    }

    output::success(
        json,
        &serde_json::json!({
            "project": project,
            "board": board.name,
        }),
        || {
            println!(
                "Initialized project '{}' with board '{}' at {}",
                project.name,
                board.name,
                paths.data_dir().display()
            );
        },
    );
    Ok(())
}
