use std::io::Write;
use std::path::{Path, PathBuf};

use kan_core::KanPaths;
use kan_persistence::{MigrationPlan, Migrator};

use crate::context;
use crate::cli::MigrateArgs;
use crate::output;

pub async fn handle(dir: &Path, args: MigrateArgs, json: bool) -> anyhow::Result<()> {
    if args.all {
        return migrate_all(args, json).await;
    }

    let ctx = context::open(dir).await?;
    migrate_one(ctx.paths.clone(), &args, json).await
}

async fn migrate_all(args: MigrateArgs, json: bool) -> anyhow::Result<()> {
    let global = context::global_store()?.load_or_default().await?;
    if global.projects.is_empty() {
        println!("No projects registered in global config.");
        return Ok(());
    }
    for (name, path) in &global.projects {
        let root = PathBuf::from(path);
        if !root.is_dir() {
            output::warn(json, &format!("skipping '{name}': {path} does not exist"));
            continue;
        }
        if !args.yes && !confirm(&format!("Migrate project '{name}' at {path}?"))? {
            continue;
        }
        let data_location = global.data_location_for(path).map(String::from);
        migrate_one(KanPaths::new(root, data_location), &args, json).await?;
    }
    Ok(())
}

async fn migrate_one(paths: KanPaths, args: &MigrateArgs, json: bool) -> anyhow::Result<()> {
    let migrator = Migrator::new(paths);
    let plan = migrator.plan().await?;

    if !plan.has_changes() {
        output::success(json, &serde_json::json!({ "changes": false }), || {
            println!("Everything is already on the current schema versions.");
        });
        return Ok(());
    }

    if args.dry_run {
        if json {
            output::success(json, &describe(&plan), || {});
        } else {
            print_plan(&plan);
            println!("Dry run: nothing was written.");
        }
        return Ok(());
    }

    let summary = migrator.execute(&plan).await?;
    output::success(json, &summary, || {
        println!(
            "Migrated {} board(s) and {} card(s).",
            summary.boards_migrated, summary.cards_migrated
        );
    });
    Ok(())
}

fn print_plan(plan: &MigrationPlan) {
    if let Some(project) = plan.project {
        if !project.is_identity() {
            println!(
                "project config: {} -> project/{}",
                project
                    .from
                    .map(|v| format!("project/{v}"))
                    .unwrap_or_else(|| "untagged".into()),
                project.to
            );
        }
    }
    for board in &plan.boards {
        if !board.transition.is_identity() {
            println!(
                "board '{}': {} -> board/{}",
                board.board,
                board
                    .transition
                    .from
                    .map(|v| format!("board/{v}"))
                    .unwrap_or_else(|| "untagged".into()),
                board.transition.to
            );
        }
        for card in &board.cards {
            if !card.transition.is_identity() {
                println!(
                    "  card {}: _v {} -> {}{}",
                    card.id,
                    card.transition
                        .from
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "missing".into()),
                    card.transition.to,
                    if card.strip_column {
                        " (drops legacy column attribute)"
                    } else {
                        ""
                    }
                );
            }
        }
    }
}

fn describe(plan: &MigrationPlan) -> serde_json::Value {
    serde_json::json!({
        "changes": true,
        "boards": plan
            .boards
            .iter()
            .map(|b| {
                serde_json::json!({
                    "board": b.board,
                    "from": b.transition.from,
                    "to": b.transition.to,
                    "cards": b
                        .cards
                        .iter()
                        .filter(|c| !c.transition.is_identity())
                        .map(|c| serde_json::json!({
                            "id": c.id,
                            "from": c.transition.from,
                            "to": c.transition.to,
                        }))
                        .collect::<Vec<_>>(),
                })
            })
            .collect::<Vec<_>>(),
    })
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
