use std::path::Path;

use crate::cli::BoardAction;
use crate::context;
use crate::output;

pub async fn handle(dir: &Path, action: BoardAction, json: bool) -> anyhow::Result<()> {
    let ctx = context::open(dir).await?;
    let service = ctx.board_service();

    match action {
        BoardAction::Create { name, columns } => {
            let config = service.create(&name, columns).await?;
            output::success(json, &config, || {
                let names: Vec<&str> = config.columns.iter().map(|c| c.name.as_str()).collect();
                println!("Created board '{}' with columns: {}", config.name, names.join(", "));
            });
        }
        BoardAction::List => {
            let boards = service.list().await?;
            output::success(json, &boards, || {
                for board in &boards {
                    println!("{board}");
                }
            });
        }
        BoardAction::Get { name } => {
            let config = service.get(&name).await?;
            output::success(json, &config, || {
                println!("{} ({})", config.name, config.id);
                for column in &config.columns {
                    let limit = column
                        .limit
                        .filter(|l| *l > 0)
                        .map(|l| format!(" (limit {l})"))
                        .unwrap_or_default();
                    println!("  {} [{} cards]{limit}", column.name, column.card_ids.len());
                }
            });
        }
    }
    Ok(())
}
