use std::path::Path;

use crate::cli::ColumnAction;
use crate::context;
use crate::output;

pub async fn handle(dir: &Path, action: ColumnAction, json: bool) -> anyhow::Result<()> {
    let ctx = context::open(dir).await?;
    let service = ctx.board_service();

    match action {
        ColumnAction::Add {
            board,
            name,
            color,
            description,
            position,
        } => {
            let column = service
                .add_column(&board, &name, color, description, position)
                .await?;
            output::success(json, &column, || {
                println!("Added column '{}' to board '{board}'", column.name);
            });
        }
        ColumnAction::Delete { board, name } => {
            let deleted = service.delete_column(&board, &name).await?;
            output::success(json, &serde_json::json!({ "deleted_cards": deleted }), || {
                println!("Deleted column '{name}' and {deleted} card(s)");
            });
        }
        ColumnAction::Rename { board, old, new } => {
            let column = service.rename_column(&board, &old, &new).await?;
            output::success(json, &column, || {
                println!("Renamed column '{old}' to '{new}'");
            });
        }
        ColumnAction::Color { board, name, color } => {
            let column = service.update_column_color(&board, &name, &color).await?;
            output::success(json, &column, || {
                println!("Column '{name}' is now {color}");
            });
        }
        ColumnAction::Limit { board, name, limit } => {
            let column = service.update_column_limit(&board, &name, limit).await?;
            output::success(json, &column, || match column.limit {
                Some(limit) => println!("Column '{name}' limited to {limit} card(s)"),
                None => println!("Column '{name}' limit cleared"),
            });
        }
        ColumnAction::Reorder {
            board,
            name,
            position,
        } => {
            service.reorder_column(&board, &name, position).await?;
            let config = service.get(&board).await?;
            output::success(json, &config, || {
                let names: Vec<&str> = config.columns.iter().map(|c| c.name.as_str()).collect();
                println!("Column order: {}", names.join(", "));
            });
        }
        ColumnAction::Order { board, names } => {
            let config = service.reorder_columns(&board, &names).await?;
            output::success(json, &config, || {
                let names: Vec<&str> = config.columns.iter().map(|c| c.name.as_str()).collect();
                println!("Column order: {}", names.join(", "));
            });
        }
    }
    Ok(())
}
