use std::path::Path;

use kan_domain::FieldUpdate;
use kan_engine::{AddCardInput, EditCardInput};

use crate::cli::{parse_fields, CardAction, CommentAction};
use crate::context;
use crate::output;

fn optional_update(value: Option<String>) -> FieldUpdate<String> {
    match value {
        None => FieldUpdate::NoChange,
        Some(s) if s.is_empty() => FieldUpdate::Clear,
        Some(s) => FieldUpdate::Set(s),
    }
}

pub async fn handle(dir: &Path, action: CardAction, json: bool) -> anyhow::Result<()> {
    let ctx = context::open(dir).await?;
    let service = ctx.card_service();

    match action {
        CardAction::Add {
            board,
            title,
            description,
            column,
            parent,
            fields,
            strict,
        } => {
            let out = service
                .add(
                    &board,
                    AddCardInput {
                        title,
                        description,
                        column,
                        parent,
                        creator: context::creator(),
                        fields: parse_fields(&fields)?,
                        strict,
                    },
                )
                .await?;
            for missing in &out.missing_wanted {
                output::warn(json, &format!("card is missing wanted field '{missing}'"));
            }
            for hook in &out.hook_results {
                if !hook.success {
                    output::warn(
                        json,
                        &format!(
                            "hook '{}' failed{}",
                            hook.hook,
                            if hook.timed_out { " (timed out)" } else { "" }
                        ),
                    );
                }
            }
            output::success(
                json,
                &serde_json::json!({
                    "card": out.card,
                    "hook_results": out.hook_results,
                    "missing_wanted": out.missing_wanted,
                }),
                || {
                    println!(
                        "Created card {} ({}) in '{}'",
                        out.card.id,
                        out.card.alias,
                        out.card.column.as_deref().unwrap_or("?")
                    );
                },
            );
        }
        CardAction::Get { board, id } => {
            let card = service.get(&board, &id).await?;
            output::success(json, &card, || {
                println!("{} [{}] {}", card.id, card.alias, card.title);
                if let Some(column) = &card.column {
                    println!("  column: {column}");
                }
                if let Some(description) = &card.description {
                    println!("  {description}");
                }
                for (name, value) in &card.fields {
                    println!("  {name}: {value}");
                }
                for comment in &card.comments {
                    println!("  [{}] {}: {}", comment.id, comment.author, comment.body);
                }
            });
        }
        CardAction::List { board, column } => {
            let cards = service.list(&board, column.as_deref()).await?;
            output::success(json, &cards, || {
                for card in &cards {
                    println!(
                        "{}  {:12}  {} [{}]",
                        card.id,
                        card.column.as_deref().unwrap_or("(orphan)"),
                        card.title,
                        card.alias
                    );
                }
            });
        }
        CardAction::Edit {
            board,
            id,
            title,
            description,
            column,
            parent,
            alias,
            fields,
            strict,
        } => {
            let out = service
                .edit(
                    &board,
                    &id,
                    EditCardInput {
                        title,
                        description: optional_update(description),
                        column,
                        parent: optional_update(parent),
                        alias,
                        fields: parse_fields(&fields)?,
                        strict,
                    },
                )
                .await?;
            for missing in &out.missing_wanted {
                output::warn(json, &format!("card is missing wanted field '{missing}'"));
            }
            output::success(json, &out.card, || {
                println!("Updated card {}", out.card.id);
            });
        }
        CardAction::Move {
            board,
            id,
            column,
            position,
        } => {
            let card = service.move_card_at(&board, &id, &column, position).await?;
            output::success(json, &card, || {
                println!("Moved card {} to '{column}'", card.id);
            });
        }
        CardAction::Delete { board, id } => {
            service.delete(&board, &id).await?;
            output::success(json, &serde_json::json!({ "deleted": id }), || {
                println!("Deleted card");
            });
        }
    }
    Ok(())
}

pub async fn handle_comment(dir: &Path, action: CommentAction, json: bool) -> anyhow::Result<()> {
    let ctx = context::open(dir).await?;
    let service = ctx.card_service();

    match action {
        CommentAction::Add {
            board,
            card,
            body,
            author,
        } => {
            let comment = service
                .add_comment(
                    &board,
                    &card,
                    body,
                    author.unwrap_or_else(context::creator),
                )
                .await?;
            output::success(json, &comment, || {
                println!("Added comment {}", comment.id);
            });
        }
        CommentAction::Edit {
            board,
            comment_id,
            body,
        } => {
            let comment = service.edit_comment(&board, &comment_id, body).await?;
            output::success(json, &comment, || {
                println!("Updated comment {}", comment.id);
            });
        }
        CommentAction::Delete { board, comment_id } => {
            service.delete_comment(&board, &comment_id).await?;
            output::success(json, &serde_json::json!({ "deleted": comment_id }), || {
                println!("Deleted comment");
            });
        }
    }
    Ok(())
}
