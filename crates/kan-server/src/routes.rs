use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use kan_core::{KanError, KanPaths};
use kan_domain::{BoardConfig, Card, Column, Comment, FieldUpdate};
use kan_engine::{AddCardInput, EditCardInput, HookResult};
use kan_persistence::BoardStore;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;
use crate::ws;

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/v1/project", get(get_project))
        .route("/favicon.svg", get(get_favicon))
        .route("/api/v1/boards", get(list_boards))
        .route("/api/v1/boards/:board", get(get_board))
        .route("/api/v1/boards/:board/columns", post(add_column))
        .route("/api/v1/boards/:board/columns/order", put(set_column_order))
        .route(
            "/api/v1/boards/:board/columns/:name",
            patch(update_column).delete(delete_column),
        )
        .route(
            "/api/v1/boards/:board/cards",
            get(list_cards).post(create_card),
        )
        .route(
            "/api/v1/boards/:board/cards/:id",
            get(get_card).put(edit_card).delete(delete_card),
        )
        .route("/api/v1/boards/:board/cards/:id/move", patch(move_card))
        .route(
            "/api/v1/boards/:board/cards/:id/comments",
            post(add_comment),
        )
        .route(
            "/api/v1/boards/:board/cards/:id/comments/:cid",
            patch(edit_comment).delete(delete_comment),
        )
        .route("/api/v1/all-boards", get(all_boards))
        .route("/api/v1/switch", post(switch_project))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct ProjectResponse {
    id: String,
    name: String,
    favicon: kan_domain::Favicon,
    #[serde(skip_serializing_if = "Option::is_none")]
    editor: Option<String>,
}

async fn get_project(State(state): State<Arc<ApiState>>) -> ApiResult<Json<ProjectResponse>> {
    let ctx = state.context().await;
    let editor = state.global.load_or_default().await?.editor;
    Ok(Json(ProjectResponse {
        id: ctx.project.id.clone(),
        name: ctx.project.name.clone(),
        favicon: ctx.project.favicon.clone(),
        editor,
    }))
}

async fn get_favicon(State(state): State<Arc<ApiState>>) -> ApiResult<Response> {
    let ctx = state.context().await;
    let custom = ctx.paths.custom_favicon();
    let svg = if tokio::fs::try_exists(&custom).await.map_err(KanError::Io)? {
        tokio::fs::read_to_string(&custom).await.map_err(KanError::Io)?
    } else {
        ctx.project.favicon.to_svg()
    };
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/svg+xml")],
        svg,
    )
        .into_response())
}

async fn list_boards(State(state): State<Arc<ApiState>>) -> ApiResult<Json<Vec<String>>> {
    let ctx = state.context().await;
    Ok(Json(ctx.boards.list().await?))
}

async fn get_board(
    State(state): State<Arc<ApiState>>,
    Path(board): Path<String>,
) -> ApiResult<Json<BoardConfig>> {
    let ctx = state.context().await;
    Ok(Json(ctx.boards.get(&board).await?))
}

#[derive(Deserialize)]
struct AddColumnRequest {
    name: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    position: Option<i64>,
}

async fn add_column(
    State(state): State<Arc<ApiState>>,
    Path(board): Path<String>,
    Json(req): Json<AddColumnRequest>,
) -> ApiResult<(StatusCode, Json<Column>)> {
    let ctx = state.context().await;
    let column = ctx
        .board_service()
        .add_column(
            &board,
            &req.name,
            req.color,
            req.description,
            req.position.unwrap_or(-1),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(column)))
}

async fn delete_column(
    State(state): State<Arc<ApiState>>,
    Path((board, name)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let ctx = state.context().await;
    ctx.board_service().delete_column(&board, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct UpdateColumnRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

async fn update_column(
    State(state): State<Arc<ApiState>>,
    Path((board, name)): Path<(String, String)>,
    Json(req): Json<UpdateColumnRequest>,
) -> ApiResult<Json<Column>> {
    let ctx = state.context().await;
    let service = ctx.board_service();

    let mut current = name.clone();
    if let Some(new_name) = &req.name {
        service.rename_column(&board, &current, new_name).await?;
        current = new_name.clone();
    }
    if let Some(color) = &req.color {
        service.update_column_color(&board, &current, color).await?;
    }
    if let Some(description) = req.description {
        service
            .update_column_description(&board, &current, Some(description))
            .await?;
    }
    if let Some(limit) = req.limit {
        service.update_column_limit(&board, &current, limit).await?;
    }

    let config = ctx.boards.get(&board).await?;
    let column = config
        .column(&current)
        .cloned()
        .ok_or_else(|| KanError::NotFound(format!("column '{current}' in board '{board}'")))?;
    Ok(Json(column))
}

#[derive(Deserialize)]
struct ColumnOrderRequest {
    order: Vec<String>,
}

async fn set_column_order(
    State(state): State<Arc<ApiState>>,
    Path(board): Path<String>,
    Json(req): Json<ColumnOrderRequest>,
) -> ApiResult<Json<BoardConfig>> {
    let ctx = state.context().await;
    Ok(Json(
        ctx.board_service().reorder_columns(&board, &req.order).await?,
    ))
}

#[derive(Deserialize)]
struct ListCardsQuery {
    #[serde(default)]
    column: Option<String>,
}

async fn list_cards(
    State(state): State<Arc<ApiState>>,
    Path(board): Path<String>,
    Query(query): Query<ListCardsQuery>,
) -> ApiResult<Json<Vec<Card>>> {
    let ctx = state.context().await;
    let cards = ctx
        .card_service()
        .list(&board, query.column.as_deref())
        .await?;
    Ok(Json(cards))
}

#[derive(Deserialize)]
struct CreateCardRequest {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    column: Option<String>,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    creator: Option<String>,
    #[serde(default)]
    fields: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct CreateCardResponse {
    card: Card,
    hook_results: Vec<HookResult>,
    missing_wanted: Vec<String>,
}

async fn create_card(
    State(state): State<Arc<ApiState>>,
    Path(board): Path<String>,
    Json(req): Json<CreateCardRequest>,
) -> ApiResult<(StatusCode, Json<CreateCardResponse>)> {
    let ctx = state.context().await;
    let output = ctx
        .card_service()
        .add(
            &board,
            AddCardInput {
                title: req.title,
                description: req.description,
                column: req.column,
                parent: req.parent,
                creator: req.creator.unwrap_or_else(|| "api".to_string()),
                fields: req.fields,
                strict: false,
            },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateCardResponse {
            card: output.card,
            hook_results: output.hook_results,
            missing_wanted: output.missing_wanted,
        }),
    ))
}

async fn get_card(
    State(state): State<Arc<ApiState>>,
    Path((board, id)): Path<(String, String)>,
) -> ApiResult<Json<Card>> {
    let ctx = state.context().await;
    Ok(Json(ctx.card_service().get(&board, &id).await?))
}

#[derive(Deserialize)]
struct EditCardRequest {
    #[serde(default)]
    title: Option<String>,
    /// Present-and-empty clears; absent leaves unchanged.
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    column: Option<String>,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    fields: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct EditCardResponse {
    card: Card,
    missing_wanted: Vec<String>,
}

fn optional_update(value: Option<String>) -> FieldUpdate<String> {
    match value {
        None => FieldUpdate::NoChange,
        Some(s) if s.is_empty() => FieldUpdate::Clear,
        Some(s) => FieldUpdate::Set(s),
    }
}

async fn edit_card(
    State(state): State<Arc<ApiState>>,
    Path((board, id)): Path<(String, String)>,
    Json(req): Json<EditCardRequest>,
) -> ApiResult<Json<EditCardResponse>> {
    let ctx = state.context().await;
    let output = ctx
        .card_service()
        .edit(
            &board,
            &id,
            EditCardInput {
                title: req.title,
                description: optional_update(req.description),
                column: req.column,
                parent: optional_update(req.parent),
                alias: req.alias,
                fields: req.fields,
                strict: false,
            },
        )
        .await?;
    Ok(Json(EditCardResponse {
        card: output.card,
        missing_wanted: output.missing_wanted,
    }))
}

async fn delete_card(
    State(state): State<Arc<ApiState>>,
    Path((board, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let ctx = state.context().await;
    ctx.card_service().delete(&board, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct MoveCardRequest {
    column: String,
    #[serde(default)]
    position: Option<i64>,
}

async fn move_card(
    State(state): State<Arc<ApiState>>,
    Path((board, id)): Path<(String, String)>,
    Json(req): Json<MoveCardRequest>,
) -> ApiResult<Json<Card>> {
    let ctx = state.context().await;
    let card = ctx
        .card_service()
        .move_card_at(&board, &id, &req.column, req.position.unwrap_or(-1))
        .await?;
    Ok(Json(card))
}

#[derive(Deserialize)]
struct CommentRequest {
    body: String,
    #[serde(default)]
    author: Option<String>,
}

async fn add_comment(
    State(state): State<Arc<ApiState>>,
    Path((board, id)): Path<(String, String)>,
    Json(req): Json<CommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let ctx = state.context().await;
    let comment = ctx
        .card_service()
        .add_comment(
            &board,
            &id,
            req.body,
            req.author.unwrap_or_else(|| "api".to_string()),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn edit_comment(
    State(state): State<Arc<ApiState>>,
    Path((board, _id, cid)): Path<(String, String, String)>,
    Json(req): Json<CommentRequest>,
) -> ApiResult<Json<Comment>> {
    let ctx = state.context().await;
    Ok(Json(
        ctx.card_service().edit_comment(&board, &cid, req.body).await?,
    ))
}

async fn delete_comment(
    State(state): State<Arc<ApiState>>,
    Path((board, _id, cid)): Path<(String, String, String)>,
) -> ApiResult<StatusCode> {
    let ctx = state.context().await;
    ctx.card_service().delete_comment(&board, &cid).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct ProjectBoards {
    name: String,
    path: String,
    boards: Vec<String>,
}

/// Cross-project index from global config. Unreadable projects are
/// skipped rather than failing the whole listing.
async fn all_boards(
    State(state): State<Arc<ApiState>>,
) -> ApiResult<Json<Vec<ProjectBoards>>> {
    let global = state.global.load_or_default().await?;
    let mut out = Vec::new();
    for (name, path) in &global.projects {
        let data_location = global.data_location_for(path).map(String::from);
        let paths = KanPaths::new(path.clone(), data_location);
        let store = BoardStore::new(paths);
        match store.list().await {
            Ok(boards) => out.push(ProjectBoards {
                name: name.clone(),
                path: path.clone(),
                boards,
            }),
            Err(e) => {
                tracing::warn!(project = %path, "Skipping unreadable project: {e}");
            }
        }
    }
    Ok(Json(out))
}

#[derive(Deserialize)]
struct SwitchRequest {
    path: String,
}

async fn switch_project(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<SwitchRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    let ctx = state.switch_project(&req.path).await?;
    let editor = state.global.load_or_default().await?.editor;
    Ok(Json(ProjectResponse {
        id: ctx.project.id.clone(),
        name: ctx.project.name.clone(),
        favicon: ctx.project.favicon.clone(),
        editor,
    }))
}

async fn ws_handler(
    State(state): State<Arc<ApiState>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let project = state.context().await.project.name.clone();
    let hub = state.hub.clone();
    upgrade.on_upgrade(move |socket| ws::handle_socket(socket, hub, project))
}
