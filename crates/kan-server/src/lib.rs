pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::ApiState;
pub use ws::{Hub, ServerMessage};

use std::sync::Arc;

use kan_core::KanResult;

/// Bind and serve until the process ends.
pub async fn serve(state: Arc<ApiState>, port: u16) -> KanResult<()> {
    let app = router(state);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Serving API on http://{addr}");
    axum::serve(listener, app)
        .await
        .map_err(|e| kan_core::KanError::Internal(e.to_string()))
}
