use std::path::PathBuf;
use std::sync::Arc;

use kan_core::{KanError, KanResult};
use kan_engine::ProjectContext;
use kan_persistence::{GlobalStore, KanWatcher};
use tokio::sync::RwLock;

use crate::ws::{Hub, ServerMessage};

struct WatcherHandle {
    watcher: Arc<KanWatcher>,
    bridge: tokio::task::JoinHandle<()>,
}

/// Shared state for all HTTP/WS handlers. The project context can be
/// swapped at runtime; the watcher is per-context and follows the swap.
pub struct ApiState {
    pub global: GlobalStore,
    pub hub: Hub,
    ctx: RwLock<ProjectContext>,
    watcher: tokio::sync::Mutex<Option<WatcherHandle>>,
}

impl ApiState {
    pub async fn new(ctx: ProjectContext, global: GlobalStore) -> KanResult<Arc<Self>> {
        let state = Arc::new(Self {
            global,
            hub: Hub::new(),
            ctx: RwLock::new(ctx),
            watcher: tokio::sync::Mutex::new(None),
        });
        state.restart_watcher().await?;
        Ok(state)
    }

    pub async fn context(&self) -> ProjectContext {
        self.ctx.read().await.clone()
    }

    /// Switch the active project. The target must be registered in global
    /// config, exist on disk, and contain at least one board.
    pub async fn switch_project(&self, path: &str) -> KanResult<ProjectContext> {
        let global = self.global.load_or_default().await?;
        if !global.projects.values().any(|p| p == path) {
            return Err(KanError::NotFound(format!(
                "project '{path}' is not registered in global config"
            )));
        }
        let root = PathBuf::from(path);
        if !root.is_dir() {
            return Err(KanError::NotFound(format!(
                "project path '{path}' does not exist"
            )));
        }
        let data_location = global.data_location_for(path).map(String::from);
        let new_ctx = ProjectContext::open(root, data_location).await?;
        if new_ctx.boards.list().await?.is_empty() {
            return Err(KanError::Validation(format!(
                "project '{path}' has no boards"
            )));
        }

        {
            let mut ctx = self.ctx.write().await;
            *ctx = new_ctx.clone();
        }
        self.restart_watcher().await?;
        tracing::info!(project = path, "Switched active project");
        Ok(new_ctx)
    }

    /// Stop the current watcher (stopped watchers are terminal, so a fresh
    /// one is built) and re-bridge the hub to the new broadcast stream.
    pub async fn restart_watcher(&self) -> KanResult<()> {
        let data_dir = { self.ctx.read().await.paths.data_dir() };

        let mut guard = self.watcher.lock().await;
        if let Some(handle) = guard.take() {
            handle.watcher.stop();
            handle.bridge.abort();
        }

        let watcher = Arc::new(KanWatcher::new());
        watcher.start(data_dir).await?;

        let mut rx = watcher.subscribe();
        let hub = self.hub.clone();
        let bridge = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => hub.broadcast(ServerMessage::FileChange(change)).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket bridge lagged {n} file changes");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        *guard = Some(WatcherHandle { watcher, bridge });
        Ok(())
    }

    pub async fn shutdown(&self) {
        let mut guard = self.watcher.lock().await;
        if let Some(handle) = guard.take() {
            handle.watcher.stop();
            handle.bridge.abort();
        }
    }
}
