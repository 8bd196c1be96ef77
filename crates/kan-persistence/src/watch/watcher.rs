use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kan_core::{KanError, KanResult};
use notify::{RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

use super::classifier::{self, ChangeType, FileChange};

/// Debounce window per path.
pub const DEBOUNCE_MILLIS: u64 = 100;

#[derive(Debug)]
enum State {
    Idle,
    Running {
        task: tokio::task::JoinHandle<()>,
        _watcher: notify::RecommendedWatcher,
    },
    Stopped,
}

/// Watches one project's data root recursively, coalesces write-bursts per
/// path (100 ms), classifies surviving events, and fans them out on a
/// broadcast channel. Once stopped, a watcher may not be restarted.
pub struct KanWatcher {
    tx: broadcast::Sender<FileChange>,
    state: Mutex<State>,
}

impl KanWatcher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            tx,
            state: Mutex::new(State::Idle),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FileChange> {
        self.tx.subscribe()
    }

    /// Start watching `data_root` (the `.kan` directory). Recursive, so
    /// directories created later are covered too.
    pub async fn start(&self, data_root: PathBuf) -> KanResult<()> {
        {
            let state = self.state.lock().expect("watcher state poisoned");
            match *state {
                State::Idle => {}
                State::Running { .. } => {
                    return Err(KanError::Validation("watcher already running".into()))
                }
                State::Stopped => {
                    return Err(KanError::Validation(
                        "watcher was stopped and cannot be restarted".into(),
                    ))
                }
            }
        }

        let root = tokio::fs::canonicalize(&data_root).await?;
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<(PathBuf, ChangeType)>();

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    for (path, change_type) in translate(&event) {
                        if classifier::is_temp_file(&path) {
                            continue;
                        }
                        let _ = raw_tx.send((path, change_type));
                    }
                }
                Err(e) => {
                    tracing::warn!("File watcher error: {e}");
                }
            })
            .map_err(|e| KanError::Internal(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| KanError::Internal(format!("failed to watch {}: {e}", root.display())))?;
        tracing::info!("Watching {}", root.display());

        let tx = self.tx.clone();
        let task = tokio::spawn(dispatch(root, raw_rx, tx));

        let mut state = self.state.lock().expect("watcher state poisoned");
        *state = State::Running {
            task,
            _watcher: watcher,
        };
        Ok(())
    }

    /// Idempotent; cancels pending debounce timers. Terminal.
    pub fn stop(&self) {
        let mut state = self.state.lock().expect("watcher state poisoned");
        if let State::Running { task, _watcher } =
            std::mem::replace(&mut *state, State::Stopped)
        {
            // Dropping the notify watcher ends the event stream; aborting
            // the dispatcher drops its JoinSet, cancelling pending timers.
            task.abort();
            drop(_watcher);
            tracing::info!("Stopped file watching");
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(
            *self.state.lock().expect("watcher state poisoned"),
            State::Running { .. }
        )
    }
}

impl Default for KanWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for KanWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map one notify event onto (path, change type) pairs. Rename sources are
/// reported as deletions; rename targets as creations.
fn translate(event: &notify::Event) -> Vec<(PathBuf, ChangeType)> {
    use notify::event::{ModifyKind, RenameMode};
    use notify::EventKind;

    match &event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .map(|p| (p.clone(), ChangeType::Created))
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .map(|p| (p.clone(), ChangeType::Deleted))
            .collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => event
                .paths
                .iter()
                .map(|p| (p.clone(), ChangeType::Deleted))
                .collect(),
            RenameMode::To => event
                .paths
                .iter()
                .map(|p| (p.clone(), ChangeType::Created))
                .collect(),
            RenameMode::Both => {
                let mut out = Vec::new();
                if let Some(from) = event.paths.first() {
                    out.push((from.clone(), ChangeType::Deleted));
                }
                if let Some(to) = event.paths.get(1) {
                    out.push((to.clone(), ChangeType::Created));
                }
                out
            }
            _ => event
                .paths
                .iter()
                .map(|p| (p.clone(), ChangeType::Modified))
                .collect(),
        },
        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|p| (p.clone(), ChangeType::Modified))
            .collect(),
        _ => Vec::new(),
    }
}

struct PendingEntry {
    generation: u64,
    change_type: ChangeType,
}

/// Single-writer event machine: events arrive on one queue, reset per-path
/// timers, and emit classify-then-broadcast on timer fire.
async fn dispatch(
    root: PathBuf,
    mut raw_rx: mpsc::UnboundedReceiver<(PathBuf, ChangeType)>,
    tx: broadcast::Sender<FileChange>,
) {
    let pending: Arc<Mutex<HashMap<PathBuf, PendingEntry>>> = Arc::new(Mutex::new(HashMap::new()));
    let mut generation: u64 = 0;
    let mut timers = JoinSet::new();

    loop {
        tokio::select! {
            maybe = raw_rx.recv() => {
                let Some((path, change_type)) = maybe else { break };
                generation += 1;
                {
                    let mut pending = pending.lock().expect("debounce map poisoned");
                    pending.insert(
                        path.clone(),
                        PendingEntry { generation, change_type },
                    );
                }

                let pending = Arc::clone(&pending);
                let tx = tx.clone();
                let root = root.clone();
                let my_generation = generation;
                timers.spawn(async move {
                    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MILLIS)).await;
                    let entry = {
                        let mut pending = pending.lock().expect("debounce map poisoned");
                        match pending.get(&path) {
                            Some(e) if e.generation == my_generation => pending.remove(&path),
                            _ => None,
                        }
                    };
                    let Some(entry) = entry else { return };
                    let Ok(relative) = path.strip_prefix(&root) else { return };
                    if let Some(change) = classifier::classify(relative, entry.change_type) {
                        tracing::debug!(?change, "Broadcasting file change");
                        let _ = tx.send(change);
                    }
                });
            }
            Some(_) = timers.join_next(), if !timers.is_empty() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kan_core::KanPaths;
    use tempfile::tempdir;
    use tokio::time::{timeout, Duration};

    use crate::watch::classifier::ChangeKind;

    async fn setup(root: &std::path::Path) -> KanPaths {
        let paths = KanPaths::new(root, None);
        tokio::fs::create_dir_all(paths.cards_dir("main")).await.unwrap();
        paths
    }

    #[tokio::test]
    async fn test_debounce_coalesces_double_write() {
        let dir = tempdir().unwrap();
        let paths = setup(dir.path()).await;

        let watcher = KanWatcher::new();
        let mut rx = watcher.subscribe();
        watcher.start(paths.data_dir()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let card = paths.card_file("main", "a_x");
        tokio::fs::write(&card, b"{\"_v\":1}").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        tokio::fs::write(&card, b"{\"_v\":1,\"id\":\"a_x\"}").await.unwrap();

        let change = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        assert_eq!(change.kind, ChangeKind::Card);
        assert_eq!(change.board_name.as_deref(), Some("main"));
        assert_eq!(change.card_id.as_deref(), Some("a_x"));

        // No second event inside the window.
        let extra = timeout(Duration::from_millis(250), rx.recv()).await;
        assert!(extra.is_err(), "expected exactly one coalesced event");

        watcher.stop();
    }

    #[tokio::test]
    async fn test_temp_files_ignored() {
        let dir = tempdir().unwrap();
        let paths = setup(dir.path()).await;

        let watcher = KanWatcher::new();
        let mut rx = watcher.subscribe();
        watcher.start(paths.data_dir()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        tokio::fs::write(paths.cards_dir("main").join(".a_x.json.tmp"), b"x")
            .await
            .unwrap();
        tokio::fs::write(paths.cards_dir("main").join("a_y.json~"), b"x")
            .await
            .unwrap();

        let result = timeout(Duration::from_millis(400), rx.recv()).await;
        assert!(result.is_err(), "temp files must not broadcast");

        watcher.stop();
    }

    #[tokio::test]
    async fn test_stopped_watcher_is_terminal() {
        let dir = tempdir().unwrap();
        let paths = setup(dir.path()).await;

        let watcher = KanWatcher::new();
        watcher.start(paths.data_dir()).await.unwrap();
        watcher.stop();
        watcher.stop(); // idempotent

        let err = watcher.start(paths.data_dir()).await.unwrap_err();
        assert!(err.to_string().contains("restarted"));
    }

    #[tokio::test]
    async fn test_double_start_refused() {
        let dir = tempdir().unwrap();
        let paths = setup(dir.path()).await;

        let watcher = KanWatcher::new();
        watcher.start(paths.data_dir()).await.unwrap();
        assert!(watcher.start(paths.data_dir()).await.is_err());
        watcher.stop();
    }
}
