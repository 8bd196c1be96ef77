pub mod classifier;
pub mod watcher;

pub use classifier::{classify, ChangeKind, ChangeType, FileChange};
pub use watcher::KanWatcher;
