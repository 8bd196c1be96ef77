pub mod atomic;
pub mod migration;
pub mod store;
pub mod watch;

pub use atomic::AtomicWriter;
pub use migration::{BoardPlan, CardPlan, MigrationPlan, MigrationSummary, Migrator};
pub use store::{BoardStore, CardStore, GlobalStore, ProjectStore};
pub use watch::{classify, ChangeKind, ChangeType, FileChange, KanWatcher};
