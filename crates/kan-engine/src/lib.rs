pub mod alias;
pub mod boards;
pub mod cards;
pub mod context;
pub mod doctor;
pub mod hooks;

pub use alias::AliasService;
pub use boards::BoardService;
pub use cards::{AddCardInput, AddCardOutput, CardService, EditCardInput, EditCardOutput};
pub use context::ProjectContext;
pub use doctor::{Doctor, DoctorReport, Finding, FixSummary, Issue};
pub use hooks::{run_hooks_for_card, HookResult};
