pub mod history;
pub mod phase;
pub mod scheduler;
pub mod timeline;

pub use phase::PhaseKind;
pub use scheduler::CycleScheduler;
pub use timeline::{build_timeline, PhaseSpan, Timeline};
