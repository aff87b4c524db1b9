pub mod engine;
pub mod list;
pub mod store;

pub use engine::{Decision, NoActionReason, ReconciliationEngine, SwitchAction};
pub use list::PriorityList;
pub use store::PriorityStore;
