pub mod audio;
pub mod config;
pub mod logging;
pub mod notifications;
pub mod priority;
pub mod service;
pub mod simulate;
pub mod status;
pub mod system;

pub use audio::{ChangeCoordinator, Device, DeviceId, Role};
pub use config::Config;
pub use priority::{PriorityStore, ReconciliationEngine};
