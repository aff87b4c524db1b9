pub mod daemon;
pub mod signals;

pub use daemon::ServiceManager;
pub use signals::{SignalHandler, SignalType};
