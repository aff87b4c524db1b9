pub mod adapters;
pub mod mocks;
pub mod traits;

// Re-export traits and adapters for easy access
pub use adapters::*;
pub use mocks::*;
pub use traits::*;
