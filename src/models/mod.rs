pub mod extraction;
pub mod watch;

// Re-exports for convenience
pub use extraction::*;
pub use watch::*;
