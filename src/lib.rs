pub mod concurrency;
pub mod config;
pub mod models;
pub mod orchestrator;
pub mod page;
pub mod plugins;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod sync;
pub mod utils;
pub mod watch_state;

// Re-export commonly used types
pub use config::AppConfig;
pub use models::{ExtractionResult, RunSummary};
pub use orchestrator::EngineContext;
pub use scheduler::WatchScheduler;
pub use utils::error::{AppError, ExtractionError, Result};
