pub mod config;
pub mod models;
pub mod plugins;
pub mod scheduler;
pub mod scraper;
pub mod utils;
pub mod watch;

// Re-export commonly used types
pub use config::AppConfig;
pub use scheduler::{SchedulerStats, SiteScheduler};
pub use utils::error::AppError;
pub use watch::{Condition, PollOutcome, Watch};

pub type Result<T> = std::result::Result<T, AppError>;
