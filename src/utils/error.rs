use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("External write failed for row {row}: {message}")]
    ExternalWrite { row: i64, message: String },

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Implement conversion from validation errors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

impl From<tokio_cron_scheduler::JobSchedulerError> for AppError {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        AppError::Scheduler(format!("{:?}", err))
    }
}

/// Failures inside a single extraction attempt.
///
/// Absent elements and selector timeouts are kept apart from navigation
/// failures so adapters can treat the former as "marker not present" while the
/// latter still fail the attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("navigation timed out")]
    NavigationTimeout,

    #[error("timed out waiting for selector: {selector}")]
    SelectorTimeout { selector: String },

    #[error("element not found: {selector}")]
    ElementAbsent { selector: String },

    #[error("no valid price in page text: {text}")]
    ParseFailure { text: String },

    #[error("unclassified failure: {0}")]
    Unclassified(String),
}

impl ExtractionError {
    /// True for failures that only mean "this element is not on the page".
    pub fn is_missing_element(&self) -> bool {
        matches!(
            self,
            ExtractionError::SelectorTimeout { .. } | ExtractionError::ElementAbsent { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::NavigationTimeout => "navigation_timeout",
            ExtractionError::SelectorTimeout { .. } => "selector_timeout",
            ExtractionError::ElementAbsent { .. } => "element_absent",
            ExtractionError::ParseFailure { .. } => "parse_failure",
            ExtractionError::Unclassified(_) => "unclassified",
        }
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
