//! Page capability used by the extraction adapters.
//!
//! A page is opened fresh for every extraction attempt and closed on every
//! exit path; implementations never share navigation state between pages.

use async_trait::async_trait;
use std::time::Duration;

use crate::utils::error::ExtractionError;

pub mod chrome;
pub mod static_html;

pub use chrome::ChromePageFactory;
pub use static_html::{HttpPageFactory, StaticPage};

#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Loads `url`, waiting for initial DOM readiness only.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), ExtractionError>;

    /// Waits until `selector` matches a visible element.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), ExtractionError>;

    /// Text of the first element matching `selector`.
    async fn read_text(&self, selector: &str) -> Result<String, ExtractionError>;

    /// Text of every element matching `selector`, in document order.
    async fn read_all_texts(&self, selector: &str) -> Result<Vec<String>, ExtractionError>;

    /// Text of every rendered element matching `selector`, in document order.
    async fn read_visible_texts(&self, selector: &str) -> Result<Vec<String>, ExtractionError>;

    /// Whether the first element matching `selector` is rendered.
    async fn is_visible(&self, selector: &str) -> Result<bool, ExtractionError>;

    /// Bounded wait for network quiescence; expiry is not an error.
    async fn wait_for_network_idle(&self, _idle: Duration, _timeout: Duration) -> Result<(), ExtractionError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ExtractionError>;
}

#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageHandle>, ExtractionError>;
}

/// Maps a collaborator error to the extraction taxonomy by its message.
pub(crate) fn classify_error<E: std::fmt::Display>(err: E, on_timeout: ExtractionError) -> ExtractionError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") || lower.contains("never came") {
        on_timeout
    } else {
        ExtractionError::Unclassified(message)
    }
}
