use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Transition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Restock,
    PriceChange,
    SoldOut,
    /// Operational messages such as URL list reloads.
    Info,
}

/// Message handed to a notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Adapter family that produced the observation.
    pub adapter: String,
    pub url: String,
    pub previous: Option<u64>,
    pub current: Option<u64>,
    /// Already formatted in the configured offset.
    pub timestamp: String,
    pub message: Option<String>,
}

impl Notification {
    /// `None` for `Transition::Unchanged`.
    pub fn from_transition(
        transition: Transition,
        adapter: &str,
        url: &str,
        timestamp: impl Into<String>,
    ) -> Option<Self> {
        let (kind, previous, current) = match transition {
            Transition::Unchanged => return None,
            Transition::Restock { price } => (NotificationKind::Restock, None, Some(price)),
            Transition::PriceChange { previous, current } => {
                (NotificationKind::PriceChange, previous, Some(current))
            }
            Transition::NewSoldOut { previous } => (NotificationKind::SoldOut, previous, None),
        };

        Some(Self {
            kind,
            adapter: adapter.to_string(),
            url: url.to_string(),
            previous,
            current,
            timestamp: timestamp.into(),
            message: None,
        })
    }

    pub fn info(message: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            adapter: String::new(),
            url: String::new(),
            previous: None,
            current: None,
            timestamp: timestamp.into(),
            message: Some(message.into()),
        }
    }

    /// Signed difference for price changes with a known previous price.
    pub fn delta(&self) -> Option<i128> {
        match (self.previous, self.current) {
            (Some(previous), Some(current)) => Some(current as i128 - previous as i128),
            _ => None,
        }
    }
}

/// Delivery channel for change notifications (Discord, log, ...).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Delivers `notification` to `channel`; no retries are attempted.
    async fn send(&self, channel: &str, notification: &Notification) -> crate::Result<()>;
}
