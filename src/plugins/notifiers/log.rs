use async_trait::async_trait;

use crate::plugins::traits::{Notification, NotificationKind, NotifierPlugin};

/// Writes notifications to the tracing log instead of an external channel.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotifierPlugin for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, channel: &str, notification: &Notification) -> crate::Result<()> {
        match notification.kind {
            NotificationKind::Info => tracing::info!(
                channel = %channel,
                "{}",
                notification.message.as_deref().unwrap_or_default()
            ),
            kind => tracing::info!(
                channel = %channel,
                adapter = %notification.adapter,
                url = %notification.url,
                previous = ?notification.previous,
                current = ?notification.current,
                "{:?} detected",
                kind
            ),
        }
        Ok(())
    }
}
