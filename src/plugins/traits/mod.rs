pub mod adapter;
pub mod notifier;

pub use adapter::{ExtractionSettings, IdleStrategy, SiteAdapter};
pub use notifier::{Notification, NotificationKind, NotifierPlugin};
