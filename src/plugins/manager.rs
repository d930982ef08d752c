use std::sync::Arc;

use super::adapters::AdapterKind;
use super::traits::{ExtractionSettings, SiteAdapter};
use crate::config::AppConfig;

pub type SiteAdapterRef = Arc<dyn SiteAdapter>;

/// An adapter together with the notification channel its changes go to.
#[derive(Clone)]
pub struct AdapterBinding {
    pub kind: AdapterKind,
    pub adapter: SiteAdapterRef,
    /// Webhook for this family; `None` means notifications are only logged.
    pub channel: Option<String>,
}

impl std::fmt::Debug for AdapterBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterBinding")
            .field("kind", &self.kind)
            .field("channel", &self.channel)
            .finish()
    }
}

/// Ordered adapter bindings; the first match wins and the catch-all is last.
#[derive(Clone, Debug)]
pub struct AdapterRegistry {
    bindings: Vec<AdapterBinding>,
}

impl AdapterRegistry {
    pub fn new(bindings: Vec<AdapterBinding>) -> Self {
        Self { bindings }
    }

    /// Builds every adapter in `AdapterKind::ALL` order.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut settings = ExtractionSettings::new(config.engine.price_floor, config.engine.navigation_timeout());
        settings.settle_delays = config.engine.settle_delays;

        let bindings = AdapterKind::ALL
            .iter()
            .map(|kind| AdapterBinding {
                kind: *kind,
                adapter: kind.build(settings.clone()),
                channel: config.notifications.channel_for(kind.name()),
            })
            .collect();

        Self::new(bindings)
    }

    /// Binding for `url`. Falls back to the last binding if nothing matches.
    pub fn resolve(&self, url: &str) -> Option<&AdapterBinding> {
        self.bindings
            .iter()
            .find(|binding| binding.adapter.matches(url))
            .or_else(|| self.bindings.last())
    }

    pub fn bindings(&self) -> &[AdapterBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
