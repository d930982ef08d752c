use async_trait::async_trait;
use std::time::Duration;

use super::common::{read_precise, visible_text_has_sold_out};
use crate::page::PageHandle;
use crate::plugins::traits::{ExtractionSettings, IdleStrategy, SiteAdapter};
use crate::utils::error::ExtractionError;

const PRICE_SELECTOR: &str = r#"span[class*="Price__CalculatedPrice"]"#;
const SOLD_OUT_SELECTOR: &str = r#"div[class*="Purchase__Container"] button span"#;

pub struct MusinsaAdapter {
    settings: ExtractionSettings,
}

impl MusinsaAdapter {
    pub const PREFIXES: &'static [&'static str] = &["https://www.musinsa.com/products/"];

    pub fn new(settings: ExtractionSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SiteAdapter for MusinsaAdapter {
    fn name(&self) -> &'static str {
        "musinsa"
    }

    fn prefixes(&self) -> &[&'static str] {
        Self::PREFIXES
    }

    fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    fn settle_delay(&self) -> Duration {
        Duration::from_millis(500)
    }

    fn idle_strategy(&self) -> IdleStrategy {
        IdleStrategy::AfterExtraction {
            idle: Duration::from_millis(500),
            timeout: Duration::from_secs(8),
        }
    }

    async fn is_sold_out(&self, page: &dyn PageHandle) -> Result<bool, ExtractionError> {
        visible_text_has_sold_out(page, SOLD_OUT_SELECTOR, Duration::from_secs(2)).await
    }

    async fn extract_precise(&self, page: &dyn PageHandle) -> Result<Option<u64>, ExtractionError> {
        read_precise(page, PRICE_SELECTOR, Duration::from_secs(6), &self.settings.rules).await
    }
}
