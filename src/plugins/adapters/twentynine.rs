use async_trait::async_trait;
use std::time::Duration;

use super::common::{read_precise, visible_text_has_sold_out};
use crate::page::PageHandle;
use crate::plugins::traits::{ExtractionSettings, IdleStrategy, SiteAdapter};
use crate::utils::error::ExtractionError;

const PRICE_SELECTOR: &str = "#pdp_product_price";
const SOLD_OUT_SELECTOR: &str = "#pdp_buy_now > span";

pub struct TwentyNineAdapter {
    settings: ExtractionSettings,
}

impl TwentyNineAdapter {
    pub const PREFIXES: &'static [&'static str] =
        &["https://www.29cm.co.kr/products/", "https://m.29cm.co.kr/product/"];

    pub fn new(settings: ExtractionSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SiteAdapter for TwentyNineAdapter {
    fn name(&self) -> &'static str {
        "29cm"
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
        IdleStrategy::RetryPrecise {
            idle: Duration::from_millis(500),
            timeout: Duration::from_secs(7),
        }
    }

    async fn is_sold_out(&self, page: &dyn PageHandle) -> Result<bool, ExtractionError> {
        visible_text_has_sold_out(page, SOLD_OUT_SELECTOR, Duration::from_millis(2500)).await
    }

    async fn extract_precise(&self, page: &dyn PageHandle) -> Result<Option<u64>, ExtractionError> {
        read_precise(page, PRICE_SELECTOR, Duration::from_secs(8), &self.settings.rules).await
    }
}
