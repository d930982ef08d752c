use async_trait::async_trait;
use std::time::Duration;

use super::common::{read_precise, visible_tag_with_keyword};
use crate::page::PageHandle;
use crate::plugins::traits::{ExtractionSettings, IdleStrategy, SiteAdapter};
use crate::utils::error::ExtractionError;

const PRICE_SELECTOR: &str = "#finalDscPrcArea > dd.price > strong > span.value";
const SOLD_OUT_SELECTOR: &str = ".btn_soldout, .sold_out";

pub struct ElevenStAdapter {
    settings: ExtractionSettings,
}

impl ElevenStAdapter {
    pub const PREFIXES: &'static [&'static str] = &[
        "https://www.11st.co.kr/products/",
        "https://m.11st.co.kr/products/",
        "http://www.11st.co.kr/products/",
    ];

    pub fn new(settings: ExtractionSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SiteAdapter for ElevenStAdapter {
    fn name(&self) -> &'static str {
        "11st"
    }

    fn prefixes(&self) -> &[&'static str] {
        Self::PREFIXES
    }

    fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    fn settle_delay(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn idle_strategy(&self) -> IdleStrategy {
        IdleStrategy::RetryPrecise {
            idle: Duration::from_millis(500),
            timeout: Duration::from_secs(8),
        }
    }

    async fn is_sold_out(&self, page: &dyn PageHandle) -> Result<bool, ExtractionError> {
        if page.is_visible(SOLD_OUT_SELECTOR).await? {
            return Ok(true);
        }
        if visible_tag_with_keyword(page, "button", &["품절"]).await? {
            return Ok(true);
        }
        visible_tag_with_keyword(page, "span", &["판매종료"]).await
    }

    async fn extract_precise(&self, page: &dyn PageHandle) -> Result<Option<u64>, ExtractionError> {
        read_precise(page, PRICE_SELECTOR, Duration::from_secs(6), &self.settings.rules).await
    }
}
