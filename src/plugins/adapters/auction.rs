use async_trait::async_trait;
use std::time::Duration;

use super::common::{read_precise, soften};
use crate::page::PageHandle;
use crate::plugins::traits::{ExtractionSettings, IdleStrategy, SiteAdapter};
use crate::utils::error::ExtractionError;
use crate::utils::price::contains_sold_out_keyword;

const PRICE_SELECTOR: &str = "#frmMain > div.box__item-info > div.price_wrap > div:nth-child(2) > strong";
const SOLD_OUT_SELECTOR: &str = ".btn_soldout, .layer_soldout, .soldout, button[disabled]";
const ITEM_INFO_SELECTOR: &str = ".item_top_info";

pub struct AuctionAdapter {
    settings: ExtractionSettings,
}

impl AuctionAdapter {
    pub const PREFIXES: &'static [&'static str] = &[
        "http://itempage3.auction.co.kr",
        "https://itempage3.auction.co.kr",
        "http://mobile.auction.co.kr",
    ];

    pub fn new(settings: ExtractionSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SiteAdapter for AuctionAdapter {
    fn name(&self) -> &'static str {
        "auction"
    }

    fn prefixes(&self) -> &[&'static str] {
        Self::PREFIXES
    }

    fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    fn settle_delay(&self) -> Duration {
        Duration::from_millis(800)
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
        let info = soften(page.read_text(ITEM_INFO_SELECTOR).await)?.unwrap_or_default();
        Ok(contains_sold_out_keyword(&info))
    }

    async fn extract_precise(&self, page: &dyn PageHandle) -> Result<Option<u64>, ExtractionError> {
        read_precise(page, PRICE_SELECTOR, Duration::from_secs(5), &self.settings.rules).await
    }
}
