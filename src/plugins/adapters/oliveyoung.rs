use async_trait::async_trait;
use std::time::Duration;
use tokio_retry::strategy::jitter;

use super::common::{any_text_has_sold_out, read_precise, visible_text_has_sold_out, wait_visible};
use crate::page::PageHandle;
use crate::plugins::traits::{ExtractionSettings, IdleStrategy, SiteAdapter};
use crate::utils::error::ExtractionError;

const PRICE_SELECTOR: &str =
    "#Contents > div.prd_detail_box.renew > div.right_area > div > div.price > span.price-2";
const SOLD_OUT_PRIMARY: &str = "#Contents > div.prd_detail_box.renew > div.right_area > div > \
     div.prd_btn_area.new-style.type1 > button.btnSoldout.recoPopBtn.temprecobell";
const SOLD_OUT_FALLBACKS: &str = ".btnSoldout, button[disabled], .soldout, .btnL.stSoldOut";

pub struct OliveYoungAdapter {
    settings: ExtractionSettings,
}

impl OliveYoungAdapter {
    pub const PREFIXES: &'static [&'static str] = &[
        "https://www.oliveyoung.co.kr/store/goods/getGoodsDetail.do",
        "https://m.oliveyoung.co.kr/m/goods/getGoodsDetail.do",
    ];

    pub fn new(settings: ExtractionSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SiteAdapter for OliveYoungAdapter {
    fn name(&self) -> &'static str {
        "oliveyoung"
    }

    fn prefixes(&self) -> &[&'static str] {
        Self::PREFIXES
    }

    fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    fn settle_delay(&self) -> Duration {
        Duration::from_millis(700) + jitter(Duration::from_millis(600))
    }

    fn idle_strategy(&self) -> IdleStrategy {
        IdleStrategy::AfterExtraction {
            idle: Duration::from_millis(500),
            timeout: Duration::from_secs(9),
        }
    }

    async fn is_sold_out(&self, page: &dyn PageHandle) -> Result<bool, ExtractionError> {
        if visible_text_has_sold_out(page, SOLD_OUT_PRIMARY, Duration::from_secs(2)).await? {
            return Ok(true);
        }
        if !wait_visible(page, SOLD_OUT_FALLBACKS, Duration::from_secs(2)).await? {
            return Ok(false);
        }
        any_text_has_sold_out(page, SOLD_OUT_FALLBACKS).await
    }

    async fn extract_precise(&self, page: &dyn PageHandle) -> Result<Option<u64>, ExtractionError> {
        read_precise(page, PRICE_SELECTOR, Duration::from_secs(10), &self.settings.rules).await
    }
}
