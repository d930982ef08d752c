use async_trait::async_trait;
use std::time::Duration;

use super::common::{any_text_has_sold_out, read_precise, soften};
use crate::page::PageHandle;
use crate::plugins::traits::{ExtractionSettings, IdleStrategy, SiteAdapter};
use crate::utils::error::ExtractionError;
use crate::utils::price::contains_sold_out_keyword;

const COUPON_PRICE_SELECTOR: &str = "#itemcase_basic span[class*='price_innerwrap-coupon'] strong";
const NORMAL_PRICE_SELECTOR: &str = "#itemcase_basic div[class*='box__price'] strong[class*='price_real']";
const SOLD_OUT_SELECTOR: &str =
    ".btn_soldout, .soldout, button[disabled], .box__supply .text__state, .layer_soldout, [aria-disabled='true']";
const ITEM_BOX: &str = "#itemcase_basic";

/// Some sold-out items keep the price block but print "SOLD OUT" inside it.
const PRICE_STATUS_SELECTORS: &[&str] = &[
    "#itemcase_basic > div > div.box__price.price > span > strong",
    "#itemcase_basic .box__price strong",
    "#itemcase_basic .box__price",
];

pub struct GmarketAdapter {
    settings: ExtractionSettings,
}

impl GmarketAdapter {
    pub const PREFIXES: &'static [&'static str] = &[
        "https://item.gmarket.co.kr/Item",
        "https://item2.gmarket.co.kr/Item",
        "https://mitem.gmarket.co.kr/Item",
    ];

    pub fn new(settings: ExtractionSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SiteAdapter for GmarketAdapter {
    fn name(&self) -> &'static str {
        "gmarket"
    }

    fn prefixes(&self) -> &[&'static str] {
        Self::PREFIXES
    }

    fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    fn settle_delay(&self) -> Duration {
        Duration::from_millis(600)
    }

    fn idle_strategy(&self) -> IdleStrategy {
        IdleStrategy::RetryPrecise {
            idle: Duration::from_millis(600),
            timeout: Duration::from_secs(8),
        }
    }

    async fn is_sold_out(&self, page: &dyn PageHandle) -> Result<bool, ExtractionError> {
        if any_text_has_sold_out(page, SOLD_OUT_SELECTOR).await? {
            return Ok(true);
        }

        for selector in PRICE_STATUS_SELECTORS {
            if any_text_has_sold_out(page, selector).await? {
                return Ok(true);
            }
        }

        let item_text = soften(page.read_text(ITEM_BOX).await)?.unwrap_or_default();
        Ok(contains_sold_out_keyword(&item_text))
    }

    /// Coupon price first, then the regular selling price.
    async fn extract_precise(&self, page: &dyn PageHandle) -> Result<Option<u64>, ExtractionError> {
        let rules = &self.settings.rules;
        if let Some(price) = read_precise(page, COUPON_PRICE_SELECTOR, Duration::from_secs(4), rules).await? {
            return Ok(Some(price));
        }
        read_precise(page, NORMAL_PRICE_SELECTOR, Duration::from_secs(6), rules).await
    }
}
