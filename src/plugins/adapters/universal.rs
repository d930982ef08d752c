use async_trait::async_trait;
use std::time::Duration;

use super::common::{marker_has_sold_out, soften, visible_tag_with_keyword};
use crate::page::PageHandle;
use crate::plugins::traits::{ExtractionSettings, SiteAdapter};
use crate::utils::error::ExtractionError;

const SOLD_OUT_MARKERS: &[&str] = &[
    ".btn_soldout",
    ".btnSoldout",
    ".soldout",
    ".sold_out",
    "button[disabled]",
    "[aria-disabled='true']",
    ".layer_soldout",
    ".box__supply .text__state",
];

/// Only the top of the page is scanned; footers often list "품절" policies.
const BODY_SCAN_CHARS: usize = 3000;

/// Catch-all adapter for sites without dedicated selectors.
pub struct UniversalAdapter {
    settings: ExtractionSettings,
}

impl UniversalAdapter {
    pub fn new(settings: ExtractionSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SiteAdapter for UniversalAdapter {
    fn name(&self) -> &'static str {
        "universal"
    }

    fn prefixes(&self) -> &[&'static str] {
        &[]
    }

    fn matches(&self, _url: &str) -> bool {
        true
    }

    fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    fn settle_delay(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn is_sold_out(&self, page: &dyn PageHandle) -> Result<bool, ExtractionError> {
        for selector in SOLD_OUT_MARKERS {
            if marker_has_sold_out(page, selector).await? {
                return Ok(true);
            }
        }

        let body = soften(page.read_text("body").await)?.unwrap_or_default();
        let head: String = body.chars().take(BODY_SCAN_CHARS).collect::<String>().to_lowercase();
        if !head.contains("품절") && !head.contains("sold out") {
            return Ok(false);
        }

        for tag in ["button", "span", "div"] {
            if visible_tag_with_keyword(page, tag, &["품절"]).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
