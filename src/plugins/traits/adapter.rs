use async_trait::async_trait;
use std::time::Duration;

use crate::models::ExtractionResult;
use crate::page::PageHandle;
use crate::plugins::adapters::common::extract_price_fallback;
use crate::utils::error::ExtractionError;
use crate::utils::price::PriceRules;

/// Settings shared by every adapter instance.
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub rules: PriceRules,
    pub navigation_timeout: Duration,
    /// Honour each adapter's post-navigation settle delay.
    pub settle_delays: bool,
}

impl ExtractionSettings {
    pub fn new(price_floor: u64, navigation_timeout: Duration) -> Self {
        Self {
            rules: PriceRules::new(price_floor),
            navigation_timeout,
            settle_delays: true,
        }
    }
}

/// When an adapter waits for network quiescence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleStrategy {
    Never,
    /// Wait once the price has been read, before returning.
    AfterExtraction { idle: Duration, timeout: Duration },
    /// Wait and re-read the precise selector when the first read found nothing.
    RetryPrecise { idle: Duration, timeout: Duration },
}

/// Site-specific extraction logic for one marketplace family.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Adapter metadata
    fn name(&self) -> &'static str;
    fn prefixes(&self) -> &[&'static str];
    fn settings(&self) -> &ExtractionSettings;

    fn matches(&self, url: &str) -> bool {
        self.prefixes().iter().any(|prefix| url.starts_with(prefix))
    }

    /// Pause after navigation so client-side rendering can start.
    fn settle_delay(&self) -> Duration {
        Duration::ZERO
    }

    fn idle_strategy(&self) -> IdleStrategy {
        IdleStrategy::Never
    }

    /// Missing marker elements mean "not sold out", never an error.
    async fn is_sold_out(&self, page: &dyn PageHandle) -> Result<bool, ExtractionError>;

    /// Price from the adapter's exact selectors, if they yield a valid amount.
    async fn extract_precise(&self, _page: &dyn PageHandle) -> Result<Option<u64>, ExtractionError> {
        Ok(None)
    }

    /// Precise selectors first, then the shared generic scan.
    async fn extract_price(&self, page: &dyn PageHandle) -> Result<Option<u64>, ExtractionError> {
        let mut price = self.extract_precise(page).await?;

        if price.is_none() {
            if let IdleStrategy::RetryPrecise { idle, timeout } = self.idle_strategy() {
                page.wait_for_network_idle(idle, timeout).await?;
                price = self.extract_precise(page).await?;
            }
        }

        if price.is_none() {
            tracing::debug!("[{}] precise selectors empty, using generic scan", self.name());
            price = extract_price_fallback(page, &self.settings().rules).await?;
        }

        Ok(price)
    }

    /// Runs one full extraction; every failure becomes `ExtractionResult::Error`.
    async fn fetch(&self, page: &dyn PageHandle, url: &str) -> ExtractionResult {
        match self.try_fetch(page, url).await {
            Ok(result) => result,
            Err(err) => {
                tracing::debug!("[{}] {} failed: {}", self.name(), url, err);
                ExtractionResult::Error(err)
            }
        }
    }

    async fn try_fetch(&self, page: &dyn PageHandle, url: &str) -> Result<ExtractionResult, ExtractionError> {
        let settings = self.settings();
        page.navigate(url, settings.navigation_timeout).await?;

        if settings.settle_delays {
            let delay = self.settle_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        if self.is_sold_out(page).await? {
            return Ok(ExtractionResult::SoldOut);
        }

        let price = self.extract_price(page).await?;

        if let IdleStrategy::AfterExtraction { idle, timeout } = self.idle_strategy() {
            page.wait_for_network_idle(idle, timeout).await?;
        }

        match price {
            Some(amount) if settings.rules.is_valid(amount) => Ok(ExtractionResult::Price(amount)),
            _ => Err(ExtractionError::ParseFailure {
                text: format!("no price at or above {} on {}", settings.rules.floor, url),
            }),
        }
    }
}
