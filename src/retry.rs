use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_retry::Retry;
use tokio_retry::strategy::jitter;

use crate::concurrency::ConcurrencyController;
use crate::config::EngineConfig;
use crate::models::ExtractionResult;
use crate::page::PageFactory;
use crate::plugins::traits::SiteAdapter;
use crate::utils::error::ExtractionError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub backoff_base: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn from_config(engine: &EngineConfig) -> Self {
        Self {
            attempts: engine.retry_attempts.max(1),
            backoff_base: engine.retry_backoff_base(),
            jitter: engine.retry_jitter(),
        }
    }

    /// Delay before attempt `n + 1`: `base * n` plus up to `jitter`.
    pub fn delays(&self) -> Vec<Duration> {
        (1..self.attempts as u32)
            .map(|attempt| self.backoff_base * attempt + jitter(self.jitter))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub result: ExtractionResult,
    pub attempts: usize,
    pub elapsed: Duration,
}

/// Runs an adapter against a URL until it yields a price or sold-out signal.
///
/// Each attempt takes admission permits, opens a fresh page and closes it
/// before the next backoff; permits are not held while sleeping.
pub struct RetryExecutor {
    policy: RetryPolicy,
    pages: Arc<dyn PageFactory>,
    controller: Arc<ConcurrencyController>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, pages: Arc<dyn PageFactory>, controller: Arc<ConcurrencyController>) -> Self {
        Self {
            policy,
            pages,
            controller,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute(&self, adapter: &dyn SiteAdapter, url: &str) -> RetryOutcome {
        let started = Instant::now();
        let attempts = AtomicUsize::new(0);

        let outcome = Retry::spawn(self.policy.delays(), || {
            let attempts = &attempts;
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                let result = self.attempt(adapter, url).await;
                if let Err(err) = &result {
                    tracing::debug!(
                        "[{}] attempt {}/{} failed for {}: {}",
                        adapter.name(),
                        attempt,
                        self.policy.attempts,
                        url,
                        err
                    );
                }
                result
            }
        })
        .await;

        RetryOutcome {
            result: outcome.unwrap_or_else(ExtractionResult::Error),
            attempts: attempts.load(Ordering::SeqCst),
            elapsed: started.elapsed(),
        }
    }

    async fn attempt(&self, adapter: &dyn SiteAdapter, url: &str) -> Result<ExtractionResult, ExtractionError> {
        let _permit = self.controller.acquire(url).await?;
        let page = self.pages.open().await?;

        let result = adapter.fetch(page.as_ref(), url).await;

        if let Err(err) = page.close().await {
            tracing::debug!("Failed to close page for {}: {}", url, err);
        }

        match result {
            ExtractionResult::Error(err) => Err(err),
            signal => Ok(signal),
        }
    }
}
