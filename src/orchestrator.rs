//! One watch run: extract every URL concurrently, then sync results in order.

use chrono::{FixedOffset, Offset, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::Instrument;
use uuid::Uuid;

use crate::concurrency::ConcurrencyController;
use crate::config::AppConfig;
use crate::models::{Column, ExtractionResult, RunSummary, StoreRow, watch_list};
use crate::page::PageFactory;
use crate::plugins::manager::AdapterRegistry;
use crate::plugins::traits::{Notification, NotifierPlugin};
use crate::retry::{RetryExecutor, RetryOutcome, RetryPolicy};
use crate::store::RowStore;
use crate::sync::{SyncPlan, SyncPolicy};
use crate::utils::error::ExtractionError;
use crate::watch_state::WatchState;

/// Everything a run needs, passed explicitly instead of living in globals.
pub struct EngineContext {
    config: AppConfig,
    registry: AdapterRegistry,
    pages: Arc<dyn PageFactory>,
    store: Arc<dyn RowStore>,
    notifier: Arc<dyn NotifierPlugin>,
    sync_policy: SyncPolicy,
    state: Mutex<WatchState>,
    urls: RwLock<Vec<String>>,
    run_guard: Mutex<()>,
}

/// Extraction outcome of one URL, kept with its binding details.
struct UrlOutcome {
    url: String,
    adapter: &'static str,
    channel: Option<String>,
    result: ExtractionResult,
}

impl EngineContext {
    pub fn new(
        config: AppConfig,
        pages: Arc<dyn PageFactory>,
        store: Arc<dyn RowStore>,
        notifier: Arc<dyn NotifierPlugin>,
        state: WatchState,
    ) -> Self {
        let registry = AdapterRegistry::from_config(&config);
        let sync_policy = SyncPolicy::new(config.sheet.sold_out_label.clone());
        Self {
            config,
            registry,
            pages,
            store,
            notifier,
            sync_policy,
            state: Mutex::new(state),
            urls: RwLock::new(Vec::new()),
            run_guard: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub async fn urls(&self) -> Vec<String> {
        self.urls.read().await.clone()
    }

    pub async fn set_urls(&self, urls: Vec<String>) {
        *self.urls.write().await = urls;
    }

    /// Snapshot of the watch state, mainly for inspection.
    pub async fn state(&self) -> WatchState {
        self.state.lock().await.clone()
    }

    fn dry_run(&self) -> bool {
        self.config.engine.dry_run
    }

    /// Current time in the configured offset, formatted for cells and messages.
    pub fn timestamp(&self) -> String {
        let offset = FixedOffset::east_opt(self.config.sheet.utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix());
        Utc::now()
            .with_timezone(&offset)
            .format(&self.config.sheet.timestamp_format)
            .to_string()
    }

    /// Replaces the in-memory URL list with the store's rows.
    pub async fn reload_urls(&self) -> crate::Result<usize> {
        let rows = match self.store.read_all().await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("URL reload failed: {}", e);
                self.notify_default(format!("URL reload failed: {}", e)).await;
                return Err(e);
            }
        };

        let urls = watch_list(&rows);
        let count = urls.len();
        self.set_urls(urls).await;

        tracing::info!("URL list reloaded: {}", count);
        self.notify_default(format!("URL list reloaded: {}", count)).await;
        Ok(count)
    }

    /// Runs once, waiting for any run already in progress.
    pub async fn run_once(&self) -> crate::Result<RunSummary> {
        let _guard = self.run_guard.lock().await;
        self.run_locked().await
    }

    /// Runs once unless another run holds the guard; `None` means skipped.
    pub async fn try_run_once(&self) -> Option<crate::Result<RunSummary>> {
        let _guard = self.run_guard.try_lock().ok()?;
        Some(self.run_locked().await)
    }

    async fn run_locked(&self) -> crate::Result<RunSummary> {
        let span = tracing::info_span!("run", run_id = %Uuid::new_v4());
        self.execute_run().instrument(span).await
    }

    async fn execute_run(&self) -> crate::Result<RunSummary> {
        let started = Instant::now();
        let urls = self.urls().await;

        if urls.is_empty() {
            tracing::info!("URL list is empty; skipping run");
            self.persist_state().await;
            return Ok(RunSummary::default());
        }

        let timestamp = self.timestamp();
        let outcomes = self.extract_all(&urls).await;

        let rows = match self.store.read_all().await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("Row store unavailable, {} results left unsynced: {}", outcomes.len(), e);
                self.persist_state().await;
                return Err(e);
            }
        };

        let mut summary = RunSummary {
            total: urls.len(),
            ..RunSummary::default()
        };
        self.sync_all(outcomes, &rows, &timestamp, &mut summary).await;
        self.persist_state().await;

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            total = summary.total,
            changed = summary.changed,
            backfilled = summary.backfilled,
            removed = summary.removed,
            errored = summary.errored,
            write_failures = summary.write_failures,
            dry_run = self.dry_run(),
            "Run summary in {:.2}s",
            summary.elapsed_ms as f64 / 1000.0
        );
        Ok(summary)
    }

    /// One task per URL; results come back in `urls` order.
    async fn extract_all(&self, urls: &[String]) -> Vec<UrlOutcome> {
        let engine = &self.config.engine;
        let controller = Arc::new(ConcurrencyController::new(
            engine.max_concurrency,
            engine.per_origin_concurrency,
            urls.iter().map(String::as_str),
        ));
        let executor = Arc::new(RetryExecutor::new(
            RetryPolicy::from_config(engine),
            Arc::clone(&self.pages),
            controller,
        ));

        let mut pending = Vec::with_capacity(urls.len());
        for url in urls {
            let Some(binding) = self.registry.resolve(url) else {
                pending.push((url.clone(), "none", None, None));
                continue;
            };

            let executor = Arc::clone(&executor);
            let adapter = Arc::clone(&binding.adapter);
            let task_url = url.clone();
            let handle = tokio::spawn(
                async move { executor.execute(adapter.as_ref(), &task_url).await }.in_current_span(),
            );
            pending.push((url.clone(), binding.adapter.name(), binding.channel.clone(), Some(handle)));
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        for (url, adapter, channel, handle) in pending {
            let result = match handle {
                Some(handle) => match handle.await {
                    Ok(RetryOutcome {
                        result,
                        attempts,
                        elapsed,
                    }) => {
                        tracing::info!(
                            "[{}] {} -> {} ({:.2}s, {} attempt(s))",
                            adapter,
                            url,
                            result,
                            elapsed.as_secs_f64(),
                            attempts
                        );
                        result
                    }
                    Err(e) => {
                        tracing::error!("[{}] extraction task for {} failed: {}", adapter, url, e);
                        ExtractionResult::Error(ExtractionError::Unclassified(format!("task failed: {}", e)))
                    }
                },
                None => ExtractionResult::Error(ExtractionError::Unclassified("no adapter registered".to_string())),
            };

            metrics::counter!("watcher_extractions_total", "adapter" => adapter, "outcome" => result.label())
                .increment(1);
            outcomes.push(UrlOutcome {
                url,
                adapter,
                channel,
                result,
            });
        }
        outcomes
    }

    async fn sync_all(&self, outcomes: Vec<UrlOutcome>, rows: &[StoreRow], timestamp: &str, summary: &mut RunSummary) {
        // The bottom-most row wins when a URL is listed more than once.
        let mut row_index: HashMap<String, &StoreRow> = HashMap::new();
        for row in rows {
            row_index.insert(row.url.trim().to_string(), row);
        }

        for outcome in outcomes {
            if let ExtractionResult::Error(err) = &outcome.result {
                tracing::warn!("[{}] Error extracting {}: {}", outcome.adapter, outcome.url, err);
                summary.errored += 1;
                continue;
            }

            let Some(row) = row_index.get(outcome.url.as_str()) else {
                if self.forget_url(&outcome.url).await {
                    tracing::info!("{} no longer in the row store; removed from watch list", outcome.url);
                    summary.removed += 1;
                }
                continue;
            };

            let previous = self.state.lock().await.previous(&outcome.url);
            let plan = self.sync_policy.plan(&outcome.result, previous, &row.snapshot());

            if plan.needs_write() {
                if let Err(e) = self.apply_writes(row.row, &plan, timestamp).await {
                    tracing::warn!("[{}] Write failed for {}: {}", outcome.adapter, outcome.url, e);
                    metrics::counter!("watcher_writes_total", "outcome" => "failed").increment(1);
                    summary.write_failures += 1;
                    continue;
                }
                metrics::counter!("watcher_writes_total", "outcome" => "ok").increment(1);
            }

            if let Some(notification) =
                Notification::from_transition(plan.transition, outcome.adapter, &outcome.url, timestamp)
            {
                if self.deliver(outcome.channel.as_deref(), &notification).await {
                    summary.notifications += 1;
                }
            }

            if let Some(current) = plan.current {
                self.state.lock().await.record(&outcome.url, current);
            }
            if plan.changed {
                summary.changed += 1;
            }
            if plan.backfill {
                tracing::info!("[{}] Backfilled {} -> {:?}", outcome.adapter, outcome.url, plan.write_value);
                summary.backfilled += 1;
            }
        }
    }

    async fn apply_writes(&self, row: i64, plan: &SyncPlan, timestamp: &str) -> crate::Result<()> {
        if self.dry_run() {
            tracing::info!(
                "[dry-run] row {}: value={:?} timestamp={}",
                row,
                plan.write_value,
                plan.write_timestamp
            );
            return Ok(());
        }

        if let Some(value) = &plan.write_value {
            self.store.write_cell(row, Column::Price, value).await?;
        }
        if plan.write_timestamp {
            self.store.write_cell(row, Column::UpdatedAt, timestamp).await?;
        }
        Ok(())
    }

    /// Returns whether the notification went out; failures are only logged.
    async fn deliver(&self, channel: Option<&str>, notification: &Notification) -> bool {
        if self.dry_run() {
            tracing::info!("[dry-run] notification skipped: {:?} {}", notification.kind, notification.url);
            return false;
        }

        let Some(channel) = channel.filter(|c| !c.trim().is_empty()) else {
            tracing::info!(
                "No channel for {}; {:?} {} logged only",
                notification.adapter,
                notification.kind,
                notification.url
            );
            return false;
        };

        match self.notifier.send(channel, notification).await {
            Ok(()) => {
                metrics::counter!("watcher_notifications_total", "outcome" => "sent").increment(1);
                true
            }
            Err(e) => {
                tracing::warn!("Notification via {} failed: {}", self.notifier.name(), e);
                metrics::counter!("watcher_notifications_total", "outcome" => "failed").increment(1);
                false
            }
        }
    }

    async fn notify_default(&self, message: String) {
        let notification = Notification::info(message, self.timestamp());
        let channel = self.config.notifications.default_channel();
        self.deliver(channel.as_deref(), &notification).await;
    }

    async fn forget_url(&self, url: &str) -> bool {
        let mut urls = self.urls.write().await;
        let before = urls.len();
        urls.retain(|u| u != url);
        urls.len() != before
    }

    async fn persist_state(&self) {
        if self.dry_run() {
            tracing::info!("[dry-run] state save skipped");
            return;
        }
        if let Err(e) = self.state.lock().await.save() {
            tracing::error!("Failed to save watch state: {}", e);
        }
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("adapters", &self.registry.len())
            .field("dry_run", &self.dry_run())
            .finish()
    }
}
