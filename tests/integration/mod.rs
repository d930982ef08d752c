// Integration tests for Shelf Watcher
// These tests drive whole runs against scripted pages and an in-memory store

pub mod concurrency_tests;
pub mod run_tests;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shelf_watcher::{
    AppConfig, EngineContext,
    concurrency::origin_key,
    config::{
        BrowserConfig, EngineConfig, LoggingConfig, MetricsConfig, NotificationsConfig, SchedulerConfig,
        SheetConfig, StateConfig, StoreConfig,
    },
    page::{PageFactory, PageHandle, StaticPage},
    plugins::traits::{Notification, NotificationKind, NotifierPlugin},
    store::MemoryRowStore,
    utils::error::ExtractionError,
    watch_state::WatchState,
};

pub const WEBHOOK: &str = "https://discord.test/api/webhooks/1/token";

/// Test configuration for integration tests
pub fn get_test_config() -> AppConfig {
    AppConfig {
        engine: EngineConfig {
            max_concurrency: 5,
            per_origin_concurrency: 2,
            retry_attempts: 2,
            retry_backoff_base_ms: 10,
            retry_jitter_ms: 0,
            price_floor: 5000,
            navigation_timeout_secs: 5,
            settle_delays: false,
            dry_run: false,
        },
        browser: BrowserConfig {
            chrome_path: None,
            user_agent: "ShelfWatcherTest/1.0".to_string(),
            headless: true,
            window_width: 1280,
            window_height: 900,
            idle_timeout_secs: 60,
            static_fetch: true,
        },
        store: StoreConfig {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        state: StateConfig {
            path: "price_state.json".to_string(),
        },
        notifications: NotificationsConfig {
            default_webhook: Some(WEBHOOK.to_string()),
            username: "Shelf Watcher".to_string(),
            adapter_webhooks: HashMap::new(),
        },
        scheduler: SchedulerConfig {
            check_interval_secs: 300,
            check_jitter_secs: 0,
            reload_interval_secs: 1800,
            reload_jitter_secs: 0,
        },
        sheet: SheetConfig {
            sold_out_label: "품절".to_string(),
            utc_offset_hours: 9,
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
        },
        logging: LoggingConfig::default(),
        metrics: MetricsConfig {
            enabled: false,
            listen: "127.0.0.1:9001".to_string(),
        },
    }
}

/// What a scripted URL serves on navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Price(u64),
    SoldOut,
    /// Renders, but nothing at or above the price floor.
    NoPrice,
    /// Navigation always times out.
    Fail,
    /// Navigation times out `failures` times, then serves `price`.
    FailThenPrice { failures: usize, price: u64 },
}

impl Script {
    fn html(&self) -> String {
        match self {
            Script::Price(price) | Script::FailThenPrice { price, .. } => format!(
                r#"<html><body><h1>Item</h1><div class="price_area"><span class="price">{}원</span></div></body></html>"#,
                group_thousands(*price)
            ),
            Script::SoldOut => {
                r#"<html><body><h1>Item</h1><button class="btn_soldout">품절</button></body></html>"#.to_string()
            }
            Script::NoPrice => r#"<html><body><h1>Item</h1><span class="price">990원</span></body></html>"#.to_string(),
            Script::Fail => String::new(),
        }
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::new();
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Counters shared by every page a [`ScriptedPageFactory`] opens.
#[derive(Debug, Default)]
pub struct PageStats {
    opens: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    origins: Mutex<HashMap<String, (usize, usize)>>,
    navigations: Mutex<HashMap<String, usize>>,
}

impl PageStats {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn max_active_for(&self, origin: &str) -> usize {
        self.origins.lock().unwrap().get(origin).map(|(_, max)| *max).unwrap_or(0)
    }

    pub fn navigations(&self, url: &str) -> usize {
        self.navigations.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn enter(&self, url: &str) -> usize {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if let Some(origin) = origin_key(url) {
            let mut origins = self.origins.lock().unwrap();
            let entry = origins.entry(origin).or_insert((0, 0));
            entry.0 += 1;
            entry.1 = entry.1.max(entry.0);
        }

        let mut navigations = self.navigations.lock().unwrap();
        let count = navigations.entry(url.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn leave(&self, url: &str) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        if let Some(origin) = origin_key(url) {
            if let Some(entry) = self.origins.lock().unwrap().get_mut(&origin) {
                entry.0 -= 1;
            }
        }
    }
}

struct Scripts {
    scripts: Mutex<HashMap<String, Script>>,
    delay: Duration,
    stats: Arc<PageStats>,
}

/// Page factory serving canned markup per URL after an optional delay.
#[derive(Clone)]
pub struct ScriptedPageFactory {
    inner: Arc<Scripts>,
}

impl ScriptedPageFactory {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            inner: Arc::new(Scripts {
                scripts: Mutex::new(HashMap::new()),
                delay,
                stats: Arc::new(PageStats::default()),
            }),
        }
    }

    pub fn set(&self, url: &str, script: Script) {
        self.inner.scripts.lock().unwrap().insert(url.to_string(), script);
    }

    pub fn stats(&self) -> &PageStats {
        &self.inner.stats
    }

    fn script_for(&self, url: &str) -> Script {
        self.inner.scripts.lock().unwrap().get(url).copied().unwrap_or(Script::NoPrice)
    }
}

#[async_trait]
impl PageFactory for ScriptedPageFactory {
    async fn open(&self) -> Result<Box<dyn PageHandle>, ExtractionError> {
        self.inner.stats.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedPage {
            factory: self.clone(),
            url: Mutex::new(None),
            loaded: Mutex::new(None),
        }))
    }
}

pub struct ScriptedPage {
    factory: ScriptedPageFactory,
    url: Mutex<Option<String>>,
    loaded: Mutex<Option<Arc<StaticPage>>>,
}

impl ScriptedPage {
    fn loaded(&self) -> Result<Arc<StaticPage>, ExtractionError> {
        self.loaded
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ExtractionError::Unclassified("page has not been navigated".to_string()))
    }
}

#[async_trait]
impl PageHandle for ScriptedPage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), ExtractionError> {
        let visit = self.factory.stats().enter(url);
        *self.url.lock().unwrap() = Some(url.to_string());

        let delay = self.factory.inner.delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let script = self.factory.script_for(url);
        let failing = match script {
            Script::Fail => true,
            Script::FailThenPrice { failures, .. } => visit <= failures,
            _ => false,
        };
        if failing {
            return Err(ExtractionError::NavigationTimeout);
        }

        *self.loaded.lock().unwrap() = Some(Arc::new(StaticPage::from_html(script.html())));
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), ExtractionError> {
        self.loaded()?.wait_for_selector(selector, timeout).await
    }

    async fn read_text(&self, selector: &str) -> Result<String, ExtractionError> {
        self.loaded()?.read_text(selector).await
    }

    async fn read_all_texts(&self, selector: &str) -> Result<Vec<String>, ExtractionError> {
        self.loaded()?.read_all_texts(selector).await
    }

    async fn read_visible_texts(&self, selector: &str) -> Result<Vec<String>, ExtractionError> {
        self.loaded()?.read_visible_texts(selector).await
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, ExtractionError> {
        self.loaded()?.is_visible(selector).await
    }

    async fn close(&self) -> Result<(), ExtractionError> {
        if let Some(url) = self.url.lock().unwrap().take() {
            self.factory.stats().leave(&url);
        }
        Ok(())
    }
}

/// Notifier that keeps every delivery for later assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Notification)>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent.lock().unwrap().iter().map(|(_, n)| n.kind).collect()
    }

    /// Deliveries other than operational info messages.
    pub fn changes(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, n)| n.kind != NotificationKind::Info)
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub fn channels(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl NotifierPlugin for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, channel: &str, notification: &Notification) -> shelf_watcher::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), notification.clone()));
        Ok(())
    }
}

/// A fully wired engine plus handles to its test doubles.
pub struct TestHarness {
    pub engine: Arc<EngineContext>,
    pub pages: ScriptedPageFactory,
    pub store: Arc<MemoryRowStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestHarness {
    pub fn new(config: AppConfig, pages: ScriptedPageFactory, urls: &[&str]) -> Self {
        Self::with_state(config, pages, urls, WatchState::in_memory())
    }

    pub fn with_state(config: AppConfig, pages: ScriptedPageFactory, urls: &[&str], state: WatchState) -> Self {
        let store = Arc::new(MemoryRowStore::with_urls(urls.iter().copied()));
        let notifier = Arc::new(RecordingNotifier::default());

        let engine = Arc::new(EngineContext::new(
            config,
            Arc::new(pages.clone()),
            store.clone(),
            notifier.clone(),
            state,
        ));

        Self {
            engine,
            pages,
            store,
            notifier,
        }
    }

    /// Loads the store's URL list into the engine and drops the reload notice.
    pub async fn reload(&self) -> usize {
        let count = self.engine.reload_urls().await.unwrap();
        self.notifier.clear();
        count
    }
}
