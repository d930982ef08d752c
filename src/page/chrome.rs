use anyhow::anyhow;
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::{PageFactory, PageHandle, classify_error};
use crate::config::BrowserConfig;
use crate::utils::error::ExtractionError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Launches one headless Chrome and hands out a fresh tab per page.
pub struct ChromePageFactory {
    browser: Arc<Browser>,
    config: BrowserConfig,
}

/// A single browser tab. Every CDP call blocks, so each runs on the blocking pool.
///
/// A tab that was never closed explicitly is closed in the background on drop.
pub struct ChromePage {
    tab: Arc<Tab>,
    closed: AtomicBool,
}

impl ChromePageFactory {
    pub fn launch(config: BrowserConfig) -> anyhow::Result<Self> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false) // Often needed in containerized environments
            .args(vec![
                std::ffi::OsStr::new("--no-sandbox"),
                std::ffi::OsStr::new("--disable-dev-shm-usage"),
                std::ffi::OsStr::new("--disable-gpu"),
                std::ffi::OsStr::new("--disable-extensions"),
                std::ffi::OsStr::new("--disable-background-timer-throttling"),
                std::ffi::OsStr::new("--disable-backgrounding-occluded-windows"),
                std::ffi::OsStr::new("--disable-renderer-backgrounding"),
                std::ffi::OsStr::new("--lang=ko-KR"),
            ])
            .build()
            .map_err(|e| anyhow!("Failed to create launch options: {}", e))?;

        // Scheduled runs are minutes apart; keep the browser alive between them.
        launch_options.idle_browser_timeout = Duration::from_secs(config.idle_timeout_secs);
        launch_options.window_size = Some((config.window_width, config.window_height));

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        Ok(Self {
            browser: Arc::new(browser),
            config,
        })
    }
}

#[async_trait]
impl PageFactory for ChromePageFactory {
    async fn open(&self) -> Result<Box<dyn PageHandle>, ExtractionError> {
        let browser = Arc::clone(&self.browser);
        let user_agent = self.config.user_agent.clone();

        let tab = tokio::task::spawn_blocking(move || -> Result<Arc<Tab>, ExtractionError> {
            let tab = browser
                .new_tab()
                .map_err(|e| ExtractionError::Unclassified(format!("Failed to create tab: {}", e)))?;
            tab.set_user_agent(&user_agent, Some("ko-KR,ko;q=0.9"), None)
                .map_err(|e| ExtractionError::Unclassified(format!("Failed to set user agent: {}", e)))?;
            Ok(tab)
        })
        .await
        .map_err(|e| ExtractionError::Unclassified(format!("browser task failed: {}", e)))??;

        Ok(Box::new(ChromePage {
            tab,
            closed: AtomicBool::new(false),
        }))
    }
}

impl ChromePage {
    async fn blocking<T, F>(&self, f: F) -> Result<T, ExtractionError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T, ExtractionError> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| ExtractionError::Unclassified(format!("browser task failed: {}", e)))?
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn evaluate(tab: &Tab, expression: &str) -> Result<serde_json::Value, ExtractionError> {
    let result = tab
        .evaluate(expression, false)
        .map_err(|e| ExtractionError::Unclassified(format!("Script evaluation failed: {}", e)))?;
    Ok(result.value.unwrap_or(serde_json::Value::Null))
}

const IS_RENDERED_JS: &str = r#"(el) => {
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    return style.display !== 'none' && style.visibility !== 'hidden' && (rect.width > 0 || rect.height > 0);
}"#;

/// A fresh tab reports `about:blank` as complete, so the target document must be current.
const DOM_READY_JS: &str = "location.href !== 'about:blank' && document.readyState !== 'loading'";

fn visible_script(selector: &str) -> String {
    format!(
        "(() => {{ const rendered = {}; const el = document.querySelector({}); return el ? rendered(el) : false; }})()",
        IS_RENDERED_JS,
        js_string(selector)
    )
}

fn visible_texts_script(selector: &str) -> String {
    format!(
        "(() => {{ const rendered = {}; return JSON.stringify(Array.from(document.querySelectorAll({})).filter(rendered).map(el => (el.innerText || el.textContent || '').trim())); }})()",
        IS_RENDERED_JS,
        js_string(selector)
    )
}

fn wait_dom_ready(tab: &Tab, timeout: Duration) -> Result<(), ExtractionError> {
    let started = Instant::now();
    loop {
        // Evaluation fails while the old context is torn down; keep polling.
        if let Ok(value) = evaluate(tab, DOM_READY_JS) {
            if value.as_bool().unwrap_or(false) {
                return Ok(());
            }
        }
        if started.elapsed() >= timeout {
            return Err(ExtractionError::NavigationTimeout);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn check_visible(tab: &Tab, selector: &str) -> Result<bool, ExtractionError> {
    Ok(evaluate(tab, &visible_script(selector))?.as_bool().unwrap_or(false))
}

#[async_trait]
impl PageHandle for ChromePage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), ExtractionError> {
        let url = url.to_string();
        self.blocking(move |tab| {
            tab.set_default_timeout(timeout);
            tab.navigate_to(&url)
                .map_err(|e| classify_error(e, ExtractionError::NavigationTimeout))?;
            wait_dom_ready(tab, timeout)
        })
        .await
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), ExtractionError> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            let started = Instant::now();
            loop {
                if check_visible(tab, &selector)? {
                    return Ok(());
                }
                if started.elapsed() >= timeout {
                    return Err(ExtractionError::SelectorTimeout { selector });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        })
        .await
    }

    async fn read_text(&self, selector: &str) -> Result<String, ExtractionError> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            let script = format!(
                "(() => {{ const el = document.querySelector({}); return el ? (el.innerText || el.textContent || '') : null; }})()",
                js_string(&selector)
            );
            match evaluate(tab, &script)? {
                serde_json::Value::String(text) => Ok(text.trim().to_string()),
                _ => Err(ExtractionError::ElementAbsent { selector }),
            }
        })
        .await
    }

    async fn read_all_texts(&self, selector: &str) -> Result<Vec<String>, ExtractionError> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            let script = format!(
                "JSON.stringify(Array.from(document.querySelectorAll({})).map(el => (el.innerText || el.textContent || '').trim()))",
                js_string(&selector)
            );
            let raw = evaluate(tab, &script)?;
            let texts = raw
                .as_str()
                .and_then(|json| serde_json::from_str::<Vec<String>>(json).ok())
                .unwrap_or_default();
            Ok(texts)
        })
        .await
    }

    async fn read_visible_texts(&self, selector: &str) -> Result<Vec<String>, ExtractionError> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            let raw = evaluate(tab, &visible_texts_script(&selector))?;
            Ok(raw
                .as_str()
                .and_then(|json| serde_json::from_str::<Vec<String>>(json).ok())
                .unwrap_or_default())
        })
        .await
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, ExtractionError> {
        let selector = selector.to_string();
        self.blocking(move |tab| check_visible(tab, &selector)).await
    }

    async fn wait_for_network_idle(&self, idle: Duration, timeout: Duration) -> Result<(), ExtractionError> {
        self.blocking(move |tab| {
            let script = "document.readyState + ':' + performance.getEntriesByType('resource').length";
            let started = Instant::now();
            let mut last_seen = String::new();
            let mut quiet_since = Instant::now();
            while started.elapsed() < timeout {
                let snapshot = evaluate(tab, script)?.as_str().unwrap_or_default().to_string();
                if snapshot != last_seen || !snapshot.starts_with("complete") {
                    last_seen = snapshot;
                    quiet_since = Instant::now();
                } else if quiet_since.elapsed() >= idle {
                    return Ok(());
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            tracing::debug!("Network idle wait expired after {:?}", timeout);
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<(), ExtractionError> {
        self.closed.store(true, Ordering::SeqCst);
        self.blocking(|tab| {
            tab.close(true)
                .map(|_| ())
                .map_err(|e| ExtractionError::Unclassified(format!("Failed to close tab: {}", e)))
        })
        .await
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let tab = Arc::clone(&self.tab);
        spawn_detached(move || {
            if let Err(e) = tab.close(false) {
                tracing::debug!("Failed to close abandoned tab: {}", e);
            }
        });
    }
}

/// Runs blocking work without waiting for it, on the runtime's blocking pool when one is current.
fn spawn_detached<F>(work: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(work);
        }
        Err(_) => {
            std::thread::spawn(work);
        }
    }
}
