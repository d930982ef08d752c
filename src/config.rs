use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use url::Url;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub browser: BrowserConfig,
    pub store: StoreConfig,
    pub state: StateConfig,
    pub notifications: NotificationsConfig,
    pub scheduler: SchedulerConfig,
    pub sheet: SheetConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    #[validate(range(min = 1))]
    pub max_concurrency: usize,
    #[validate(range(min = 1))]
    pub per_origin_concurrency: usize,
    #[validate(range(min = 1))]
    pub retry_attempts: usize,
    pub retry_backoff_base_ms: u64,
    pub retry_jitter_ms: u64,
    #[validate(range(min = 1))]
    pub price_floor: u64,
    #[validate(range(min = 1))]
    pub navigation_timeout_secs: u64,
    pub settle_delays: bool,
    pub dry_run: bool,
}

impl EngineConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn retry_backoff_base(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_base_ms)
    }

    pub fn retry_jitter(&self) -> Duration {
        Duration::from_millis(self.retry_jitter_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub chrome_path: Option<String>,
    pub user_agent: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub idle_timeout_secs: u64,
    /// Fetch pages over plain HTTP instead of driving Chrome.
    pub static_fetch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub default_webhook: Option<String>,
    pub username: String,
    /// Adapter name -> webhook URL; adapters without an entry use the default.
    #[serde(default)]
    pub adapter_webhooks: std::collections::HashMap<String, String>,
}

impl NotificationsConfig {
    pub fn channel_for(&self, adapter: &str) -> Option<String> {
        self.adapter_webhooks
            .get(adapter)
            .filter(|url| !url.trim().is_empty())
            .cloned()
            .or_else(|| self.default_channel())
    }

    pub fn default_channel(&self) -> Option<String> {
        self.default_webhook
            .as_ref()
            .filter(|url| !url.trim().is_empty())
            .cloned()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SchedulerConfig {
    #[validate(range(min = 1))]
    pub check_interval_secs: u64,
    pub check_jitter_secs: u64,
    #[validate(range(min = 1))]
    pub reload_interval_secs: u64,
    pub reload_jitter_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    pub sold_out_label: String,
    pub utc_offset_hours: i32,
    pub timestamp_format: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub directory: Option<String>,
    pub file_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load("config/default")
    }

    /// Layers `base`, the run-mode file, `config/local` and `WATCHER__*` variables.
    pub fn load(base: &str) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name(base))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "WATCHER_"
            .add_source(Environment::with_prefix("WATCHER").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = env::var("CHROME_PATH").ok();
        }

        if config.notifications.default_webhook.is_none() {
            config.notifications.default_webhook = env::var("DISCORD_WEBHOOK_URL").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine
            .validate()
            .map_err(|e| ConfigError::Message(format!("Invalid engine configuration: {}", e)))?;
        self.scheduler
            .validate()
            .map_err(|e| ConfigError::Message(format!("Invalid scheduler configuration: {}", e)))?;

        if self.engine.per_origin_concurrency > self.engine.max_concurrency {
            return Err(ConfigError::Message(
                "engine.per_origin_concurrency cannot exceed engine.max_concurrency".into(),
            ));
        }

        if self.store.max_connections == 0 {
            return Err(ConfigError::Message("Store max_connections must be greater than 0".into()));
        }

        if self.state.path.trim().is_empty() {
            return Err(ConfigError::Message("State path must not be empty".into()));
        }

        if self.sheet.sold_out_label.trim().is_empty() {
            return Err(ConfigError::Message("Sheet sold_out_label must not be empty".into()));
        }

        if !(-12..=14).contains(&self.sheet.utc_offset_hours) {
            return Err(ConfigError::Message("Sheet utc_offset_hours must be between -12 and 14".into()));
        }

        let webhooks = self
            .notifications
            .default_webhook
            .iter()
            .chain(self.notifications.adapter_webhooks.values())
            .filter(|url| !url.trim().is_empty());
        for webhook in webhooks {
            if Url::parse(webhook).is_err() {
                return Err(ConfigError::Message(format!("Invalid webhook URL: {}", webhook)));
            }
        }

        if self.metrics.enabled && self.metrics.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Message("Metrics listen must be a socket address".into()));
        }

        Ok(())
    }
}
