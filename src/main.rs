use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use shelf_watcher::config::LoggingConfig;
use shelf_watcher::models::normalize_url;
use shelf_watcher::page::{ChromePageFactory, HttpPageFactory, PageFactory};
use shelf_watcher::plugins::notifiers::DiscordNotifier;
use shelf_watcher::store::{RowStore, SqliteRowStore};
use shelf_watcher::watch_state::WatchState;
use shelf_watcher::scheduler::startup;
use shelf_watcher::{AppConfig, EngineContext, WatchScheduler};

#[derive(Parser)]
#[command(name = "shelf-watcher", version, about = "Watches product pages for price and stock changes")]
struct Cli {
    /// Base configuration file, without extension
    #[arg(long, default_value = "config/default")]
    config: String,

    /// Log intended writes and notifications without performing them
    #[arg(long)]
    dry_run: bool,

    /// Fetch pages over plain HTTP instead of a headless browser
    #[arg(long)]
    static_fetch: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run once, then keep running on the schedule until Ctrl-C
    Serve,
    /// Run once and print the summary
    Run,
    /// Add a URL to the watch list
    Add { url: String },
    /// Remove a URL from the watch list
    Remove { url: String },
    /// Print the watch list with its current cells
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config).context("Failed to load configuration")?;
    config.engine.dry_run |= cli.dry_run;
    config.browser.static_fetch |= cli.static_fetch;

    let _log_guard = init_tracing(&config.logging);

    if config.metrics.enabled {
        let listen: std::net::SocketAddr = config.metrics.listen.parse()?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(listen)
            .install()
            .context("Failed to install metrics exporter")?;
        info!("Metrics exposed on {}", listen);
    }

    let store = Arc::new(SqliteRowStore::connect(&config.store).await?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Add { url } => {
            let url = normalize_url(&url).with_context(|| format!("Not a valid http(s) URL: {}", url))?;
            let row = store.add_url(&url).await?;
            println!("Added {} as row {}", url, row);
        }
        Command::Remove { url } => {
            let removed = store.remove_url(&url).await?;
            println!("Removed {} row(s) for {}", removed, url.trim());
        }
        Command::List => {
            for row in store.read_all().await? {
                let updated_at = store.updated_at(row.row).await?.unwrap_or_default();
                println!("{:>4}  {:<10}  {:<19}  {}", row.row, row.price_cell, updated_at, row.url);
            }
        }
        Command::Run => {
            let engine = build_engine(config, store)?;
            engine.reload_urls().await?;
            let summary = engine.run_once().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Serve => {
            let engine = Arc::new(build_engine(config, store)?);
            info!("Starting Shelf Watcher ({:?})", engine);

            startup(&engine).await;

            let mut scheduler = WatchScheduler::new(Arc::clone(&engine)).await?;
            scheduler.start().await?;

            tokio::signal::ctrl_c().await?;
            info!("Shutting down...");
            scheduler.shutdown().await?;
        }
    }

    Ok(())
}

fn build_engine(config: AppConfig, store: Arc<SqliteRowStore>) -> Result<EngineContext> {
    let pages: Arc<dyn PageFactory> = if config.browser.static_fetch {
        info!("Using static HTTP page fetches");
        Arc::new(HttpPageFactory::new(&config.browser.user_agent)?)
    } else {
        Arc::new(ChromePageFactory::launch(config.browser.clone())?)
    };
    let notifier = Arc::new(DiscordNotifier::new(Some(config.notifications.username.clone()))?);
    let state = WatchState::load(&config.state.path);
    let store: Arc<dyn RowStore> = store;

    Ok(EngineContext::new(config, pages, store, notifier, state))
}

fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shelf_watcher=info"));

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let prefix = config.file_prefix.as_deref().unwrap_or("shelf-watcher.log");
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, prefix));
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    guard
}
