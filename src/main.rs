use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use mintwatch::alerts::AlertEngine;
use mintwatch::config::Config;
use mintwatch::db::Database;
use mintwatch::helius::HeliusClient;
use mintwatch::logger::{self, LogTag};
use mintwatch::notifications::{Dispatcher, Notification, PushoverClient, TelegramNotifier};
use mintwatch::prices::PriceOracle;
use mintwatch::scheduler::{Scheduler, MAX_SUMMARY_PERIOD_SECS};
use mintwatch::store::{RedisWindowStore, WindowStore};
use mintwatch::telegram::CommandHandler;
use mintwatch::webserver::{self, AppState};
use mintwatch::VERSION;

/// How long in-flight pipeline tasks get to finish after Ctrl+C.
const DRAIN_WINDOW_SECS: u64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::info(
        LogTag::System,
        &format!("🚀 mintwatch {} starting up", VERSION),
    );

    let config_path = std::env::args()
        .skip(1)
        .find(|arg| !arg.starts_with("--"))
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)?;
    logger::info(
        LogTag::System,
        &format!(
            "Configuration loaded from {} (token {}, window {}s)",
            config_path, config.token.label, config.alerts.window_seconds
        ),
    );

    // Registry and window store. Entries are retained long enough for the
    // longest summary period even when the alert window is shorter.
    let db = Arc::new(Database::open(&config.database.path)?);
    let retention_seconds = config.alerts.window_seconds.max(MAX_SUMMARY_PERIOD_SECS);
    let store: Arc<dyn WindowStore> = Arc::new(
        RedisWindowStore::connect(&config.redis, config.alerts.window_seconds, retention_seconds)
            .await?,
    );

    // Outbound integrations
    let oracle = Arc::new(PriceOracle::new(&config.prices)?);
    let telegram = TelegramNotifier::new(&config.telegram.bot_token, config.telegram.channel_id)
        .map_err(|e| anyhow::anyhow!(e))?;
    let pushover = PushoverClient::new(&config.pushover).map_err(|e| anyhow::anyhow!(e))?;
    let dispatcher = Arc::new(Dispatcher::new(telegram, pushover, db.clone()));
    let helius = HeliusClient::new(&config.helius)?;

    let engine = Arc::new(AlertEngine::new(
        config.alerts.clone(),
        config.token.clone(),
        store.clone(),
        oracle.clone(),
        dispatcher.clone(),
    ));

    let state = Arc::new(AppState {
        config: config.clone(),
        engine,
        store: store.clone(),
        oracle,
        db: db.clone(),
        dispatcher: dispatcher.clone(),
        helius,
        pipeline_tasks: TaskTracker::new(),
    });

    let shutdown = CancellationToken::new();
    let mut handles = Vec::new();

    // HTTP ingress
    {
        let state = state.clone();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = webserver::start_server(state, shutdown.clone()).await {
                logger::error(LogTag::Webserver, &format!("Webserver failed: {}", e));
                shutdown.cancel();
            }
        }));
    }

    // Periodic summaries
    let scheduler = Arc::new(Scheduler::new(
        config.token.clone(),
        store.clone(),
        dispatcher.clone(),
    ));
    handles.extend(scheduler.start(shutdown.clone()));

    // Bot command surface
    if config.telegram.commands_enabled {
        let handler =
            CommandHandler::new(&config.telegram, db.clone()).map_err(|e| anyhow::anyhow!(e))?;
        let shutdown_commands = shutdown.clone();
        handles.push(tokio::spawn(async move {
            handler.run(shutdown_commands).await;
        }));
    }

    dispatcher.announce(&Notification::service_started(VERSION)).await;
    logger::info(LogTag::System, "All services started. Press Ctrl+C to stop.");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            logger::info(LogTag::System, "Shutdown signal received");
        }
        _ = shutdown.cancelled() => {
            logger::error(LogTag::System, "A core service failed, shutting down");
        }
    }
    shutdown.cancel();

    // Give detached pipeline tasks a bounded drain window, then let the
    // process exit; anything still in flight is dropped.
    state.pipeline_tasks.close();
    if tokio::time::timeout(
        std::time::Duration::from_secs(DRAIN_WINDOW_SECS),
        state.pipeline_tasks.wait(),
    )
    .await
    .is_err()
    {
        logger::warning(
            LogTag::System,
            &format!(
                "{} pipeline tasks still running after {}s drain, dropping them",
                state.pipeline_tasks.len(),
                DRAIN_WINDOW_SECS
            ),
        );
    }

    dispatcher
        .announce(&Notification::service_stopped("shutdown requested"))
        .await;

    for handle in handles {
        let _ = handle.await;
    }

    logger::info(LogTag::System, "mintwatch stopped gracefully");
    Ok(())
}
