use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use hydrate_bot::admin::{AdminState, admin_routes};
use hydrate_bot::bot::Bot;
use hydrate_bot::channels::{Channel, CliChannel, TelegramChannel};
use hydrate_bot::clock::{Clock, SystemClock};
use hydrate_bot::config::BotConfig;
use hydrate_bot::interactions::InteractionLog;
use hydrate_bot::llm::{FallbackReplies, OllamaGenerator, ReplyGenerator, Responder};
use hydrate_bot::messages::TemplatePicker;
use hydrate_bot::reminders::{self, ReminderEngine};
use hydrate_bot::store::{JsonFileBackend, UserStore};

/// Console logging, plus a daily rolling file when `LOG_DIR` is set. The
/// returned guard must live until exit so buffered lines are flushed.
fn init_tracing(config: &BotConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "hydrate-bot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::from_env().context("invalid configuration")?;
    let _log_guard = init_tracing(&config);

    eprintln!("💧 {} v{}", config.bot_name, env!("CARGO_PKG_VERSION"));
    eprintln!("   Users file: {}", config.users_file.display());
    eprintln!(
        "   Reminders: every {}s between {}h and {}h",
        config.reminders.check_interval.as_secs(),
        config.reminders.business_hours_start,
        config.reminders.business_hours_end
    );
    eprintln!("   Admin API: http://0.0.0.0:{}", config.admin_port);

    // ── Store & interaction log ─────────────────────────────────────────
    let store = Arc::new(
        UserStore::open(Arc::new(JsonFileBackend::new(&config.users_file)))
            .await
            .context("failed to open user store")?,
    );

    let (log, log_writer) = if config.log_interactions {
        let (log, handle) = InteractionLog::spawn(&config.logs_file);
        (log, Some(handle))
    } else {
        (InteractionLog::disabled(), None)
    };

    // ── Transport ───────────────────────────────────────────────────────
    let channel: Arc<dyn Channel> = match &config.telegram_bot_token {
        Some(token) => {
            let telegram = TelegramChannel::new(token.clone());
            if let Err(e) = telegram.health_check().await {
                tracing::warn!(error = %e, "Telegram health check failed, polling anyway");
            }
            Arc::new(telegram)
        }
        None => {
            eprintln!("   Channel: CLI (set TELEGRAM_BOT_TOKEN for Telegram)");
            eprintln!("   Type a message and press Enter.\n");
            Arc::new(CliChannel::default())
        }
    };

    // ── Replies ─────────────────────────────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let picker = Arc::new(TemplatePicker::from_entropy());
    let generator: Option<Arc<dyn ReplyGenerator>> = match OllamaGenerator::new(&config.ollama) {
        Ok(generator) => Some(Arc::new(generator)),
        Err(e) => {
            tracing::warn!(error = %e, "Ollama unavailable, using canned replies only");
            None
        }
    };
    let responder = Responder::new(generator, FallbackReplies::new(picker.clone()));

    let bot = Arc::new(Bot::new(
        &config,
        store.clone(),
        channel.clone(),
        clock.clone(),
        responder,
        log.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Reminder engine ─────────────────────────────────────────────────
    let engine = Arc::new(ReminderEngine::new(
        config.reminders.clone(),
        store.clone(),
        channel.clone(),
        clock,
        picker,
        log.clone(),
    ));
    let ticker = reminders::spawn_reminder_ticker(
        engine,
        config.reminders.check_interval,
        config.shutdown_drain,
        shutdown_rx.clone(),
    );

    // ── Admin API ───────────────────────────────────────────────────────
    let admin = admin_routes(AdminState {
        store: store.clone(),
        channel: channel.clone(),
        log: log.clone(),
        ready: bot.ready_flag(),
        started_at: Instant::now(),
        api_key: config.admin_api_key.clone(),
        send_timeout: config.reminders.send_timeout,
    });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.admin_port))
        .await
        .with_context(|| format!("failed to bind admin port {}", config.admin_port))?;
    let mut admin_shutdown = shutdown_rx.clone();
    let admin_server = tokio::spawn(async move {
        let result = axum::serve(listener, admin)
            .with_graceful_shutdown(async move {
                let _ = admin_shutdown.wait_for(|stop| *stop).await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "Admin server failed");
        }
    });

    // ── Signals ─────────────────────────────────────────────────────────
    let shutdown_tx = Arc::new(shutdown_tx);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            signal_tx.send_replace(true);
        }
    });

    let run_result = bot.clone().run(shutdown_rx).await;

    // ── Shutdown ────────────────────────────────────────────────────────
    // The loop may also end because the inbound stream closed.
    shutdown_tx.send_replace(true);
    let _ = ticker.await;
    let _ = admin_server.await;
    if let Err(e) = channel.shutdown().await {
        tracing::warn!(error = %e, "Channel shutdown failed");
    }
    if let Err(e) = store.flush().await {
        tracing::error!(error = %e, "Final store flush failed");
    }
    log.drain().await;
    drop(log);
    if let Some(handle) = log_writer {
        handle.abort();
    }
    tracing::info!("Bye 💧");

    run_result.context("message loop failed")?;
    Ok(())
}
