mod config;
mod context;
mod service;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use quagmire_admin::{AdminState, ModelSummary, TarpitMetrics};
use quagmire_bot_detect::TagCounter;
use quagmire_common::{AppConfig, LoggingConfig, ModelConfig, SessionConfig, StoreBackend};
use quagmire_session::{MemoryStore, RedisStore, SessionStore, SessionTracker};
use quagmire_text_model::{load_corpus, TextModel};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::{LoadedConfig, DEFAULT_CONFIG_PATH};
use crate::service::{build_router, TarpitService};

const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Daily-rotated `app.YYYY-MM-DD.log` files under `dir`.
fn log_file_appender(dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create log dir {}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("app")
        .filename_suffix("log")
        .build(dir)
        .with_context(|| format!("failed to open log file in {}", dir.display()))
}

/// Install the global subscriber. The returned guard flushes the file
/// writer and must live until the process exits.
fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout = if logging.json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    let (file, guard) = match &logging.file_dir {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(log_file_appender(dir)?);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout)
        .with(file)
        .with(filter)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(guard)
}

fn build_model(config: &ModelConfig) -> Result<TextModel> {
    let corpus = load_corpus(config.corpus_path.as_ref()).with_context(|| {
        format!("failed to read corpus {:?}", config.corpus_path)
    })?;
    let model = TextModel::build(&corpus, config.order)
        .with_max_sentence_tokens(config.max_sentence_tokens);

    if model.is_empty() {
        warn!(order = config.order, "text model has no transitions, pages will carry no prose");
    } else {
        info!(
            order = model.order(),
            vocabulary = model.vocabulary().len(),
            transitions = model.transition_count(),
            "text model built"
        );
    }
    Ok(model)
}

async fn connect_store(config: &SessionConfig, shutdown: &CancellationToken) -> Result<Arc<dyn SessionStore>> {
    match config.backend {
        StoreBackend::Redis => {
            let endpoint = config.redis_endpoint_from_env()?;
            let store = RedisStore::connect_with_retry(
                &endpoint,
                config.connect_retries,
                Duration::from_secs(config.retry_delay_secs),
            )
            .await
            .context("redis unreachable")?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("using in-process session store, state is lost on restart");
            let store = Arc::new(MemoryStore::new());
            let purge = store.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(MEMORY_PURGE_INTERVAL);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => purge.purge_expired(),
                        _ = shutdown.cancelled() => break,
                    }
                }
            });
            Ok(store)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn serve_tarpit(router: axum::Router, listen_addr: String, shutdown: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", listen_addr))?;
    info!(addr = %listen_addr, "tarpit listening");

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line args for config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let loaded = LoadedConfig::load(&config_path)?;
    let _log_guard = init_tracing(&loaded.config.logging)?;
    info!(
        source = %loaded.source(),
        log_dir = ?loaded.config.logging.file_dir,
        "starting quagmire"
    );

    let config: AppConfig = loaded.config;
    let shutdown = CancellationToken::new();

    let model = Arc::new(build_model(&config.model)?);
    let store = connect_store(&config.session, &shutdown).await?;
    let tracker = Arc::new(SessionTracker::new(store, &config.session));
    let metrics = Arc::new(TarpitMetrics::new()?);
    let tags = Arc::new(TagCounter::new());

    let service = Arc::new(TarpitService::new(
        config.clone(),
        model.clone(),
        tracker.clone(),
        metrics.clone(),
        tags.clone(),
        shutdown.clone(),
    ));
    let router = build_router(service);

    let mut tasks = tokio::task::JoinSet::new();
    for listen_addr in &config.server.listen {
        tasks.spawn(serve_tarpit(router.clone(), listen_addr.clone(), shutdown.clone()));
    }

    if config.server.admin.enabled {
        let state = Arc::new(AdminState::new(
            config.clone(),
            metrics,
            tracker,
            tags,
            ModelSummary {
                order: model.order(),
                vocabulary: model.vocabulary().len(),
                transitions: model.transition_count(),
            },
        ));
        let admin_listen = config.server.admin.listen.clone();
        let admin_shutdown = shutdown.clone();
        tasks.spawn(async move {
            quagmire_admin::run_admin_server(state, &admin_listen, admin_shutdown).await
        });
    }

    info!("quagmire started");

    tokio::select! {
        _ = shutdown_signal() => info!("shutdown signal received"),
        Some(result) = tasks.join_next() => {
            // A listener exited on its own, which only happens on error.
            match result {
                Ok(Err(e)) => error!(error = %e, "listener failed"),
                Err(e) => error!(error = %e, "listener task panicked"),
                Ok(Ok(())) => warn!("listener stopped"),
            }
        }
    }

    // Ends every open stream and stops the listeners.
    shutdown.cancel();
    while let Some(result) = tasks.join_next().await {
        if let Ok(Err(e)) = result {
            error!(error = %e, "listener failed during shutdown");
        }
    }
    info!("quagmire stopped");
    Ok(())
}
