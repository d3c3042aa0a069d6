use std::sync::Arc;
use std::time::Duration;

use poem::Server;
use poem::listener::TcpListener;
use quickchart::core::Engines;
use quickchart::settings::get_config;
use quickchart::telemetry::Telemetry;
use quickchart::{AppState, build_app};
use tracing::Level;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let config = get_config();

    // Production logs to daily rolling files; development to stdout.
    let _log_guard = if config.is_dev() {
        tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(false)
            .init();
        None
    } else {
        let file_appender = tracing_appender::rolling::daily("./logs", "quickchart.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_writer(non_blocking)
            .with_max_level(Level::INFO)
            .init();
        Some(guard)
    };

    tracing::info!("run with config: {:?}", config);

    let engines = Engines::production().expect("Failed to initialize rendering engines");
    let state = Arc::new(AppState {
        engines,
        telemetry: Telemetry::default(),
        config: config.clone(),
    });

    let app = build_app(state);
    let server = Server::new(TcpListener::bind(format!("{}:{}", config.host, config.port)));
    tracing::info!(
        "Listening on port {} (Timeout: {} ms)",
        config.port,
        config.request_timeout_ms
    );

    if config.is_dev() {
        server.run(app).await
    } else {
        tokio::spawn(log_abort_signal());
        server
            .run_with_graceful_shutdown(app, shutdown_signal(), Some(SHUTDOWN_GRACE))
            .await
    }
}

/// Completes when a termination signal arrives; the server then stops
/// accepting connections, drains in-flight requests, and is forcibly
/// closed after the grace period.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {}", err);
                return std::future::pending().await;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Graceful shutdown...");
}

/// SIGABRT is logged but never triggers a drain.
#[cfg(unix)]
async fn log_abort_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // SIGABRT has no named constructor in tokio.
    let Ok(mut abort) = signal(SignalKind::from_raw(6)) else {
        return;
    };
    while abort.recv().await.is_some() {
        tracing::info!("Caught SIGABRT");
    }
}

#[cfg(not(unix))]
async fn log_abort_signal() {}
