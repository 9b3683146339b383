use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kv_session_store::{config::Config, routes, services::sweeper::Sweeper, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config)?;
    tracing::info!("✅ AppState initialized");

    let shutdown = CancellationToken::new();
    let sweeper = config.cleanup_interval.map(|interval| {
        Sweeper::spawn(
            state.sessions.repository().clone(),
            interval,
            shutdown.child_token(),
        )
    });
    if sweeper.is_none() {
        tracing::warn!("⚠️  Expired session cleanup is disabled");
    }

    let app = routes::router(state);

    tracing::info!("🚀 Server listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("❌ Failed to listen for ctrl-c: {}", e);
            }
            tracing::info!("🛑 Shutdown requested");
            signal.cancel();
        })
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await;
    }

    tracing::info!("✅ Shutdown complete");
    Ok(())
}
