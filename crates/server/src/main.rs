use anyhow::Context;
use db::DBService;
use server::{AppState, config::Config, routes};
use tokio::net::TcpListener;
use tracing::info;
use utils::logging::{LogFormat, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(LogFormat::from_env());

    let db = DBService::new(&config.database_url, config.db_max_connections)
        .await
        .with_context(|| format!("failed to open database at {}", config.database_url))?;

    let state = AppState::new(db, config);
    let addr = state.config().socket_addr();
    let app = routes::router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "Server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("Ctrl-C handler unavailable, running until killed");
        std::future::pending::<()>().await;
    }
}
