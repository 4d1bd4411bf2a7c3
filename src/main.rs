use chrono::Local;
use habit_engine::models::AppData;
use habit_engine::{router, AppState, CompletionStore, Config, FileStore};
use std::net::SocketAddr;
use tokio::fs;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    fs::create_dir_all(&config.data_dir).await?;

    let store = CompletionStore::new(FileStore::new(&config.data_dir));
    let activities = store.load_activities().await;
    let completions = store.load().await;
    let completions = store
        .extend_horizon(&activities, completions, Local::now().date_naive())
        .await;
    info!(
        activities = activities.len(),
        data_dir = %config.data_dir.display(),
        "hydrated completion store"
    );

    let state = AppState::new(
        store,
        AppData {
            activities,
            completions,
        },
    );
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
