use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use course_catalog::api::router;
use course_catalog::config::AppConfig;
use course_catalog::db::CourseStore;
use course_catalog::network::ProbeMonitor;
use course_catalog::remote::HttpCourseFetcher;
use course_catalog::services::{CatalogService, SyncEngine, SyncScheduler};
use course_catalog::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "course_catalog=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::new_from_env()?;

    let store = CourseStore::connect(&config.database_url).await?;
    let fetcher = Arc::new(HttpCourseFetcher::new(config.remote.clone())?);
    let connectivity = Arc::new(ProbeMonitor::start(config.probe.clone()).await);

    let engine = Arc::new(SyncEngine::new(store.clone(), fetcher, connectivity));
    let _connectivity_watch = engine.watch_connectivity();

    // First refresh of the session.
    let startup = Arc::clone(&engine);
    tokio::spawn(async move {
        startup.refresh().await;
    });

    if config.sync_interval_secs > 0 {
        let scheduler = SyncScheduler::new(Arc::clone(&engine), config.sync_interval_secs);
        tokio::spawn(scheduler.start());
    }

    let state = AppState {
        db: store.pool().clone(),
        catalog: CatalogService::new(store, Arc::clone(&engine)),
        engine,
    };

    let app = router(state);

    info!("listening on http://{}", config.listen_addr);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
