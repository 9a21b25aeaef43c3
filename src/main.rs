use domain::attachment::LocalBlobStore;
use events::EventPublisher;
use log::{error, info, warn};
use migration::{Migrator, MigratorTrait};
use service::{config::Config, logging::Logger};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();

    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!(
        "Starting parley {} ({:?})",
        env!("CARGO_PKG_VERSION"),
        config.runtime_env()
    );

    if config.is_production() && config.uses_development_jwt_secret() {
        warn!("JWT_SECRET is not set; running production with the development secret");
    }

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = Migrator::up(db.as_ref(), None).await {
        error!("Failed to run database migrations: {e}");
        std::process::exit(1);
    }

    let sse_manager = Arc::new(sse::Manager::new());
    let event_publisher = EventPublisher::new().with_handler(Arc::new(
        sse::SseDomainEventHandler::new(sse_manager.clone()),
    ));
    let blob_store = Arc::new(LocalBlobStore::from_config(&config));

    let app_state = web::AppState::new(
        service::AppState::new(config, &db),
        sse_manager,
        event_publisher,
        blob_store,
    );

    if let Err(e) = web::init_server(app_state).await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}
