use axum::http::{header, HeaderValue, Method};
use domain::attachment::BlobStore;
use domain::events::EventPublisher;
use log::*;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub mod error;

mod controller;
mod extractors;
mod middleware;
mod params;
mod router;
mod sse;

pub use error::{Error, Result};
pub use router::define_routes;

/// Web-layer state: infrastructure from `service` plus the realtime and
/// storage collaborators the controllers need.
#[derive(Clone)]
pub struct AppState {
    pub app_state: service::AppState,
    pub sse_manager: Arc<::sse::Manager>,
    pub event_publisher: Arc<EventPublisher>,
    pub blob_store: Arc<dyn BlobStore>,
}

impl AppState {
    pub fn new(
        app_state: service::AppState,
        sse_manager: Arc<::sse::Manager>,
        event_publisher: EventPublisher,
        blob_store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            app_state,
            sse_manager,
            event_publisher: Arc::new(event_publisher),
            blob_store,
        }
    }

    pub fn db_conn_ref(&self) -> &sea_orm::DatabaseConnection {
        self.app_state.db_conn_ref()
    }

    pub fn config(&self) -> &service::config::Config {
        &self.app_state.config
    }
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let host = app_state
        .config()
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let server_url = format!("{host}:{}", app_state.config().port);

    let allowed_origins: Vec<HeaderValue> = app_state
        .config()
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin}: {e}");
                None
            }
        })
        .collect();

    let cors_layer = CorsLayer::new()
        .allow_methods([Method::DELETE, Method::GET, Method::POST, Method::PUT])
        .allow_credentials(true)
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static(service::config::ApiVersion::field_name()),
        ])
        .allow_origin(allowed_origins);

    let listener = tokio::net::TcpListener::bind(&server_url).await?;
    info!("Server starting... listening for connections on http://{server_url}");

    axum::serve(
        listener,
        define_routes(app_state)
            .layer(cors_layer)
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
