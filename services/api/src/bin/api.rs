//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{FileKeyValueStore, HttpUserDirectory, MockCatalog, OktaIdentityAdapter},
    config::Config,
    error::ApiError,
    web::{self, rest::ApiDoc, state::AppState},
};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use doc_review_core::{SessionEvent, SessionStorage};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open Session Storage ---
    info!("Opening session storage at {}", config.storage_path.display());
    let storage = SessionStorage::new(Arc::new(FileKeyValueStore::open(&config.storage_path)?));

    // --- 3. Initialize Service Adapters ---
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;
    let okta = Arc::new(OktaIdentityAdapter::new(
        http.clone(),
        config.okta_issuer.clone(),
        config.okta_client_id.clone(),
        config.okta_redirect_uri.clone(),
    ));
    let directory = Arc::new(HttpUserDirectory::new(
        http,
        config.user_directory_url.clone(),
    ));
    let catalog = Arc::new(MockCatalog::new(config.mock_delay));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        okta,
        directory,
        catalog,
        storage,
    ));
    spawn_session_logger(&app_state);

    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("http://localhost:3000"))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let app = Router::new()
        .merge(web::router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    if config.demo_login_enabled {
        warn!("Demo login is enabled; anyone can sign in with a demo role");
    }
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Logs every session change for the life of the process.
fn spawn_session_logger(app_state: &AppState) {
    let mut events = app_state.bootstrap.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Authenticated { user }) => {
                    info!(user = %user.email, role = %user.role, "Session event: authenticated")
                }
                Ok(SessionEvent::RoleRestricted { role }) => {
                    info!(role = %role, "Session event: role restricted")
                }
                Ok(SessionEvent::Failed { message }) => {
                    info!(message = %message, "Session event: bootstrap failed")
                }
                Ok(SessionEvent::SignedOut) => info!("Session event: signed out"),
                Err(RecvError::Lagged(missed)) => warn!(missed, "Session event log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
