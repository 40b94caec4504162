pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use doc_review_core::guards::{LOGIN_CALLBACK_PATH, LOGIN_PATH};
use std::sync::Arc;

pub use middleware::{require_admin, require_auth};
use state::AppState;

/// Builds the console router: public session routes, guarded navigation and
/// editor routes, and the admin page.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no guards)
    let public_routes = Router::new()
        .route(LOGIN_PATH, get(auth::login_handler))
        .route(LOGIN_CALLBACK_PATH, get(auth::callback_handler))
        .route("/login/demo", post(auth::default_demo_login_handler))
        .route("/login/demo/{role}", post(auth::demo_login_handler))
        .route("/logout", post(auth::logout_handler))
        .route("/session", get(auth::session_handler))
        .route("/session/retry", post(auth::retry_handler))
        .route("/session/guard", get(auth::guard_handler));

    // Protected routes (auth guard)
    let protected_routes = Router::new()
        .route("/", get(rest::list_states_handler))
        .route("/states/{state}", get(rest::list_documents_handler))
        .route("/documents/{document_id}", get(rest::list_versions_handler))
        .route("/versions/{version_id}/pages", get(rest::list_pages_handler))
        .route(
            "/pages/{page_id}/editor",
            get(rest::get_editor_handler).put(rest::save_editor_handler),
        )
        .route("/pages/{page_id}/approve", post(rest::approve_page_handler))
        .route("/pages/{page_id}/reject", post(rest::reject_page_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Admin routes (auth guard, then admin guard)
    let admin_routes = Router::new()
        .route("/admin", get(rest::admin_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_admin,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .fallback(rest::not_found_handler)
        .with_state(app_state)
}
