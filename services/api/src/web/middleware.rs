//! services/api/src/web/middleware.rs
//!
//! Guard middleware for protecting routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use doc_review_core::{AdminGuard, AuthGuard, GuardContext, GuardDecision};
use std::sync::Arc;
use tracing::info;

use crate::web::state::AppState;

/// Which guards a layer applies.
#[derive(Clone, Copy)]
enum Guards {
    Auth,
    AuthThenAdmin,
}

async fn check(state: &AppState, attempted: &str, guards: Guards) -> GuardDecision {
    let authenticated = state.bootstrap.session_authenticated().await;

    // The read guard must be gone before the handler asks for the write lock.
    let store = state.store.read().await;
    let ctx = GuardContext {
        authenticated,
        user: store.user(),
    };
    match (AuthGuard::check(&ctx, attempted), guards) {
        (GuardDecision::Allow, Guards::AuthThenAdmin) => AdminGuard::check(&ctx),
        (decision, _) => decision,
    }
}

async fn guarded(state: Arc<AppState>, req: Request, next: Next, guards: Guards) -> Response {
    let attempted = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let decision = check(&state, &attempted, guards).await;
    match decision.location() {
        None => next.run(req).await,
        Some(location) => {
            info!(path = %attempted, to = %location, "Guard redirect");
            Redirect::to(&location).into_response()
        }
    }
}

/// Middleware that lets a request through only with a provider session and a
/// loaded user. Anything else is redirected to the login page, which returns
/// to the attempted path after sign-in.
pub async fn require_auth(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    guarded(state, req, next, Guards::Auth).await
}

/// Like [`require_auth`], then sends non-admin users to the landing page.
pub async fn require_admin(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    guarded(state, req, next, Guards::AuthThenAdmin).await
}
