//! services/api/src/web/auth.rs
//!
//! Session endpoints: the provider redirect flow, demo sign-in, sign-out,
//! the manual retry, and read-only views of the session and its guards.

use crate::web::rest::UserView;
use crate::web::state::{AppState, PendingLogin};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use doc_review_core::guards::LANDING_PATH;
use doc_review_core::mock_data::{default_demo_user, demo_user, mock_states};
use doc_review_core::User;
use doc_review_core::ports::PortError;
use doc_review_core::{evaluate, BootstrapOutcome, GuardContext, GuardDecision, Role, SessionPhase};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};

type HandlerError = (StatusCode, String);

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, IntoParams)]
pub struct LoginQuery {
    /// Path to open after a successful sign-in.
    pub return_to: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct GuardQuery {
    /// A console path such as `/states/Texas`.
    pub path: String,
}

/// The session as the login page and header see it.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub authenticated: bool,
    /// One of `signedOut`, `bootstrapping`, `ready`, `roleRestricted`, `failed`.
    pub phase: String,
    /// The rejected directory role while restricted.
    pub role: Option<String>,
    /// The failure shown next to "Try Again".
    pub message: Option<String>,
    pub user: Option<UserView>,
    pub states: Vec<String>,
    pub is_loading: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuardView {
    pub allowed: bool,
    pub redirect_to: Option<String>,
}

//=========================================================================================
// Helpers
//=========================================================================================

async fn session_view(state: &AppState) -> SessionView {
    let authenticated = state.bootstrap.session_authenticated().await;
    let (phase, role, message) = match state.bootstrap.phase() {
        SessionPhase::SignedOut => ("signedOut", None, None),
        SessionPhase::Bootstrapping => ("bootstrapping", None, None),
        SessionPhase::Ready => ("ready", None, None),
        SessionPhase::RoleRestricted { role } => ("roleRestricted", Some(role), None),
        SessionPhase::Failed { message } => ("failed", None, Some(message)),
    };
    let store = state.store.read().await;
    SessionView {
        authenticated,
        phase: phase.to_string(),
        role,
        message: message.or_else(|| store.error().map(str::to_string)),
        user: store.user().map(UserView::from),
        states: store.states().to_vec(),
        is_loading: store.is_loading(),
    }
}

/// Only same-site absolute paths are followed after sign-in.
fn safe_return_path(return_to: Option<&str>) -> &str {
    match return_to {
        Some(path) if is_local_path(path) => path,
        _ => LANDING_PATH,
    }
}

/// Browsers read `\` as `/` and drop control characters, so either one could
/// turn a path into a scheme-relative URL.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.to_ascii_lowercase().contains("%5c")
        && !path.chars().any(char::is_control)
}

fn role_restricted(role: &str) -> HandlerError {
    (
        StatusCode::FORBIDDEN,
        format!("Your account role '{}' does not have access to this console", role),
    )
}

/// A restricted session stays restricted until it signs out.
fn ensure_not_restricted(phase: &SessionPhase) -> Result<(), HandlerError> {
    match phase {
        SessionPhase::RoleRestricted { role } => Err(role_restricted(role)),
        _ => Ok(()),
    }
}

/// Finishes a bootstrap run: loads the catalogue on success, maps anything else to an error.
async fn complete_bootstrap(state: &AppState, outcome: BootstrapOutcome) -> Result<(), HandlerError> {
    let result = match outcome {
        BootstrapOutcome::Ready { user, .. } => {
            let states: Vec<String> = user.states.iter().cloned().collect();
            state.load_catalog(&states).await.map_err(|e| {
                error!("Failed to load document catalogue: {:?}", e);
                (StatusCode::BAD_GATEWAY, "Failed to load documents".to_string())
            })
        }
        BootstrapOutcome::RoleRestricted { role } => Err(role_restricted(&role)),
        BootstrapOutcome::Failed { message } => Err((StatusCode::BAD_GATEWAY, message)),
        BootstrapOutcome::Unauthenticated => {
            Err((StatusCode::UNAUTHORIZED, "Not signed in".to_string()))
        }
        BootstrapOutcome::Ignored => Err((
            StatusCode::CONFLICT,
            "Sign-in is already in progress".to_string(),
        )),
        BootstrapOutcome::Superseded => Err((
            StatusCode::CONFLICT,
            "Sign-in was superseded".to_string(),
        )),
    };
    state.save_snapshot().await;
    result
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /login - Start a provider sign-in, or skip it when already signed in
#[utoipa::path(
    get,
    path = "/login",
    params(LoginQuery),
    responses(
        (status = 303, description = "Redirect to the identity provider, or to the return path"),
        (status = 403, description = "Account role has no console access; sign out first"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
) -> Result<Response, HandlerError> {
    ensure_not_restricted(&state.bootstrap.phase())?;
    let return_to = safe_return_path(query.return_to.as_deref()).to_string();
    let signed_in = state.bootstrap.session_authenticated().await
        && state.store.read().await.user().is_some();
    if signed_in {
        return Ok(Redirect::to(&return_to).into_response());
    }

    let request = state.okta.authorization_request().map_err(|e| {
        error!("Failed to build authorization URL: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to start sign-in".to_string())
    })?;
    state.remember_login(
        request.state,
        PendingLogin {
            code_verifier: request.code_verifier,
            return_to: Some(return_to),
        },
    );

    info!("Redirecting to identity provider");
    Ok(Redirect::to(request.url.as_str()).into_response())
}

/// GET /login/callback - Finish the provider sign-in and bootstrap the session
#[utoipa::path(
    get,
    path = "/login/callback",
    params(CallbackQuery),
    responses(
        (status = 303, description = "Signed in; redirect to the return path"),
        (status = 400, description = "Missing or unknown sign-in state"),
        (status = 401, description = "Provider refused the sign-in"),
        (status = 403, description = "Account role has no console access"),
        (status = 502, description = "Provider or directory failure")
    )
)]
pub async fn callback_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, HandlerError> {
    if let Some(err) = query.error {
        warn!(error = %err, "Provider returned a sign-in error");
        return Err((
            StatusCode::UNAUTHORIZED,
            query.error_description.unwrap_or(err),
        ));
    }
    let (Some(code), Some(login_state)) = (query.code, query.state) else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Callback requires code and state".to_string(),
        ));
    };
    let pending = state.take_login(&login_state).ok_or((
        StatusCode::BAD_REQUEST,
        "Unknown or expired sign-in state".to_string(),
    ))?;

    state
        .okta
        .exchange_code(&code, &pending.code_verifier)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "The identity provider rejected the sign-in".to_string(),
            ),
            other => {
                error!("Failed to exchange authorization code: {:?}", other);
                (StatusCode::BAD_GATEWAY, "Failed to complete sign-in".to_string())
            }
        })?;

    let outcome = state.bootstrap.run(&state.store).await;
    complete_bootstrap(&state, outcome).await?;

    let target = safe_return_path(pending.return_to.as_deref());
    Ok(Redirect::to(target).into_response())
}

/// POST /login/demo/{role} - Sign in as a demo user with generated data
#[utoipa::path(
    post,
    path = "/login/demo/{role}",
    params(("role" = String, Path, description = "admin, dev, or cca")),
    responses(
        (status = 200, description = "Demo session started", body = SessionView),
        (status = 400, description = "Unknown role"),
        (status = 404, description = "Demo login is disabled")
    )
)]
pub async fn demo_login_handler(
    State(state): State<Arc<AppState>>,
    Path(role): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    if !state.config.demo_login_enabled {
        return Err((StatusCode::NOT_FOUND, "Not found".to_string()));
    }
    let role = match Role::parse(&role) {
        Some(role) if role != Role::Unassigned => role,
        _ => return Err((StatusCode::BAD_REQUEST, format!("Unknown demo role '{}'", role))),
    };
    start_demo(&state, demo_user(role)).await
}

/// POST /login/demo - Sign in as the default demo user with generated data
#[utoipa::path(
    post,
    path = "/login/demo",
    responses(
        (status = 200, description = "Demo session started", body = SessionView),
        (status = 404, description = "Demo login is disabled")
    )
)]
pub async fn default_demo_login_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    if !state.config.demo_login_enabled {
        return Err((StatusCode::NOT_FOUND, "Not found".to_string()));
    }
    start_demo(&state, default_demo_user()).await
}

async fn start_demo(state: &AppState, user: User) -> Result<Json<SessionView>, HandlerError> {
    let states = mock_states();
    let dataset = state.catalog.load(&states).await.map_err(|e| {
        error!("Failed to load demo catalogue: {:?}", e);
        (StatusCode::BAD_GATEWAY, "Failed to load documents".to_string())
    })?;
    state
        .bootstrap
        .sign_in_demo(&state.store, user, states, dataset)
        .await;
    state.save_snapshot().await;

    Ok(Json(session_view(state).await))
}

/// POST /logout - End the session and clear everything it stored
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Logout successful", body = SessionView)
    )
)]
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.bootstrap.sign_out(&state.store).await;
    state.save_snapshot().await;
    Json(session_view(&state).await)
}

/// GET /session - The current session phase and user
#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Current session", body = SessionView)
    )
)]
pub async fn session_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(session_view(&state).await)
}

/// POST /session/retry - Run the session bootstrap again after a failure
#[utoipa::path(
    post,
    path = "/session/retry",
    responses(
        (status = 200, description = "Session ready", body = SessionView),
        (status = 401, description = "No provider session"),
        (status = 403, description = "Account role has no console access"),
        (status = 409, description = "A bootstrap is already running"),
        (status = 502, description = "Provider or directory failure")
    )
)]
pub async fn retry_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let outcome = state.bootstrap.retry(&state.store).await;
    complete_bootstrap(&state, outcome).await?;
    Ok(Json(session_view(&state).await))
}

/// GET /session/guard - Whether the current session may open a console path
#[utoipa::path(
    get,
    path = "/session/guard",
    params(GuardQuery),
    responses(
        (status = 200, description = "Guard decision for the path", body = GuardView)
    )
)]
pub async fn guard_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GuardQuery>,
) -> impl IntoResponse {
    let authenticated = state.bootstrap.session_authenticated().await;
    let store = state.store.read().await;
    let decision = evaluate(
        &GuardContext {
            authenticated,
            user: store.user(),
        },
        &query.path,
    );
    Json(GuardView {
        allowed: decision == GuardDecision::Allow,
        redirect_to: decision.location(),
    })
}
