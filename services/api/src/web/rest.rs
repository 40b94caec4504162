//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the console's navigation and editor
//! endpoints and the master definition for the OpenAPI specification.
//!
//! Each navigation handler mirrors one console page: it checks the target
//! exists and is within the user's states, moves the selection to it, and
//! returns what that page renders.

use crate::web::auth;
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use doc_review_core::editor::{
    review_page, EditorError, PageDraft, PagePermissions, ReviewVerdict, RuleField,
};
use doc_review_core::mock_data::{demo_users, mock_states};
use doc_review_core::{AppStore, Breadcrumb, Document, Page, User, ValidationRule, Version};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

type HandlerError = (StatusCode, String);

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login_handler,
        auth::callback_handler,
        auth::demo_login_handler,
        auth::default_demo_login_handler,
        auth::logout_handler,
        auth::session_handler,
        auth::retry_handler,
        auth::guard_handler,
        list_states_handler,
        list_documents_handler,
        list_versions_handler,
        list_pages_handler,
        get_editor_handler,
        save_editor_handler,
        approve_page_handler,
        reject_page_handler,
        admin_handler,
    ),
    components(
        schemas(
            auth::SessionView, auth::GuardView, UserView, BreadcrumbView, StateSummary,
            StatesResponse, DocumentView, DocumentsResponse, VersionView, VersionsResponse,
            RuleView, PageView, PagesResponse, PermissionsView, EditorResponse, PageEdit,
            SavePageRequest, ReviewResponse, StateAccessView, AdminResponse
        )
    ),
    tags(
        (name = "Document Review Console API", description = "Session, navigation, and page review endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub states: Vec<String>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.to_string(),
            states: user.states.iter().cloned().collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct BreadcrumbView {
    pub label: String,
    pub path: String,
    pub active: bool,
}

impl From<Breadcrumb> for BreadcrumbView {
    fn from(crumb: Breadcrumb) -> Self {
        Self {
            label: crumb.label,
            path: crumb.path,
            active: crumb.active,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StateSummary {
    pub name: String,
    pub document_count: usize,
}

#[derive(Serialize, ToSchema)]
pub struct StatesResponse {
    pub states: Vec<StateSummary>,
    pub breadcrumbs: Vec<BreadcrumbView>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub id: String,
    pub name: String,
    pub state: String,
    pub versions_count: u32,
    pub last_edited: DateTime<Utc>,
    pub status: String,
    pub status_label: String,
    pub status_color: String,
}

impl From<&Document> for DocumentView {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.name.clone(),
            state: doc.state.clone(),
            versions_count: doc.versions_count,
            last_edited: doc.last_edited,
            status: doc.status.as_str().to_string(),
            status_label: doc.status.label().to_string(),
            status_color: doc.status.color().to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DocumentsResponse {
    pub state: String,
    pub documents: Vec<DocumentView>,
    pub breadcrumbs: Vec<BreadcrumbView>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionView {
    pub id: String,
    pub document_id: String,
    pub version_number: u32,
    pub status: String,
    pub status_label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Version> for VersionView {
    fn from(version: &Version) -> Self {
        Self {
            id: version.id.clone(),
            document_id: version.document_id.clone(),
            version_number: version.version_number,
            status: version.status.as_str().to_string(),
            status_label: version.status.label().to_string(),
            created_at: version.created_at,
            updated_at: version.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct VersionsResponse {
    pub document: DocumentView,
    pub versions: Vec<VersionView>,
    pub breadcrumbs: Vec<BreadcrumbView>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleView {
    pub id: String,
    pub page_id: String,
    pub description: String,
    pub field: String,
    pub rule: String,
}

impl From<&ValidationRule> for RuleView {
    fn from(rule: &ValidationRule) -> Self {
        Self {
            id: rule.id.clone(),
            page_id: rule.page_id.clone(),
            description: rule.description.clone(),
            field: rule.field.clone(),
            rule: rule.rule.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
    pub id: String,
    pub version_id: String,
    pub page_number: u32,
    pub image_url: String,
    #[schema(value_type = Object)]
    pub json: serde_json::Value,
    pub validation_rules: Vec<RuleView>,
}

impl From<&Page> for PageView {
    fn from(page: &Page) -> Self {
        Self {
            id: page.id.clone(),
            version_id: page.version_id.clone(),
            page_number: page.page_number,
            image_url: page.image_url.clone(),
            json: page.json.clone(),
            validation_rules: page.validation_rules.iter().map(RuleView::from).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PagesResponse {
    pub version: VersionView,
    pub pages: Vec<PageView>,
    pub breadcrumbs: Vec<BreadcrumbView>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsView {
    pub can_edit: bool,
    pub can_approve: bool,
}

impl From<PagePermissions> for PermissionsView {
    fn from(perms: PagePermissions) -> Self {
        Self {
            can_edit: perms.can_edit,
            can_approve: perms.can_approve,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct EditorResponse {
    pub document: DocumentView,
    pub version: VersionView,
    pub page: PageView,
    pub permissions: PermissionsView,
    pub breadcrumbs: Vec<BreadcrumbView>,
}

/// One change to a page draft. Edits apply in order; the first failure aborts the save.
#[derive(Deserialize, ToSchema)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PageEdit {
    /// Replace the page JSON with the given editor text.
    SetJson { text: String },
    AddRule,
    UpdateRule {
        index: usize,
        #[schema(value_type = String, example = "rule")]
        field: RuleField,
        value: String,
    },
    RemoveRule { index: usize },
}

#[derive(Deserialize, ToSchema)]
pub struct SavePageRequest {
    pub edits: Vec<PageEdit>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub page_id: String,
    pub reviewer: String,
    pub verdict: String,
    pub decided_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StateAccessView {
    pub state: String,
    /// Managed users whose state list includes this state.
    pub user_count: usize,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminResponse {
    pub user: UserView,
    /// The users tab.
    pub users: Vec<UserView>,
    /// The state access tab, one entry per known state.
    pub state_access: Vec<StateAccessView>,
    pub states: Vec<String>,
    pub document_count: usize,
    pub version_count: usize,
    pub page_count: usize,
    /// Places where the current selection disagrees with the loaded data.
    pub selection_issues: Vec<String>,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn breadcrumbs(store: &AppStore) -> Vec<BreadcrumbView> {
    store.breadcrumbs().into_iter().map(BreadcrumbView::from).collect()
}

fn signed_in_user(store: &AppStore) -> Result<User, HandlerError> {
    store
        .user()
        .cloned()
        .ok_or((StatusCode::UNAUTHORIZED, "Not signed in".to_string()))
}

fn check_state_access(user: &User, state: &str) -> Result<(), HandlerError> {
    if user.can_access_state(state) {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            format!("You do not have access to {}", state),
        ))
    }
}

fn not_found(kind: &str, id: &str) -> HandlerError {
    (StatusCode::NOT_FOUND, format!("{} '{}' not found", kind, id))
}

/// Resolves a page and its owners, or the first missing link.
fn page_chain<'a>(
    store: &'a AppStore,
    page_id: &str,
) -> Result<(&'a Document, &'a Version, &'a Page), HandlerError> {
    let page = store.page(page_id).ok_or_else(|| not_found("Page", page_id))?;
    let version = store
        .version(&page.version_id)
        .ok_or_else(|| not_found("Version", &page.version_id))?;
    let document = store
        .document(&version.document_id)
        .ok_or_else(|| not_found("Document", &version.document_id))?;
    Ok((document, version, page))
}

fn select(
    store: &mut AppStore,
    state: Option<&str>,
    document: Option<&str>,
    version: Option<&str>,
    page: Option<&str>,
) {
    store.set_current_state(state.map(str::to_string));
    store.set_current_document(document.map(str::to_string));
    store.set_current_version(version.map(str::to_string));
    store.set_current_page(page.map(str::to_string));
}

//=========================================================================================
// Navigation Handlers
//=========================================================================================

/// The states the signed-in user may browse.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Accessible states", body = StatesResponse),
        (status = 303, description = "Not signed in; redirected to login")
    )
)]
pub async fn list_states_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let response = {
        let mut store = app_state.store.write().await;
        let user = signed_in_user(&store)?;
        select(&mut store, None, None, None, None);

        let states = store
            .states()
            .iter()
            .filter(|s| user.can_access_state(s))
            .map(|s| StateSummary {
                name: s.clone(),
                document_count: store.documents_for_state(s).len(),
            })
            .collect();
        StatesResponse {
            states,
            breadcrumbs: breadcrumbs(&store),
        }
    };
    app_state.save_snapshot().await;
    Ok(Json(response))
}

/// Documents of one state.
#[utoipa::path(
    get,
    path = "/states/{state}",
    params(("state" = String, Path, description = "State name")),
    responses(
        (status = 200, description = "Documents in the state", body = DocumentsResponse),
        (status = 403, description = "State is outside the user's access"),
        (status = 404, description = "Unknown state")
    )
)]
pub async fn list_documents_handler(
    State(app_state): State<Arc<AppState>>,
    Path(state): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let response = {
        let mut store = app_state.store.write().await;
        let user = signed_in_user(&store)?;
        if !store.states().contains(&state) {
            return Err(not_found("State", &state));
        }
        check_state_access(&user, &state)?;
        select(&mut store, Some(&state), None, None, None);

        DocumentsResponse {
            documents: store
                .documents_for_current_state()
                .into_iter()
                .map(DocumentView::from)
                .collect(),
            breadcrumbs: breadcrumbs(&store),
            state,
        }
    };
    app_state.save_snapshot().await;
    Ok(Json(response))
}

/// Versions of one document, newest first.
#[utoipa::path(
    get,
    path = "/documents/{document_id}",
    params(("document_id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document versions", body = VersionsResponse),
        (status = 403, description = "Document's state is outside the user's access"),
        (status = 404, description = "Unknown document")
    )
)]
pub async fn list_versions_handler(
    State(app_state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let response = {
        let mut store = app_state.store.write().await;
        let user = signed_in_user(&store)?;
        let document = store
            .document(&document_id)
            .cloned()
            .ok_or_else(|| not_found("Document", &document_id))?;
        check_state_access(&user, &document.state)?;
        select(&mut store, Some(&document.state), Some(&document.id), None, None);

        VersionsResponse {
            document: DocumentView::from(&document),
            versions: store
                .versions_for_current_document()
                .into_iter()
                .map(VersionView::from)
                .collect(),
            breadcrumbs: breadcrumbs(&store),
        }
    };
    app_state.save_snapshot().await;
    Ok(Json(response))
}

/// Pages of one version, in page order.
#[utoipa::path(
    get,
    path = "/versions/{version_id}/pages",
    params(("version_id" = String, Path, description = "Version id")),
    responses(
        (status = 200, description = "Version pages", body = PagesResponse),
        (status = 403, description = "Version's state is outside the user's access"),
        (status = 404, description = "Unknown version")
    )
)]
pub async fn list_pages_handler(
    State(app_state): State<Arc<AppState>>,
    Path(version_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let response = {
        let mut store = app_state.store.write().await;
        let user = signed_in_user(&store)?;
        let version = store
            .version(&version_id)
            .cloned()
            .ok_or_else(|| not_found("Version", &version_id))?;
        let document = store
            .document(&version.document_id)
            .cloned()
            .ok_or_else(|| not_found("Document", &version.document_id))?;
        check_state_access(&user, &document.state)?;
        select(
            &mut store,
            Some(&document.state),
            Some(&document.id),
            Some(&version.id),
            None,
        );

        PagesResponse {
            version: VersionView::from(&version),
            pages: store
                .pages_for_current_version()
                .into_iter()
                .map(PageView::from)
                .collect(),
            breadcrumbs: breadcrumbs(&store),
        }
    };
    app_state.save_snapshot().await;
    Ok(Json(response))
}

//=========================================================================================
// Page Editor Handlers
//=========================================================================================

/// A page with its rules and what the current role may do to it.
#[utoipa::path(
    get,
    path = "/pages/{page_id}/editor",
    params(("page_id" = String, Path, description = "Page id")),
    responses(
        (status = 200, description = "Page editor view", body = EditorResponse),
        (status = 403, description = "Page's state is outside the user's access"),
        (status = 404, description = "Unknown page")
    )
)]
pub async fn get_editor_handler(
    State(app_state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let response = {
        let mut store = app_state.store.write().await;
        let user = signed_in_user(&store)?;
        let (document, version, page) = {
            let (d, v, p) = page_chain(&store, &page_id)?;
            (d.clone(), v.clone(), p.clone())
        };
        check_state_access(&user, &document.state)?;
        select(
            &mut store,
            Some(&document.state),
            Some(&document.id),
            Some(&version.id),
            Some(&page.id),
        );

        EditorResponse {
            document: DocumentView::from(&document),
            version: VersionView::from(&version),
            page: PageView::from(&page),
            permissions: PagePermissions::for_role(user.role).into(),
            breadcrumbs: breadcrumbs(&store),
        }
    };
    app_state.save_snapshot().await;
    Ok(Json(response))
}

/// Applies a sequence of edits to a page's JSON and rules.
#[utoipa::path(
    put,
    path = "/pages/{page_id}/editor",
    params(("page_id" = String, Path, description = "Page id")),
    request_body = SavePageRequest,
    responses(
        (status = 200, description = "Saved page", body = PageView),
        (status = 400, description = "Invalid JSON text or rule index"),
        (status = 403, description = "Role may not edit pages"),
        (status = 404, description = "Unknown page")
    )
)]
pub async fn save_editor_handler(
    State(app_state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
    Json(req): Json<SavePageRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let saved = {
        let mut store = app_state.store.write().await;
        let user = signed_in_user(&store)?;
        let (document, _, page) = page_chain(&store, &page_id)?;
        check_state_access(&user, &document.state)?;
        if !PagePermissions::for_role(user.role).can_edit {
            return Err((
                StatusCode::FORBIDDEN,
                format!("Role '{}' may not edit pages", user.role),
            ));
        }

        let mut draft = PageDraft::from_page(page);
        for edit in req.edits {
            apply_edit(&mut draft, edit).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        }
        let pages = draft.apply_to(store.pages());
        store.set_pages(pages);

        info!(page = %page_id, editor = %user.email, "Saved page edits");
        store
            .page(&page_id)
            .map(PageView::from)
            .ok_or_else(|| not_found("Page", &page_id))?
    };
    app_state.save_snapshot().await;
    Ok(Json(saved))
}

fn apply_edit(draft: &mut PageDraft, edit: PageEdit) -> Result<(), EditorError> {
    match edit {
        PageEdit::SetJson { text } => draft.set_json_text(&text),
        PageEdit::AddRule => {
            draft.add_rule();
            Ok(())
        }
        PageEdit::UpdateRule {
            index,
            field,
            value,
        } => draft.update_rule(index, field, value),
        PageEdit::RemoveRule { index } => draft.remove_rule(index).map(|_| ()),
    }
}

/// Approves a page.
#[utoipa::path(
    post,
    path = "/pages/{page_id}/approve",
    params(("page_id" = String, Path, description = "Page id")),
    responses(
        (status = 200, description = "Page approved", body = ReviewResponse),
        (status = 403, description = "Role may not review pages"),
        (status = 404, description = "Unknown page")
    )
)]
pub async fn approve_page_handler(
    State(app_state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    review(&app_state, &page_id, ReviewVerdict::Approved).await
}

/// Rejects a page.
#[utoipa::path(
    post,
    path = "/pages/{page_id}/reject",
    params(("page_id" = String, Path, description = "Page id")),
    responses(
        (status = 200, description = "Page rejected", body = ReviewResponse),
        (status = 403, description = "Role may not review pages"),
        (status = 404, description = "Unknown page")
    )
)]
pub async fn reject_page_handler(
    State(app_state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    review(&app_state, &page_id, ReviewVerdict::Rejected).await
}

async fn review(
    app_state: &AppState,
    page_id: &str,
    verdict: ReviewVerdict,
) -> Result<Json<ReviewResponse>, HandlerError> {
    let store = app_state.store.read().await;
    let user = signed_in_user(&store)?;
    let (document, _, page) = page_chain(&store, page_id)?;
    check_state_access(&user, &document.state)?;

    let decision = review_page(&user, page, verdict, Utc::now()).map_err(|e| match e {
        EditorError::Forbidden(_) => (StatusCode::FORBIDDEN, e.to_string()),
        other => {
            error!("Failed to review page: {:?}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to review page".to_string())
        }
    })?;
    info!(page = %decision.page_id, reviewer = %decision.reviewer, verdict = ?decision.verdict, "Page reviewed");

    Ok(Json(ReviewResponse {
        page_id: decision.page_id,
        reviewer: decision.reviewer,
        verdict: match decision.verdict {
            ReviewVerdict::Approved => "approved".to_string(),
            ReviewVerdict::Rejected => "rejected".to_string(),
        },
        decided_at: decision.decided_at,
    }))
}

//=========================================================================================
// Admin Handler
//=========================================================================================

/// Overview for administrators.
#[utoipa::path(
    get,
    path = "/admin",
    responses(
        (status = 200, description = "Admin overview", body = AdminResponse),
        (status = 303, description = "Not an admin; redirected to the landing page")
    )
)]
pub async fn admin_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let store = app_state.store.read().await;
    let user = signed_in_user(&store)?;
    let users = demo_users();
    let state_access = mock_states()
        .into_iter()
        .map(|state| StateAccessView {
            user_count: users.iter().filter(|u| u.can_access_state(&state)).count(),
            state,
        })
        .collect();
    Ok(Json(AdminResponse {
        user: UserView::from(&user),
        users: users.iter().map(UserView::from).collect(),
        state_access,
        states: store.states().to_vec(),
        document_count: store.documents().len(),
        version_count: store.versions().len(),
        page_count: store.pages().len(),
        selection_issues: store
            .selection_issues()
            .iter()
            .map(|issue| issue.to_string())
            .collect(),
    }))
}

/// Anything outside the known routes.
pub async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not found" })),
    )
}
