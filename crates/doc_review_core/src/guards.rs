//! crates/doc_review_core/src/guards.rs
//!
//! Route classification and the two access guards evaluated before any
//! protected route is served. Guards are pure: they read the session and user
//! and return a decision, nothing else.

use crate::domain::User;

pub const LOGIN_PATH: &str = "/login";
pub const LOGIN_CALLBACK_PATH: &str = "/login/callback";
pub const LANDING_PATH: &str = "/";

/// The client-side routes of the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    LoginCallback,
    States,
    Documents { state: String },
    Versions { document_id: String },
    Pages { version_id: String },
    PageEditor { page_id: String },
    Admin,
    NotFound,
}

/// Which guards a route sits behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
    AdminOnly,
}

impl Route {
    /// Classifies a request path. Query strings and trailing slashes are ignored.
    pub fn parse(path: &str) -> Route {
        let path = path.split(|c: char| c == '?' || c == '#').next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Route::States,
            ["login"] => Route::Login,
            ["login", "callback"] => Route::LoginCallback,
            ["states", state] => Route::Documents {
                state: state.to_string(),
            },
            ["documents", id] => Route::Versions {
                document_id: id.to_string(),
            },
            ["versions", id, "pages"] => Route::Pages {
                version_id: id.to_string(),
            },
            ["pages", id, "editor"] => Route::PageEditor {
                page_id: id.to_string(),
            },
            ["admin"] => Route::Admin,
            _ => Route::NotFound,
        }
    }

    pub fn access(&self) -> Access {
        match self {
            Route::Login | Route::LoginCallback | Route::NotFound => Access::Public,
            Route::Admin => Access::AdminOnly,
            _ => Access::Protected,
        }
    }
}

/// What a guard sees: the provider session flag and the store's user.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    pub authenticated: bool,
    pub user: Option<&'a User>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect {
        to: &'static str,
        /// Where to go after a successful login.
        return_to: Option<String>,
    },
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }

    /// The `Location` a redirect decision points at, with any return path encoded.
    pub fn location(&self) -> Option<String> {
        match self {
            GuardDecision::Allow => None,
            GuardDecision::Redirect {
                to,
                return_to: Some(return_to),
            } if *to == LOGIN_PATH => Some(login_redirect(return_to)),
            GuardDecision::Redirect { to, .. } => Some(to.to_string()),
        }
    }
}

pub struct AuthGuard;

impl AuthGuard {
    /// Both the provider session and the application user are required.
    pub fn check(ctx: &GuardContext<'_>, attempted: &str) -> GuardDecision {
        if ctx.authenticated && ctx.user.is_some() {
            GuardDecision::Allow
        } else {
            GuardDecision::Redirect {
                to: LOGIN_PATH,
                return_to: Some(attempted.to_string()),
            }
        }
    }
}

pub struct AdminGuard;

impl AdminGuard {
    pub fn check(ctx: &GuardContext<'_>) -> GuardDecision {
        match ctx.user {
            Some(user) if user.is_admin() => GuardDecision::Allow,
            _ => GuardDecision::Redirect {
                to: LANDING_PATH,
                return_to: None,
            },
        }
    }
}

/// The login URL that returns to `return_to` after sign-in.
pub fn login_redirect(return_to: &str) -> String {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("return_to", return_to)
        .finish();
    format!("{}?{}", LOGIN_PATH, query)
}

/// Runs whichever guards the route at `path` requires.
pub fn evaluate(ctx: &GuardContext<'_>, path: &str) -> GuardDecision {
    match Route::parse(path).access() {
        Access::Public => GuardDecision::Allow,
        Access::Protected => AuthGuard::check(ctx, path),
        Access::AdminOnly => match AuthGuard::check(ctx, path) {
            GuardDecision::Allow => AdminGuard::check(ctx),
            redirect => redirect,
        },
    }
}
