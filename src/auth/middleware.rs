//! Request authorization middleware.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;

use crate::api::AppState;

/// Cookie carrying the session token.
pub const AUTH_COOKIE: &str = "auth_token";

/// Cookie carrying the chosen shell flavor.
pub const FLAVOR_COOKIE: &str = "flavor";

/// Gate for protected surfaces.
///
/// Requests without a live authorized token are redirected to the login
/// page rather than errored.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let authorized = jar
        .get(AUTH_COOKIE)
        .map(|cookie| state.tokens.is_authorized(cookie.value()))
        .unwrap_or(false);
    if !authorized {
        return Redirect::to("/login").into_response();
    }
    next.run(request).await
}
