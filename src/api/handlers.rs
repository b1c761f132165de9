//! API request handlers.

use std::path::Path;

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::Redirect,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{AUTH_COOKIE, FLAVOR_COOKIE};
use crate::container::{Flavor, build_file_archive, remove_quietly};

use super::error::{ApiError, ApiResult};
use super::extract::ClientOrigin;
use super::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Shell flavor for the upcoming session; defaults to `shell`.
    #[serde(default)]
    pub flavor: Option<String>,
}

/// Login response body.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub flavor: Flavor,
}

/// Verify credentials, mint a session token, and record the chosen flavor.
///
/// POST /login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<LoginResponse>)> {
    let flavor: Flavor = request
        .flavor
        .as_deref()
        .unwrap_or("shell")
        .parse()
        .map_err(|err: crate::container::ContainerError| ApiError::bad_request(err.to_string()))?;

    if !state.gate.authenticate(&request.username, &request.password) {
        warn!(username = %request.username, "failed login attempt");
        return Err(ApiError::authentication_failed("invalid credentials"));
    }

    let token = nanoid::nanoid!();
    state.tokens.authorize(token.clone());
    info!(username = %request.username, %flavor, "login succeeded");

    let jar = jar
        .add(
            Cookie::build((AUTH_COOKIE, token.clone()))
                .path("/")
                .http_only(true)
                .build(),
        )
        .add(Cookie::build((FLAVOR_COOKIE, flavor.to_string())).path("/").build());

    Ok((jar, Json(LoginResponse { token, flavor })))
}

/// Revoke the session token, clear cookies, and send the client back to
/// the login page. Works with or without a live token.
///
/// POST|DELETE /logout
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(AUTH_COOKIE) {
        state.tokens.revoke(cookie.value());
    }
    let jar = jar
        .remove(Cookie::build(AUTH_COOKIE).path("/"))
        .remove(Cookie::build(FLAVOR_COOKIE).path("/"));
    (jar, Redirect::to("/login"))
}

/// Terminal resize request.
#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub cols: u16,
    pub rows: u16,
}

/// Propagate new terminal dimensions to the caller's container.
///
/// POST /resize
///
/// An origin without an active session is a no-op unless the slot is held
/// by someone else entirely, which is reported as a capacity rejection.
pub async fn resize(
    State(state): State<AppState>,
    origin: ClientOrigin,
    Json(request): Json<ResizeRequest>,
) -> ApiResult<StatusCode> {
    let Some(session) = state.registry.lookup(&origin.0) else {
        if state.admission.at_capacity() {
            return Err(ApiError::CapacityExceeded);
        }
        return Ok(StatusCode::NO_CONTENT);
    };

    state
        .runtime
        .resize(&session.container_id, request.cols, request.rows)
        .await;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload response body.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: String,
    pub file: String,
    pub size: usize,
}

/// Receive a file and inject it into the caller's container at `/`.
///
/// POST /uploads
pub async fn upload(
    State(state): State<AppState>,
    origin: ClientOrigin,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let session = match state.registry.lookup(&origin.0) {
        Some(session) => session,
        None if state.admission.at_capacity() => return Err(ApiError::CapacityExceeded),
        None => return Err(ApiError::bad_request("no active session for caller")),
    };

    let mut received: Option<(String, usize)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("reading upload: {err}")))?
    {
        let Some(file_name) = field.file_name().and_then(bare_file_name) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|err| ApiError::bad_request(format!("reading upload: {err}")))?;
        let staged = state.staging_dir.join(&file_name);
        tokio::fs::write(&staged, &data)
            .await
            .map_err(|err| ApiError::Injection(format!("staging upload: {err}")))?;
        received = Some((file_name, data.len()));
        break;
    }

    let Some((file_name, size)) = received else {
        return Err(ApiError::bad_request("upload carried no file"));
    };

    let staged = state.staging_dir.join(&file_name);
    let archive = state.staging_dir.join(format!("{file_name}.tar.gz"));
    let injected = build_file_archive(&staged, &archive)
        .map_err(|err| ApiError::Injection(format!("archiving upload: {err}")));
    let injected = match injected {
        Ok(()) => state
            .runtime
            .inject_file(&session.container_id, &archive, "/")
            .await
            .map_err(ApiError::from),
        Err(err) => Err(err),
    };

    // Staging cleanup is best-effort and never reported to the caller.
    remove_quietly(&staged);
    remove_quietly(&archive);
    injected?;

    info!(file = %file_name, size, container_id = %session.container_id, "file injected");
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            status: "received".to_string(),
            file: file_name,
            size,
        }),
    ))
}

/// Strip any path components from a client-supplied file name.
fn bare_file_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty() && name != "." && name != "..")
}
