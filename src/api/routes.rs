//! API route definitions.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::auth::require_session;
use crate::ws;

use super::handlers;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Resize and upload are gated up front; the shell channel performs its
    // own checks after the upgrade so rejections reach the client as coded
    // close frames.
    let protected_routes = Router::new()
        .route("/resize", post(handlers::resize))
        .route("/uploads", post(handlers::upload))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout).delete(handlers::logout))
        .route("/health", get(handlers::health))
        .route("/ws", get(ws::ws_handler))
        .merge(protected_routes)
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
