pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::feedback::handlers;
use crate::state::AppState;

pub const FEEDBACK_PATH: &str = "/api/feedback";

const CORS_ALLOW_METHODS: &str = "POST, OPTIONS";
const CORS_ALLOW_HEADERS: &str = "Content-Type";

pub fn build_router(state: AppState) -> Router {
    let allow_origin = state.config.cors_allow_origin.clone();
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            FEEDBACK_PATH,
            post(handlers::handle_feedback)
                .options(handlers::handle_preflight)
                .fallback(handlers::handle_method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        // CORS headers go on every response, errors included, so the browser can read them
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            allow_origin,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        ))
        .with_state(state)
}
