use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use super::app_state::AppState;
use super::rest_api;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the axum router with all HTTP routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Restrict CORS to the configured public_url origin (or allow any for localhost dev)
    let public_url = &state.auth_config.public_url;
    let cors = if public_url.contains("localhost") || public_url.contains("127.0.0.1") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origin = public_url
            .parse::<HeaderValue>()
            .unwrap_or_else(|_| HeaderValue::from_static("https://localhost"));
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let upload_limit =
        DefaultBodyLimit::max(state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD));

    let api_routes = Router::new()
        // Server listing (anonymous unless a directive needs a session)
        .route(
            "/api/server/select",
            axum::routing::get(rest_api::list_servers),
        )
        // Channel media
        .route(
            "/api/channels/{channel_id}/icon",
            axum::routing::post(rest_api::upload_channel_icon)
                .delete(rest_api::clear_channel_icon)
                .layer(upload_limit),
        )
        .route(
            "/api/channels/{channel_id}/banner",
            axum::routing::post(rest_api::upload_channel_banner)
                .delete(rest_api::clear_channel_banner)
                .layer(upload_limit),
        )
        .route(
            "/api/channels/{channel_id}",
            axum::routing::delete(rest_api::delete_channel),
        );

    Router::new()
        .merge(api_routes)
        // Stored attachments, addressed by their storage path
        .nest_service("/media", ServeDir::new(&state.media_root))
        .layer(cors)
        .with_state(state)
}
